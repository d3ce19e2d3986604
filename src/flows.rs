//! The TripIt sign-in middleware: construction, authorization redirect, callback handling,
//! and request dispatch.

mod callback;
mod challenge;
mod middleware;

pub use callback::*;
pub use challenge::*;
pub use middleware::*;

// self
use crate::{
	_prelude::*,
	auth::{AuthenticationType, ClientId, ScopeList},
	error::ConfigError,
	http::BackchannelHttpClient,
	oauth::{BackchannelFacade, TransportErrorMapper},
	options::{ProviderEndpoints, ProviderOptions},
	provider::{AuthenticationEvents, AuthenticationHost, DefaultAuthenticationEvents},
	state::{SignedStateCodec, StateCodec, state_purposes},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

/// Middleware specialized for the crate's default reqwest transport stack.
#[cfg(feature = "reqwest")]
pub type ReqwestTripItAuthentication =
	TripItAuthentication<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// TripIt sign-in middleware bound to validated [`ProviderOptions`].
///
/// Construction validates every option and fails fast; a constructed value only holds
/// read-only settings plus the shared backchannel transport, so concurrent callbacks need no
/// coordination. Share it behind an [`Arc`] across request handlers.
pub struct TripItAuthentication<C, M>
where
	C: BackchannelHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	authentication_type: AuthenticationType,
	caption: String,
	client_id: ClientId,
	scope: ScopeList,
	scope_delimiter: char,
	callback_path: String,
	backchannel_timeout: StdDuration,
	sign_in_as: String,
	state_codec: Arc<dyn StateCodec>,
	events: Arc<dyn AuthenticationEvents>,
	facade: BackchannelFacade<C, M>,
}
impl<C, M> TripItAuthentication<C, M>
where
	C: BackchannelHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Validates `options` and binds them to a caller-provided transport + mapper pair.
	///
	/// Fails when a credential is blank, an identifier or scope is malformed, the callback path
	/// or timeout is unusable, an endpoint is not HTTPS, no sign-in target can be resolved, or a
	/// certificate validator is supplied for a transport that cannot honor it.
	pub fn with_http_client(
		options: ProviderOptions,
		host: &dyn AuthenticationHost,
		mut http_client: C,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		if options.client_id.trim().is_empty() {
			return Err(ConfigError::MissingOption { option: "client_id" }.into());
		}
		if options.client_secret.is_blank() {
			return Err(ConfigError::MissingOption { option: "client_secret" }.into());
		}

		let client_id = ClientId::new(&options.client_id).map_err(ConfigError::from)?;
		let authentication_type =
			AuthenticationType::new(&options.authentication_type).map_err(ConfigError::from)?;
		let scope = ScopeList::new(options.scope.iter()).map_err(ConfigError::from)?;

		if options.scope_delimiter.is_control() {
			return Err(ConfigError::InvalidScopeDelimiter { delimiter: options.scope_delimiter }
				.into());
		}

		validate_callback_path(&options.callback_path)?;

		if options.backchannel_timeout.is_zero() {
			return Err(ConfigError::InvalidTimeout.into());
		}
		if options.max_response_bytes == 0 {
			return Err(ConfigError::InvalidResponseLimit.into());
		}

		let endpoints = match options.endpoints {
			Some(endpoints) => endpoints,
			None => ProviderEndpoints::tripit()?,
		};

		endpoints.validate()?;

		let sign_in_as = options
			.sign_in_as
			.filter(|target| !target.trim().is_empty())
			.or_else(|| host.default_sign_in_as().filter(|target| !target.trim().is_empty()))
			.ok_or(ConfigError::MissingSignInTarget)?;
		let purposes = state_purposes(authentication_type.as_ref());
		let state_codec = match options.state_codec.or_else(|| host.state_codec(&purposes)) {
			Some(codec) => codec,
			None => Arc::new(SignedStateCodec::random(&purposes).map_err(ConfigError::StateCodec)?),
		};

		if let Some(validator) = options.certificate_validator {
			if !http_client.supports_certificate_validation() {
				return Err(ConfigError::ValidatorTransportMismatch.into());
			}

			http_client.install_certificate_validator(validator)?;
		}

		http_client.limit_response_bytes(options.max_response_bytes);

		let events = options.events.unwrap_or_else(|| Arc::new(DefaultAuthenticationEvents));
		let facade = BackchannelFacade::new(
			endpoints,
			client_id.clone(),
			options.client_secret,
			options.max_response_bytes,
			Arc::new(http_client),
			error_mapper.into(),
		);

		Ok(Self {
			authentication_type,
			caption: options.caption,
			client_id,
			scope,
			scope_delimiter: options.scope_delimiter,
			callback_path: options.callback_path,
			backchannel_timeout: options.backchannel_timeout,
			sign_in_as,
			state_codec,
			events,
			facade,
		})
	}

	/// Authentication type identities are issued under.
	pub fn authentication_type(&self) -> &AuthenticationType {
		&self.authentication_type
	}

	/// Text a sign-in UI may display for this provider.
	pub fn caption(&self) -> &str {
		&self.caption
	}

	/// Configured callback path.
	pub fn callback_path(&self) -> &str {
		&self.callback_path
	}

	/// Resolved sign-in target.
	pub fn sign_in_as(&self) -> &str {
		&self.sign_in_as
	}

	/// Endpoints the middleware talks to.
	pub fn endpoints(&self) -> &ProviderEndpoints {
		self.facade.endpoints()
	}

	/// State codec protecting the `state` parameter.
	pub fn state_codec(&self) -> &Arc<dyn StateCodec> {
		&self.state_codec
	}

	/// Name of the cookie carrying the correlation value between challenge and callback.
	pub fn correlation_cookie_name(&self) -> String {
		format!(".oauth2_tripit.correlation.{}", self.authentication_type)
	}
}
#[cfg(feature = "reqwest")]
impl TripItAuthentication<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Validates `options` and provisions the crate's own reqwest-backed transport.
	///
	/// The managed transport can honor a certificate validator supplied in `options`.
	pub fn new(options: ProviderOptions, host: &dyn AuthenticationHost) -> Result<Self> {
		Self::with_http_client(
			options,
			host,
			ReqwestHttpClient::new()?,
			Arc::new(ReqwestTransportErrorMapper),
		)
	}
}
impl<C, M> Debug for TripItAuthentication<C, M>
where
	C: BackchannelHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TripItAuthentication")
			.field("authentication_type", &self.authentication_type)
			.field("client_id", &self.client_id)
			.field("scope", &self.scope)
			.field("callback_path", &self.callback_path)
			.field("backchannel_timeout", &self.backchannel_timeout)
			.field("sign_in_as", &self.sign_in_as)
			.field("endpoints", self.facade.endpoints())
			.finish()
	}
}

fn validate_callback_path(path: &str) -> Result<(), ConfigError> {
	if !path.starts_with('/') || path.contains(['?', '#']) || path.chars().any(char::is_whitespace)
	{
		return Err(ConfigError::InvalidCallbackPath { path: path.to_owned() });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn callback_paths_must_be_plain_absolute_paths() {
		assert!(validate_callback_path("/signin-tripit").is_ok());
		assert!(validate_callback_path("/auth/tripit/callback").is_ok());

		for path in ["", "signin-tripit", "/cb?x=1", "/cb#frag", "/sign in"] {
			let result = validate_callback_path(path);

			assert!(
				matches!(result, Err(ConfigError::InvalidCallbackPath { .. })),
				"`{path}` must be rejected."
			);
		}
	}
}
