//! Provider options, endpoint metadata, and file-friendly configuration.
//!
//! [`ProviderOptions`] is plain data assembled through [`ProviderOptionsBuilder`]; nothing is
//! validated until the options are handed to
//! [`TripItAuthentication`](crate::flows::TripItAuthentication), which rejects bad settings
//! before any request is served. [`ProviderConfig`] is the serde-facing mirror used to load
//! the same settings from JSON or any other serde format.

pub mod config;
pub mod endpoints;

pub use config::*;
pub use endpoints::*;

// self
use crate::{
	_prelude::*,
	auth::Secret,
	http::CertificateValidator,
	provider::AuthenticationEvents,
	state::StateCodec,
};

/// Default authentication type and caption.
pub const DEFAULT_AUTHENTICATION_TYPE: &str = "TripIt";
/// Default callback path the provider redirects back to.
pub const DEFAULT_CALLBACK_PATH: &str = "/signin-tripit";
/// Default timeout applied to each backchannel call.
pub const DEFAULT_BACKCHANNEL_TIMEOUT: StdDuration = StdDuration::from_secs(60);
/// Default cap on backchannel response bodies (10 MiB).
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

/// Configuration for a single TripIt sign-in integration.
///
/// Owned by the application and shared read-only across requests once the middleware is built.
#[derive(Clone)]
pub struct ProviderOptions {
	/// Name the resulting identities are issued under.
	pub authentication_type: String,
	/// Text a sign-in UI may display for this provider.
	pub caption: String,
	/// Provider-assigned client identifier.
	pub client_id: String,
	/// Provider-assigned client secret.
	pub client_secret: Secret,
	/// Permissions to request, in order.
	pub scope: Vec<String>,
	/// Character joining scopes in the `scope` parameter.
	pub scope_delimiter: char,
	/// Path within the application where the provider returns the user.
	pub callback_path: String,
	/// Timeout applied to each backchannel call.
	pub backchannel_timeout: StdDuration,
	/// Cap on backchannel response bodies.
	pub max_response_bytes: usize,
	/// Endpoint overrides; `None` uses the TripIt production endpoints.
	pub endpoints: Option<ProviderEndpoints>,
	/// Validator vetting the backchannel TLS peer.
	pub certificate_validator: Option<Arc<dyn CertificateValidator>>,
	/// State codec; `None` asks the host, then falls back to a signed codec.
	pub state_codec: Option<Arc<dyn StateCodec>>,
	/// Application hooks; `None` uses pass-through hooks.
	pub events: Option<Arc<dyn AuthenticationEvents>>,
	/// Downstream identity consumer; `None` uses the host default.
	pub sign_in_as: Option<String>,
}
impl ProviderOptions {
	/// Starts a builder seeded with the provider credentials and default settings.
	pub fn builder(
		client_id: impl Into<String>,
		client_secret: impl Into<Secret>,
	) -> ProviderOptionsBuilder {
		ProviderOptionsBuilder::new(client_id, client_secret)
	}
}
impl Debug for ProviderOptions {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProviderOptions")
			.field("authentication_type", &self.authentication_type)
			.field("caption", &self.caption)
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret)
			.field("scope", &self.scope)
			.field("scope_delimiter", &self.scope_delimiter)
			.field("callback_path", &self.callback_path)
			.field("backchannel_timeout", &self.backchannel_timeout)
			.field("max_response_bytes", &self.max_response_bytes)
			.field("endpoints", &self.endpoints)
			.field("certificate_validator_set", &self.certificate_validator.is_some())
			.field("state_codec_set", &self.state_codec.is_some())
			.field("events_set", &self.events.is_some())
			.field("sign_in_as", &self.sign_in_as)
			.finish()
	}
}

/// Builder for [`ProviderOptions`].
#[derive(Debug)]
pub struct ProviderOptionsBuilder {
	options: ProviderOptions,
}
impl ProviderOptionsBuilder {
	/// Creates a builder with default settings.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<Secret>) -> Self {
		Self {
			options: ProviderOptions {
				authentication_type: DEFAULT_AUTHENTICATION_TYPE.into(),
				caption: DEFAULT_AUTHENTICATION_TYPE.into(),
				client_id: client_id.into(),
				client_secret: client_secret.into(),
				scope: Vec::new(),
				scope_delimiter: ' ',
				callback_path: DEFAULT_CALLBACK_PATH.into(),
				backchannel_timeout: DEFAULT_BACKCHANNEL_TIMEOUT,
				max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
				endpoints: None,
				certificate_validator: None,
				state_codec: None,
				events: None,
				sign_in_as: None,
			},
		}
	}

	/// Overrides the authentication type identities are issued under.
	pub fn authentication_type(mut self, value: impl Into<String>) -> Self {
		self.options.authentication_type = value.into();

		self
	}

	/// Overrides the display caption.
	pub fn caption(mut self, value: impl Into<String>) -> Self {
		self.options.caption = value.into();

		self
	}

	/// Appends a single scope.
	pub fn scope(mut self, scope: impl Into<String>) -> Self {
		self.options.scope.push(scope.into());

		self
	}

	/// Appends multiple scopes.
	pub fn scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.options.scope.extend(scopes.into_iter().map(Into::into));

		self
	}

	/// Overrides the scope delimiter.
	pub fn scope_delimiter(mut self, delimiter: char) -> Self {
		self.options.scope_delimiter = delimiter;

		self
	}

	/// Overrides the callback path.
	pub fn callback_path(mut self, path: impl Into<String>) -> Self {
		self.options.callback_path = path.into();

		self
	}

	/// Overrides the backchannel timeout.
	pub fn backchannel_timeout(mut self, timeout: StdDuration) -> Self {
		self.options.backchannel_timeout = timeout;

		self
	}

	/// Overrides the backchannel response size cap.
	pub fn max_response_bytes(mut self, limit: usize) -> Self {
		self.options.max_response_bytes = limit;

		self
	}

	/// Overrides the provider endpoints.
	pub fn endpoints(mut self, endpoints: ProviderEndpoints) -> Self {
		self.options.endpoints = Some(endpoints);

		self
	}

	/// Installs a backchannel certificate validator.
	pub fn certificate_validator(mut self, validator: Arc<dyn CertificateValidator>) -> Self {
		self.options.certificate_validator = Some(validator);

		self
	}

	/// Installs a state codec.
	pub fn state_codec(mut self, codec: Arc<dyn StateCodec>) -> Self {
		self.options.state_codec = Some(codec);

		self
	}

	/// Installs application hooks.
	pub fn events(mut self, events: Arc<dyn AuthenticationEvents>) -> Self {
		self.options.events = Some(events);

		self
	}

	/// Overrides the sign-in target.
	pub fn sign_in_as(mut self, target: impl Into<String>) -> Self {
		self.options.sign_in_as = Some(target.into());

		self
	}

	/// Finishes the builder. Validation happens when the middleware is constructed.
	pub fn build(self) -> ProviderOptions {
		self.options
	}
}
