//! Error taxonomy shared by construction, the authorization handshake, and extension hooks.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem; surfaces while constructing the middleware.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// The authorization handshake failed for the current request.
	#[error(transparent)]
	Protocol(#[from] ProtocolError),
	/// An embedding-application hook stopped the flow.
	#[error(transparent)]
	Extension(#[from] ExtensionError),
}
impl Error {
	/// Returns the failure label for request-scoped errors.
	///
	/// Configuration errors are not tied to a request and return `None`.
	pub fn reason(&self) -> Option<FailureReason> {
		match self {
			Self::Config(_) => None,
			Self::Protocol(e) => Some(e.reason()),
			Self::Extension(e) => Some(e.reason()),
		}
	}

	/// Backchannel call that was in flight when the request failed, if any.
	pub fn stage(&self) -> Option<BackchannelStage> {
		match self {
			Self::Protocol(e) => e.stage(),
			Self::Config(_) | Self::Extension(_) => None,
		}
	}
}

/// Configuration failures raised before any request is served.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A required option is empty or whitespace.
	#[error("The `{option}` option must be provided.")]
	MissingOption {
		/// Name of the missing option.
		option: &'static str,
	},
	/// A certificate validator was supplied for a transport that cannot hook peer validation.
	#[error(
		"A backchannel certificate validator was supplied but the backchannel transport cannot hook certificate validation."
	)]
	ValidatorTransportMismatch,
	/// Endpoint URL failed validation.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Endpoint URL could not be parsed.
	#[error("The {endpoint} endpoint is not a valid URL.")]
	InvalidEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Callback path must be an absolute path without query or fragment.
	#[error("Callback path `{path}` must start with `/` and carry no query or fragment.")]
	InvalidCallbackPath {
		/// Offending callback path.
		path: String,
	},
	/// Identifier option failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Requested scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Backchannel timeout must be positive.
	#[error("Backchannel timeout must be greater than zero.")]
	InvalidTimeout,
	/// Backchannel response limit must be positive.
	#[error("Backchannel response limit must be greater than zero.")]
	InvalidResponseLimit,
	/// Scope delimiter is a control character.
	#[error("Scope delimiter must be a printable character.")]
	InvalidScopeDelimiter {
		/// Invalid delimiter that was supplied.
		delimiter: char,
	},
	/// State codec could not be constructed.
	#[error("State codec could not be constructed.")]
	StateCodec(#[source] crate::state::StateError),
	/// Serialized configuration could not be parsed.
	#[error("Provider configuration is invalid at `{path}`.")]
	InvalidConfig {
		/// Path to the offending field.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: serde_json::Error,
	},
	/// Certificate thumbprint is not a base64-encoded SHA-256 digest.
	#[error("Certificate thumbprint `{value}` is not a base64-encoded SHA-256 digest.")]
	InvalidThumbprint {
		/// Offending thumbprint.
		value: String,
	},
	/// No sign-in target was configured and the host supplied no default.
	#[error("No sign-in target was configured and the host has no default.")]
	MissingSignInTarget,
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// TLS configuration for certificate validation could not be assembled.
	#[error("TLS configuration for certificate validation could not be assembled.")]
	Tls {
		/// Underlying TLS failure.
		#[source]
		source: BoxError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	/// Wraps a TLS setup failure inside [`ConfigError`].
	pub fn tls(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Tls { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Stable labels describing why a request did not produce a redirect or an identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
	/// Provider reported an authorization error on the callback.
	RemoteError,
	/// State parameter was absent, forged, altered, expired, or not bound to this browser.
	InvalidState,
	/// The state codec failed while protecting a new state.
	StateProtectionFailed,
	/// Token endpoint rejected the exchange or returned an unusable body.
	ExchangeFailed,
	/// Token endpoint did not answer within the backchannel timeout.
	ExchangeTimeout,
	/// User-info endpoint returned a non-success response.
	ProfileFetchFailed,
	/// User-info endpoint did not answer within the backchannel timeout.
	ProfileTimeout,
	/// User-info payload lacked a usable external identifier.
	MalformedProfile,
	/// The surrounding request was cancelled during a backchannel call.
	Cancelled,
	/// An embedding-application hook rejected the flow.
	Rejected,
}
impl FailureReason {
	/// Returns a stable label suitable for span, metric, or log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::RemoteError => "remote_error",
			Self::InvalidState => "invalid_state",
			Self::StateProtectionFailed => "state_protection_failed",
			Self::ExchangeFailed => "exchange_failed",
			Self::ExchangeTimeout => "exchange_timeout",
			Self::ProfileFetchFailed => "profile_fetch_failed",
			Self::ProfileTimeout => "profile_timeout",
			Self::MalformedProfile => "malformed_profile",
			Self::Cancelled => "cancelled",
			Self::Rejected => "rejected",
		}
	}
}
impl Display for FailureReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Backchannel call that was in flight when a failure occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BackchannelStage {
	/// Authorization artifact exchange against the token endpoint.
	TokenExchange,
	/// Authenticated user-info request.
	ProfileFetch,
}
impl BackchannelStage {
	/// Returns a stable label suitable for span or log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::TokenExchange => "token_exchange",
			Self::ProfileFetch => "profile_fetch",
		}
	}
}
impl Display for BackchannelStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Request-scoped handshake failures.
#[derive(Debug, ThisError)]
pub enum ProtocolError {
	/// Provider returned an `error` parameter on the callback.
	#[error("Provider reported an authorization error: {error}.")]
	RemoteError {
		/// Provider-supplied `error` value.
		error: String,
		/// Provider-supplied `error_description`, when present.
		description: Option<String>,
	},
	/// State was absent, failed to decode, or was not bound to this browser.
	#[error("Authorization state is missing or invalid.")]
	InvalidState(#[source] crate::state::StateError),
	/// State could not be protected while building the authorization redirect.
	#[error("Authorization state could not be protected.")]
	StateProtection(#[source] crate::state::StateError),
	/// Token exchange failed.
	#[error("Token exchange failed: {message}.")]
	ExchangeFailed {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token exchange exceeded the backchannel timeout.
	#[error("Token exchange timed out.")]
	ExchangeTimeout,
	/// Profile fetch failed.
	#[error("Profile fetch failed: {message}.")]
	ProfileFetchFailed {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Profile fetch exceeded the backchannel timeout.
	#[error("Profile fetch timed out.")]
	ProfileTimeout,
	/// Profile payload was unusable.
	#[error("Profile payload is malformed: {message}.")]
	MalformedProfile {
		/// Summary of the problem.
		message: String,
	},
	/// Request was cancelled during a backchannel call.
	#[error("Request was cancelled during the {stage} call.")]
	Cancelled {
		/// Backchannel call that was abandoned.
		stage: BackchannelStage,
	},
}
impl ProtocolError {
	/// Builds the failure for a non-timeout backchannel error at `stage`.
	pub fn failed(
		stage: BackchannelStage,
		message: impl Into<String>,
		status: Option<u16>,
	) -> Self {
		let message = message.into();

		match stage {
			BackchannelStage::TokenExchange => Self::ExchangeFailed { message, status },
			BackchannelStage::ProfileFetch => Self::ProfileFetchFailed { message, status },
		}
	}

	/// Builds the timeout failure for `stage`.
	pub fn timeout(stage: BackchannelStage) -> Self {
		match stage {
			BackchannelStage::TokenExchange => Self::ExchangeTimeout,
			BackchannelStage::ProfileFetch => Self::ProfileTimeout,
		}
	}

	/// Backchannel call this failure belongs to, if any.
	pub fn stage(&self) -> Option<BackchannelStage> {
		match self {
			Self::ExchangeFailed { .. } | Self::ExchangeTimeout =>
				Some(BackchannelStage::TokenExchange),
			Self::ProfileFetchFailed { .. }
			| Self::ProfileTimeout
			| Self::MalformedProfile { .. } => Some(BackchannelStage::ProfileFetch),
			Self::Cancelled { stage } => Some(*stage),
			Self::RemoteError { .. } | Self::InvalidState(_) | Self::StateProtection(_) => None,
		}
	}

	/// Returns the failure label.
	pub fn reason(&self) -> FailureReason {
		match self {
			Self::RemoteError { .. } => FailureReason::RemoteError,
			Self::InvalidState(_) => FailureReason::InvalidState,
			Self::StateProtection(_) => FailureReason::StateProtectionFailed,
			Self::ExchangeFailed { .. } => FailureReason::ExchangeFailed,
			Self::ExchangeTimeout => FailureReason::ExchangeTimeout,
			Self::ProfileFetchFailed { .. } => FailureReason::ProfileFetchFailed,
			Self::ProfileTimeout => FailureReason::ProfileTimeout,
			Self::MalformedProfile { .. } => FailureReason::MalformedProfile,
			Self::Cancelled { .. } => FailureReason::Cancelled,
		}
	}
}

/// Failures raised by embedding-application hooks.
#[derive(Debug, ThisError)]
pub enum ExtensionError {
	/// A hook rejected the authenticated identity.
	#[error("Authentication was rejected by the application: {reason}.")]
	Rejected {
		/// Application-supplied reason.
		reason: String,
	},
}
impl ExtensionError {
	/// Returns the failure label.
	pub fn reason(&self) -> FailureReason {
		match self {
			Self::Rejected { .. } => FailureReason::Rejected,
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::state::StateError;

	#[test]
	fn stage_helpers_pick_matching_variants() {
		assert_eq!(
			ProtocolError::timeout(BackchannelStage::TokenExchange).reason(),
			FailureReason::ExchangeTimeout
		);
		assert_eq!(
			ProtocolError::timeout(BackchannelStage::ProfileFetch).reason(),
			FailureReason::ProfileTimeout
		);
		assert_eq!(
			ProtocolError::failed(BackchannelStage::ProfileFetch, "boom", Some(500)).reason(),
			FailureReason::ProfileFetchFailed
		);
	}

	#[test]
	fn backchannel_failures_report_their_stage() {
		assert_eq!(
			Error::from(ProtocolError::ExchangeTimeout).stage(),
			Some(BackchannelStage::TokenExchange)
		);
		assert_eq!(
			Error::from(ProtocolError::MalformedProfile { message: "no id".into() }).stage(),
			Some(BackchannelStage::ProfileFetch)
		);
		assert_eq!(
			ProtocolError::Cancelled { stage: BackchannelStage::ProfileFetch }.stage(),
			Some(BackchannelStage::ProfileFetch)
		);

		let protection = Error::from(ProtocolError::StateProtection(StateError::InvalidKey));

		assert_eq!(protection.reason(), Some(FailureReason::StateProtectionFailed));
		assert_eq!(protection.stage(), None);
	}

	#[test]
	fn config_errors_have_no_request_reason() {
		let err = Error::from(ConfigError::MissingOption { option: "client_secret" });

		assert_eq!(err.reason(), None);
		assert_eq!(err.to_string(), "The `client_secret` option must be provided.");
	}
}
