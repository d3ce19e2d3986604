//! Authorization state carried through the browser as the OAuth `state` parameter.
//!
//! [`AuthorizationState`] records where the user should land after sign-in plus any
//! caller-supplied properties. A [`StateCodec`] turns it into an opaque, tamper-evident string
//! before the redirect and back into the original value when the callback arrives. The host
//! may supply its own codec (for example one backed by a shared data-protection service);
//! otherwise [`SignedStateCodec`] is used.
//!
//! Every issued state also carries a random correlation value under [`CORRELATION_PROPERTY`].
//! The host hands the same value to the browser as a cookie, and a callback is accepted only
//! when the cookie comes back matching, so a state is bound to the browser it was issued to.

mod signed;

pub use signed::*;

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::_prelude::*;

/// Reserved state property holding the correlation value.
pub const CORRELATION_PROPERTY: &str = ".xsrf";

const CORRELATION_LEN: usize = 32;

/// Post-login target and caller properties correlated with a single authorization redirect.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationState {
	/// Where the user should be sent once the callback completes.
	pub return_url: String,
	/// Arbitrary caller-supplied properties that round-trip with the state.
	#[serde(default)]
	pub properties: BTreeMap<String, String>,
}
impl AuthorizationState {
	/// Creates a state targeting `return_url` with no properties.
	pub fn new(return_url: impl Into<String>) -> Self {
		Self { return_url: return_url.into(), properties: BTreeMap::new() }
	}

	/// Adds or replaces a caller property.
	pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.properties.insert(key.into(), value.into());

		self
	}
}

/// Errors raised while protecting or unprotecting authorization state.
#[derive(Debug, ThisError)]
pub enum StateError {
	/// The callback carried no `state` parameter.
	#[error("The state parameter is missing.")]
	Missing,
	/// The protected value is not in the expected shape.
	#[error("The state value is malformed.")]
	Malformed,
	/// The payload does not match its signature.
	#[error("The state signature does not match its payload.")]
	SignatureMismatch,
	/// The state was issued too long ago (or in the future).
	#[error("The state has expired.")]
	Expired,
	/// The envelope was produced by an unknown codec version.
	#[error("The state envelope version {version} is not supported.")]
	UnsupportedVersion {
		/// Version found in the envelope.
		version: u8,
	},
	/// The payload could not be parsed after its signature was verified.
	#[error("The state payload could not be parsed.")]
	Payload(#[from] serde_path_to_error::Error<serde_json::Error>),
	/// The state could not be serialized.
	#[error("The state could not be serialized.")]
	Serialize(#[source] serde_json::Error),
	/// The signing key was rejected by the MAC implementation.
	#[error("The state signing key is invalid.")]
	InvalidKey,
	/// The callback arrived without the correlation cookie.
	#[error("The correlation cookie is missing.")]
	CorrelationMissing,
	/// The correlation cookie does not match the value bound into the state.
	#[error("The correlation cookie does not match the state.")]
	CorrelationMismatch,
}

/// Produces and verifies opaque, tamper-evident representations of [`AuthorizationState`].
///
/// Implementations must fail [`decode`](StateCodec::decode) for any string they did not
/// produce, including altered copies of strings they did produce. Codecs that support
/// expiry must reject stale values instead of returning them.
pub trait StateCodec
where
	Self: Send + Sync,
{
	/// Protects `state` into an opaque string suitable for a query parameter.
	fn encode(&self, state: &AuthorizationState) -> Result<String, StateError>;

	/// Verifies and unprotects a value produced by [`encode`](StateCodec::encode).
	fn decode(&self, protected: &str) -> Result<AuthorizationState, StateError>;
}

/// Fresh random correlation value, URL-safe and cookie-safe.
pub(crate) fn new_correlation() -> String {
	let bytes: [u8; CORRELATION_LEN] = rand::random();

	URL_SAFE_NO_PAD.encode(bytes)
}

/// Checks the correlation cookie against the value bound into `state` and strips it.
pub(crate) fn verify_correlation(
	mut state: AuthorizationState,
	presented: Option<&str>,
) -> Result<AuthorizationState, StateError> {
	let expected =
		state.properties.remove(CORRELATION_PROPERTY).ok_or(StateError::CorrelationMismatch)?;
	let presented = presented.ok_or(StateError::CorrelationMissing)?;

	if !fixed_time_eq(expected.as_bytes(), presented.as_bytes()) {
		return Err(StateError::CorrelationMismatch);
	}

	Ok(state)
}

fn fixed_time_eq(a: &[u8], b: &[u8]) -> bool {
	if a.len() != b.len() {
		return false;
	}

	a.iter().zip(b).fold(0_u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn bound(correlation: &str) -> AuthorizationState {
		AuthorizationState::new("/trips")
			.with_property("tab", "upcoming")
			.with_property(CORRELATION_PROPERTY, correlation)
	}

	#[test]
	fn correlations_are_fresh_and_cookie_safe() {
		let first = new_correlation();

		assert_ne!(first, new_correlation());
		assert!(first.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'));
	}

	#[test]
	fn matching_correlation_is_stripped() {
		let state =
			verify_correlation(bound("abc"), Some("abc")).expect("Matching cookie should pass.");

		assert!(!state.properties.contains_key(CORRELATION_PROPERTY));
		assert_eq!(state.properties.get("tab").map(String::as_str), Some("upcoming"));
	}

	#[test]
	fn missing_or_foreign_correlation_is_rejected() {
		assert!(matches!(
			verify_correlation(bound("abc"), None),
			Err(StateError::CorrelationMissing)
		));
		assert!(matches!(
			verify_correlation(bound("abc"), Some("abd")),
			Err(StateError::CorrelationMismatch)
		));
		assert!(matches!(
			verify_correlation(bound("abc"), Some("abcd")),
			Err(StateError::CorrelationMismatch)
		));
		assert!(matches!(
			verify_correlation(AuthorizationState::new("/trips"), Some("abc")),
			Err(StateError::CorrelationMismatch)
		));
	}
}
