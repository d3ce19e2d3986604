// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
// self
use crate::{
	_prelude::*,
	state::{AuthorizationState, StateCodec, StateError},
};

type HmacSha256 = Hmac<Sha256>;

const ENVELOPE_VERSION: u8 = 1;
const NONCE_LEN: usize = 16;
const KEY_LEN: usize = 32;
const PURPOSE_SEPARATOR: u8 = 0x1f;
const CLOCK_SKEW: Duration = Duration::minutes(1);

/// Purposes used to bind the signing key to a middleware issuing `TripIt` identities.
pub const DEFAULT_STATE_PURPOSES: &[&str] = &["oauth2_tripit", "TripIt", "state.v1"];

/// Purposes binding the signing key to a middleware issuing `authentication_type` identities.
pub fn state_purposes(authentication_type: &str) -> [&str; 3] {
	["oauth2_tripit", authentication_type, "state.v1"]
}

/// HMAC-SHA256 signed state codec with a bounded lifetime.
///
/// Wire format: `base64url(json envelope) "." base64url(tag)`. The envelope carries the
/// version, issue time, a random nonce, and the state itself. The tag covers the encoded
/// envelope, so any change to either half fails verification.
#[derive(Clone)]
pub struct SignedStateCodec {
	key: [u8; KEY_LEN],
	max_age: Duration,
}
impl SignedStateCodec {
	/// Default lifetime of an issued state.
	pub const DEFAULT_MAX_AGE: Duration = Duration::minutes(15);

	/// Creates a codec whose signing key is derived from `secret` and `purposes`.
	///
	/// Codecs built from the same secret but different purposes cannot read each other's output.
	pub fn new(secret: impl AsRef<[u8]>, purposes: &[&str]) -> Result<Self, StateError> {
		let mut mac =
			HmacSha256::new_from_slice(secret.as_ref()).map_err(|_| StateError::InvalidKey)?;

		for (idx, purpose) in purposes.iter().enumerate() {
			if idx > 0 {
				mac.update(&[PURPOSE_SEPARATOR]);
			}

			mac.update(purpose.as_bytes());
		}

		let mut key = [0_u8; KEY_LEN];

		key.copy_from_slice(&mac.finalize().into_bytes());

		Ok(Self { key, max_age: Self::DEFAULT_MAX_AGE })
	}

	/// Creates a codec keyed with fresh random material.
	///
	/// States issued by one process cannot be read by another; use [`SignedStateCodec::new`]
	/// with a shared secret when several instances serve the same callback path.
	pub fn random(purposes: &[&str]) -> Result<Self, StateError> {
		let secret: [u8; KEY_LEN] = rand::random();

		Self::new(secret, purposes)
	}

	/// Overrides how long an issued state stays valid.
	pub fn with_max_age(mut self, max_age: Duration) -> Self {
		self.max_age = if max_age.is_negative() { Duration::ZERO } else { max_age };

		self
	}

	/// Configured state lifetime.
	pub fn max_age(&self) -> Duration {
		self.max_age
	}

	pub(crate) fn encode_at(
		&self,
		state: &AuthorizationState,
		now: OffsetDateTime,
	) -> Result<String, StateError> {
		let nonce: [u8; NONCE_LEN] = rand::random();
		let envelope = Envelope {
			v: ENVELOPE_VERSION,
			iat: now.unix_timestamp(),
			nonce: URL_SAFE_NO_PAD.encode(nonce),
			state: state.clone(),
		};
		let json = serde_json::to_vec(&envelope).map_err(StateError::Serialize)?;
		let payload = URL_SAFE_NO_PAD.encode(json);
		let tag = URL_SAFE_NO_PAD.encode(self.sign(payload.as_bytes())?);

		Ok(format!("{payload}.{tag}"))
	}

	pub(crate) fn decode_at(
		&self,
		protected: &str,
		now: OffsetDateTime,
	) -> Result<AuthorizationState, StateError> {
		let (payload, tag) = protected.split_once('.').ok_or(StateError::Malformed)?;
		let tag = URL_SAFE_NO_PAD.decode(tag).map_err(|_| StateError::Malformed)?;

		self.verify(payload.as_bytes(), &tag)?;

		let json = URL_SAFE_NO_PAD.decode(payload).map_err(|_| StateError::Malformed)?;
		let envelope: Envelope =
			serde_path_to_error::deserialize(&mut serde_json::Deserializer::from_slice(&json))?;

		if envelope.v != ENVELOPE_VERSION {
			return Err(StateError::UnsupportedVersion { version: envelope.v });
		}

		let issued_at = OffsetDateTime::from_unix_timestamp(envelope.iat)
			.map_err(|_| StateError::Malformed)?;
		let age = now - issued_at;

		if age > self.max_age || age < -CLOCK_SKEW {
			return Err(StateError::Expired);
		}

		Ok(envelope.state)
	}

	fn mac(&self) -> Result<HmacSha256, StateError> {
		HmacSha256::new_from_slice(&self.key).map_err(|_| StateError::InvalidKey)
	}

	fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, StateError> {
		let mut mac = self.mac()?;

		mac.update(payload);

		Ok(mac.finalize().into_bytes().to_vec())
	}

	fn verify(&self, payload: &[u8], tag: &[u8]) -> Result<(), StateError> {
		let mut mac = self.mac()?;

		mac.update(payload);
		mac.verify_slice(tag).map_err(|_| StateError::SignatureMismatch)
	}
}
impl StateCodec for SignedStateCodec {
	fn encode(&self, state: &AuthorizationState) -> Result<String, StateError> {
		self.encode_at(state, OffsetDateTime::now_utc())
	}

	fn decode(&self, protected: &str) -> Result<AuthorizationState, StateError> {
		self.decode_at(protected, OffsetDateTime::now_utc())
	}
}
impl Debug for SignedStateCodec {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SignedStateCodec")
			.field("key", &"<redacted>")
			.field("max_age", &self.max_age)
			.finish()
	}
}

#[derive(Serialize, Deserialize)]
struct Envelope {
	v: u8,
	iat: i64,
	nonce: String,
	state: AuthorizationState,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn codec() -> SignedStateCodec {
		SignedStateCodec::new(b"unit-test-secret", DEFAULT_STATE_PURPOSES)
			.expect("Codec fixture should build.")
	}

	fn sample_state() -> AuthorizationState {
		AuthorizationState::new("https://app.example.com/trips?tab=upcoming")
			.with_property("locale", "nb-NO")
			.with_property("prompt", "login")
	}

	#[test]
	fn round_trip_preserves_state() {
		let codec = codec();
		let state = sample_state();
		let protected = codec.encode(&state).expect("State should encode.");
		let decoded = codec.decode(&protected).expect("State should decode.");

		assert_eq!(decoded, state);
	}

	#[test]
	fn empty_state_round_trips() {
		let codec = codec();
		let state = AuthorizationState::default();
		let protected = codec.encode(&state).expect("State should encode.");

		assert_eq!(codec.decode(&protected).expect("State should decode."), state);
	}

	#[test]
	fn every_single_character_change_is_rejected() {
		let codec = codec();
		let protected = codec.encode(&sample_state()).expect("State should encode.");

		for idx in 0..protected.len() {
			let mut bytes = protected.clone().into_bytes();

			bytes[idx] = if bytes[idx] == b'A' { b'B' } else { b'A' };

			let tampered = String::from_utf8(bytes).expect("Tampered value stays ASCII.");

			assert!(codec.decode(&tampered).is_err(), "Change at index {idx} must be rejected.");
		}
	}

	#[test]
	fn foreign_strings_are_rejected() {
		let codec = codec();

		for candidate in ["", ".", "abc", "abc.def", "e30.e30", "not base64!.AAAA"] {
			assert!(codec.decode(candidate).is_err(), "`{candidate}` must be rejected.");
		}
	}

	#[test]
	fn purposes_isolate_keys() {
		let codec = codec();
		let other = SignedStateCodec::new(b"unit-test-secret", &["another-purpose"])
			.expect("Codec fixture should build.");
		let protected = codec.encode(&sample_state()).expect("State should encode.");

		assert!(matches!(other.decode(&protected), Err(StateError::SignatureMismatch)));
	}

	#[test]
	fn expired_and_future_states_are_rejected() {
		let codec = codec().with_max_age(Duration::minutes(5));
		let now = OffsetDateTime::now_utc();
		let protected = codec.encode_at(&sample_state(), now).expect("State should encode.");

		assert!(codec.decode_at(&protected, now + Duration::minutes(4)).is_ok());
		assert!(matches!(
			codec.decode_at(&protected, now + Duration::minutes(6)),
			Err(StateError::Expired)
		));
		assert!(matches!(
			codec.decode_at(&protected, now - Duration::minutes(10)),
			Err(StateError::Expired)
		));
	}

	#[test]
	fn default_purposes_match_default_authentication_type() {
		assert_eq!(state_purposes("TripIt").as_slice(), DEFAULT_STATE_PURPOSES);
	}

	#[test]
	fn random_codecs_do_not_share_keys() {
		let lhs = SignedStateCodec::random(DEFAULT_STATE_PURPOSES).expect("Codec should build.");
		let rhs = SignedStateCodec::random(DEFAULT_STATE_PURPOSES).expect("Codec should build.");
		let protected = lhs.encode(&sample_state()).expect("State should encode.");

		assert!(rhs.decode(&protected).is_err());
		assert!(format!("{lhs:?}").contains("<redacted>"));
	}
}
