//! Access credentials, remote profiles, and the identity assertion handed to the host.

// self
use crate::{
	_prelude::*,
	auth::{AuthenticationType, ExternalId, Secret},
};

/// Claim type carrying the provider's stable user identifier.
pub const CLAIM_NAME_IDENTIFIER: &str = "name_identifier";
/// Claim type carrying the user's display name.
pub const CLAIM_NAME: &str = "name";
/// Prefix applied to claims derived from raw profile attributes.
pub const CLAIM_ATTRIBUTE_PREFIX: &str = "urn:tripit:";

/// Access credential issued by the token endpoint.
///
/// The credential only lives for the duration of a callback: it authenticates the
/// profile fetch and is handed to the `authenticated` hook, then dropped.
#[derive(Clone, Debug)]
pub struct AccessCredential {
	/// Bearer token value.
	pub token: Secret,
	/// Lifetime reported by the provider, when supplied.
	pub expires_in: Option<StdDuration>,
}
impl AccessCredential {
	/// Wraps a token with an optional lifetime.
	pub fn new(token: impl Into<Secret>, expires_in: Option<StdDuration>) -> Self {
		Self { token: token.into(), expires_in }
	}
}

/// User profile returned by the provider's user-info endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteUserProfile {
	/// Stable identifier assigned by the provider.
	pub external_id: ExternalId,
	/// Display name, when the provider returns one.
	pub display_name: Option<String>,
	/// Remaining scalar attributes keyed by their JSON field name.
	pub raw_attributes: BTreeMap<String, String>,
}

/// Single `(type, value)` pair asserted about the user.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Claim {
	/// Claim type.
	pub claim_type: String,
	/// Claim value.
	pub value: String,
	/// Authentication type that issued the claim.
	pub issuer: String,
}
impl Claim {
	/// Creates a new claim.
	pub fn new(
		claim_type: impl Into<String>,
		value: impl Into<String>,
		issuer: impl Into<String>,
	) -> Self {
		Self { claim_type: claim_type.into(), value: value.into(), issuer: issuer.into() }
	}
}

/// Identity produced by a successful callback, ready for session issuance by the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityAssertion {
	/// Stable identifier assigned by the provider.
	pub external_id: ExternalId,
	/// Display name, when known.
	pub display_name: Option<String>,
	/// Claim set describing the user.
	pub claims: BTreeSet<Claim>,
	/// Authentication type the assertion was issued under.
	pub provider_name: AuthenticationType,
}
impl IdentityAssertion {
	/// Maps a remote profile into an assertion issued under `provider_name`.
	pub fn from_profile(profile: &RemoteUserProfile, provider_name: &AuthenticationType) -> Self {
		let issuer = provider_name.to_string();
		let mut claims = BTreeSet::new();

		claims.insert(Claim::new(CLAIM_NAME_IDENTIFIER, profile.external_id.as_ref(), &issuer));

		if let Some(name) = &profile.display_name {
			claims.insert(Claim::new(CLAIM_NAME, name, &issuer));
		}
		for (key, value) in &profile.raw_attributes {
			claims.insert(Claim::new(format!("{CLAIM_ATTRIBUTE_PREFIX}{key}"), value, &issuer));
		}

		Self {
			external_id: profile.external_id.clone(),
			display_name: profile.display_name.clone(),
			claims,
			provider_name: provider_name.clone(),
		}
	}

	/// Adds a claim issued under this assertion's provider name.
	pub fn add_claim(&mut self, claim_type: impl Into<String>, value: impl Into<String>) {
		let issuer = self.provider_name.to_string();

		self.claims.insert(Claim::new(claim_type, value, issuer));
	}

	/// Removes every claim of `claim_type`, returning how many were dropped.
	pub fn remove_claims(&mut self, claim_type: &str) -> usize {
		let before = self.claims.len();

		self.claims.retain(|claim| claim.claim_type != claim_type);

		before - self.claims.len()
	}

	/// Returns the first claim value of `claim_type`.
	pub fn find_first(&self, claim_type: &str) -> Option<&str> {
		self.claims.iter().find(|claim| claim.claim_type == claim_type).map(|c| c.value.as_str())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn profile() -> RemoteUserProfile {
		RemoteUserProfile {
			external_id: ExternalId::new("42").expect("External id fixture should be valid."),
			display_name: Some("Alice".into()),
			raw_attributes: BTreeMap::from([("home_city".into(), "Oslo".into())]),
		}
	}

	#[test]
	fn assertion_maps_profile_into_claims() {
		let provider =
			AuthenticationType::new("TripIt").expect("Provider name fixture should be valid.");
		let assertion = IdentityAssertion::from_profile(&profile(), &provider);

		assert_eq!(assertion.external_id.as_ref(), "42");
		assert_eq!(assertion.display_name.as_deref(), Some("Alice"));
		assert_eq!(assertion.find_first(CLAIM_NAME_IDENTIFIER), Some("42"));
		assert_eq!(assertion.find_first(CLAIM_NAME), Some("Alice"));
		assert_eq!(assertion.find_first("urn:tripit:home_city"), Some("Oslo"));
		assert!(assertion.claims.iter().all(|claim| claim.issuer == "TripIt"));
	}

	#[test]
	fn claims_can_be_added_and_removed() {
		let provider =
			AuthenticationType::new("TripIt").expect("Provider name fixture should be valid.");
		let mut assertion = IdentityAssertion::from_profile(&profile(), &provider);

		assertion.add_claim("role", "traveler");
		assertion.add_claim("role", "admin");

		assert_eq!(assertion.remove_claims("role"), 2);
		assert_eq!(assertion.find_first("role"), None);
	}
}
