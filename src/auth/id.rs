//! Strongly typed identifiers validated at construction time.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal, $validate:ident) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				$validate($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 256;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (client, authentication type, external).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (client, authentication type, external).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (client, authentication type, external).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { ClientId, "Provider-assigned OAuth client identifier.", "Client", validate_view }
def_id! {
	AuthenticationType,
	"Name under which the provider's identities are issued (e.g. `TripIt`).",
	"AuthenticationType",
	validate_view
}
def_id! {
	ExternalId,
	"Stable user identifier assigned by the provider, kept exactly as the provider sent it.",
	"External",
	validate_present
}

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

fn validate_present(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_reject_padding_and_blank_values() {
		assert!(ClientId::new(" app-123").is_err(), "Leading whitespace must be rejected.");
		assert!(ClientId::new("app-123 ").is_err(), "Trailing whitespace must be rejected.");
		assert!(matches!(ClientId::new(""), Err(IdentifierError::Empty { kind: "Client" })));

		let client = ClientId::new("app-123").expect("Client fixture should be considered valid.");

		assert_eq!(client.as_ref(), "app-123");
		assert_eq!(format!("{client:?}"), "Client(app-123)");
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let external: ExternalId =
			serde_json::from_str("\"42\"").expect("External id should deserialize successfully.");

		assert_eq!(external.as_ref(), "42");
		assert!(serde_json::from_str::<ClientId>("\"with space\"").is_err());
		assert!(serde_json::from_str::<ExternalId>("\"\"").is_err());
	}

	#[test]
	fn length_limit_is_inclusive() {
		let exact = "a".repeat(IDENTIFIER_MAX_LEN);

		ClientId::new(&exact).expect("Exact length should succeed.");

		let too_long = "a".repeat(IDENTIFIER_MAX_LEN + 1);

		assert!(matches!(ClientId::new(&too_long), Err(IdentifierError::TooLong { .. })));
	}

	#[test]
	fn external_ids_only_need_to_be_present() {
		let long = "9".repeat(IDENTIFIER_MAX_LEN * 2);

		for raw in ["user 42", " padded ", long.as_str()] {
			let id = ExternalId::new(raw).expect("Any non-empty provider id should be accepted.");

			assert_eq!(id.as_ref(), raw);
		}

		assert!(matches!(ExternalId::new(""), Err(IdentifierError::Empty { kind: "External" })));
	}
}
