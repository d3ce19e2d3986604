//! Requested permission scopes.

// self
use crate::_prelude::*;

/// Errors emitted when validating scopes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ScopeValidationError {
	/// Empty scope entries are not allowed.
	#[error("Scope entries cannot be empty.")]
	Empty,
	/// Scopes cannot contain embedded whitespace characters.
	#[error("Scope contains whitespace: {scope}.")]
	ContainsWhitespace {
		/// The offending scope string.
		scope: String,
	},
}

/// Ordered list of requested scopes.
///
/// Unlike a set, the list keeps the order in which scopes were requested because some
/// providers display permissions in that order. Duplicates are dropped on insertion so the
/// outgoing `scope` parameter never repeats a value.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ScopeList(Vec<String>);
impl ScopeList {
	/// Creates a validated scope list from any iterator, keeping first-seen order.
	pub fn new<I, S>(scopes: I) -> Result<Self, ScopeValidationError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut list = Self::default();

		for scope in scopes {
			list.push(scope)?;
		}

		Ok(list)
	}

	/// Appends a scope unless it is already present.
	pub fn push(&mut self, scope: impl Into<String>) -> Result<(), ScopeValidationError> {
		let owned = scope.into();

		if owned.is_empty() {
			return Err(ScopeValidationError::Empty);
		}
		if owned.chars().any(char::is_whitespace) {
			return Err(ScopeValidationError::ContainsWhitespace { scope: owned });
		}
		if !self.contains(&owned) {
			self.0.push(owned);
		}

		Ok(())
	}

	/// Number of distinct scopes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true if no scopes are requested.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Returns true if the list contains the provided scope.
	pub fn contains(&self, scope: &str) -> bool {
		self.0.iter().any(|candidate| candidate == scope)
	}

	/// Iterator over scopes in request order.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(|s| s.as_str())
	}

	/// Joins the scopes with the provider's delimiter; `None` when the list is empty.
	pub fn join(&self, delimiter: char) -> Option<String> {
		if self.is_empty() {
			return None;
		}

		let mut buf = String::new();

		for (idx, value) in self.0.iter().enumerate() {
			if idx > 0 {
				buf.push(delimiter);
			}

			buf.push_str(value);
		}

		Some(buf)
	}
}
impl Debug for ScopeList {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ScopeList").field(&self.0).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn scopes_keep_request_order_and_drop_duplicates() {
		let scopes = ScopeList::new(["trips.read", "profile", "trips.read"])
			.expect("Scope list should be valid.");

		assert_eq!(scopes.len(), 2);
		assert_eq!(scopes.iter().collect::<Vec<_>>(), vec!["trips.read", "profile"]);
		assert_eq!(scopes.join(' '), Some("trips.read profile".into()));
		assert_eq!(scopes.join(','), Some("trips.read,profile".into()));
	}

	#[test]
	fn empty_list_has_no_scope_parameter() {
		let scopes = ScopeList::new(Vec::<String>::new()).expect("No scopes is a valid list.");

		assert!(scopes.is_empty());
		assert_eq!(scopes.join(' '), None);
	}

	#[test]
	fn invalid_scopes_error() {
		assert!(matches!(ScopeList::new([""]), Err(ScopeValidationError::Empty)));
		assert!(matches!(
			ScopeList::new([" profile "]),
			Err(ScopeValidationError::ContainsWhitespace { .. })
		));
		assert!(matches!(
			ScopeList::new(["   "]),
			Err(ScopeValidationError::ContainsWhitespace { .. })
		));
	}
}
