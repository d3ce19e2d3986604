//! Capabilities borrowed from the hosting pipeline.

// self
use crate::{_prelude::*, state::StateCodec};

/// Capabilities the hosting pipeline lends to the middleware during construction.
pub trait AuthenticationHost
where
	Self: Send + Sync,
{
	/// Sign-in target used when the options leave `sign_in_as` unset.
	fn default_sign_in_as(&self) -> Option<String>;

	/// Host-provided state codec bound to `purposes`.
	///
	/// Returning `None` makes the middleware fall back to a randomly keyed
	/// [`SignedStateCodec`](crate::state::SignedStateCodec).
	fn state_codec(&self, _purposes: &[&str]) -> Option<Arc<dyn StateCodec>> {
		None
	}
}

/// Host stub with a fixed default sign-in target and no state service.
#[derive(Clone, Debug, Default)]
pub struct StaticHost {
	sign_in_as: Option<String>,
}
impl StaticHost {
	/// Creates a host whose default sign-in target is `sign_in_as`.
	pub fn new(sign_in_as: impl Into<String>) -> Self {
		Self { sign_in_as: Some(sign_in_as.into()) }
	}
}
impl AuthenticationHost for StaticHost {
	fn default_sign_in_as(&self) -> Option<String> {
		self.sign_in_as.clone()
	}
}
