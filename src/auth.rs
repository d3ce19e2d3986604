//! Auth-domain identifiers, scope lists, secrets, and the identity model.

pub mod id;
pub mod identity;
pub mod scope;
pub mod secret;

pub use id::*;
pub use identity::*;
pub use scope::*;
pub use secret::*;
