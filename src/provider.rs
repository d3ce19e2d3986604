//! Extension points exposed to the embedding application and capabilities consumed from the host.
//!
//! `events` defines [`AuthenticationEvents`], the three lifecycle hooks an application can
//! implement to enrich, reject, or redirect the flow. `host` defines [`AuthenticationHost`],
//! the narrow interface through which the hosting pipeline supplies its default sign-in target
//! and, optionally, its own state protection service.

pub mod events;
pub mod host;

pub use events::*;
pub use host::*;
