//! Lifecycle hooks invoked while building the redirect and handling the callback.

// self
use crate::{
	_prelude::*,
	auth::{AccessCredential, IdentityAssertion, RemoteUserProfile},
	state::AuthorizationState,
};

/// Boxed future returned by asynchronous hooks.
pub type EventFuture<'a> = Pin<Box<dyn Future<Output = ()> + 'a + Send>>;

/// Hooks the embedding application implements to customize the flow.
///
/// Every hook has a no-op default, so implementors override only what they need.
/// Hooks operate on mutable contexts instead of returning values, which keeps the trait
/// object-safe and lets one hook both inspect and rewrite the data it receives.
pub trait AuthenticationEvents
where
	Self: Send + Sync,
{
	/// Invoked once per successful profile fetch.
	///
	/// Implementations may add or remove claims, or call
	/// [`AuthenticatedContext::reject`] to fail the flow.
	fn authenticated<'a>(&'a self, context: &'a mut AuthenticatedContext) -> EventFuture<'a> {
		let _ = context;

		Box::pin(async {})
	}

	/// Invoked once before the identity is handed to the host and the user is redirected.
	///
	/// Implementations may change the redirect target, drop the identity, or mark the
	/// request completed when they write the response themselves.
	fn return_endpoint<'a>(&'a self, context: &'a mut ReturnEndpointContext) -> EventFuture<'a> {
		let _ = context;

		Box::pin(async {})
	}

	/// Invoked once when the authorization redirect is built; may rewrite the outgoing URL.
	fn apply_redirect(&self, _context: &mut ApplyRedirectContext) {}
}

/// Pass-through hooks used when the application supplies none.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultAuthenticationEvents;
impl AuthenticationEvents for DefaultAuthenticationEvents {}

/// Context handed to [`AuthenticationEvents::authenticated`].
#[derive(Debug)]
pub struct AuthenticatedContext {
	/// Identity built from the profile; claims may be edited in place.
	pub identity: IdentityAssertion,
	/// Profile returned by the user-info endpoint.
	pub profile: RemoteUserProfile,
	/// Access credential obtained during the exchange.
	pub access: AccessCredential,
	/// State decoded from the callback.
	pub state: AuthorizationState,
	rejection: Option<String>,
}
impl AuthenticatedContext {
	pub(crate) fn new(
		identity: IdentityAssertion,
		profile: RemoteUserProfile,
		access: AccessCredential,
		state: AuthorizationState,
	) -> Self {
		Self { identity, profile, access, state, rejection: None }
	}

	/// Fails the flow with `reason`; no identity is handed to the host.
	pub fn reject(&mut self, reason: impl Into<String>) {
		self.rejection = Some(reason.into());
	}

	/// Returns true once [`reject`](Self::reject) has been called.
	pub fn is_rejected(&self) -> bool {
		self.rejection.is_some()
	}

	pub(crate) fn into_parts(self) -> (IdentityAssertion, AuthorizationState, Option<String>) {
		(self.identity, self.state, self.rejection)
	}
}

/// Context handed to [`AuthenticationEvents::return_endpoint`].
#[derive(Debug)]
pub struct ReturnEndpointContext {
	/// Identity about to be handed to the host; `None` when the flow already failed.
	pub identity: Option<IdentityAssertion>,
	/// Sign-in target that will receive the identity.
	pub sign_in_as: String,
	/// Redirect target; defaults to the state's return URL.
	pub redirect_uri: Option<String>,
	/// State decoded from the callback.
	pub state: AuthorizationState,
	request_completed: bool,
}
impl ReturnEndpointContext {
	pub(crate) fn new(
		identity: Option<IdentityAssertion>,
		sign_in_as: String,
		state: AuthorizationState,
	) -> Self {
		let redirect_uri =
			if state.return_url.is_empty() { None } else { Some(state.return_url.clone()) };

		Self { identity, sign_in_as, redirect_uri, state, request_completed: false }
	}

	/// Marks the response as written by the application; the host must not redirect.
	pub fn request_completed(&mut self) {
		self.request_completed = true;
	}

	/// Returns true once [`request_completed`](Self::request_completed) has been called.
	pub fn is_request_completed(&self) -> bool {
		self.request_completed
	}
}

/// Context handed to [`AuthenticationEvents::apply_redirect`].
#[derive(Clone, Debug)]
pub struct ApplyRedirectContext {
	/// Authorization URL the browser will be sent to.
	pub redirect_uri: Url,
	/// State embedded in the redirect.
	pub state: AuthorizationState,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn return_context_defaults_redirect_to_return_url() {
		let ctx = ReturnEndpointContext::new(
			None,
			"Cookies".into(),
			AuthorizationState::new("https://app.example.com/home"),
		);

		assert_eq!(ctx.redirect_uri.as_deref(), Some("https://app.example.com/home"));
		assert!(!ctx.is_request_completed());

		let ctx = ReturnEndpointContext::new(None, "Cookies".into(), AuthorizationState::default());

		assert_eq!(ctx.redirect_uri, None);
	}

	#[test]
	fn default_redirect_hook_leaves_url_untouched() {
		let url = Url::parse("https://www.tripit.com/oauth/authorize?client_id=a")
			.expect("Authorization URL fixture should parse.");
		let mut ctx = ApplyRedirectContext {
			redirect_uri: url.clone(),
			state: AuthorizationState::default(),
		};

		DefaultAuthenticationEvents.apply_redirect(&mut ctx);

		assert_eq!(ctx.redirect_uri, url);
	}
}
