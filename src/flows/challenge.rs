// self
use crate::{
	_prelude::*,
	error::ProtocolError,
	flows::TripItAuthentication,
	http::BackchannelHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::ApplyRedirectContext,
	state::{AuthorizationState, CORRELATION_PROPERTY, new_correlation},
};

/// Authorization redirect plus the correlation value that binds it to the browser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationRedirect {
	/// Where the user agent should be sent.
	pub url: Url,
	/// Value the host sets as the correlation cookie alongside the redirect.
	///
	/// The cookie is named by
	/// [`correlation_cookie_name`](TripItAuthentication::correlation_cookie_name) and must come
	/// back on the callback through [`CallbackRequest::with_correlation`]. The host should clear
	/// it once the callback has been handled.
	///
	/// [`CallbackRequest::with_correlation`]: crate::flows::CallbackRequest::with_correlation
	pub correlation: String,
}

impl<C, M> TripItAuthentication<C, M>
where
	C: BackchannelHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds the authorization redirect for a user challenged on `current_url`.
	///
	/// The URL carries `response_type=code`, `client_id`, `redirect_uri`, the joined `scope`
	/// (omitted when no scope is configured), and `state` produced by the state codec. An empty
	/// [`AuthorizationState::return_url`] defaults to `current_url`. A fresh correlation value is
	/// bound into the state and returned for the host to set as a cookie. The `apply_redirect`
	/// hook sees the finished URL and may rewrite it. No network call is made.
	pub fn challenge(
		&self,
		current_url: &Url,
		state: AuthorizationState,
	) -> Result<AuthorizationRedirect> {
		let span = FlowSpan::challenge();

		span.in_scope(|| {
			obs::record_flow_outcome(FlowKind::Challenge, FlowOutcome::Attempt);

			match self.build_redirect(current_url, state) {
				Ok(redirect) => {
					obs::record_flow_outcome(FlowKind::Challenge, FlowOutcome::Success);

					Ok(redirect)
				},
				Err(e) => {
					obs::record_flow_outcome(FlowKind::Challenge, FlowOutcome::Failure);
					obs::record_failure(e.reason());
					span.record_failure(e.reason(), None, &e);

					Err(e.into())
				},
			}
		})
	}

	/// Absolute callback URL for a request arriving on `current_url`.
	///
	/// Keeps the scheme, host, and port of `current_url` and replaces the rest with the
	/// configured callback path.
	pub fn redirect_uri_for(&self, current_url: &Url) -> Url {
		let mut redirect_uri = current_url.clone();

		redirect_uri.set_path(&self.callback_path);
		redirect_uri.set_query(None);
		redirect_uri.set_fragment(None);

		redirect_uri
	}

	fn build_redirect(
		&self,
		current_url: &Url,
		mut state: AuthorizationState,
	) -> Result<AuthorizationRedirect, ProtocolError> {
		if state.return_url.is_empty() {
			state.return_url = current_url.to_string();
		}

		let correlation = new_correlation();

		state.properties.insert(CORRELATION_PROPERTY.into(), correlation.clone());

		let protected = self.state_codec.encode(&state).map_err(ProtocolError::StateProtection)?;
		let redirect_uri = self.redirect_uri_for(current_url);
		let mut url = self.endpoints().authorization.clone();
		let mut pairs = url.query_pairs_mut();

		pairs.append_pair("response_type", "code");
		pairs.append_pair("client_id", self.client_id.as_ref());
		pairs.append_pair("redirect_uri", redirect_uri.as_str());

		if let Some(scope) = self.scope.join(self.scope_delimiter) {
			pairs.append_pair("scope", &scope);
		}

		pairs.append_pair("state", &protected);

		drop(pairs);

		let mut context = ApplyRedirectContext { redirect_uri: url, state };

		self.events.apply_redirect(&mut context);

		Ok(AuthorizationRedirect { url: context.redirect_uri, correlation })
	}
}
