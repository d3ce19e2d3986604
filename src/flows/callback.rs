// crates.io
use tokio_util::sync::CancellationToken;
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::IdentityAssertion,
	error::{BackchannelStage, ExtensionError, FailureReason, ProtocolError},
	flows::TripItAuthentication,
	http::BackchannelHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::{AuthenticatedContext, ReturnEndpointContext},
	state::{AuthorizationState, StateError, verify_correlation},
};

/// Query parameters carried by a provider callback, plus the correlation cookie.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackRequest {
	/// Full URL the callback arrived on.
	pub url: Url,
	/// Authorization code, when the provider granted access.
	pub code: Option<String>,
	/// Protected state echoed back by the provider.
	pub state: Option<String>,
	/// Provider-reported error, when the user or provider denied access.
	pub error: Option<String>,
	/// Human-readable detail accompanying [`error`](Self::error).
	pub error_description: Option<String>,
	/// Correlation cookie presented by the user agent.
	pub correlation: Option<String>,
}
impl CallbackRequest {
	/// Extracts the callback parameters from `url`; empty values count as absent.
	///
	/// The correlation cookie lives outside the URL; attach it with
	/// [`with_correlation`](Self::with_correlation).
	pub fn from_url(url: &Url) -> Self {
		let mut request = Self {
			url: url.clone(),
			code: None,
			state: None,
			error: None,
			error_description: None,
			correlation: None,
		};

		for (key, value) in url.query_pairs() {
			let slot = match key.as_ref() {
				"code" => &mut request.code,
				"state" => &mut request.state,
				"error" => &mut request.error,
				"error_description" => &mut request.error_description,
				_ => continue,
			};

			if slot.is_none() && !value.is_empty() {
				*slot = Some(value.into_owned());
			}
		}

		request
	}

	/// Attaches the correlation cookie value; an empty value counts as absent.
	pub fn with_correlation(mut self, correlation: impl Into<String>) -> Self {
		let correlation = correlation.into();

		self.correlation = if correlation.is_empty() { None } else { Some(correlation) };

		self
	}
}

/// Identity produced by a successful callback, ready for session issuance by the host.
#[derive(Clone, Debug)]
pub struct SignIn {
	/// Identity to sign in.
	pub identity: IdentityAssertion,
	/// Sign-in target that should receive the identity.
	pub sign_in_as: String,
	/// Where the host should redirect the user, if anywhere.
	pub redirect_uri: Option<String>,
	/// State decoded from the callback.
	pub state: AuthorizationState,
	/// True when a hook already wrote the response; the host must not redirect.
	pub request_completed: bool,
}

/// Failed callback. No identity is ever attached.
#[derive(Debug)]
pub struct CallbackFailure {
	/// Why the callback failed.
	pub reason: FailureReason,
	/// Underlying error.
	pub error: Error,
	/// Failure redirect carrying `error=access_denied`; `None` when the state was unusable.
	pub redirect_uri: Option<String>,
	/// State decoded from the callback, when it was valid.
	pub state: Option<AuthorizationState>,
	/// True when a hook already wrote the response; the host must not redirect.
	pub request_completed: bool,
}

/// Result of handling a provider callback.
#[derive(Debug)]
pub enum CallbackOutcome {
	/// The user is authenticated.
	Succeeded(SignIn),
	/// The handshake failed; the host decides how to report it.
	Failed(CallbackFailure),
}
impl CallbackOutcome {
	/// Returns true for [`CallbackOutcome::Succeeded`].
	pub fn is_success(&self) -> bool {
		matches!(self, Self::Succeeded(_))
	}

	/// Failure label, `None` on success.
	pub fn reason(&self) -> Option<FailureReason> {
		match self {
			Self::Succeeded(_) => None,
			Self::Failed(failure) => Some(failure.reason),
		}
	}

	/// Where the host should redirect the user, if anywhere.
	pub fn redirect_uri(&self) -> Option<&str> {
		match self {
			Self::Succeeded(sign_in) => sign_in.redirect_uri.as_deref(),
			Self::Failed(failure) => failure.redirect_uri.as_deref(),
		}
	}

	/// Converts the outcome into a [`Result`], dropping redirect details.
	pub fn into_result(self) -> Result<SignIn> {
		match self {
			Self::Succeeded(sign_in) => Ok(sign_in),
			Self::Failed(failure) => Err(failure.error),
		}
	}
}

struct Interrupted {
	reason: FailureReason,
	error: Error,
}
impl From<ProtocolError> for Interrupted {
	fn from(e: ProtocolError) -> Self {
		Self { reason: e.reason(), error: e.into() }
	}
}
impl From<ExtensionError> for Interrupted {
	fn from(e: ExtensionError) -> Self {
		Self { reason: e.reason(), error: e.into() }
	}
}

impl<C, M> TripItAuthentication<C, M>
where
	C: BackchannelHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Handles a provider callback.
	///
	/// Equivalent to [`handle_callback_with_cancel`](Self::handle_callback_with_cancel) with a
	/// token that never fires.
	pub async fn handle_callback(&self, request: &CallbackRequest) -> CallbackOutcome {
		self.handle_callback_with_cancel(request, &CancellationToken::new()).await
	}

	/// Handles a provider callback, abandoning in-flight backchannel calls once `cancel` fires.
	///
	/// A provider error short-circuits before any backchannel call. A missing or invalid
	/// state, or one whose correlation value does not match the request's correlation cookie,
	/// fails with [`FailureReason::InvalidState`] and no redirect. Otherwise the code is
	/// exchanged and the profile fetched, each bounded by the backchannel timeout, and the
	/// resulting identity passes through the `authenticated` and `return_endpoint` hooks.
	/// Must run inside a Tokio runtime with timers enabled.
	pub async fn handle_callback_with_cancel(
		&self,
		request: &CallbackRequest,
		cancel: &CancellationToken,
	) -> CallbackOutcome {
		let span = FlowSpan::callback();

		obs::record_flow_outcome(FlowKind::Callback, FlowOutcome::Attempt);

		let outcome = span.run(self.run_callback(request, cancel)).await;

		match &outcome {
			CallbackOutcome::Succeeded(_) =>
				obs::record_flow_outcome(FlowKind::Callback, FlowOutcome::Success),
			CallbackOutcome::Failed(failure) => {
				obs::record_flow_outcome(FlowKind::Callback, FlowOutcome::Failure);
				obs::record_failure(failure.reason);
				span.record_failure(failure.reason, failure.error.stage(), &failure.error);
			},
		}

		outcome
	}

	async fn run_callback(
		&self,
		request: &CallbackRequest,
		cancel: &CancellationToken,
	) -> CallbackOutcome {
		let decoded = match request.state.as_deref() {
			Some(protected) => self
				.state_codec
				.decode(protected)
				.and_then(|state| verify_correlation(state, request.correlation.as_deref())),
			None => Err(StateError::Missing),
		};

		if let Some(error) = &request.error {
			let interrupted = Interrupted::from(ProtocolError::RemoteError {
				error: error.clone(),
				description: request.error_description.clone(),
			});

			return match decoded {
				Ok(state) => self.fail(interrupted, state).await,
				Err(_) => Self::fail_without_state(interrupted),
			};
		}

		let state = match decoded {
			Ok(state) => state,
			Err(e) => return Self::fail_without_state(ProtocolError::InvalidState(e).into()),
		};

		match self.authenticate(request, state.clone(), cancel).await {
			Ok((identity, state)) => self.complete(identity, state).await,
			Err(interrupted) => self.fail(interrupted, state).await,
		}
	}

	async fn authenticate(
		&self,
		request: &CallbackRequest,
		state: AuthorizationState,
		cancel: &CancellationToken,
	) -> Result<(IdentityAssertion, AuthorizationState), Interrupted> {
		let code = request.code.as_deref().ok_or_else(|| {
			ProtocolError::failed(
				BackchannelStage::TokenExchange,
				"callback carries no authorization code",
				None,
			)
		})?;
		let redirect_uri = self.redirect_uri_for(&request.url);
		let access = self
			.bounded(
				BackchannelStage::TokenExchange,
				cancel,
				self.facade.exchange_code(code, &redirect_uri),
			)
			.await?;
		let profile = self
			.bounded(BackchannelStage::ProfileFetch, cancel, self.facade.fetch_profile(&access))
			.await?;
		let identity = IdentityAssertion::from_profile(&profile, &self.authentication_type);
		let mut context = AuthenticatedContext::new(identity, profile, access, state);

		self.events.authenticated(&mut context).await;

		let (identity, state, rejection) = context.into_parts();

		if let Some(reason) = rejection {
			return Err(ExtensionError::Rejected { reason }.into());
		}

		Ok((identity, state))
	}

	async fn bounded<T, F>(
		&self,
		stage: BackchannelStage,
		cancel: &CancellationToken,
		call: F,
	) -> Result<T, ProtocolError>
	where
		F: Future<Output = Result<T, ProtocolError>>,
	{
		tokio::select! {
			biased;
			_ = cancel.cancelled() => Err(ProtocolError::Cancelled { stage }),
			result = tokio::time::timeout(self.backchannel_timeout, call) =>
				result.unwrap_or(Err(ProtocolError::timeout(stage))),
		}
	}

	async fn complete(
		&self,
		identity: IdentityAssertion,
		state: AuthorizationState,
	) -> CallbackOutcome {
		let mut context =
			ReturnEndpointContext::new(Some(identity), self.sign_in_as.clone(), state);

		self.events.return_endpoint(&mut context).await;

		let request_completed = context.is_request_completed();

		match context.identity {
			Some(identity) => CallbackOutcome::Succeeded(SignIn {
				identity,
				sign_in_as: context.sign_in_as,
				redirect_uri: context.redirect_uri,
				state: context.state,
				request_completed,
			}),
			None => {
				let interrupted = Interrupted::from(ExtensionError::Rejected {
					reason: "the return endpoint hook cleared the identity".into(),
				});

				CallbackOutcome::Failed(CallbackFailure {
					reason: interrupted.reason,
					error: interrupted.error,
					redirect_uri: context.redirect_uri.map(|uri| with_access_denied(&uri)),
					state: Some(context.state),
					request_completed,
				})
			},
		}
	}

	async fn fail(&self, interrupted: Interrupted, state: AuthorizationState) -> CallbackOutcome {
		let mut context = ReturnEndpointContext::new(None, self.sign_in_as.clone(), state);

		self.events.return_endpoint(&mut context).await;

		let request_completed = context.is_request_completed();

		CallbackOutcome::Failed(CallbackFailure {
			reason: interrupted.reason,
			error: interrupted.error,
			redirect_uri: context.redirect_uri.map(|uri| with_access_denied(&uri)),
			state: Some(context.state),
			request_completed,
		})
	}

	fn fail_without_state(interrupted: Interrupted) -> CallbackOutcome {
		CallbackOutcome::Failed(CallbackFailure {
			reason: interrupted.reason,
			error: interrupted.error,
			redirect_uri: None,
			state: None,
			request_completed: false,
		})
	}
}

/// Appends `error=access_denied` to `uri`, keeping any fragment last.
fn with_access_denied(uri: &str) -> String {
	let (base, fragment) = match uri.split_once('#') {
		Some((base, fragment)) => (base, Some(fragment)),
		None => (uri, None),
	};
	let separator = if !base.contains('?') {
		"?"
	} else if base.ends_with(['?', '&']) {
		""
	} else {
		"&"
	};
	let pair = form_urlencoded::Serializer::new(String::new())
		.append_pair("error", "access_denied")
		.finish();
	let mut out = format!("{base}{separator}{pair}");

	if let Some(fragment) = fragment {
		out.push('#');
		out.push_str(fragment);
	}

	out
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn callback_request_reads_known_parameters() {
		let url = Url::parse(
			"https://app.example.com/signin-tripit?code=abc&state=xyz&error=&extra=1&code=ignored",
		)
		.expect("Callback URL fixture should parse.");
		let request = CallbackRequest::from_url(&url);

		assert_eq!(request.code.as_deref(), Some("abc"));
		assert_eq!(request.state.as_deref(), Some("xyz"));
		assert_eq!(request.error, None);
		assert_eq!(request.error_description, None);
		assert_eq!(request.correlation, None);
		assert_eq!(request.clone().with_correlation("").correlation, None);
		assert_eq!(request.with_correlation("c0ffee").correlation.as_deref(), Some("c0ffee"));
	}

	#[test]
	fn access_denied_is_appended_before_fragment() {
		assert_eq!(with_access_denied("/trips"), "/trips?error=access_denied");
		assert_eq!(with_access_denied("/trips?tab=1"), "/trips?tab=1&error=access_denied");
		assert_eq!(with_access_denied("/trips?"), "/trips?error=access_denied");
		assert_eq!(
			with_access_denied("https://app.example.com/t?x=1#top"),
			"https://app.example.com/t?x=1&error=access_denied#top"
		);
	}

	#[test]
	fn outcome_helpers_report_failure_details() {
		let outcome = CallbackOutcome::Failed(CallbackFailure {
			reason: FailureReason::InvalidState,
			error: ProtocolError::InvalidState(StateError::Missing).into(),
			redirect_uri: None,
			state: None,
			request_completed: false,
		});

		assert!(!outcome.is_success());
		assert_eq!(outcome.reason(), Some(FailureReason::InvalidState));
		assert_eq!(outcome.redirect_uri(), None);
		assert!(matches!(
			outcome.into_result(),
			Err(Error::Protocol(ProtocolError::InvalidState(_)))
		));
	}
}
