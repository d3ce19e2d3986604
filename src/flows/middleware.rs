// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	flows::{CallbackOutcome, CallbackRequest, TripItAuthentication},
	http::BackchannelHttpClient,
	oauth::TransportErrorMapper,
};

/// How [`TripItAuthentication::invoke`] disposed of a request.
#[derive(Debug)]
pub enum Dispatch<T> {
	/// The request hit the callback path and was handled here.
	Callback(CallbackOutcome),
	/// The request was passed to the next handler, which produced `T`.
	Next(T),
}
impl<T> Dispatch<T> {
	/// Returns the callback outcome, if the request was handled here.
	pub fn callback(self) -> Option<CallbackOutcome> {
		match self {
			Self::Callback(outcome) => Some(outcome),
			Self::Next(_) => None,
		}
	}
}

impl<C, M> TripItAuthentication<C, M>
where
	C: BackchannelHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Returns true when `url` targets the callback path (ASCII case-insensitive).
	pub fn is_callback(&self, url: &Url) -> bool {
		url.path().eq_ignore_ascii_case(&self.callback_path)
	}

	/// Handles requests to the callback path and delegates every other request to `next`.
	///
	/// `correlation` is the value of the
	/// [`correlation_cookie_name`](Self::correlation_cookie_name) cookie on the request, if the
	/// user agent sent one.
	pub async fn invoke<F, Fut, T>(
		&self,
		url: &Url,
		correlation: Option<&str>,
		next: F,
	) -> Dispatch<T>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = T>,
	{
		self.invoke_with_cancel(url, correlation, &CancellationToken::new(), next).await
	}

	/// Like [`invoke`](Self::invoke), abandoning backchannel calls once `cancel` fires.
	pub async fn invoke_with_cancel<F, Fut, T>(
		&self,
		url: &Url,
		correlation: Option<&str>,
		cancel: &CancellationToken,
		next: F,
	) -> Dispatch<T>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = T>,
	{
		if self.is_callback(url) {
			let mut request = CallbackRequest::from_url(url);

			if let Some(correlation) = correlation {
				request = request.with_correlation(correlation);
			}

			Dispatch::Callback(self.handle_callback_with_cancel(&request, cancel).await)
		} else {
			Dispatch::Next(next().await)
		}
	}
}
