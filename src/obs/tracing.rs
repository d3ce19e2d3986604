// self
use crate::{
	_prelude::*,
	error::{BackchannelStage, FailureReason},
	obs::FlowKind,
};

/// Span covering one challenge or one callback.
///
/// The span opens with empty `reason`, `stage`, and `error` fields. A failed flow fills them
/// through [`FlowSpan::record_failure`], so its cause travels with the span itself.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Span for building the authorization redirect.
	pub fn challenge() -> Self {
		Self::open(FlowKind::Challenge)
	}

	/// Span for handling a provider callback.
	pub fn callback() -> Self {
		Self::open(FlowKind::Callback)
	}

	fn open(kind: FlowKind) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"oauth2_tripit.flow",
				flow = kind.as_str(),
				reason = tracing::field::Empty,
				stage = tracing::field::Empty,
				error = tracing::field::Empty,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = kind;

			Self {}
		}
	}

	/// Runs a synchronous section inside the span.
	pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
		#[cfg(feature = "tracing")]
		{
			self.span.in_scope(f)
		}
		#[cfg(not(feature = "tracing"))]
		{
			f()
		}
	}

	/// Drives `fut` to completion with the span attached to every poll.
	pub async fn run<Fut>(&self, fut: Fut) -> Fut::Output
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone()).await
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut.await
		}
	}

	/// Stamps why the flow failed onto the span.
	///
	/// `stage` names the backchannel call that was in flight, when there was one.
	pub fn record_failure(
		&self,
		reason: FailureReason,
		stage: Option<BackchannelStage>,
		error: &dyn Display,
	) {
		#[cfg(feature = "tracing")]
		{
			self.span.record("reason", reason.as_str());

			if let Some(stage) = stage {
				self.span.record("stage", stage.as_str());
			}

			self.span.record("error", tracing::field::display(error));
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (reason, stage, error);
		}
	}
}
