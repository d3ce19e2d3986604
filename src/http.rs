//! Backchannel transport primitives for the token exchange and profile fetch.
//!
//! The module exposes [`BackchannelHttpClient`] alongside [`ResponseMetadata`] and
//! [`ResponseMetadataSlot`] so downstream crates can plug in custom HTTP clients without
//! losing failure classification. Implementations call [`ResponseMetadataSlot::take`] before
//! dispatching a request and [`ResponseMetadataSlot::store`] once an HTTP status is known,
//! enabling the error mapper to attach consistent metadata to each failure.
//!
//! Transports also declare whether they can hook TLS peer validation; a
//! [`CertificateValidator`] supplied for a transport that cannot honor it is rejected when the
//! middleware is constructed.

pub mod certificate;

pub use certificate::*;

// crates.io
use oauth2::{AsyncHttpClient, HttpClientError};
#[cfg(feature = "reqwest")] use oauth2::{HttpRequest, HttpResponse};
#[cfg(feature = "reqwest")] use reqwest::redirect::Policy;
// self
use crate::{_prelude::*, error::ConfigError};
#[cfg(feature = "reqwest")] use crate::options::DEFAULT_MAX_RESPONSE_BYTES;

/// Abstraction over HTTP transports used for backchannel calls.
///
/// The trait is the middleware's only dependency on an HTTP stack. The middleware owns one
/// implementation behind an [`Arc`] and requests short-lived [`AsyncHttpClient`] handles that
/// each carry a clone of a [`ResponseMetadataSlot`]. Handles must own whatever state they need
/// so their request futures remain `Send` for the lifetime of the in-flight call.
pub trait BackchannelHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle tied to a [`ResponseMetadataSlot`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds an [`AsyncHttpClient`] handle that records outcomes in `slot`.
	///
	/// # Metadata Contract
	///
	/// - Call [`ResponseMetadataSlot::take`] before submitting the HTTP request so stale
	///   information never leaks across calls.
	/// - Once an HTTP response (successful or erroneous) provides a status, save it with
	///   [`ResponseMetadataSlot::store`].
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;

	/// Returns true when [`install_certificate_validator`](Self::install_certificate_validator)
	/// can honor a validator.
	fn supports_certificate_validation(&self) -> bool {
		false
	}

	/// Routes TLS peer validation for every backchannel call through `validator`.
	///
	/// The default implementation reports [`ConfigError::ValidatorTransportMismatch`].
	fn install_certificate_validator(
		&mut self,
		validator: Arc<dyn CertificateValidator>,
	) -> Result<(), ConfigError> {
		let _ = validator;

		Err(ConfigError::ValidatorTransportMismatch)
	}

	/// Caps response bodies at `limit` bytes; transports that cannot stream may ignore it.
	fn limit_response_bytes(&mut self, limit: usize) {
		let _ = limit;
	}
}

/// Captures metadata from the most recent HTTP response for downstream error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the endpoint, if available.
	pub status: Option<u16>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

#[cfg(feature = "reqwest")]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ClientOrigin {
	/// Built by this crate; the TLS stack can be reconfigured.
	Managed,
	/// Supplied by the caller; its TLS stack is opaque.
	External,
}

/// reqwest-backed backchannel transport.
///
/// Backchannel calls must not follow redirects: the token and user-info endpoints answer
/// directly. [`ReqwestHttpClient::new`] disables redirects; callers supplying their own client
/// through [`ReqwestHttpClient::with_client`] should do the same.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient {
	client: ReqwestClient,
	origin: ClientOrigin,
	max_response_bytes: usize,
}
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Builds a managed client that can later honor a certificate validator.
	pub fn new() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().redirect(Policy::none()).build()?;

		Ok(Self {
			client,
			origin: ClientOrigin::Managed,
			max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
		})
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	///
	/// The wrapped client's TLS stack is opaque, so certificate validators are rejected.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self {
			client,
			origin: ClientOrigin::External,
			max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
		}
	}

	/// Returns the underlying reqwest client.
	pub fn client(&self) -> &ReqwestClient {
		&self.client
	}

	pub(crate) fn instrumented(&self, slot: ResponseMetadataSlot) -> InstrumentedHandle {
		InstrumentedHandle::new(self.client.clone(), slot, self.max_response_bytes)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.client
	}
}
#[cfg(feature = "reqwest")]
impl BackchannelHttpClient for ReqwestHttpClient {
	type Handle = InstrumentedHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		self.instrumented(slot)
	}

	fn supports_certificate_validation(&self) -> bool {
		self.origin == ClientOrigin::Managed
	}

	fn install_certificate_validator(
		&mut self,
		validator: Arc<dyn CertificateValidator>,
	) -> Result<(), ConfigError> {
		if self.origin != ClientOrigin::Managed {
			return Err(ConfigError::ValidatorTransportMismatch);
		}

		let tls = certificate::validating_tls_config(validator)?;

		self.client =
			ReqwestClient::builder().redirect(Policy::none()).use_preconfigured_tls(tls).build()?;

		Ok(())
	}

	fn limit_response_bytes(&mut self, limit: usize) {
		self.max_response_bytes = limit;
	}
}

#[cfg(feature = "reqwest")]
struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
	max_response_bytes: usize,
}

/// Handle returned by [`ReqwestHttpClient`] that satisfies [`BackchannelHttpClient`].
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
#[cfg(feature = "reqwest")]
impl InstrumentedHandle {
	fn new(client: ReqwestClient, slot: ResponseMetadataSlot, max_response_bytes: usize) -> Self {
		Self(Arc::new(InstrumentedHttpClient { client, slot, max_response_bytes }))
	}
}
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future = Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = Arc::clone(&self.0);

		Box::pin(async move {
			client.slot.take();

			let mut response = client
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();

			client.slot.store(ResponseMetadata { status: Some(status.as_u16()) });

			let mut body = Vec::new();

			while let Some(chunk) = response.chunk().await.map_err(Box::new)? {
				if body.len() + chunk.len() > client.max_response_bytes {
					return Err(HttpClientError::Other(format!(
						"Response body exceeded {} bytes",
						client.max_response_bytes
					)));
				}

				body.extend_from_slice(&chunk);
			}

			let mut response_new = HttpResponse::new(body);

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;

	#[derive(Debug)]
	struct AcceptAll;
	impl CertificateValidator for AcceptAll {
		fn validate(&self, _peer: &PeerCertificate) -> bool {
			true
		}
	}

	#[test]
	fn metadata_slot_take_clears_value() {
		let slot = ResponseMetadataSlot::default();

		slot.store(ResponseMetadata { status: Some(502) });

		assert_eq!(slot.take().and_then(|meta| meta.status), Some(502));
		assert!(slot.take().is_none());
	}

	#[test]
	fn external_clients_reject_certificate_validators() {
		let mut transport = ReqwestHttpClient::with_client(ReqwestClient::new());

		assert!(!transport.supports_certificate_validation());
		assert!(matches!(
			transport.install_certificate_validator(Arc::new(AcceptAll)),
			Err(ConfigError::ValidatorTransportMismatch)
		));
	}

	#[test]
	fn managed_clients_accept_certificate_validators() {
		let mut transport = ReqwestHttpClient::new().expect("Managed client should build.");

		assert!(transport.supports_certificate_validation());
		assert!(transport.install_certificate_validator(Arc::new(AcceptAll)).is_ok());
	}
}
