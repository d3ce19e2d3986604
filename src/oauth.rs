//! Backchannel facade for the token exchange and profile fetch.
//!
//! Requests are assembled by hand on top of the [`oauth2`] transport types: TripIt's token
//! endpoint may omit `token_type`, which the typed `oauth2` token responses require.

pub use oauth2;

// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{self, HeaderValue, Method, header},
};
use serde_json::{Map, Value};
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::{AccessCredential, ClientId, ExternalId, RemoteUserProfile, Secret},
	error::{BackchannelStage, ProtocolError},
	http::{BackchannelHttpClient, ResponseMetadata, ResponseMetadataSlot},
	options::ProviderEndpoints,
};

type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ProtocolError>> + 'a + Send>>;

/// Maps HTTP transport failures into [`ProtocolError`] values for a backchannel stage.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport during `stage`.
	///
	/// Implementations should map transport-level timeouts to [`ProtocolError::timeout`] and
	/// everything else to [`ProtocolError::failed`].
	fn map_transport_error(
		&self,
		stage: BackchannelStage,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> ProtocolError;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		stage: BackchannelStage,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> ProtocolError {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(stage, meta, *inner),
			HttpClientError::Http(inner) =>
				ProtocolError::failed(stage, format!("invalid HTTP request: {inner}"), None),
			HttpClientError::Io(inner) =>
				ProtocolError::failed(stage, format!("I/O error: {inner}"), meta_status(meta)),
			HttpClientError::Other(message) =>
				ProtocolError::failed(stage, message, meta_status(meta)),
			_ => ProtocolError::failed(stage, "unknown HTTP client error", meta_status(meta)),
		}
	}
}

pub(crate) struct BackchannelFacade<C, M>
where
	C: BackchannelHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	endpoints: ProviderEndpoints,
	client_id: ClientId,
	client_secret: Secret,
	max_response_bytes: usize,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> BackchannelFacade<C, M>
where
	C: BackchannelHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn new(
		endpoints: ProviderEndpoints,
		client_id: ClientId,
		client_secret: Secret,
		max_response_bytes: usize,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Self {
		Self { endpoints, client_id, client_secret, max_response_bytes, http_client, error_mapper }
	}

	pub(crate) fn endpoints(&self) -> &ProviderEndpoints {
		&self.endpoints
	}

	/// Trades `code` for an access credential at the token endpoint.
	pub(crate) fn exchange_code<'a>(
		&'a self,
		code: &'a str,
		redirect_uri: &'a Url,
	) -> FacadeFuture<'a, AccessCredential> {
		const STAGE: BackchannelStage = BackchannelStage::TokenExchange;

		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let handle = self.http_client.with_metadata(meta.clone());
			let body = form_urlencoded::Serializer::new(String::new())
				.append_pair("grant_type", "authorization_code")
				.append_pair("code", code)
				.append_pair("redirect_uri", redirect_uri.as_str())
				.append_pair("client_id", self.client_id.as_ref())
				.append_pair("client_secret", self.client_secret.expose())
				.finish();
			let request = http::Request::builder()
				.method(Method::POST)
				.uri(self.endpoints.token.as_str())
				.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
				.header(header::ACCEPT, "application/json")
				.body(body.into_bytes())
				.map_err(|e| request_build_error(STAGE, e))?;
			let response = self.send(&handle, STAGE, &meta, request).await?;

			parse_token_response(&response)
		})
	}

	/// Fetches the profile of the user `access` was issued for.
	pub(crate) fn fetch_profile<'a>(
		&'a self,
		access: &'a AccessCredential,
	) -> FacadeFuture<'a, RemoteUserProfile> {
		const STAGE: BackchannelStage = BackchannelStage::ProfileFetch;

		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let handle = self.http_client.with_metadata(meta.clone());
			let mut authorization =
				HeaderValue::try_from(format!("Bearer {}", access.token.expose()))
					.map_err(|e| request_build_error(STAGE, e))?;

			authorization.set_sensitive(true);

			let request = http::Request::builder()
				.method(Method::GET)
				.uri(self.endpoints.user_info.as_str())
				.header(header::AUTHORIZATION, authorization)
				.header(header::ACCEPT, "application/json")
				.body(Vec::new())
				.map_err(|e| request_build_error(STAGE, e))?;
			let response = self.send(&handle, STAGE, &meta, request).await?;

			parse_profile_response(&response)
		})
	}

	async fn send(
		&self,
		handle: &C::Handle,
		stage: BackchannelStage,
		meta: &ResponseMetadataSlot,
		request: HttpRequest,
	) -> Result<HttpResponse, ProtocolError> {
		let response = handle
			.call(request)
			.await
			.map_err(|e| self.error_mapper.map_transport_error(stage, meta.take().as_ref(), e))?;

		if response.body().len() > self.max_response_bytes {
			return Err(ProtocolError::failed(
				stage,
				format!("response body exceeded {} bytes", self.max_response_bytes),
				Some(response.status().as_u16()),
			));
		}

		Ok(response)
	}
}

#[derive(Deserialize)]
struct TokenResponseBody {
	#[serde(default)]
	access_token: Option<String>,
	#[serde(default)]
	expires_in: Option<Value>,
}

#[derive(Deserialize)]
struct OAuthErrorBody {
	error: String,
	#[serde(default)]
	error_description: Option<String>,
}

fn parse_token_response(response: &HttpResponse) -> Result<AccessCredential, ProtocolError> {
	const STAGE: BackchannelStage = BackchannelStage::TokenExchange;

	let status = response.status().as_u16();

	if !response.status().is_success() {
		let message = match serde_json::from_slice::<OAuthErrorBody>(response.body()) {
			Ok(OAuthErrorBody { error, error_description: Some(description) }) =>
				format!("token endpoint returned `{error}`: {description}"),
			Ok(OAuthErrorBody { error, error_description: None }) =>
				format!("token endpoint returned `{error}`"),
			Err(_) => format!("token endpoint returned HTTP {status}"),
		};

		return Err(ProtocolError::failed(STAGE, message, Some(status)));
	}

	let body: TokenResponseBody =
		serde_path_to_error::deserialize(&mut serde_json::Deserializer::from_slice(response.body()))
			.map_err(|e| {
				ProtocolError::failed(
					STAGE,
					format!("token response is not valid JSON at `{}`: {}", e.path(), e.inner()),
					Some(status),
				)
			})?;
	let token = body
		.access_token
		.filter(|token| !token.trim().is_empty())
		.ok_or_else(|| {
			ProtocolError::failed(STAGE, "token response has no access_token", Some(status))
		})?;
	let expires_in = body.expires_in.as_ref().and_then(|value| match value {
		Value::Number(n) => n.as_u64(),
		Value::String(s) => s.trim().parse().ok(),
		_ => None,
	});

	Ok(AccessCredential::new(token, expires_in.map(StdDuration::from_secs)))
}

fn parse_profile_response(response: &HttpResponse) -> Result<RemoteUserProfile, ProtocolError> {
	let status = response.status().as_u16();

	if !response.status().is_success() {
		return Err(ProtocolError::failed(
			BackchannelStage::ProfileFetch,
			format!("user-info endpoint returned HTTP {status}"),
			Some(status),
		));
	}

	let fields: Map<String, Value> = serde_json::from_slice(response.body()).map_err(|e| {
		ProtocolError::MalformedProfile { message: format!("profile is not a JSON object: {e}") }
	})?;

	profile_from_fields(fields)
}

pub(crate) fn profile_from_fields(
	mut fields: Map<String, Value>,
) -> Result<RemoteUserProfile, ProtocolError> {
	let raw_id = fields.remove("id").and_then(scalar_to_string).ok_or_else(|| {
		ProtocolError::MalformedProfile { message: "profile has no usable `id`".into() }
	})?;
	let external_id = ExternalId::new(raw_id).map_err(|e| ProtocolError::MalformedProfile {
		message: format!("profile `id` is invalid: {e}"),
	})?;
	let display_name = fields
		.remove("name")
		.and_then(scalar_to_string)
		.filter(|name| !name.trim().is_empty());
	let raw_attributes = fields
		.into_iter()
		.filter_map(|(key, value)| scalar_to_string(value).map(|value| (key, value)))
		.collect();

	Ok(RemoteUserProfile { external_id, display_name, raw_attributes })
}

fn scalar_to_string(value: Value) -> Option<String> {
	match value {
		Value::String(s) => Some(s),
		Value::Number(n) => Some(n.to_string()),
		Value::Bool(b) => Some(b.to_string()),
		_ => None,
	}
}

fn request_build_error(stage: BackchannelStage, err: impl Display) -> ProtocolError {
	ProtocolError::failed(stage, format!("request could not be built: {err}"), None)
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(
	stage: BackchannelStage,
	meta: Option<&ResponseMetadata>,
	err: ReqwestError,
) -> ProtocolError {
	if err.is_timeout() {
		return ProtocolError::timeout(stage);
	}

	let status = meta_status(meta).or_else(|| err.status().map(|code| code.as_u16()));

	ProtocolError::failed(stage, format!("HTTP transport error: {err}"), status)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn response(status: u16, body: &str) -> HttpResponse {
		let mut response = HttpResponse::new(body.as_bytes().to_vec());

		*response.status_mut() =
			http::StatusCode::from_u16(status).expect("Status fixture should be valid.");

		response
	}

	#[test]
	fn token_response_needs_only_access_token() {
		let credential = parse_token_response(&response(200, r#"{"access_token":"T"}"#))
			.expect("Minimal token response should parse.");

		assert_eq!(credential.token.expose(), "T");
		assert_eq!(credential.expires_in, None);

		let credential = parse_token_response(&response(
			200,
			r#"{"access_token":"T","token_type":"bearer","expires_in":"3600"}"#,
		))
		.expect("Full token response should parse.");

		assert_eq!(credential.expires_in, Some(StdDuration::from_secs(3600)));
	}

	#[test]
	fn token_failures_map_to_exchange_failed() {
		for (status, body) in [
			(200, r#"{"token_type":"bearer"}"#),
			(200, r#"{"access_token":"  "}"#),
			(200, "not json"),
			(400, r#"{"error":"invalid_grant","error_description":"code reused"}"#),
			(500, "oops"),
		] {
			let err = parse_token_response(&response(status, body))
				.expect_err("Unusable token responses must fail.");

			assert!(matches!(err, ProtocolError::ExchangeFailed { .. }), "{status} {body}");
		}
	}

	#[test]
	fn profile_maps_id_name_and_scalars() {
		let profile = parse_profile_response(&response(
			200,
			r#"{"id":42,"name":"Alice","email":"a@example.com","verified":true,"trips":[1,2],"home":null}"#,
		))
		.expect("Profile should parse.");

		assert_eq!(profile.external_id.as_ref(), "42");
		assert_eq!(profile.display_name.as_deref(), Some("Alice"));
		assert_eq!(profile.raw_attributes.get("email").map(String::as_str), Some("a@example.com"));
		assert_eq!(profile.raw_attributes.get("verified").map(String::as_str), Some("true"));
		assert!(!profile.raw_attributes.contains_key("trips"));
		assert!(!profile.raw_attributes.contains_key("home"));
	}

	#[test]
	fn profile_without_id_is_malformed() {
		for body in [r#"{"name":"Alice"}"#, r#"{"id":""}"#, r#"{"id":{"v":1}}"#, "[]", "nope"] {
			let err = parse_profile_response(&response(200, body))
				.expect_err("Profiles without a usable id must fail.");

			assert!(matches!(err, ProtocolError::MalformedProfile { .. }), "{body}");
		}
	}

	#[test]
	fn profile_non_success_is_fetch_failure() {
		let err = parse_profile_response(&response(401, r#"{"id":"42"}"#))
			.expect_err("Non-success profile responses must fail.");

		assert!(matches!(err, ProtocolError::ProfileFetchFailed { status: Some(401), .. }));
	}
}
