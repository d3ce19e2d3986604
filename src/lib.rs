//! TripIt sign-in for Rust web stacks: OAuth 2.0 authorization-code handshake, tamper-evident
//! state, and pluggable backchannel transports in one crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod error;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod options;
pub mod provider;
pub mod state;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		flows::{CallbackRequest, TripItAuthentication},
		http::ReqwestHttpClient,
		oauth::ReqwestTransportErrorMapper,
		options::{ProviderEndpoints, ProviderOptions, ProviderOptionsBuilder},
		provider::{AuthenticationHost, StaticHost},
		state::AuthorizationState,
	};

	/// Middleware type alias used by reqwest-backed integration tests.
	pub type ReqwestTestAuthentication =
		TripItAuthentication<ReqwestHttpClient, ReqwestTransportErrorMapper>;

	/// Client identifier shared by integration fixtures.
	pub const TEST_CLIENT_ID: &str = "client-it";
	/// Client secret shared by integration fixtures.
	pub const TEST_CLIENT_SECRET: &str = "secret-it";
	/// Host default sign-in target used by integration fixtures.
	pub const TEST_SIGN_IN_AS: &str = "ApplicationCookie";
	/// Origin of the application under test.
	pub const TEST_APP_ORIGIN: &str = "https://app.example.com";

	/// Builds a caller-owned reqwest client for talking to plain-HTTP loopback mock servers.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Host stub that resolves the test sign-in target.
	pub fn test_host() -> StaticHost {
		StaticHost::new(TEST_SIGN_IN_AS)
	}

	/// Endpoints pointing at a mock server rooted at `base`.
	pub fn mock_endpoints(base: &str) -> ProviderEndpoints {
		let join = |path: &str| {
			Url::parse(&format!("{}{path}", base.trim_end_matches('/')))
				.expect("Mock endpoint URL should parse successfully.")
		};

		ProviderEndpoints {
			authorization: join("/oauth/authorize"),
			token: join("/oauth/token"),
			user_info: join("/v1/profile"),
		}
	}

	/// Absolute application URL for `path_and_query`.
	pub fn app_url(path_and_query: &str) -> Url {
		Url::parse(&format!("{TEST_APP_ORIGIN}{path_and_query}"))
			.expect("Application URL should parse successfully.")
	}

	/// Protected `state` parameter and correlation cookie issued by one challenge.
	#[derive(Clone, Debug)]
	pub struct IssuedState {
		/// Value of the `state` query parameter.
		pub state: String,
		/// Value the host would set as the correlation cookie.
		pub correlation: String,
	}
	impl IssuedState {
		/// Callback carrying `pairs`, this state, and the matching correlation cookie.
		pub fn callback(&self, pairs: &[(&str, &str)]) -> CallbackRequest {
			let mut pairs = pairs.to_vec();

			pairs.push(("state", &self.state));

			callback_request(&pairs).with_correlation(&self.correlation)
		}
	}

	/// Runs the challenge for `state` and returns what it issued to the browser.
	pub fn issue_state(auth: &ReqwestTestAuthentication, state: AuthorizationState) -> IssuedState {
		let redirect = auth
			.challenge(&app_url("/trips"), state)
			.expect("Challenge should build the authorization redirect.");
		let state = redirect
			.url
			.query_pairs()
			.find(|(key, _)| key == "state")
			.map(|(_, value)| value.into_owned())
			.expect("Authorization redirect should carry a state parameter.");

		IssuedState { state, correlation: redirect.correlation }
	}

	/// Callback request on the default callback path carrying `pairs` as query parameters.
	pub fn callback_request(pairs: &[(&str, &str)]) -> CallbackRequest {
		let mut url = app_url("/signin-tripit");

		url.query_pairs_mut().extend_pairs(pairs.iter().copied());

		CallbackRequest::from_url(&url)
	}

	/// Options builder pre-wired with the shared credentials and mock endpoints rooted at `base`.
	pub fn test_options(base: &str) -> ProviderOptionsBuilder {
		ProviderOptions::builder(TEST_CLIENT_ID, TEST_CLIENT_SECRET).endpoints(mock_endpoints(base))
	}

	/// Constructs a [`TripItAuthentication`] from `options` backed by the reqwest transport used
	/// across integration tests.
	pub fn build_reqwest_test_authentication_with(
		options: ProviderOptions,
	) -> ReqwestTestAuthentication {
		let host: &dyn AuthenticationHost = &test_host();

		TripItAuthentication::with_http_client(
			options,
			host,
			test_reqwest_http_client(),
			ReqwestTransportErrorMapper,
		)
		.expect("Test middleware should construct successfully.")
	}

	/// Constructs a [`TripItAuthentication`] with default options pointed at the mock server
	/// rooted at `base`.
	pub fn build_reqwest_test_authentication(base: &str) -> ReqwestTestAuthentication {
		build_reqwest_test_authentication_with(test_options(base).build())
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, BTreeSet},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use tokio_util::sync::CancellationToken;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
