//! Provider endpoint set and its transport-security checks.

// std
use std::net::IpAddr;
// self
use crate::{_prelude::*, error::ConfigError};

/// TripIt authorization endpoint.
pub const TRIPIT_AUTHORIZATION_ENDPOINT: &str = "https://www.tripit.com/oauth/authorize";
/// TripIt token endpoint.
pub const TRIPIT_TOKEN_ENDPOINT: &str = "https://api.tripit.com/oauth/access_token";
/// TripIt user-info endpoint.
pub const TRIPIT_USER_INFO_ENDPOINT: &str = "https://api.tripit.com/v1/get/profile?format=json";

/// Endpoint set used by the handshake.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Browser-facing authorization endpoint.
	pub authorization: Url,
	/// Backchannel token endpoint.
	pub token: Url,
	/// Backchannel user-info endpoint.
	pub user_info: Url,
}
impl ProviderEndpoints {
	/// TripIt production endpoints.
	pub fn tripit() -> Result<Self, ConfigError> {
		Ok(Self {
			authorization: parse_endpoint("authorization", TRIPIT_AUTHORIZATION_ENDPOINT)?,
			token: parse_endpoint("token", TRIPIT_TOKEN_ENDPOINT)?,
			user_info: parse_endpoint("user_info", TRIPIT_USER_INFO_ENDPOINT)?,
		})
	}

	/// Requires HTTPS for every endpoint; loopback hosts may use plain HTTP.
	pub fn validate(&self) -> Result<(), ConfigError> {
		validate_endpoint("authorization", &self.authorization)?;
		validate_endpoint("token", &self.token)?;
		validate_endpoint("user_info", &self.user_info)?;

		Ok(())
	}
}

pub(crate) fn parse_endpoint(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
	Url::parse(raw).map_err(|source| ConfigError::InvalidEndpoint { endpoint: name, source })
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ConfigError> {
	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ => Err(ConfigError::InsecureEndpoint { endpoint: name, url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host_str() {
		Some("localhost") => true,
		Some(host) => host
			.trim_start_matches('[')
			.trim_end_matches(']')
			.parse::<IpAddr>()
			.map(|ip| ip.is_loopback())
			.unwrap_or(false),
		None => false,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn endpoints(base: &str) -> ProviderEndpoints {
		ProviderEndpoints {
			authorization: Url::parse(&format!("{base}/authorize")).expect("URL should parse."),
			token: Url::parse(&format!("{base}/token")).expect("URL should parse."),
			user_info: Url::parse(&format!("{base}/profile")).expect("URL should parse."),
		}
	}

	#[test]
	fn production_endpoints_are_valid() {
		let endpoints = ProviderEndpoints::tripit().expect("Production endpoints should parse.");

		assert!(endpoints.validate().is_ok());
		assert_eq!(endpoints.authorization.host_str(), Some("www.tripit.com"));
	}

	#[test]
	fn plain_http_is_limited_to_loopback() {
		assert!(endpoints("http://127.0.0.1:8080").validate().is_ok());
		assert!(endpoints("http://localhost:8080").validate().is_ok());
		assert!(endpoints("http://[::1]:8080").validate().is_ok());

		let err = endpoints("http://provider.example.com")
			.validate()
			.expect_err("Remote plain HTTP endpoints must be rejected.");

		assert!(matches!(err, ConfigError::InsecureEndpoint { endpoint: "authorization", .. }));
	}
}
