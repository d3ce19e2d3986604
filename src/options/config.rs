//! Serde-facing provider configuration.

// self
use crate::{
	_prelude::*,
	auth::Secret,
	error::ConfigError,
	options::{ProviderEndpoints, ProviderOptions, ProviderOptionsBuilder},
};

/// Provider settings as they appear in configuration files.
///
/// Omitted fields keep the [`ProviderOptionsBuilder`] defaults. Hooks, codecs, and certificate
/// validators are code-only and are attached to the returned builder.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
	/// Provider-assigned client identifier.
	pub client_id: String,
	/// Provider-assigned client secret.
	pub client_secret: Secret,
	/// Authentication type override.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub authentication_type: Option<String>,
	/// Caption override.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub caption: Option<String>,
	/// Requested scopes.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub scope: Vec<String>,
	/// Scope delimiter override.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope_delimiter: Option<char>,
	/// Callback path override.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub callback_path: Option<String>,
	/// Backchannel timeout override in milliseconds.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub backchannel_timeout_ms: Option<u64>,
	/// Response size cap override in bytes.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub max_response_bytes: Option<usize>,
	/// Endpoint overrides.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub endpoints: Option<ProviderEndpoints>,
	/// Sign-in target override.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sign_in_as: Option<String>,
}
impl ProviderConfig {
	/// Parses a JSON document, reporting the path of the first offending field.
	pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_str(json);

		serde_path_to_error::deserialize(&mut de).map_err(|e| ConfigError::InvalidConfig {
			path: e.path().to_string(),
			source: e.into_inner(),
		})
	}

	/// Converts the configuration into a builder so code-only settings can be attached.
	pub fn into_builder(self) -> ProviderOptionsBuilder {
		let mut builder = ProviderOptions::builder(self.client_id, self.client_secret)
			.scopes(self.scope);

		if let Some(value) = self.authentication_type {
			builder = builder.authentication_type(value);
		}
		if let Some(value) = self.caption {
			builder = builder.caption(value);
		}
		if let Some(value) = self.scope_delimiter {
			builder = builder.scope_delimiter(value);
		}
		if let Some(value) = self.callback_path {
			builder = builder.callback_path(value);
		}
		if let Some(value) = self.backchannel_timeout_ms {
			builder = builder.backchannel_timeout(StdDuration::from_millis(value));
		}
		if let Some(value) = self.max_response_bytes {
			builder = builder.max_response_bytes(value);
		}
		if let Some(value) = self.endpoints {
			builder = builder.endpoints(value);
		}
		if let Some(value) = self.sign_in_as {
			builder = builder.sign_in_as(value);
		}

		builder
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn minimal_document_keeps_defaults() {
		let config = ProviderConfig::from_json_str(r#"{"client_id":"app","client_secret":"s3"}"#)
			.expect("Minimal configuration should parse.");
		let options = config.into_builder().build();

		assert_eq!(options.client_id, "app");
		assert_eq!(options.client_secret.expose(), "s3");
		assert_eq!(options.callback_path, "/signin-tripit");
		assert_eq!(options.backchannel_timeout, StdDuration::from_secs(60));
	}

	#[test]
	fn overrides_flow_into_options() {
		let config = ProviderConfig::from_json_str(
			r#"{
				"client_id": "app",
				"client_secret": "s3",
				"scope": ["trips", "profile"],
				"scope_delimiter": ",",
				"callback_path": "/auth/tripit",
				"backchannel_timeout_ms": 2500,
				"sign_in_as": "Cookies",
				"endpoints": {
					"authorization": "https://auth.example.com/authorize",
					"token": "https://auth.example.com/token",
					"user_info": "https://api.example.com/me"
				}
			}"#,
		)
		.expect("Full configuration should parse.");
		let options = config.into_builder().build();

		assert_eq!(options.scope, vec!["trips".to_string(), "profile".to_string()]);
		assert_eq!(options.scope_delimiter, ',');
		assert_eq!(options.callback_path, "/auth/tripit");
		assert_eq!(options.backchannel_timeout, StdDuration::from_millis(2500));
		assert_eq!(options.sign_in_as.as_deref(), Some("Cookies"));
		assert_eq!(
			options.endpoints.map(|e| e.user_info.to_string()),
			Some("https://api.example.com/me".into())
		);
	}

	#[test]
	fn errors_report_the_offending_path() {
		let err = ProviderConfig::from_json_str(
			r#"{"client_id":"app","client_secret":"s3","endpoints":{"authorization":"nope","token":"https://a/t","user_info":"https://a/u"}}"#,
		)
		.expect_err("Invalid endpoint URL must be rejected.");

		match err {
			ConfigError::InvalidConfig { path, .. } => assert_eq!(path, "endpoints.authorization"),
			other => panic!("Unexpected error: {other:?}."),
		}
	}
}
