//! Client configuration resolved from the environment or built in code.

// std
use std::path::PathBuf;
// self
use crate::{_prelude::*, error::ConfigError};

/// Environment variable naming the backend origin (scheme + host + port).
pub const ENV_API_ORIGIN: &str = "BACKOFFICE_API_ORIGIN";
/// Environment variable overriding the API base path.
pub const ENV_API_BASE_PATH: &str = "BACKOFFICE_API_BASE_PATH";
/// Environment variable overriding the per-request timeout, in seconds.
pub const ENV_API_TIMEOUT_SECS: &str = "BACKOFFICE_API_TIMEOUT_SECS";
/// Environment variable enabling the file-backed durable scope.
pub const ENV_SESSION_FILE: &str = "BACKOFFICE_SESSION_FILE";

const DEFAULT_ORIGIN: &str = "http://127.0.0.1:8000";
const DEFAULT_BASE_PATH: &str = "/api/v1";
const DEFAULT_TIMEOUT: Duration = Duration::seconds(30);

/// Where the backend lives and how requests against it behave.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
	/// Backend origin, e.g. `https://erp.school.test`.
	pub origin: Url,
	/// Prefix shared by every resource path, e.g. `/api/v1`.
	pub base_path: String,
	/// Timeout applied to each individual request, refresh calls included.
	pub request_timeout: Duration,
	/// File backing the durable scope; `None` keeps durable sessions in memory.
	pub durable_path: Option<PathBuf>,
}
impl ClientConfig {
	/// Creates a configuration for `origin` with the default base path and timeout.
	pub fn new(origin: Url) -> Self {
		Self {
			origin,
			base_path: DEFAULT_BASE_PATH.into(),
			request_timeout: DEFAULT_TIMEOUT,
			durable_path: None,
		}
	}

	/// Reads the configuration from process environment variables.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Resolves the configuration through `lookup`, falling back to defaults for unset keys.
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
		let origin_raw = lookup(ENV_API_ORIGIN).unwrap_or_else(|| DEFAULT_ORIGIN.into());
		let origin = Url::parse(origin_raw.trim())
			.map_err(|source| ConfigError::InvalidOrigin { value: origin_raw.clone(), source })?;
		let mut config = Self::new(origin);

		if let Some(path) = lookup(ENV_API_BASE_PATH) {
			config = config.with_base_path(path);
		}
		if let Some(raw) = lookup(ENV_API_TIMEOUT_SECS) {
			let secs = raw
				.trim()
				.parse::<i64>()
				.ok()
				.filter(|secs| *secs > 0)
				.ok_or_else(|| ConfigError::InvalidTimeout { value: raw.clone() })?;

			config.request_timeout = Duration::seconds(secs);
		}
		if let Some(path) = lookup(ENV_SESSION_FILE).filter(|p| !p.trim().is_empty()) {
			config.durable_path = Some(PathBuf::from(path));
		}

		Ok(config)
	}

	/// Overrides the base path; leading/trailing slashes are normalized.
	pub fn with_base_path(mut self, path: impl AsRef<str>) -> Self {
		let trimmed = path.as_ref().trim().trim_matches('/');

		self.base_path = if trimmed.is_empty() { String::new() } else { format!("/{trimmed}") };

		self
	}

	/// Overrides the per-request timeout.
	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Enables the file-backed durable scope.
	pub fn with_durable_path(mut self, path: impl Into<PathBuf>) -> Self {
		self.durable_path = Some(path.into());

		self
	}

	/// Resolves a resource path (e.g. `/students`) against origin + base path.
	pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
		let path = path.trim_start_matches('/');
		let joined = format!("{}/{path}", self.base_path);

		self.origin
			.join(&joined)
			.map_err(|source| ConfigError::InvalidPath { path: path.to_owned(), source })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
		move |key| pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| (*v).to_owned())
	}

	#[test]
	fn defaults_apply_when_environment_is_empty() {
		let config = ClientConfig::from_lookup(|_| None).expect("Defaults should resolve.");

		assert_eq!(config.base_path, "/api/v1");
		assert_eq!(config.request_timeout, Duration::seconds(30));
		assert_eq!(config.durable_path, None);
		assert_eq!(
			config.endpoint("/students").expect("Endpoint should resolve.").as_str(),
			"http://127.0.0.1:8000/api/v1/students"
		);
	}

	#[test]
	fn environment_overrides_are_applied() {
		let config = ClientConfig::from_lookup(lookup(&[
			(ENV_API_ORIGIN, "https://erp.school.test"),
			(ENV_API_BASE_PATH, "api/v2/"),
			(ENV_API_TIMEOUT_SECS, "5"),
			(ENV_SESSION_FILE, "/tmp/backoffice/session.json"),
		]))
		.expect("Overrides should resolve.");

		assert_eq!(config.base_path, "/api/v2");
		assert_eq!(config.request_timeout, Duration::seconds(5));
		assert_eq!(config.durable_path, Some(PathBuf::from("/tmp/backoffice/session.json")));
		assert_eq!(
			config.endpoint("invoices/7").expect("Endpoint should resolve.").as_str(),
			"https://erp.school.test/api/v2/invoices/7"
		);
	}

	#[test]
	fn invalid_values_are_rejected() {
		let origin = ClientConfig::from_lookup(lookup(&[(ENV_API_ORIGIN, "not a url")]));
		let timeout = ClientConfig::from_lookup(lookup(&[(ENV_API_TIMEOUT_SECS, "0")]));

		assert!(matches!(origin, Err(ConfigError::InvalidOrigin { .. })));
		assert!(matches!(timeout, Err(ConfigError::InvalidTimeout { .. })));
	}

	#[test]
	fn empty_base_path_targets_origin_root() {
		let origin = Url::parse("http://127.0.0.1:8000").expect("Origin fixture should parse.");
		let config = ClientConfig::new(origin).with_base_path("/");

		assert_eq!(
			config.endpoint("/health").expect("Endpoint should resolve.").as_str(),
			"http://127.0.0.1:8000/health"
		);
	}
}
