//! Client-level error types shared by the HTTP pipeline, the refresh coordinator, and hooks.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// No response was received (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Response body is not a valid `{success, data}` envelope for the expected type.
	#[error("Response from `{path}` could not be decoded.")]
	Decode {
		/// Request path that produced the body.
		path: String,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},

	/// The backend rejected the credentials of a request that was already replayed once.
	#[error("Request was rejected as unauthenticated: {message}.")]
	Unauthorized {
		/// Backend- or client-supplied reason string.
		message: String,
	},
	/// Credentials could not be renewed; the session has been cleared.
	#[error("Session expired: {reason}.")]
	SessionExpired {
		/// Why the refresh cycle failed.
		reason: String,
	},
	/// Authenticated, but not allowed to perform the operation.
	#[error("Access denied: {message}.")]
	Forbidden {
		/// Backend- or client-supplied reason string.
		message: String,
	},
	/// Validation or business rule failure reported by the backend (4xx).
	#[error(
		"Request failed with status {status}: {}.",
		.message.as_deref().unwrap_or("no details")
	)]
	Api {
		/// HTTP status code.
		status: u16,
		/// Message extracted from the response body, if any.
		message: Option<String>,
	},
	/// Backend failure (5xx).
	#[error("Server failed with status {status}.")]
	Server {
		/// HTTP status code.
		status: u16,
	},
}
impl Error {
	/// Human-readable text suitable for surfacing next to a form or table.
	///
	/// Validation messages are passed through verbatim; transport and server failures
	/// collapse into generic text.
	pub fn display_message(&self) -> String {
		match self {
			Self::Api { message: Some(message), .. } => message.clone(),
			Self::Api { status, message: None } => format!("Request failed ({status})."),
			Self::Server { .. } =>
				"The server encountered an error. Please try again later.".into(),
			Self::Transport(_) =>
				"Unable to reach the server. Check your connection and try again.".into(),
			Self::Unauthorized { message } => message.clone(),
			Self::SessionExpired { .. } => "Your session has expired. Please sign in again.".into(),
			Self::Forbidden { .. } => "You do not have permission to perform this action.".into(),
			Self::Decode { .. } => "The server returned an unexpected response.".into(),
			Self::Storage(_) | Self::Config(_) => self.to_string(),
		}
	}

	/// HTTP status associated with the failure, when one was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Unauthorized { .. } => Some(401),
			Self::Forbidden { .. } => Some(403),
			Self::Api { status, .. } | Self::Server { status } => Some(*status),
			_ => None,
		}
	}
}

/// Configuration and validation failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// API origin is not an absolute URL.
	#[error("API origin `{value}` is invalid.")]
	InvalidOrigin {
		/// Raw configured value.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A request path cannot be joined onto the API base.
	#[error("Request path `{path}` cannot be resolved against the API base.")]
	InvalidPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request timeout is not a positive number of seconds.
	#[error("Request timeout `{value}` must be a positive number of seconds.")]
	InvalidTimeout {
		/// Raw configured value.
		value: String,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	RequestBody(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
