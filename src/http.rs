//! Transport primitives for back-office API calls.
//!
//! The module exposes [`ApiTransport`], the client's only dependency on an HTTP stack,
//! together with the logical [`ApiRequest`] that flows through the client pipeline and
//! the resolved [`TransportRequest`]/[`TransportResponse`] pair a transport exchanges.
//! An [`ApiRequest`] carries the "already retried" marker the refresh coordinator sets
//! exactly once, plus the bearer credential and refresh epoch it was dispatched under.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
#[cfg(feature = "reqwest")]
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{ConfigError, TransportError},
};

/// Query parameters attached to a request; ordered so equal sets compare equal.
pub type QueryParams = BTreeMap<String, String>;

/// Boxed future returned by [`ApiTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing API calls.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by every
/// clone of an [`ApiClient`](crate::client::ApiClient), and the futures they return must be
/// `Send` so request hooks can hand their fetches to any executor. A transport reports a
/// response for every status code; only failures that produced no response at all
/// (DNS, TCP, TLS, timeouts) are surfaced as [`TransportError`].
pub trait ApiTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes `request`, attaching `Authorization: Bearer <token>` when a bearer is present.
	fn send(&self, request: TransportRequest) -> TransportFuture<'_>;
}

/// HTTP verbs used by the back-office API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
	/// Read.
	Get,
	/// Create.
	Post,
	/// Replace.
	Put,
	/// Partial update.
	Patch,
	/// Remove.
	Delete,
}
impl Method {
	/// Returns the verb as sent on the wire.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Get => "GET",
			Self::Post => "POST",
			Self::Put => "PUT",
			Self::Patch => "PATCH",
			Self::Delete => "DELETE",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Logical API call as seen by the client pipeline and the refresh coordinator.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP verb.
	pub method: Method,
	/// Resource path relative to the API base (e.g. `/students`).
	pub path: String,
	/// Query parameters.
	pub query: QueryParams,
	/// JSON body, if any.
	pub body: Option<serde_json::Value>,
	refreshable: bool,
	retried: bool,
	bearer: Option<TokenSecret>,
	epoch: u64,
}
impl ApiRequest {
	/// Creates a request for `path` with no query and no body.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			query: QueryParams::new(),
			body: None,
			refreshable: true,
			retried: false,
			bearer: None,
			epoch: 0,
		}
	}

	/// Shorthand for a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::Get, path)
	}

	/// Replaces the query parameters.
	pub fn with_query(mut self, query: QueryParams) -> Self {
		self.query = query;

		self
	}

	/// Serializes `body` as the JSON payload.
	pub fn with_json(mut self, body: &impl Serialize) -> Result<Self, ConfigError> {
		self.body = Some(serde_json::to_value(body)?);

		Ok(self)
	}

	/// Sends the request anonymously and excludes it from refresh handling, as login and
	/// refresh calls are.
	pub fn without_refresh(mut self) -> Self {
		self.refreshable = false;

		self
	}

	/// Whether a 401 on this request may start the refresh flow.
	pub fn is_refreshable(&self) -> bool {
		self.refreshable
	}

	/// Whether the request has already been replayed after a credential refresh.
	pub fn is_retried(&self) -> bool {
		self.retried
	}

	/// Bearer credential attached on egress, if any.
	pub fn bearer(&self) -> Option<&TokenSecret> {
		self.bearer.as_ref()
	}

	/// Refresh epoch observed when the request was last dispatched.
	pub fn epoch(&self) -> u64 {
		self.epoch
	}

	/// Marks the request as replayed and pins the credential it will be replayed with.
	pub(crate) fn prepare_replay(&mut self, bearer: Option<TokenSecret>) {
		debug_assert!(!self.retried, "A request must be replayed at most once.");

		self.retried = true;
		self.bearer = bearer;
	}

	pub(crate) fn stamp(&mut self, bearer: Option<TokenSecret>, epoch: u64) {
		self.bearer = bearer;
		self.epoch = epoch;
	}
}

/// Fully resolved request handed to an [`ApiTransport`].
#[derive(Clone, Debug)]
pub struct TransportRequest {
	/// HTTP verb.
	pub method: Method,
	/// Absolute URL including the query string.
	pub url: Url,
	/// Bearer credential to attach, if any.
	pub bearer: Option<TokenSecret>,
	/// Serialized JSON body, if any.
	pub body: Option<Vec<u8>>,
	/// Timeout for this individual call.
	pub timeout: Duration,
}

/// Status and raw body of a completed HTTP exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportResponse {
	/// HTTP status code.
	pub status: u16,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl TransportResponse {
	/// Creates a response from a status and body.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, body: body.into() }
	}

	/// Creates a response whose body is `value` serialized as JSON.
	pub fn json(status: u16, value: &serde_json::Value) -> Self {
		Self { status, body: value.to_string().into_bytes() }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Extracts the backend's error text: a `detail`, `message`, or `error` string field of a
	/// JSON body, or a short plain-text body.
	pub fn error_message(&self) -> Option<String> {
		const FIELDS: [&str; 3] = ["detail", "message", "error"];
		const MAX_PLAIN_TEXT: usize = 512;

		if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&self.body) {
			return FIELDS
				.iter()
				.find_map(|field| value.get(field).and_then(serde_json::Value::as_str))
				.map(str::to_owned)
				.filter(|message| !message.trim().is_empty());
		}

		let text = std::str::from_utf8(&self.body).ok()?.trim();

		(!text.is_empty() && text.len() <= MAX_PLAIN_TEXT).then(|| text.to_owned())
	}

	/// Classifies the status into the client's error taxonomy without side effects.
	pub fn into_result(self) -> Result<Self> {
		match self.status {
			200..=299 => Ok(self),
			401 => Err(Error::Unauthorized {
				message: self.error_message().unwrap_or_else(|| "Not authenticated".into()),
			}),
			403 => Err(Error::Forbidden {
				message: self.error_message().unwrap_or_else(|| "Not allowed".into()),
			}),
			500..=599 => Err(Error::Server { status: self.status }),
			status => Err(Error::Api { status, message: self.error_message() }),
		}
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a transport over a fresh reqwest client.
	pub fn new() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().build()?;

		Ok(Self(client))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiTransport for ReqwestTransport {
	fn send(&self, request: TransportRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let method = match request.method {
				Method::Get => reqwest::Method::GET,
				Method::Post => reqwest::Method::POST,
				Method::Put => reqwest::Method::PUT,
				Method::Patch => reqwest::Method::PATCH,
				Method::Delete => reqwest::Method::DELETE,
			};
			let mut builder = self
				.0
				.request(method, request.url)
				.header(ACCEPT, HeaderValue::from_static("application/json"))
				.timeout(request.timeout.unsigned_abs());

			if let Some(bearer) = &request.bearer {
				builder = builder.bearer_auth(bearer.expose());
			}
			if let Some(body) = request.body {
				builder = builder
					.header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
					.body(body);
			}

			let response = builder.send().await?;
			let status = response.status().as_u16();
			let body = response.bytes().await?.to_vec();

			Ok(TransportResponse { status, body })
		})
	}
}
