//! HTTP Client Core: one shared pipeline bound to the configured API base.
//!
//! Every call runs the same two stages. The outbound stage reads the current access token
//! from the [`TokenStore`] and attaches it as a bearer credential; the inbound stage hands
//! every response to the client's [`RefreshCoordinator`] before the caller sees it. Typed
//! verbs then unwrap the backend's `{success, data}` envelope.

// crates.io
use serde_json::Value;
// self
#[cfg(feature = "reqwest")]
use crate::{
	http::ReqwestTransport,
	store::{FileScope, MemoryScope, ScopeBackend},
};
use crate::{
	_prelude::*,
	auth::{
		CredentialPair, Identity, LoginRequest, LoginResponse, RefreshRequest, StoredSession,
		TokenSecret,
	},
	config::ClientConfig,
	error::ConfigError,
	http::{ApiRequest, ApiTransport, Method, QueryParams, TransportRequest, TransportResponse},
	nav::Navigator,
	obs::{self, FlowKind},
	refresh::{RefreshCoordinator, RefreshMetrics, RefreshPhase},
	store::TokenStore,
};

/// Resource path of the login endpoint.
pub const LOGIN_PATH: &str = "/auth/login";
/// Resource path of the credential refresh endpoint.
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Shared handle to the authenticated pipeline; clones share one store and one coordinator.
#[derive(Clone)]
pub struct ApiClient {
	inner: Arc<ClientInner>,
}
impl ApiClient {
	/// Builds a client over caller-provided transport, store, and navigator.
	pub fn with_transport(
		config: ClientConfig,
		transport: Arc<dyn ApiTransport>,
		store: Arc<TokenStore>,
		navigator: Arc<dyn Navigator>,
	) -> Self {
		let core = ClientCore { config, transport, store, navigator };

		Self { inner: Arc::new(ClientInner { core, coordinator: RefreshCoordinator::new() }) }
	}

	/// Builds a reqwest-backed client.
	///
	/// The durable scope is file-backed when [`ClientConfig::durable_path`] is set and lives
	/// in memory otherwise; the session scope always lives in memory.
	#[cfg(feature = "reqwest")]
	pub fn new(config: ClientConfig, navigator: Arc<dyn Navigator>) -> Result<Self> {
		let durable: Arc<dyn ScopeBackend> = match config.durable_path.as_deref() {
			Some(path) => Arc::new(FileScope::open(path)?),
			None => Arc::new(MemoryScope::default()),
		};
		let store = TokenStore::new(durable, Arc::new(MemoryScope::default()));
		let transport = ReqwestTransport::new()?;

		Ok(Self::with_transport(config, Arc::new(transport), Arc::new(store), navigator))
	}

	/// Configuration the client was built with.
	pub fn config(&self) -> &ClientConfig {
		&self.inner.core.config
	}

	/// Session store shared with the refresh coordinator.
	pub fn store(&self) -> &Arc<TokenStore> {
		&self.inner.core.store
	}

	/// Current phase of the refresh coordinator.
	pub fn refresh_phase(&self) -> RefreshPhase {
		self.inner.coordinator.phase()
	}

	/// Refresh and replay counters.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		self.inner.coordinator.metrics()
	}

	/// Runs `request` through both pipeline stages and returns the settled response.
	///
	/// A 401 is recovered transparently when the refresh cycle succeeds; any other
	/// non-2xx status is returned as the matching [`Error`] variant.
	pub async fn send(&self, mut request: ApiRequest) -> Result<TransportResponse> {
		let inner = &self.inner;
		let path = request.path.clone();

		obs::observe(FlowKind::Request, &path, async move {
			let epoch = inner.coordinator.epoch();
			let response = inner.core.dispatch(&mut request, epoch).await?;

			inner.coordinator.inspect(&inner.core, request, response).await
		})
		.await
	}

	/// Sends `request` and unwraps the envelope's `data` as `T`.
	///
	/// Envelopes without `data` (and empty bodies) decode as JSON `true`, so `T = bool`
	/// or `T = serde_json::Value` suits endpoints with no payload.
	pub async fn call<T>(&self, request: ApiRequest) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let path = request.path.clone();
		let response = self.send(request).await?;

		decode_envelope(&path, response.status, &response.body)
	}

	/// `GET path?query`.
	pub async fn get<T>(&self, path: &str, query: &QueryParams) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.call(ApiRequest::get(path).with_query(query.clone())).await
	}

	/// `POST path` with a JSON body.
	pub async fn post<T>(&self, path: &str, body: &impl Serialize) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.call(ApiRequest::new(Method::Post, path).with_json(body)?).await
	}

	/// `PUT path` with a JSON body.
	pub async fn put<T>(&self, path: &str, body: &impl Serialize) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.call(ApiRequest::new(Method::Put, path).with_json(body)?).await
	}

	/// `PATCH path` with a JSON body.
	pub async fn patch<T>(&self, path: &str, body: &impl Serialize) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.call(ApiRequest::new(Method::Patch, path).with_json(body)?).await
	}

	/// `DELETE path`.
	pub async fn delete<T>(&self, path: &str) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.call(ApiRequest::new(Method::Delete, path)).await
	}

	/// Signs in and stores the session in the scope selected by `remember`.
	///
	/// The call is anonymous and never enters the refresh flow: a 401 here means the
	/// credentials were rejected and surfaces as [`Error::Unauthorized`] with the
	/// backend's message.
	pub async fn login(&self, credentials: &LoginRequest, remember: bool) -> Result<StoredSession> {
		let inner = &self.inner;

		obs::observe(FlowKind::Login, LOGIN_PATH, async move {
			let mut request = ApiRequest::new(Method::Post, LOGIN_PATH)
				.with_json(credentials)?
				.without_refresh();
			let epoch = inner.coordinator.epoch();
			let response = inner.core.dispatch(&mut request, epoch).await?.into_result()?;
			let session = StoredSession::from(decode_auth_payload::<LoginResponse>(
				LOGIN_PATH,
				response.status,
				&response.body,
			)?);

			inner.core.store.save(&session, remember).await?;
			inner.coordinator.advance_epoch();

			#[cfg(feature = "tracing")]
			tracing::info!(user = %session.user.id, remember, "Signed in.");

			Ok::<_, Error>(session)
		})
		.await
	}

	/// Removes the stored session from both scopes.
	pub async fn logout(&self) -> Result<()> {
		self.inner.core.store.clear().await?;

		#[cfg(feature = "tracing")]
		tracing::info!("Signed out.");

		Ok(())
	}

	/// Identity snapshot of the signed-in user, if any.
	pub async fn current_user(&self) -> Result<Option<Identity>> {
		Ok(self.inner.core.store.read().await?.map(|session| session.user))
	}
}
impl Debug for ApiClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("config", &self.inner.core.config)
			.field("coordinator", &self.inner.coordinator)
			.finish()
	}
}

struct ClientInner {
	core: ClientCore,
	coordinator: RefreshCoordinator,
}

/// Collaborators the pipeline stages and the refresh coordinator share.
pub(crate) struct ClientCore {
	pub(crate) config: ClientConfig,
	pub(crate) transport: Arc<dyn ApiTransport>,
	pub(crate) store: Arc<TokenStore>,
	pub(crate) navigator: Arc<dyn Navigator>,
}
impl ClientCore {
	/// Outbound stage: binds credentials and sends `request` as-is.
	///
	/// Fresh requests are stamped with the current access token and `epoch`; replays keep
	/// the credential the coordinator pinned on them.
	pub(crate) async fn dispatch(
		&self,
		request: &mut ApiRequest,
		epoch: u64,
	) -> Result<TransportResponse> {
		if !request.is_retried() {
			let bearer =
				if request.is_refreshable() { self.store.access_token().await? } else { None };

			request.stamp(bearer, epoch);
		}

		let mut url = self.config.endpoint(&request.path)?;

		if !request.query.is_empty() {
			let mut pairs = url.query_pairs_mut();

			for (key, value) in &request.query {
				pairs.append_pair(key, value);
			}
		}

		let body =
			request.body.as_ref().map(serde_json::to_vec).transpose().map_err(ConfigError::from)?;
		let outbound = TransportRequest {
			method: request.method,
			url,
			bearer: request.bearer().cloned(),
			body,
			timeout: self.config.request_timeout,
		};

		Ok(self.transport.send(outbound).await?)
	}

	/// Exchanges `refresh_token` for a new credential pair.
	///
	/// Any non-2xx answer fails the exchange; no redirect happens here.
	pub(crate) async fn request_refresh(
		&self,
		refresh_token: &TokenSecret,
	) -> Result<CredentialPair> {
		let mut request = ApiRequest::new(Method::Post, REFRESH_PATH)
			.with_json(&RefreshRequest { refresh_token: refresh_token.expose() })?
			.without_refresh();
		let response = self.dispatch(&mut request, 0).await?.into_result()?;

		decode_auth_payload(REFRESH_PATH, response.status, &response.body)
	}
}

#[derive(Deserialize)]
struct Envelope {
	success: bool,
	/// Absent and `null` both mean "no payload".
	#[serde(default)]
	data: Option<Value>,
	#[serde(default)]
	message: Option<String>,
}

fn no_payload() -> Value {
	Value::Bool(true)
}

fn decode_envelope<T>(path: &str, status: u16, body: &[u8]) -> Result<T>
where
	T: DeserializeOwned,
{
	if body.iter().all(u8::is_ascii_whitespace) {
		return decode_value(path, no_payload());
	}

	let envelope: Envelope = decode_slice(path, body)?;

	if !envelope.success {
		return Err(Error::Api { status, message: envelope.message });
	}

	decode_value(path, envelope.data.unwrap_or_else(no_payload))
}

/// Auth endpoints answer with a bare payload; an enveloped one is accepted too.
fn decode_auth_payload<T>(path: &str, status: u16, body: &[u8]) -> Result<T>
where
	T: DeserializeOwned,
{
	let value: Value = decode_slice(path, body)?;

	if value.get("success").is_some_and(Value::is_boolean) {
		return decode_envelope(path, status, body);
	}

	decode_value(path, value)
}

fn decode_slice<T>(path: &str, body: &[u8]) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| Error::Decode { path: path.to_owned(), source })
}

fn decode_value<T>(path: &str, value: Value) -> Result<T>
where
	T: DeserializeOwned,
{
	serde_path_to_error::deserialize(value)
		.map_err(|source| Error::Decode { path: path.to_owned(), source })
}
