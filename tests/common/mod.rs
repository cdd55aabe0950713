//! In-process back-office backend used by the integration suites.
//!
//! Protected routes accept exactly one access token at a time; `/auth/refresh` rotates it.
//! Routes can be held behind a gate so tests decide when a response is released.

#![allow(dead_code)]

// std
use std::{collections::HashMap, sync::Arc, time::Duration};
// crates.io
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::Semaphore;
// self
use backoffice_client::{
	auth::{CredentialPair, Identity, Role, StoredSession, UserId},
	client::ApiClient,
	config::ClientConfig,
	error::TransportError,
	http::{ApiTransport, Method, TransportFuture, TransportRequest, TransportResponse},
	nav::RedirectLog,
	store::TokenStore,
	url::Url,
};

pub const ORIGIN: &str = "http://backoffice.test";
pub const BASE_PATH: &str = "/api/v1";
pub const PASSWORD: &str = "correct horse";

/// One request as observed by the backend.
#[derive(Clone, Debug)]
pub struct Call {
	pub method: Method,
	pub path: String,
	pub query: Option<String>,
	pub bearer: Option<String>,
	pub body: Option<Value>,
}

/// How `/auth/refresh` answers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshMode {
	Rotate,
	Reject,
	Offline,
}

#[derive(Clone, Debug)]
enum Scripted {
	Reply(TransportResponse),
	Offline,
}

struct BackendState {
	valid_access: String,
	issued: u32,
	refresh_mode: RefreshMode,
	scripted: HashMap<String, Scripted>,
	calls: Vec<Call>,
}

pub struct FakeBackend {
	state: Mutex<BackendState>,
	gates: Mutex<HashMap<String, Arc<Semaphore>>>,
}
impl FakeBackend {
	pub fn new() -> Self {
		Self {
			state: Mutex::new(BackendState {
				valid_access: "access-0".into(),
				issued: 0,
				refresh_mode: RefreshMode::Rotate,
				scripted: HashMap::new(),
				calls: Vec::new(),
			}),
			gates: Mutex::new(HashMap::new()),
		}
	}

	pub fn set_refresh_mode(&self, mode: RefreshMode) {
		self.state.lock().refresh_mode = mode;
	}

	/// Answers every call to `path` with `status` and `body`, regardless of credentials.
	pub fn script(&self, path: &str, status: u16, body: Value) {
		let reply = Scripted::Reply(TransportResponse::json(status, &body));

		self.state.lock().scripted.insert(path.into(), reply);
	}

	/// Makes every call to `path` fail without a response.
	pub fn script_offline(&self, path: &str) {
		self.state.lock().scripted.insert(path.into(), Scripted::Offline);
	}

	/// Holds every call to `route` (path plus `?query`, if any) until [`Self::open`].
	pub fn hold(&self, route: &str) {
		self.gates.lock().insert(route.into(), Arc::new(Semaphore::new(0)));
	}

	/// Releases every held and future call to `route`.
	pub fn open(&self, route: &str) {
		if let Some(gate) = self.gates.lock().remove(route) {
			gate.close();
		}
	}

	pub fn calls(&self) -> Vec<Call> {
		self.state.lock().calls.clone()
	}

	pub fn count(&self, path: &str) -> usize {
		self.state.lock().calls.iter().filter(|call| call.path == path).count()
	}

	pub fn bearers(&self, path: &str) -> Vec<Option<String>> {
		self.state
			.lock()
			.calls
			.iter()
			.filter(|call| call.path == path)
			.map(|call| call.bearer.clone())
			.collect()
	}

	fn respond(
		&self,
		path: &str,
		query: Option<&str>,
		bearer: Option<&str>,
		body: Option<&Value>,
	) -> Result<TransportResponse, TransportError> {
		let mut state = self.state.lock();

		match path {
			"/auth/login" => {
				let password = body.and_then(|body| body.get("password")).and_then(Value::as_str);

				if password != Some(PASSWORD) {
					return Ok(TransportResponse::json(
						401,
						&json!({"detail": "Invalid email or password"}),
					));
				}

				let (access, refresh) = state.rotate();

				Ok(TransportResponse::json(
					200,
					&json!({
						"access_token": access,
						"refresh_token": refresh,
						"token_type": "bearer",
						"user": {
							"id": 7,
							"email": "bursar@school.test",
							"full_name": "Bursar Office",
							"role": "admin"
						}
					}),
				))
			},
			"/auth/refresh" => match state.refresh_mode {
				RefreshMode::Rotate => {
					let (access, refresh) = state.rotate();

					Ok(TransportResponse::json(
						200,
						&json!({
							"access_token": access,
							"refresh_token": refresh,
							"token_type": "bearer"
						}),
					))
				},
				RefreshMode::Reject =>
					Ok(TransportResponse::json(401, &json!({"detail": "Refresh token expired"}))),
				RefreshMode::Offline =>
					Err(TransportError::Io(std::io::Error::other("connection refused"))),
			},
			path => {
				if let Some(scripted) = state.scripted.get(path) {
					return match scripted {
						Scripted::Reply(response) => Ok(response.clone()),
						Scripted::Offline =>
							Err(TransportError::Io(std::io::Error::other("connection reset"))),
					};
				}
				if bearer != Some(state.valid_access.as_str()) {
					return Ok(TransportResponse::json(401, &json!({"detail": "Token expired"})));
				}

				let mut data = json!({"path": path, "token": bearer});

				if let Some(query) = query {
					data["query"] = json!(query);
				}

				Ok(TransportResponse::json(200, &json!({"success": true, "data": data})))
			},
		}
	}
}
impl ApiTransport for FakeBackend {
	fn send(&self, request: TransportRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let full_path = request.url.path();
			let path = full_path.strip_prefix(BASE_PATH).unwrap_or(full_path).to_owned();
			let query = request.url.query().map(str::to_owned);
			let route = match &query {
				Some(query) => format!("{path}?{query}"),
				None => path.clone(),
			};
			let bearer = request.bearer.as_ref().map(|token| token.expose().to_owned());
			let body = request
				.body
				.as_deref()
				.map(|raw| serde_json::from_slice::<Value>(raw).expect("Request bodies are JSON."));

			self.state.lock().calls.push(Call {
				method: request.method,
				path: path.clone(),
				query: query.clone(),
				bearer: bearer.clone(),
				body: body.clone(),
			});

			let gate = self.gates.lock().get(&route).cloned();

			if let Some(gate) = gate {
				// A closed gate lets every waiter through.
				if let Ok(permit) = gate.acquire().await {
					permit.forget();
				}
			}

			self.respond(&path, query.as_deref(), bearer.as_deref(), body.as_ref())
		})
	}
}
impl BackendState {
	fn rotate(&mut self) -> (String, String) {
		self.issued += 1;
		self.valid_access = format!("access-{}", self.issued);

		(self.valid_access.clone(), format!("refresh-{}", self.issued))
	}
}

/// Client wired to a [`FakeBackend`] with in-memory scopes and a recording navigator.
pub struct Harness {
	pub client: ApiClient,
	pub backend: Arc<FakeBackend>,
	pub store: Arc<TokenStore>,
	pub redirects: RedirectLog,
}
impl Harness {
	pub fn new() -> Self {
		let backend = Arc::new(FakeBackend::new());
		let store = Arc::new(TokenStore::in_memory());
		let redirects = RedirectLog::default();
		let origin = Url::parse(ORIGIN).expect("Test origin should parse.");
		let client = ApiClient::with_transport(
			ClientConfig::new(origin),
			backend.clone(),
			store.clone(),
			Arc::new(redirects.clone()),
		);

		Self { client, backend, store, redirects }
	}

	/// Harness whose store holds a session with the given credentials.
	pub async fn signed_in(access: &str, refresh: &str) -> Self {
		let harness = Self::new();

		harness
			.store
			.save(&session(access, refresh), false)
			.await
			.expect("Seeding the session should succeed.");

		harness
	}

	/// Harness whose stored access token the backend no longer accepts.
	pub async fn expired() -> Self {
		Self::signed_in("stale-access", "refresh-0").await
	}

	pub async fn access_token(&self) -> Option<String> {
		self.store
			.access_token()
			.await
			.expect("Reading the store should succeed.")
			.map(|token| token.expose().to_owned())
	}
}

pub fn session(access: &str, refresh: &str) -> StoredSession {
	StoredSession {
		user: Identity {
			id: UserId::new("7").expect("User id fixture should be valid."),
			email: "bursar@school.test".into(),
			display_name: "Bursar Office".into(),
			role: Role::new("admin").expect("Role fixture should be valid."),
		},
		tokens: CredentialPair::bearer(access, refresh),
	}
}

/// Polls `condition` until it holds, failing the test after five seconds.
pub async fn eventually(condition: impl Fn() -> bool) {
	tokio::time::timeout(Duration::from_secs(5), async {
		while !condition() {
			tokio::time::sleep(Duration::from_millis(2)).await;
		}
	})
	.await
	.expect("Condition should hold within five seconds.");
}
