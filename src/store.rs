//! Token Store: the stored session across two mutually exclusive persistence scopes.
//!
//! The durable scope survives process restarts (the "remember me" choice) while the
//! session scope lives only as long as the process. [`TokenStore`] guarantees that at
//! most one [`StoredSession`] exists across both scopes: every save clears the other
//! scope first, and every operation runs under a single async write guard so readers
//! never observe a half-switched pair of scopes.

pub mod file;
pub mod memory;

pub use file::FileScope;
pub use memory::MemoryScope;

// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, StoredSession, TokenSecret},
};

/// Boxed future returned by [`ScopeBackend`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Raw single-slot storage contract implemented by each persistence scope.
///
/// Backends store the serialized record verbatim; parsing (and purging records that no
/// longer parse) is the [`TokenStore`]'s job.
pub trait ScopeBackend
where
	Self: Send + Sync,
{
	/// Returns the raw record held by this scope, if any.
	fn load(&self) -> StoreFuture<'_, Option<String>>;

	/// Replaces the raw record held by this scope.
	fn persist(&self, raw: String) -> StoreFuture<'_, ()>;

	/// Removes the record; removing an empty scope succeeds.
	fn remove(&self) -> StoreFuture<'_, ()>;
}

/// Persistence lifetime selected at login.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageScope {
	/// Survives restarts.
	Durable,
	/// Cleared when the process ends.
	Session,
}
impl StorageScope {
	/// Scope selected by the login form's "remember me" flag.
	pub const fn from_remember(remember: bool) -> Self {
		if remember { Self::Durable } else { Self::Session }
	}

	/// Returns the opposite scope.
	pub const fn other(self) -> Self {
		match self {
			Self::Durable => Self::Session,
			Self::Session => Self::Durable,
		}
	}

	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Durable => "durable",
			Self::Session => "session",
		}
	}
}

/// Error type produced by [`ScopeBackend`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced while writing a record.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Session persistence shared by the HTTP pipeline, the refresh coordinator, and the
/// login/logout paths.
pub struct TokenStore {
	durable: Arc<dyn ScopeBackend>,
	session: Arc<dyn ScopeBackend>,
	guard: AsyncMutex<()>,
}
impl TokenStore {
	/// Builds a store over the provided durable and session backends.
	pub fn new(durable: Arc<dyn ScopeBackend>, session: Arc<dyn ScopeBackend>) -> Self {
		Self { durable, session, guard: AsyncMutex::new(()) }
	}

	/// Builds a store whose scopes both live in process memory.
	pub fn in_memory() -> Self {
		Self::new(Arc::new(MemoryScope::default()), Arc::new(MemoryScope::default()))
	}

	/// Returns the backend serving `scope`.
	pub fn backend(&self, scope: StorageScope) -> &Arc<dyn ScopeBackend> {
		match scope {
			StorageScope::Durable => &self.durable,
			StorageScope::Session => &self.session,
		}
	}

	/// Reads the stored session, checking the durable scope before the session scope.
	///
	/// A record that no longer parses is purged from its scope and treated as absent.
	pub async fn read(&self) -> Result<Option<StoredSession>, StoreError> {
		let _guard = self.guard.lock().await;

		Ok(self.locate().await?.map(|(_, session)| session))
	}

	/// Writes `session` into the scope chosen by `remember`, clearing the other scope first.
	pub async fn save(&self, session: &StoredSession, remember: bool) -> Result<(), StoreError> {
		let scope = StorageScope::from_remember(remember);
		let raw = encode(session)?;
		let _guard = self.guard.lock().await;

		self.backend(scope.other()).remove().await?;
		self.backend(scope).persist(raw).await
	}

	/// Replaces only the credential pair of the current session, leaving the identity as is.
	///
	/// Returns `false` (and writes nothing) when no session is stored.
	pub async fn update_tokens(&self, tokens: CredentialPair) -> Result<bool, StoreError> {
		let _guard = self.guard.lock().await;
		let Some((scope, mut session)) = self.locate().await? else {
			return Ok(false);
		};

		session.tokens = tokens;
		self.backend(scope).persist(encode(&session)?).await?;

		Ok(true)
	}

	/// Removes the session from both scopes.
	pub async fn clear(&self) -> Result<(), StoreError> {
		let _guard = self.guard.lock().await;

		self.durable.remove().await?;
		self.session.remove().await
	}

	/// Current access token, if a session exists.
	pub async fn access_token(&self) -> Result<Option<TokenSecret>, StoreError> {
		Ok(self.read().await?.map(|session| session.tokens.access_token))
	}

	/// Current refresh token, if a session exists.
	pub async fn refresh_token(&self) -> Result<Option<TokenSecret>, StoreError> {
		Ok(self.read().await?.map(|session| session.tokens.refresh_token))
	}

	async fn locate(&self) -> Result<Option<(StorageScope, StoredSession)>, StoreError> {
		for scope in [StorageScope::Durable, StorageScope::Session] {
			let backend = self.backend(scope);
			let Some(raw) = backend.load().await? else {
				continue;
			};

			match serde_json::from_str::<StoredSession>(&raw) {
				Ok(session) => return Ok(Some((scope, session))),
				Err(_e) => {
					#[cfg(feature = "tracing")]
					tracing::warn!(
						scope = scope.as_str(),
						error = %_e,
						"Purging unreadable stored session."
					);

					backend.remove().await?;
				},
			}
		}

		Ok(None)
	}
}
impl Debug for TokenStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TokenStore(..)")
	}
}

fn encode(session: &StoredSession) -> Result<String, StoreError> {
	serde_json::to_string(session).map_err(|e| StoreError::Serialization {
		message: format!("Failed to encode session: {e}"),
	})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		auth::{Identity, Role, UserId},
		error::Error,
	};

	fn session(access: &str, refresh: &str) -> StoredSession {
		StoredSession {
			user: Identity {
				id: UserId::new("1").expect("User id fixture should be valid."),
				email: "bursar@school.test".into(),
				display_name: "Bursar".into(),
				role: Role::new("admin").expect("Role fixture should be valid."),
			},
			tokens: CredentialPair::bearer(access, refresh),
		}
	}

	async fn raw(store: &TokenStore, scope: StorageScope) -> Option<String> {
		store.backend(scope).load().await.expect("Memory scopes never fail to load.")
	}

	#[test]
	fn store_error_converts_into_client_error_with_source() {
		let store_error = StoreError::Backend { message: "disk unavailable".into() };
		let error: Error = store_error.clone().into();

		assert!(matches!(error, Error::Storage(_)));
		assert!(error.to_string().contains("disk unavailable"));

		let source = StdError::source(&error)
			.expect("Client error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[tokio::test]
	async fn remember_selects_durable_scope_and_clears_session_scope() {
		let store = TokenStore::in_memory();

		store.save(&session("a-1", "r-1"), false).await.expect("Session save should succeed.");
		store.save(&session("a-2", "r-2"), true).await.expect("Durable save should succeed.");

		assert!(raw(&store, StorageScope::Session).await.is_none());
		assert!(raw(&store, StorageScope::Durable).await.is_some());
		assert_eq!(
			store.read().await.expect("Read should succeed."),
			Some(session("a-2", "r-2"))
		);
	}

	#[tokio::test]
	async fn forgetting_selects_session_scope_and_clears_durable_scope() {
		let store = TokenStore::in_memory();

		store.save(&session("a-1", "r-1"), true).await.expect("Durable save should succeed.");
		store.save(&session("a-2", "r-2"), false).await.expect("Session save should succeed.");

		assert!(raw(&store, StorageScope::Durable).await.is_none());
		assert_eq!(
			store.read().await.expect("Read should succeed."),
			Some(session("a-2", "r-2"))
		);
	}

	#[tokio::test]
	async fn corrupt_record_is_purged_and_read_as_absent() {
		let store = TokenStore::in_memory();

		store
			.backend(StorageScope::Durable)
			.persist("{not json".into())
			.await
			.expect("Raw persist should succeed.");

		assert_eq!(store.read().await.expect("Corrupt records must not error."), None);
		assert!(raw(&store, StorageScope::Durable).await.is_none());
	}

	#[tokio::test]
	async fn corrupt_durable_record_falls_through_to_session_scope() {
		let store = TokenStore::in_memory();

		store.save(&session("a-1", "r-1"), false).await.expect("Session save should succeed.");
		store
			.backend(StorageScope::Durable)
			.persist("[]".into())
			.await
			.expect("Raw persist should succeed.");

		assert_eq!(
			store.read().await.expect("Read should succeed."),
			Some(session("a-1", "r-1"))
		);
		assert!(raw(&store, StorageScope::Durable).await.is_none());
	}

	#[tokio::test]
	async fn update_tokens_keeps_identity_and_scope() {
		let store = TokenStore::in_memory();
		let original = session("a-1", "r-1");

		store.save(&original, false).await.expect("Session save should succeed.");

		let updated = store
			.update_tokens(CredentialPair::bearer("a-2", "r-2"))
			.await
			.expect("Token update should succeed.");
		let current =
			store.read().await.expect("Read should succeed.").expect("Session should remain.");

		assert!(updated);
		assert_eq!(current.user, original.user);
		assert_eq!(current.tokens.access_token.expose(), "a-2");
		assert!(raw(&store, StorageScope::Durable).await.is_none());
	}

	#[tokio::test]
	async fn update_tokens_without_session_is_a_noop() {
		let store = TokenStore::in_memory();
		let updated = store
			.update_tokens(CredentialPair::bearer("a", "r"))
			.await
			.expect("Token update should succeed.");

		assert!(!updated);
		assert_eq!(store.read().await.expect("Read should succeed."), None);
	}

	#[tokio::test]
	async fn clear_and_convenience_reads() {
		let store = TokenStore::in_memory();

		assert_eq!(store.access_token().await.expect("Read should succeed."), None);

		store.save(&session("a-1", "r-1"), true).await.expect("Durable save should succeed.");

		assert_eq!(
			store.refresh_token().await.expect("Read should succeed."),
			Some(TokenSecret::new("r-1"))
		);

		store.clear().await.expect("Clear should succeed.");

		assert_eq!(store.access_token().await.expect("Read should succeed."), None);
		assert_eq!(store.refresh_token().await.expect("Read should succeed."), None);
	}
}
