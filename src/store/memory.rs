//! Thread-safe in-memory [`ScopeBackend`] used for the session scope and for tests.

// self
use crate::{
	_prelude::*,
	store::{ScopeBackend, StoreFuture},
};

type Slot = Arc<Mutex<Option<String>>>;

/// Process-lifetime storage slot.
#[derive(Clone, Debug, Default)]
pub struct MemoryScope(Slot);
impl MemoryScope {
	/// Returns a copy of the raw record without going through the async contract.
	pub fn peek(&self) -> Option<String> {
		self.0.lock().clone()
	}
}
impl ScopeBackend for MemoryScope {
	fn load(&self) -> StoreFuture<'_, Option<String>> {
		let slot = self.0.clone();

		Box::pin(async move { Ok(slot.lock().clone()) })
	}

	fn persist(&self, raw: String) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			*slot.lock() = Some(raw);

			Ok(())
		})
	}

	fn remove(&self) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			slot.lock().take();

			Ok(())
		})
	}
}
