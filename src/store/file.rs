//! File-backed [`ScopeBackend`] used for the durable ("remember me") scope.

// std
use std::{
	fs::{self, File},
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{ScopeBackend, StoreError, StoreFuture},
};

/// Persists the raw session record to a single file, replacing it atomically on write.
#[derive(Clone, Debug)]
pub struct FileScope {
	path: PathBuf,
	cached: Arc<Mutex<Option<String>>>,
}
impl FileScope {
	/// Opens (or prepares) a scope at the provided path, eagerly loading an existing record.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, cached: Arc::new(Mutex::new(snapshot)) })
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<Option<String>, StoreError> {
		match fs::read_to_string(path) {
			Ok(contents) if contents.trim().is_empty() => Ok(None),
			Ok(contents) => Ok(Some(contents)),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
			Err(e) => Err(io_failure("read", path, e)),
		}
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		match path.parent() {
			Some(parent) if !parent.as_os_str().is_empty() =>
				fs::create_dir_all(parent).map_err(|e| io_failure("create", parent, e)),
			_ => Ok(()),
		}
	}

	/// Writes `raw` to a sibling `.tmp` file, syncs it, then renames it over the record.
	fn replace_contents(&self, raw: &str) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let staging = self.path.with_extension("tmp");
		let mut file = File::create(&staging).map_err(|e| io_failure("create", &staging, e))?;

		file.write_all(raw.as_bytes()).map_err(|e| io_failure("write", &staging, e))?;
		file.sync_all().map_err(|e| io_failure("sync", &staging, e))?;
		drop(file);

		fs::rename(&staging, &self.path).map_err(|e| io_failure("replace", &self.path, e))
	}

	fn delete(&self) -> Result<(), StoreError> {
		match fs::remove_file(&self.path) {
			Err(e) if e.kind() != ErrorKind::NotFound => Err(io_failure("remove", &self.path, e)),
			_ => Ok(()),
		}
	}
}
impl ScopeBackend for FileScope {
	fn load(&self) -> StoreFuture<'_, Option<String>> {
		Box::pin(async move { Ok(self.cached.lock().clone()) })
	}

	fn persist(&self, raw: String) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.cached.lock();

			self.replace_contents(&raw)?;
			*guard = Some(raw);

			Ok(())
		})
	}

	fn remove(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.cached.lock();

			self.delete()?;
			guard.take();

			Ok(())
		})
	}
}

fn io_failure(action: &str, path: &Path, e: std::io::Error) -> StoreError {
	StoreError::Backend { message: format!("Failed to {action} {}: {e}", path.display()) }
}
