//! Application-level redirects triggered by authentication and authorization failures.

// self
use crate::_prelude::*;

/// Where the embedding shell should send the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Redirect {
	/// Login entry point; the session is gone.
	Login,
	/// Access-denied view; the session is intact.
	AccessDenied,
}
impl Redirect {
	/// Conventional route for the target.
	pub const fn route(self) -> &'static str {
		match self {
			Self::Login => "/login",
			Self::AccessDenied => "/unauthorized",
		}
	}
}
impl Display for Redirect {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.route())
	}
}

/// Sink for redirects requested by the client pipeline.
pub trait Navigator
where
	Self: Send + Sync,
{
	/// Requests navigation to `target`.
	fn redirect(&self, target: Redirect);
}

/// A redirect together with the instant it was requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RedirectEntry {
	/// Requested target.
	pub target: Redirect,
	/// When the redirect was requested.
	pub at: OffsetDateTime,
}

/// Thread-safe [`Navigator`] that records every redirect for the shell to consume.
#[derive(Clone, Debug, Default)]
pub struct RedirectLog(Arc<Mutex<Vec<RedirectEntry>>>);
impl RedirectLog {
	/// Returns every recorded redirect, oldest first.
	pub fn entries(&self) -> Vec<RedirectEntry> {
		self.0.lock().clone()
	}

	/// Number of recorded redirects to `target`.
	pub fn count(&self, target: Redirect) -> usize {
		self.0.lock().iter().filter(|entry| entry.target == target).count()
	}

	/// Most recent redirect, if any.
	pub fn last(&self) -> Option<Redirect> {
		self.0.lock().last().map(|entry| entry.target)
	}

	/// Drains the recorded redirects.
	pub fn take(&self) -> Vec<RedirectEntry> {
		std::mem::take(&mut *self.0.lock())
	}
}
impl Navigator for RedirectLog {
	fn redirect(&self, target: Redirect) {
		#[cfg(feature = "tracing")]
		tracing::info!(target_route = target.route(), "Redirect requested.");

		self.0.lock().push(RedirectEntry { target, at: OffsetDateTime::now_utc() });
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn log_counts_and_drains() {
		let log = RedirectLog::default();

		log.redirect(Redirect::AccessDenied);
		log.redirect(Redirect::Login);

		assert_eq!(log.count(Redirect::Login), 1);
		assert_eq!(log.last(), Some(Redirect::Login));
		assert_eq!(log.take().len(), 2);
		assert!(log.entries().is_empty());
	}
}
