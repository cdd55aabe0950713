//! Mutation Hook: imperative writes with an in-flight flag and display-ready errors.

// self
use crate::{_prelude::*, client::ApiClient};

/// Observable `{loading, error}` view of a mutation hook.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MutationState {
	/// Whether any call started through the hook is still running.
	pub loading: bool,
	/// Display text of the most recent failure, until the next success or [`MutationHook::reset`].
	pub error: Option<String>,
}

/// Wraps caller-supplied write calls; failures never escape as errors.
#[derive(Clone, Debug)]
pub struct MutationHook {
	client: ApiClient,
	state: Arc<Mutex<Tracker>>,
}
impl MutationHook {
	/// Creates a hook whose calls run against `client`.
	pub fn new(client: ApiClient) -> Self {
		Self { client, state: Default::default() }
	}

	/// Runs `call` and returns its payload, or `None` after recording the failure text.
	///
	/// Credential refresh is transparent: a call blocked by an expired token resolves
	/// normally once the refresh cycle recovers it.
	pub async fn run<T, F, Fut>(&self, call: F) -> Option<T>
	where
		F: FnOnce(ApiClient) -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let in_flight = InFlight::enter(&self.state);
		let result = call(self.client.clone()).await;

		drop(in_flight);

		let mut tracker = self.state.lock();

		match result {
			Ok(payload) => {
				tracker.error = None;

				Some(payload)
			},
			Err(e) => {
				#[cfg(feature = "tracing")]
				tracing::debug!(error = %e, "Mutation failed.");

				tracker.error = Some(e.display_message());

				None
			},
		}
	}

	/// Clears a previously surfaced error without re-running anything.
	pub fn reset(&self) {
		self.state.lock().error = None;
	}

	/// Cloned view of the current state.
	pub fn snapshot(&self) -> MutationState {
		let tracker = self.state.lock();

		MutationState { loading: tracker.in_flight > 0, error: tracker.error.clone() }
	}
}

#[derive(Debug, Default)]
struct Tracker {
	in_flight: usize,
	error: Option<String>,
}

/// Counts one running call; dropping it (including when the call's future is dropped)
/// ends the call.
struct InFlight<'a>(&'a Mutex<Tracker>);
impl<'a> InFlight<'a> {
	fn enter(tracker: &'a Mutex<Tracker>) -> Self {
		tracker.lock().in_flight += 1;

		Self(tracker)
	}
}
impl Drop for InFlight<'_> {
	fn drop(&mut self) {
		let mut tracker = self.0.lock();

		tracker.in_flight = tracker.in_flight.saturating_sub(1);
	}
}
