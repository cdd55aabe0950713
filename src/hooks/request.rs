//! Request Hook: a read subscription whose results are applied only while still current.
//!
//! Every fetch takes a generation ticket when it is issued. Mounting, changing parameters,
//! refetching, and unmounting all advance the generation, so a fetch whose ticket no longer
//! matches finds its result discarded on arrival. The network call itself is never
//! aborted.

// crates.io
use futures::future;
// self
use crate::{_prelude::*, client::ApiClient, http::QueryParams};

/// Boxed fetch returned to the binding, which drives it on its executor.
pub type FetchFuture = Pin<Box<dyn Future<Output = FetchOutcome> + 'static + Send>>;

/// What happened to a fetch's result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchOutcome {
	/// The result was written into the hook state.
	Applied,
	/// A newer fetch (or an unmount) superseded this one; its result was dropped.
	Discarded,
	/// Nothing was requested: parameters are absent or the hook is unmounted.
	Skipped,
}

/// Observable `{data, loading, error}` view of a subscription.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestState<T> {
	/// Most recent successfully applied payload; kept across later failures.
	pub data: Option<T>,
	/// Whether the current fetch has yet to settle.
	pub loading: bool,
	/// Display text of the most recent applied failure.
	pub error: Option<String>,
}
impl<T> Default for RequestState<T> {
	fn default() -> Self {
		Self { data: None, loading: false, error: None }
	}
}

/// Read subscription bound to one endpoint and a parameter set.
///
/// Dropping the hook unmounts it.
pub struct RequestHook<T> {
	client: ApiClient,
	endpoint: String,
	subscription: Arc<Subscription<T>>,
}
impl<T> RequestHook<T>
where
	T: 'static + Send + DeserializeOwned,
{
	/// Creates an unmounted hook for `endpoint`.
	pub fn new(client: ApiClient, endpoint: impl Into<String>) -> Self {
		Self { client, endpoint: endpoint.into(), subscription: Default::default() }
	}

	/// Endpoint the hook reads from.
	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	/// Current parameter set; `None` means fetching is skipped.
	pub fn params(&self) -> Option<QueryParams> {
		self.subscription.inner.lock().params.clone()
	}

	/// Mounts the hook and issues the first fetch (skipped when `params` is `None`).
	pub fn mount(&self, params: Option<QueryParams>) -> FetchFuture {
		{
			let mut inner = self.subscription.inner.lock();

			inner.mounted = true;
			inner.params = params;
		}

		self.issue()
	}

	/// Replaces the parameter set, fetching again only when it differs from the current one.
	pub fn set_params(&self, params: Option<QueryParams>) -> Option<FetchFuture> {
		{
			let mut inner = self.subscription.inner.lock();

			if inner.params == params {
				return None;
			}

			inner.params = params;

			if !inner.mounted {
				return None;
			}
		}

		Some(self.issue())
	}

	/// Repeats the call with the current parameters.
	pub fn refetch(&self) -> FetchFuture {
		self.issue()
	}

	/// Supersedes every pending fetch; their results will be discarded.
	pub fn unmount(&self) {
		let mut inner = self.subscription.inner.lock();

		inner.mounted = false;
		inner.generation += 1;
		inner.state.loading = false;
	}

	/// Whether the hook is mounted.
	pub fn is_mounted(&self) -> bool {
		self.subscription.inner.lock().mounted
	}

	fn issue(&self) -> FetchFuture {
		let (ticket, params) = {
			let mut inner = self.subscription.inner.lock();

			if !inner.mounted {
				return Box::pin(future::ready(FetchOutcome::Skipped));
			}

			inner.generation += 1;

			let Some(params) = inner.params.clone() else {
				inner.state.loading = false;

				return Box::pin(future::ready(FetchOutcome::Skipped));
			};

			inner.state.loading = true;

			(inner.generation, params)
		};
		let client = self.client.clone();
		let endpoint = self.endpoint.clone();
		let subscription = self.subscription.clone();

		Box::pin(async move {
			let result = client.get::<T>(&endpoint, &params).await;

			subscription.apply(ticket, result)
		})
	}
}
impl<T> RequestHook<T>
where
	T: Clone,
{
	/// Cloned view of the current state.
	pub fn snapshot(&self) -> RequestState<T> {
		self.subscription.inner.lock().state.clone()
	}
}
impl<T> Debug for RequestHook<T> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let inner = self.subscription.inner.lock();

		f.debug_struct("RequestHook")
			.field("endpoint", &self.endpoint)
			.field("params", &inner.params)
			.field("generation", &inner.generation)
			.field("loading", &inner.state.loading)
			.finish()
	}
}
impl<T> Drop for RequestHook<T> {
	fn drop(&mut self) {
		let mut inner = self.subscription.inner.lock();

		inner.mounted = false;
		inner.generation += 1;
	}
}

struct Subscription<T> {
	inner: Mutex<SubscriptionInner<T>>,
}
impl<T> Subscription<T> {
	fn apply(&self, ticket: u64, result: Result<T>) -> FetchOutcome {
		let mut inner = self.inner.lock();

		if inner.generation != ticket {
			#[cfg(feature = "tracing")]
			tracing::debug!(
				ticket,
				current = inner.generation,
				"Discarding superseded fetch result."
			);

			return FetchOutcome::Discarded;
		}

		inner.state.loading = false;

		match result {
			Ok(data) => {
				inner.state.data = Some(data);
				inner.state.error = None;
			},
			Err(e) => inner.state.error = Some(e.display_message()),
		}

		FetchOutcome::Applied
	}
}
impl<T> Default for Subscription<T> {
	fn default() -> Self {
		Self {
			inner: Mutex::new(SubscriptionInner {
				state: RequestState::default(),
				params: None,
				generation: 0,
				mounted: false,
			}),
		}
	}
}

struct SubscriptionInner<T> {
	state: RequestState<T>,
	params: Option<QueryParams>,
	generation: u64,
	mounted: bool,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn subscription(generation: u64) -> Subscription<u32> {
		let subscription = Subscription::default();

		subscription.inner.lock().generation = generation;

		subscription
	}

	#[test]
	fn current_ticket_applies_and_clears_error() {
		let subscription = subscription(2);

		subscription.inner.lock().state.error = Some("previous".into());

		assert_eq!(subscription.apply(2, Ok(7)), FetchOutcome::Applied);

		let state = subscription.inner.lock().state.clone();

		assert_eq!(state, RequestState { data: Some(7), loading: false, error: None });
	}

	#[test]
	fn stale_ticket_is_discarded() {
		let subscription = subscription(3);

		subscription.inner.lock().state.loading = true;

		assert_eq!(subscription.apply(2, Ok(7)), FetchOutcome::Discarded);

		let state = subscription.inner.lock().state.clone();

		assert_eq!(state.data, None);
		assert!(state.loading, "A discarded result must not settle the newer fetch.");
	}

	#[test]
	fn failure_keeps_previous_data() {
		let subscription = subscription(1);

		assert_eq!(subscription.apply(1, Ok(5)), FetchOutcome::Applied);

		subscription.inner.lock().generation = 2;

		let outcome = subscription.apply(2, Err(Error::Server { status: 500 }));
		let state = subscription.inner.lock().state.clone();

		assert_eq!(outcome, FetchOutcome::Applied);
		assert_eq!(state.data, Some(5));
		assert!(state.error.is_some());
	}
}
