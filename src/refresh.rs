//! Refresh Coordinator: single-flight credential renewal with exactly-once replay.
//!
//! Every response passes through [`RefreshCoordinator::inspect`]. A 401 on a request that
//! has not been replayed yet is admitted into the coordinator's two-state machine:
//!
//! - `IDLE`: the request becomes the cycle leader. The coordinator switches to `REFRESHING`,
//!   exchanges the stored refresh token for a new pair and persists it.
//! - `REFRESHING`: the caller parks behind a deferred reply and keeps its own request. No
//!   second refresh call is issued.
//!
//! When the cycle resolves the coordinator returns to `IDLE` and sends its outcome (the new
//! bearer or the failure reason) to every parked caller in arrival order. Each caller then
//! replays its own request, so a dropped leader never strands the batch once the refresh
//! has succeeded. The leader replays its request last.
//!
//! A replayed request is marked retried before it is sent, so a second 401 propagates as
//! [`Error::Unauthorized`] instead of looping. A failed cycle is terminal for the whole
//! batch: the session is cleared before the cycle is released, parked callers reject, and
//! the shell is redirected to the login entry point exactly once. Late 401s from the same
//! epoch reject without another refresh call or redirect. Requests dispatched before the
//! most recent renewal skip the cycle entirely and are replayed with the current token.

mod metrics;

pub use metrics::RefreshMetrics;

// crates.io
use futures::channel::oneshot;
// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, TokenSecret},
	client::ClientCore,
	http::{ApiRequest, TransportResponse},
	nav::Redirect,
	obs::{self, FlowKind},
};

/// What a parked caller receives: the renewed bearer, or the reason the cycle failed.
type CycleOutcome = Result<TokenSecret, String>;

const ABANDONED: &str = "the refresh cycle was abandoned before it completed";
const NO_REFRESH_TOKEN: &str = "no refresh token is stored";
const BLANK_ACCESS_TOKEN: &str = "the refresh response carried a blank access token";
const SESSION_CLEARED: &str = "the session was cleared while credentials were being renewed";

/// Observable phase of the coordinator's state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshPhase {
	/// No refresh call is in flight.
	Idle,
	/// A refresh call is in flight; 401s are queued behind it.
	Refreshing,
}

/// Per-client refresh arbiter; construct one per [`ApiClient`](crate::client::ApiClient).
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
	state: Mutex<CoordinatorState>,
	metrics: RefreshMetrics,
}
impl RefreshCoordinator {
	/// Creates an idle coordinator.
	pub fn new() -> Self {
		Self::default()
	}

	/// Current phase.
	pub fn phase(&self) -> RefreshPhase {
		match self.state.lock().phase {
			Phase::Idle => RefreshPhase::Idle,
			Phase::Refreshing { .. } => RefreshPhase::Refreshing,
		}
	}

	/// Number of credential renewals (refreshes and logins) observed so far.
	pub fn epoch(&self) -> u64 {
		self.state.lock().epoch
	}

	/// Counters for refresh cycles and replays.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Records a credential renewal that happened outside a refresh cycle (a login).
	pub(crate) fn advance_epoch(&self) {
		let mut state = self.state.lock();

		state.epoch += 1;
		state.expired = None;
	}

	/// Inbound stage: recovers 401s through the refresh cycle and settles everything else.
	pub(crate) async fn inspect(
		&self,
		core: &ClientCore,
		request: ApiRequest,
		response: TransportResponse,
	) -> Result<TransportResponse> {
		if response.status == 401 && request.is_refreshable() && !request.is_retried() {
			return self.recover(core, request).await;
		}

		self.settle(core, response)
	}

	/// Maps a response onto the caller's result, redirecting to the access-denied view on 403.
	fn settle(&self, core: &ClientCore, response: TransportResponse) -> Result<TransportResponse> {
		let result = response.into_result();

		if matches!(result, Err(Error::Forbidden { .. })) {
			obs::record_redirect(Redirect::AccessDenied);
			core.navigator.redirect(Redirect::AccessDenied);
		}

		result
	}

	fn admit(&self, request: ApiRequest) -> Admission<'_> {
		let mut state = self.state.lock();
		let epoch = state.epoch;

		if let Phase::Refreshing { waiters } = &mut state.phase {
			let (reply, deferred) = oneshot::channel();

			waiters.push(reply);
			self.metrics.record_queued();

			#[cfg(feature = "tracing")]
			tracing::debug!(depth = waiters.len(), "Request queued behind in-flight refresh.");

			return Admission::Queued(request, Deferred(deferred));
		}
		if let Some(expired) = state.expired.as_ref().filter(|expired| expired.epoch == epoch) {
			return Admission::Expired(expired.reason.clone());
		}
		if request.epoch() != epoch {
			return Admission::Stale(request);
		}

		state.phase = Phase::Refreshing { waiters: Vec::new() };

		Admission::Lead(RefreshCycle { coordinator: self, finished: false }, request)
	}

	async fn recover(&self, core: &ClientCore, request: ApiRequest) -> Result<TransportResponse> {
		match self.admit(request) {
			Admission::Queued(mut request, deferred) => {
				let bearer = deferred.settle().await?;

				request.prepare_replay(Some(bearer));

				self.replay(core, request).await
			},
			Admission::Lead(cycle, request) => self.lead(core, cycle, request).await,
			Admission::Stale(mut request) => {
				let Some(bearer) = core.store.access_token().await? else {
					return Err(self.expire(core, NO_REFRESH_TOKEN.into()).await);
				};

				#[cfg(feature = "tracing")]
				tracing::debug!(
					path = %request.path,
					"Replaying request issued before the latest renewal."
				);

				request.prepare_replay(Some(bearer));

				self.replay(core, request).await
			},
			Admission::Expired(reason) => Err(Error::SessionExpired { reason }),
		}
	}

	async fn lead(
		&self,
		core: &ClientCore,
		cycle: RefreshCycle<'_>,
		mut request: ApiRequest,
	) -> Result<TransportResponse> {
		self.metrics.record_attempt();

		let renewed = obs::observe(FlowKind::Refresh, &request.path, self.renew(core)).await;

		match renewed {
			Ok(tokens) => {
				self.metrics.record_success();

				let _released = cycle.succeed(&tokens.access_token);

				#[cfg(feature = "tracing")]
				tracing::info!(
					queued = _released,
					"Credentials renewed; releasing blocked requests."
				);

				request.prepare_replay(Some(tokens.access_token));

				self.replay(core, request).await
			},
			Err(e) => {
				self.metrics.record_failure();

				let reason = match e {
					Error::SessionExpired { reason } => reason,
					other => other.to_string(),
				};

				// The store is empty before the cycle is released.
				self.clear_session(core).await;

				let _rejected = cycle.fail(&reason);

				#[cfg(feature = "tracing")]
				tracing::warn!(
					%reason,
					queued = _rejected,
					"Credential refresh failed; ending session."
				);

				Err(redirect_to_login(core, reason))
			},
		}
	}

	async fn renew(&self, core: &ClientCore) -> Result<CredentialPair> {
		let refresh_token = core
			.store
			.refresh_token()
			.await?
			.ok_or_else(|| Error::SessionExpired { reason: NO_REFRESH_TOKEN.into() })?;
		let tokens = core.request_refresh(&refresh_token).await?;

		if tokens.access_token.is_blank() {
			return Err(Error::SessionExpired { reason: BLANK_ACCESS_TOKEN.into() });
		}
		if !core.store.update_tokens(tokens.clone()).await? {
			return Err(Error::SessionExpired { reason: SESSION_CLEARED.into() });
		}

		Ok(tokens)
	}

	async fn replay(
		&self,
		core: &ClientCore,
		mut request: ApiRequest,
	) -> Result<TransportResponse> {
		let path = request.path.clone();

		self.metrics.record_replay();

		obs::observe(FlowKind::Replay, &path, async {
			let epoch = self.epoch();
			let response = core.dispatch(&mut request, epoch).await?;

			self.settle(core, response)
		})
		.await
	}

	async fn clear_session(&self, core: &ClientCore) {
		if let Err(_e) = core.store.clear().await {
			#[cfg(feature = "tracing")]
			tracing::error!(error = %_e, "Failed to clear the stored session.");
		}
	}

	/// Terminal path outside a cycle: clears the session and redirects unless this epoch
	/// has already ended.
	async fn expire(&self, core: &ClientCore, reason: String) -> Error {
		self.clear_session(core).await;

		let first = {
			let mut state = self.state.lock();
			let epoch = state.epoch;
			let ended = state.expired.as_ref().is_some_and(|expired| expired.epoch == epoch);

			if !ended {
				state.expired = Some(ExpiredEpoch { epoch, reason: reason.clone() });
			}

			!ended
		};

		if first { redirect_to_login(core, reason) } else { Error::SessionExpired { reason } }
	}
}

#[derive(Debug, Default)]
struct CoordinatorState {
	phase: Phase,
	epoch: u64,
	expired: Option<ExpiredEpoch>,
}

/// Epoch whose session ended, with the reason late callers are rejected with.
#[derive(Debug)]
struct ExpiredEpoch {
	epoch: u64,
	reason: String,
}

#[derive(Default)]
enum Phase {
	#[default]
	Idle,
	Refreshing {
		waiters: Vec<oneshot::Sender<CycleOutcome>>,
	},
}
impl Debug for Phase {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Idle => f.write_str("Idle"),
			Self::Refreshing { waiters } =>
				f.debug_struct("Refreshing").field("queued", &waiters.len()).finish(),
		}
	}
}

enum Admission<'a> {
	Lead(RefreshCycle<'a>, ApiRequest),
	Queued(ApiRequest, Deferred),
	Stale(ApiRequest),
	Expired(String),
}

/// Caller-side half of a parked request; resolved exactly once by the cycle.
struct Deferred(oneshot::Receiver<CycleOutcome>);
impl Deferred {
	async fn settle(self) -> Result<TokenSecret> {
		match self.0.await {
			Ok(Ok(bearer)) => Ok(bearer),
			Ok(Err(reason)) => Err(Error::SessionExpired { reason }),
			Err(oneshot::Canceled) => Err(Error::SessionExpired { reason: ABANDONED.into() }),
		}
	}
}

enum Resolution<'r> {
	Renewed,
	Failed(&'r str),
	Abandoned,
}

/// Leadership of one refresh cycle; dropping it unfinished returns the coordinator to idle
/// and rejects every parked caller.
struct RefreshCycle<'a> {
	coordinator: &'a RefreshCoordinator,
	finished: bool,
}
impl RefreshCycle<'_> {
	/// Hands `bearer` to every parked caller in arrival order; returns how many there were.
	fn succeed(mut self, bearer: &TokenSecret) -> usize {
		let waiters = self.finish(Resolution::Renewed);
		let released = waiters.len();

		for waiter in waiters {
			// A parked caller that went away simply misses the token.
			let _ = waiter.send(Ok(bearer.clone()));
		}

		released
	}

	/// Rejects every parked caller with `reason` and ends the current epoch.
	fn fail(mut self, reason: &str) -> usize {
		let waiters = self.finish(Resolution::Failed(reason));
		let rejected = waiters.len();

		for waiter in waiters {
			let _ = waiter.send(Err(reason.to_owned()));
		}

		rejected
	}

	fn finish(&mut self, resolution: Resolution<'_>) -> Vec<oneshot::Sender<CycleOutcome>> {
		let mut state = self.coordinator.state.lock();

		self.finished = true;

		match resolution {
			Resolution::Renewed => state.epoch += 1,
			Resolution::Failed(reason) => {
				let epoch = state.epoch;

				state.expired = Some(ExpiredEpoch { epoch, reason: reason.to_owned() });
			},
			Resolution::Abandoned => {},
		}

		match std::mem::take(&mut state.phase) {
			Phase::Refreshing { waiters } => waiters,
			Phase::Idle => Vec::new(),
		}
	}
}
impl Drop for RefreshCycle<'_> {
	fn drop(&mut self) {
		if !self.finished {
			// Dropping the senders rejects every parked caller.
			drop(self.finish(Resolution::Abandoned));
		}
	}
}

fn redirect_to_login(core: &ClientCore, reason: String) -> Error {
	obs::record_redirect(Redirect::Login);
	core.navigator.redirect(Redirect::Login);

	Error::SessionExpired { reason }
}
