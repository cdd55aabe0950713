//! Flow observability for the client pipeline.
//!
//! With `tracing` (on by default) each flow runs inside a `backoffice_client.flow` span
//! carrying its `flow` label and the request `path`. With `metrics` every flow bumps
//! `backoffice_client_flow_total{flow, outcome}` and every redirect bumps
//! `backoffice_client_redirect_total{route}`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Pipeline flows that are observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Ordinary API call.
	Request,
	/// Credential refresh cycle led by a rejected request.
	Refresh,
	/// Re-send of a request blocked by an expired token.
	Replay,
	/// Explicit sign-in.
	Login,
}
impl FlowKind {
	/// Label used for span and counter fields.
	pub const fn label(self) -> &'static str {
		match self {
			Self::Request => "request",
			Self::Refresh => "refresh",
			Self::Replay => "replay",
			Self::Login => "login",
		}
	}
}

/// Counter outcome for a flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// The flow started.
	Attempt,
	/// The flow produced a value.
	Success,
	/// The flow produced an error.
	Failure,
}
impl FlowOutcome {
	/// Label used for counter fields.
	pub const fn label(self) -> &'static str {
		match self {
			Self::Attempt => "attempt",
			Self::Success => "success",
			Self::Failure => "failure",
		}
	}

	/// Terminal outcome of `result`.
	pub fn of<T, E>(result: &Result<T, E>) -> Self {
		if result.is_ok() { Self::Success } else { Self::Failure }
	}
}

/// Runs `flow` inside a span for `kind` on `path`, counting its attempt and outcome.
pub async fn observe<F, T, E>(kind: FlowKind, path: &str, flow: F) -> Result<T, E>
where
	F: Future<Output = Result<T, E>>,
{
	record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = FlowSpan::new(kind, path).instrument(flow).await;

	record_flow_outcome(kind, FlowOutcome::of(&result));

	result
}
