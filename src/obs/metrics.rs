// self
use crate::{
	nav::Redirect,
	obs::{FlowKind, FlowOutcome},
};

/// Bumps `backoffice_client_flow_total` for `kind` and `outcome` when `metrics` is enabled.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(
		"backoffice_client_flow_total",
		"flow" => kind.label(),
		"outcome" => outcome.label()
	)
	.increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}

/// Bumps `backoffice_client_redirect_total` for `target` when `metrics` is enabled.
pub fn record_redirect(target: Redirect) {
	#[cfg(feature = "metrics")]
	metrics::counter!("backoffice_client_redirect_total", "route" => target.route()).increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = target;
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recording_without_a_recorder_is_a_no_op() {
		record_flow_outcome(FlowKind::Login, FlowOutcome::Failure);
		record_redirect(Redirect::AccessDenied);
	}
}
