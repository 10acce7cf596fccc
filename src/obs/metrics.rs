// std
use std::time::Duration as StdDuration;
// self
use crate::obs::{FlowKind, FlowOutcome};

/// Counter bumped on every attempt and every terminal outcome, labeled `flow` + `outcome`.
pub const FLOW_TOTAL: &str = "cloud_cli_auth_flow_total";
/// Histogram of finished flow durations in seconds, labeled `flow` + `outcome`.
pub const FLOW_DURATION_SECONDS: &str = "cloud_cli_auth_flow_duration_seconds";

/// Counts one flow event on the global recorder, if any.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(FLOW_TOTAL, "flow" => kind.as_str(), "outcome" => outcome.as_str()).increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}

/// Records how long a finished flow took.
pub fn record_flow_duration(kind: FlowKind, outcome: FlowOutcome, elapsed: StdDuration) {
	#[cfg(feature = "metrics")]
	metrics::histogram!(
		FLOW_DURATION_SECONDS,
		"flow" => kind.as_str(),
		"outcome" => outcome.as_str()
	)
	.record(elapsed.as_secs_f64());
	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome, elapsed);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recording_without_a_recorder_is_silent() {
		record_flow_outcome(FlowKind::InstanceIdentity, FlowOutcome::Failure);
		record_flow_duration(FlowKind::Refresh, FlowOutcome::Success, StdDuration::from_millis(120));
	}
}
