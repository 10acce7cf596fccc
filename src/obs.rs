//! Optional observability helpers for backend exchanges and token maintenance.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `cloud_cli_auth.flow` with the `flow`
//!   (exchange kind), `stage` (call site), and `outcome` fields.
//! - Enable `metrics` to increment the `cloud_cli_auth_flow_total` counter for every
//!   attempt/success/failure and to record `cloud_cli_auth_flow_duration_seconds` for every
//!   finished flow, both labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// std
use std::time::Instant;
// self
use crate::_prelude::*;

/// Exchange kinds observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// IAM token endpoint exchange.
	IamToken,
	/// UAA token endpoint exchange.
	UaaToken,
	/// IAM OpenID discovery lookup.
	IamDiscovery,
	/// VPC instance-identity token request.
	InstanceIdentity,
	/// VPC instance-identity to IAM token exchange.
	InstanceIamToken,
	/// Stored refresh token rotation.
	Refresh,
	/// Compute-resource login renewal.
	ComputeResourceRenewal,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::IamToken => "iam_token",
			FlowKind::UaaToken => "uaa_token",
			FlowKind::IamDiscovery => "iam_discovery",
			FlowKind::InstanceIdentity => "instance_identity",
			FlowKind::InstanceIamToken => "instance_iam_token",
			FlowKind::Refresh => "refresh",
			FlowKind::ComputeResourceRenewal => "compute_resource_renewal",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to an exchange.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside a flow span, counting the attempt and timing the outcome.
pub(crate) async fn observe_flow<T, Fut>(kind: FlowKind, stage: &'static str, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let span = FlowSpan::new(kind, stage);
	let started = Instant::now();

	record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = span.instrument(fut).await;
	let outcome = match &result {
		Ok(_) => FlowOutcome::Success,
		Err(_e) => {
			#[cfg(feature = "tracing")]
			::tracing::debug!(flow = kind.as_str(), stage, error = %_e, "Flow failed.");

			FlowOutcome::Failure
		},
	};

	span.record_outcome(outcome);
	record_flow_outcome(kind, outcome);
	record_flow_duration(kind, outcome, started.elapsed());

	result
}
