//! Controllers for the ScalePolicy operator

mod decision;
mod scale_policy;

pub use decision::DecisionEngine;
pub use scale_policy::{ScalePolicyController, EVENT_REASON_FAILED_GET_SCALE_SUBRESOURCE};

use crate::error::OperatorError;
use kube::runtime::controller::Action;
use std::time::Duration;

/// Framework error policy. Reconciliation requeues on the policy's own
/// polling cadence and never surfaces transient failures as errors, so this
/// backstop only fires on unexpected ones; a fixed delay keeps the polling
/// interval authoritative instead of an exponential backoff.
pub(crate) fn error_policy<K>(
    _object: std::sync::Arc<K>,
    error: &OperatorError,
    _ctx: std::sync::Arc<impl std::any::Any + Send + Sync>,
) -> Action {
    tracing::error!("Unexpected reconciliation error: {}", error);
    Action::requeue(Duration::from_secs(30))
}
