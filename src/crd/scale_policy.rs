//! ScalePolicy Custom Resource Definition
//!
//! Declarative horizontal-scaling policy: a target workload reference,
//! replica bounds, the metrics that drive the desired replica count, and
//! per-direction stabilization behavior.

use crate::error::{OperatorError, Result};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metric kinds understood by the provider registry.
pub const METRIC_KIND_STATIC: &str = "static";
pub const METRIC_KIND_PROMETHEUS: &str = "prometheus";

/// Metric target modes. `pod-average` is accepted by the schema for forward
/// compatibility; providers currently treat `target.value` as a literal.
pub const TARGET_MODE_VALUE: &str = "value";
pub const TARGET_MODE_POD_AVERAGE: &str = "pod-average";

/// ScalePolicy is the Schema for the scalepolicies API
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "scaling.dev",
    version = "v1alpha1",
    kind = "ScalePolicy",
    namespaced,
    status = "ScalePolicyStatus",
    shortname = "sp",
    printcolumn = r#"{"name":"Target","type":"string","jsonPath":".spec.scaleTargetRef.name"}"#,
    printcolumn = r#"{"name":"Min","type":"integer","jsonPath":".spec.minReplicas"}"#,
    printcolumn = r#"{"name":"Max","type":"integer","jsonPath":".spec.maxReplicas"}"#,
    printcolumn = r#"{"name":"Desired","type":"integer","jsonPath":".status.desiredReplicas"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ScalePolicySpec {
    /// Reference to the scalable workload in the same namespace
    pub scale_target_ref: ScaleTargetRef,

    /// Lower bound for the emitted replica count
    #[serde(default = "default_min_replicas")]
    pub min_replicas: i32,

    /// Upper bound for the emitted replica count
    pub max_replicas: i32,

    /// How often the metrics are polled, in seconds
    #[serde(default = "default_polling_interval_seconds")]
    pub polling_interval_seconds: u64,

    /// Metrics that drive the desired replica count; the max wins
    pub metrics: Vec<MetricSpec>,

    /// Per-direction stabilization behavior
    #[serde(default)]
    pub behavior: ScalingBehavior,

    /// Replica count substituted for a metric after repeated failures
    #[serde(default)]
    pub fallback: Option<Fallback>,

    /// Compute the desired replicas but only record them in status
    #[serde(default)]
    pub dry_run: bool,
}

/// Identifies the scalable workload
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScaleTargetRef {
    /// API group of the target (empty for the core group)
    #[serde(default)]
    pub group: String,

    /// Kind of the target
    pub kind: String,

    /// Name of the target
    pub name: String,
}

/// A single metric to poll
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricSpec {
    /// Provider kind ("static", "prometheus")
    pub kind: String,

    /// Provider-specific configuration (e.g. "query" for prometheus)
    #[serde(default)]
    pub config: BTreeMap<String, String>,

    /// Target value for the metric
    pub target: MetricTarget,
}

/// Target value specification for a metric
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricTarget {
    /// Target mode ("value", "pod-average")
    #[serde(default = "default_target_mode")]
    pub mode: String,

    /// Decimal value interpreted by the provider
    pub value: String,
}

/// Per-direction stabilization configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScalingBehavior {
    /// Scale-up damping
    #[serde(default)]
    pub scale_up: ScalingRules,

    /// Scale-down damping
    #[serde(default)]
    pub scale_down: ScalingRules,
}

/// Stabilization rules for one direction
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScalingRules {
    /// Sliding window over recent proposals, in seconds; 0 disables damping
    #[serde(default)]
    pub stabilization_window_seconds: i64,
}

/// Fallback applied when a metric keeps failing
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Fallback {
    /// Replica count substituted for the failing metric
    pub replicas: i32,

    /// Consecutive failures before the fallback kicks in
    pub threshold: u32,
}

/// Observed state of a ScalePolicy
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScalePolicyStatus {
    /// Last replica count the controller computed
    #[serde(default)]
    pub desired_replicas: i32,

    /// Generation the controller last acted on
    #[serde(default)]
    pub observed_generation: Option<i64>,
}

impl ScalePolicySpec {
    /// Validate the invariants the admission layer would normally enforce.
    pub fn validate(&self) -> Result<()> {
        if self.min_replicas < 1 {
            return Err(OperatorError::Configuration(format!(
                "minReplicas must be >= 1, got {}",
                self.min_replicas
            )));
        }
        if self.max_replicas < 1 {
            return Err(OperatorError::Configuration(format!(
                "maxReplicas must be >= 1, got {}",
                self.max_replicas
            )));
        }
        if self.min_replicas > self.max_replicas {
            return Err(OperatorError::Configuration(format!(
                "minReplicas {} must not exceed maxReplicas {}",
                self.min_replicas, self.max_replicas
            )));
        }
        if self.polling_interval_seconds == 0 {
            return Err(OperatorError::Configuration(
                "pollingIntervalSeconds must be positive".to_string(),
            ));
        }
        if self.metrics.is_empty() {
            return Err(OperatorError::Configuration(
                "at least one metric is required".to_string(),
            ));
        }
        for metric in &self.metrics {
            if metric.kind != METRIC_KIND_STATIC && metric.kind != METRIC_KIND_PROMETHEUS {
                return Err(OperatorError::Configuration(format!(
                    "unsupported metric kind {:?}",
                    metric.kind
                )));
            }
            if metric.target.mode != TARGET_MODE_VALUE
                && metric.target.mode != TARGET_MODE_POD_AVERAGE
            {
                return Err(OperatorError::Configuration(format!(
                    "unsupported metric target mode {:?}",
                    metric.target.mode
                )));
            }
            if metric.kind == METRIC_KIND_PROMETHEUS && !metric.config.contains_key("query") {
                return Err(OperatorError::Configuration(
                    "prometheus metrics require a \"query\" config entry".to_string(),
                ));
            }
        }
        for (direction, rules) in [
            ("scaleUp", &self.behavior.scale_up),
            ("scaleDown", &self.behavior.scale_down),
        ] {
            if rules.stabilization_window_seconds < 0 {
                return Err(OperatorError::Configuration(format!(
                    "{direction}.stabilizationWindowSeconds must not be negative"
                )));
            }
        }
        Ok(())
    }
}

// Default value functions
fn default_min_replicas() -> i32 {
    1
}

fn default_polling_interval_seconds() -> u64 {
    30
}

fn default_target_mode() -> String {
    TARGET_MODE_VALUE.to_string()
}
