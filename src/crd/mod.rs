//! Custom Resource Definitions for the ScalePolicy operator

mod scale_policy;

pub use scale_policy::{
    Fallback, MetricSpec, MetricTarget, ScalePolicy, ScalePolicySpec, ScalePolicyStatus,
    ScaleTargetRef, ScalingBehavior, ScalingRules, METRIC_KIND_PROMETHEUS, METRIC_KIND_STATIC,
    TARGET_MODE_POD_AVERAGE, TARGET_MODE_VALUE,
};
