//! ScalePolicy Kubernetes Operator
//!
//! A horizontal autoscaling controller: each `ScalePolicy` names a scalable
//! workload, replica bounds, and a list of metrics; the operator polls the
//! metrics, computes a desired replica count, and drives the workload's
//! scale subresource toward it while damping oscillation with per-direction
//! stabilization windows.
//!
//! ## Example
//!
//! ```yaml
//! apiVersion: scaling.dev/v1alpha1
//! kind: ScalePolicy
//! metadata:
//!   name: my-app
//! spec:
//!   scaleTargetRef:
//!     group: apps
//!     kind: Deployment
//!     name: my-app
//!   minReplicas: 3
//!   maxReplicas: 20
//!   metrics:
//!     - kind: prometheus
//!       config:
//!         query: ceil(sum(rate(http_requests_total[1m])) / 100)
//!       target:
//!         mode: value
//!         value: "0"
//!   behavior:
//!     scaleDown:
//!       stabilizationWindowSeconds: 300
//! ```

pub mod controllers;
pub mod crd;
pub mod error;
pub mod metrics;
pub mod scale;
pub mod stabilization;

pub use controllers::{DecisionEngine, ScalePolicyController};
pub use crd::{
    Fallback, MetricSpec, MetricTarget, ScalePolicy, ScalePolicySpec, ScalePolicyStatus,
    ScaleTargetRef, ScalingBehavior, ScalingRules,
};
pub use error::{OperatorError, Result};
pub use metrics::MetricClient;
pub use scale::ScaleClient;
pub use stabilization::{Clock, ManualClock, RollingWindow, SystemClock, WindowKind};
