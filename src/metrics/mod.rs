//! Metric providers for ScalePolicy metrics
//!
//! Each metric spec names a provider kind; the [`MetricClient`] dispatches to
//! the matching provider and returns a single numeric value. Providers do not
//! retry; failure semantics (fallbacks, short-circuiting) belong to the
//! decision engine.

mod prometheus;
mod static_value;

pub use prometheus::PrometheusProvider;
pub use static_value::StaticProvider;

use crate::crd::{MetricSpec, METRIC_KIND_PROMETHEUS, METRIC_KIND_STATIC};
use crate::error::{OperatorError, Result};
use async_trait::async_trait;

/// A source of metric values. Implementations must be safe for concurrent
/// calls and abort outstanding I/O when the calling future is dropped.
#[async_trait]
pub trait MetricProvider: Send + Sync {
    async fn get_value(&self, metric: &MetricSpec) -> Result<f64>;
}

/// Dispatches a metric spec to the provider registered for its kind.
pub struct MetricClient {
    static_provider: Box<dyn MetricProvider>,
    prometheus_provider: Box<dyn MetricProvider>,
}

impl MetricClient {
    /// Create a client with the default providers.
    pub fn new(prometheus_base_url: &str) -> Self {
        Self {
            static_provider: Box::new(StaticProvider::new()),
            prometheus_provider: Box::new(PrometheusProvider::new(prometheus_base_url)),
        }
    }

    /// Create a client with explicit providers (tests swap in fakes here).
    pub fn with_providers(
        static_provider: Box<dyn MetricProvider>,
        prometheus_provider: Box<dyn MetricProvider>,
    ) -> Self {
        Self {
            static_provider,
            prometheus_provider,
        }
    }

    /// Resolve a metric spec to a value via its provider.
    pub async fn get_value(&self, metric: &MetricSpec) -> Result<f64> {
        match metric.kind.as_str() {
            METRIC_KIND_STATIC => self.static_provider.get_value(metric).await,
            METRIC_KIND_PROMETHEUS => self.prometheus_provider.get_value(metric).await,
            other => Err(OperatorError::UnknownMetricKind(other.to_string())),
        }
    }
}
