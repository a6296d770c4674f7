//! Static metric provider: the target value is the metric value.

use crate::crd::MetricSpec;
use crate::error::{OperatorError, Result};
use crate::metrics::MetricProvider;
use async_trait::async_trait;

/// Parses `target.value` as a decimal number and returns it verbatim.
/// Mostly useful for manual scaling through a policy and for tests.
#[derive(Debug, Default)]
pub struct StaticProvider;

impl StaticProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MetricProvider for StaticProvider {
    async fn get_value(&self, metric: &MetricSpec) -> Result<f64> {
        metric.target.value.parse::<f64>().map_err(|err| {
            OperatorError::MalformedMetricTarget(format!(
                "failed parsing target value {:?}: {}",
                metric.target.value, err
            ))
        })
    }
}
