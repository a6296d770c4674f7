//! Error types for the ScalePolicy operator

use std::fmt;

/// Result type alias for operator operations
pub type Result<T> = std::result::Result<T, OperatorError>;

/// Errors that can occur during operator operations
#[derive(Debug)]
pub enum OperatorError {
    /// Kubernetes API error
    KubeApi(String),
    /// Invalid ScalePolicy configuration
    Configuration(String),
    /// Metric spec names a kind no provider handles
    UnknownMetricKind(String),
    /// Metric target value could not be parsed
    MalformedMetricTarget(String),
    /// Metric query returned something other than a single scalar
    MalformedMetricResult(String),
    /// Metric query failed in transport
    MetricQueryFailed(String),
    /// Metric query exceeded its deadline
    MetricQueryTimedOut(String),
    /// Target resource or its scale subresource does not exist
    NotFound(String),
    /// Serialization error
    Serialization(String),
}

impl fmt::Display for OperatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorError::KubeApi(msg) => write!(f, "Kubernetes API error: {}", msg),
            OperatorError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            OperatorError::UnknownMetricKind(msg) => write!(f, "Unknown metric kind: {}", msg),
            OperatorError::MalformedMetricTarget(msg) => {
                write!(f, "Malformed metric target: {}", msg)
            }
            OperatorError::MalformedMetricResult(msg) => {
                write!(f, "Malformed metric result: {}", msg)
            }
            OperatorError::MetricQueryFailed(msg) => write!(f, "Metric query failed: {}", msg),
            OperatorError::MetricQueryTimedOut(msg) => {
                write!(f, "Metric query timed out: {}", msg)
            }
            OperatorError::NotFound(msg) => write!(f, "Resource not found: {}", msg),
            OperatorError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for OperatorError {}

impl OperatorError {
    /// Whether the error is a transient external failure worth a plain requeue.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            OperatorError::KubeApi(_)
                | OperatorError::MetricQueryFailed(_)
                | OperatorError::MetricQueryTimedOut(_)
        )
    }
}

impl From<kube::Error> for OperatorError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ref e) if e.code == 404 => OperatorError::NotFound(err.to_string()),
            _ => OperatorError::KubeApi(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for OperatorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OperatorError::MetricQueryTimedOut(err.to_string())
        } else {
            OperatorError::MetricQueryFailed(err.to_string())
        }
    }
}

impl From<serde_json::Error> for OperatorError {
    fn from(err: serde_json::Error) -> Self {
        OperatorError::Serialization(err.to_string())
    }
}
