//! Scaling decision engine
//!
//! Turns per-metric results into the replica count to emit this tick:
//! aggregate (max wins), clamp to the policy bounds, then run the clamped
//! proposal through both stabilization windows and let the matching
//! direction guard decide whether the move may happen yet.
//!
//! The engine owns the two process-wide rolling windows. The scale-down
//! window tracks maxima so a brief dip cannot drive a fast scale-down; the
//! scale-up window tracks minima so a brief spike cannot drive a fast
//! scale-up. Both windows observe every proposal, which keeps an oscillating
//! metric from winning in either direction.

use crate::crd::ScalePolicy;
use crate::stabilization::{key_for, Clock, RollingWindow, SystemClock, WindowKind};
use chrono::Duration;
use kube::ResourceExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct DecisionEngine {
    /// Max window consulted for scale-down decisions.
    scale_down_window: RollingWindow,
    /// Min window consulted for scale-up decisions.
    scale_up_window: RollingWindow,
    /// Consecutive metric-failure counters per policy, for fallback.
    fallback_state: Mutex<HashMap<String, FallbackCounters>>,
}

struct FallbackCounters {
    generation: Option<i64>,
    consecutive_failures: Vec<u32>,
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionEngine {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            scale_down_window: RollingWindow::with_clock(WindowKind::Max, Arc::clone(&clock)),
            scale_up_window: RollingWindow::with_clock(WindowKind::Min, clock),
            fallback_state: Mutex::new(HashMap::new()),
        }
    }

    /// Compute the replica count to emit, or `None` when a metric failure
    /// without an applicable fallback forces this tick to be skipped.
    pub fn decide(
        &self,
        policy: &ScalePolicy,
        current_replicas: i32,
        results: &[crate::error::Result<f64>],
    ) -> Option<i32> {
        let name = policy.name_any();
        let namespace = policy.namespace().unwrap_or_else(|| "default".to_string());

        let values = self.aggregate(policy, &format!("{namespace}/{name}"), results)?;
        let raw = values.iter().copied().max()?;
        let clamped = raw.clamp(policy.spec.min_replicas, policy.spec.max_replicas);

        let target = &policy.spec.scale_target_ref;
        let key = key_for(&namespace, &name, &target.name, &target.kind, &target.group);

        // Both windows observe every proposal so the history of recent
        // proposals stays symmetric regardless of direction.
        let (down_value, down_ready) = self.scale_down_window.stabilize(
            &key,
            clamped,
            Duration::seconds(policy.spec.behavior.scale_down.stabilization_window_seconds),
        );
        let (up_value, up_ready) = self.scale_up_window.stabilize(
            &key,
            clamped,
            Duration::seconds(policy.spec.behavior.scale_up.stabilization_window_seconds),
        );

        let emission = if clamped == current_replicas {
            current_replicas
        } else if clamped < current_replicas {
            if down_ready {
                down_value.min(current_replicas)
            } else {
                current_replicas
            }
        } else if up_ready {
            up_value.max(current_replicas)
        } else {
            current_replicas
        };

        debug!(
            policy = %format!("{namespace}/{name}"),
            target = %target.name,
            raw,
            clamped,
            current_replicas,
            down_value,
            down_ready,
            up_value,
            up_ready,
            emission,
            "computed scaling decision"
        );

        Some(emission)
    }

    /// Per-metric aggregation with fallback substitution. Returns `None`
    /// when any metric failed without a matured fallback; failure counters
    /// are still advanced for every metric in that case.
    fn aggregate(
        &self,
        policy: &ScalePolicy,
        policy_key: &str,
        results: &[crate::error::Result<f64>],
    ) -> Option<Vec<i32>> {
        let mut state = self.fallback_state.lock();
        let counters = state
            .entry(policy_key.to_string())
            .or_insert_with(|| FallbackCounters {
                generation: policy.metadata.generation,
                consecutive_failures: vec![0; results.len()],
            });

        // A policy edit invalidates the failure history.
        if counters.generation != policy.metadata.generation {
            counters.generation = policy.metadata.generation;
            counters.consecutive_failures.clear();
        }
        counters.consecutive_failures.resize(results.len(), 0);

        let mut values = Vec::with_capacity(results.len());
        let mut skip_tick = false;
        for (index, result) in results.iter().enumerate() {
            match result {
                Ok(value) => {
                    counters.consecutive_failures[index] = 0;
                    values.push(floor_to_replicas(*value));
                }
                Err(err) => {
                    counters.consecutive_failures[index] =
                        counters.consecutive_failures[index].saturating_add(1);
                    match &policy.spec.fallback {
                        Some(fallback)
                            if counters.consecutive_failures[index] >= fallback.threshold =>
                        {
                            warn!(
                                policy = %policy_key,
                                metric_index = index,
                                failures = counters.consecutive_failures[index],
                                error = %err,
                                "substituting fallback replicas for failing metric"
                            );
                            values.push(fallback.replicas);
                        }
                        _ => {
                            warn!(
                                policy = %policy_key,
                                metric_index = index,
                                failures = counters.consecutive_failures[index],
                                error = %err,
                                "metric failed without applicable fallback, skipping tick"
                            );
                            skip_tick = true;
                        }
                    }
                }
            }
        }

        if skip_tick {
            return None;
        }
        Some(values)
    }
}

/// Metric values express "at least this many replicas"; fractional demand
/// does not round up past what was measured, and negatives mean zero.
fn floor_to_replicas(value: f64) -> i32 {
    if value <= 0.0 {
        0
    } else {
        value.floor() as i32
    }
}
