//! ScalePolicy Controller
//!
//! Per-policy control loop: fetch the target's current replica count, poll
//! the policy's metrics, run the decision engine, and write the emission to
//! the target's scale subresource (or only to status in dry-run mode).
//!
//! Transient failures never surface as reconcile errors; every path requeues
//! after the policy's polling interval so that cadence stays authoritative.

use crate::controllers::{error_policy, DecisionEngine};
use crate::crd::{ScalePolicy, ScalePolicyStatus};
use crate::error::{OperatorError, Result};
use crate::metrics::MetricClient;
use crate::scale::ScaleClient;
use futures::StreamExt;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::{Action, Controller};
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::runtime::watcher::Config;
use kube::{Client, Resource, ResourceExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Event reason recorded when the target's scale subresource cannot be read.
pub const EVENT_REASON_FAILED_GET_SCALE_SUBRESOURCE: &str = "FailedGetScaleSubresource";

/// Event reason recorded when a policy fails validation.
pub const EVENT_REASON_INVALID_SCALE_POLICY: &str = "InvalidScalePolicy";

/// Context for the ScalePolicy controller
pub struct ScalePolicyController {
    client: Client,
    reporter: Reporter,
    namespace: Option<String>,
    scale_client: ScaleClient,
    metric_client: MetricClient,
    decision: DecisionEngine,
}

impl ScalePolicyController {
    /// Create a new ScalePolicy controller. `namespace` restricts the watch;
    /// `None` watches all namespaces.
    pub fn new(client: Client, metric_client: MetricClient, namespace: Option<String>) -> Self {
        Self {
            scale_client: ScaleClient::new(client.clone()),
            metric_client,
            decision: DecisionEngine::new(),
            reporter: Reporter {
                controller: "scalepolicy-operator".to_string(),
                instance: None,
            },
            namespace,
            client,
        }
    }

    /// Run the ScalePolicy controller until shutdown.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let policies: Api<ScalePolicy> = match &self.namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        };

        info!("Starting ScalePolicy controller");

        Controller::new(policies, Config::default())
            .shutdown_on_signal()
            .run(
                |policy, ctx| async move { ctx.reconcile(policy).await },
                |policy, err, ctx| error_policy(policy, err, ctx),
                Arc::clone(&self),
            )
            .for_each(|result| async move {
                match result {
                    Ok((obj, _action)) => {
                        debug!("Reconciled ScalePolicy: {}", obj.name);
                    }
                    Err(e) => {
                        error!("Reconciliation failed: {:?}", e);
                    }
                }
            })
            .await;

        Ok(())
    }

    /// Reconcile a single ScalePolicy.
    async fn reconcile(
        &self,
        policy: Arc<ScalePolicy>,
    ) -> std::result::Result<Action, OperatorError> {
        // Nothing to clean up on deletion; the stabilization history is
        // in-memory and its key simply goes stale.
        if policy.metadata.deletion_timestamp.is_some() {
            return Ok(Action::await_change());
        }

        let name = policy.name_any();
        let namespace = policy.namespace().unwrap_or_else(|| "default".to_string());
        let polling_interval = Duration::from_secs(policy.spec.polling_interval_seconds.max(1));

        info!("Reconciling ScalePolicy {}/{}", namespace, name);

        if let Err(err) = policy.spec.validate() {
            warn!(
                "ScalePolicy {}/{} is invalid, declining to act: {}",
                namespace, name, err
            );
            self.record_warning(&policy, EVENT_REASON_INVALID_SCALE_POLICY, &err.to_string())
                .await;
            return Ok(Action::requeue(polling_interval));
        }

        let target = &policy.spec.scale_target_ref;
        let scale = match self.scale_client.get(&namespace, target).await {
            Ok(scale) => scale,
            Err(err) => {
                // The target may simply not exist yet; either way the event
                // tells the operator and the next poll retries.
                warn!(
                    "Failed getting scale subresource for {}/{} (target {}): {}",
                    namespace, name, target.name, err
                );
                self.record_warning(
                    &policy,
                    EVENT_REASON_FAILED_GET_SCALE_SUBRESOURCE,
                    &err.to_string(),
                )
                .await;
                return Ok(Action::requeue(polling_interval));
            }
        };
        let current_replicas = scale.spec.as_ref().and_then(|s| s.replicas).unwrap_or(0);

        let mut results = Vec::with_capacity(policy.spec.metrics.len());
        for metric in &policy.spec.metrics {
            results.push(self.metric_client.get_value(metric).await);
        }

        let Some(desired_replicas) = self.decision.decide(&policy, current_replicas, &results)
        else {
            return Ok(Action::requeue(polling_interval));
        };

        if policy.spec.dry_run {
            info!(
                "Dry run: ScalePolicy {}/{} would scale {} to {} replicas",
                namespace, name, target.name, desired_replicas
            );
        } else if let Err(err) = self
            .scale_client
            .update(&namespace, target, desired_replicas)
            .await
        {
            error!(
                "Failed updating scale subresource for {}/{} (target {}): {}",
                namespace, name, target.name, err
            );
        } else if desired_replicas != current_replicas {
            info!(
                "Scaled {} in {} from {} to {} replicas",
                target.name, namespace, current_replicas, desired_replicas
            );
        }

        self.write_status(&policy, &namespace, desired_replicas)
            .await;

        Ok(Action::requeue(polling_interval))
    }

    /// Record the last computed replica count; write failures are logged,
    /// never propagated.
    async fn write_status(&self, policy: &ScalePolicy, namespace: &str, desired_replicas: i32) {
        let api: Api<ScalePolicy> = Api::namespaced(self.client.clone(), namespace);
        let status = ScalePolicyStatus {
            desired_replicas,
            observed_generation: policy.metadata.generation,
        };
        let patch = serde_json::json!({ "status": status });

        if let Err(err) = api
            .patch_status(
                &policy.name_any(),
                &PatchParams::default(),
                &Patch::Merge(&patch),
            )
            .await
        {
            warn!(
                "Failed updating status of ScalePolicy {}/{}: {}",
                namespace,
                policy.name_any(),
                err
            );
        }
    }

    /// Fire-and-forget Warning event on the policy.
    async fn record_warning(&self, policy: &ScalePolicy, reason: &str, message: &str) {
        let recorder = Recorder::new(
            self.client.clone(),
            self.reporter.clone(),
            policy.object_ref(&()),
        );
        let event = Event {
            type_: EventType::Warning,
            reason: reason.to_string(),
            note: Some(message.to_string()),
            action: "Reconcile".to_string(),
            secondary: None,
        };
        if let Err(err) = recorder.publish(event).await {
            debug!("Failed publishing event on {}: {}", policy.name_any(), err);
        }
    }
}
