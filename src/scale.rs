//! Scale subresource client for arbitrary workload kinds
//!
//! A ScalePolicy references its target by `(group, kind, name)` without an
//! API version, so the concrete resource is resolved through API discovery
//! before the scale subresource is read or written.

use crate::crd::ScaleTargetRef;
use crate::error::{OperatorError, Result};
use k8s_openapi::api::autoscaling::v1::Scale;
use kube::api::{Api, DynamicObject, Patch, PatchParams};
use kube::{discovery, Client};

pub struct ScaleClient {
    client: Client,
}

impl ScaleClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Fetch the target's scale subresource.
    pub async fn get(&self, namespace: &str, target: &ScaleTargetRef) -> Result<Scale> {
        let api = self.api_for(namespace, target).await?;
        Ok(api.get_scale(&target.name).await?)
    }

    /// Write the target's replica count through the scale subresource.
    pub async fn update(
        &self,
        namespace: &str,
        target: &ScaleTargetRef,
        replicas: i32,
    ) -> Result<Scale> {
        let api = self.api_for(namespace, target).await?;
        let patch = serde_json::json!({
            "spec": {
                "replicas": replicas,
            }
        });
        Ok(api
            .patch_scale(
                &target.name,
                &PatchParams::default(),
                &Patch::Merge(&patch),
            )
            .await?)
    }

    /// Resolve `(group, kind)` to a served resource via discovery. The
    /// target version is whatever the API server recommends for the kind.
    async fn api_for(
        &self,
        namespace: &str,
        target: &ScaleTargetRef,
    ) -> Result<Api<DynamicObject>> {
        let group = discovery::group(&self.client, &target.group).await?;
        let (resource, _caps) = group.recommended_kind(&target.kind).ok_or_else(|| {
            OperatorError::NotFound(format!(
                "kind {:?} is not served by group {:?}",
                target.kind, target.group
            ))
        })?;
        Ok(Api::namespaced_with(
            self.client.clone(),
            namespace,
            &resource,
        ))
    }
}
