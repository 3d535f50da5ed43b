//! Kubernetes Mutation Gateway
//!
//! Implements [`MutationGateway`] against the API server: JSON-Patch on core
//! `Node` objects and plain creates for claims and the storage cluster.

use crate::crd::{Cluster, FileSystemClaim};
use crate::domain::ports::{JsonPatchOp, MutationGateway};
use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::Client;
use tracing::{debug, info};

/// Field manager recorded on every write
pub const FIELD_MANAGER: &str = "fusion-access-reconciler";

/// Gateway backed by a kube [`Client`]
#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
    namespace: String,
}

impl KubeGateway {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl MutationGateway for KubeGateway {
    async fn patch_node(&self, name: &str, ops: Vec<JsonPatchOp>) -> Result<()> {
        let api: Api<Node> = Api::all(self.client.clone());
        let patch = to_json_patch(&ops)?;

        debug!(node = %name, ops = ops.len(), "Patching node");
        api.patch(
            name,
            &PatchParams {
                field_manager: Some(FIELD_MANAGER.to_string()),
                ..Default::default()
            },
            &Patch::Json::<()>(patch),
        )
        .await
        .map_err(|e| classify_patch_error(e, name))?;

        Ok(())
    }

    async fn create_filesystem_claim(&self, claim: FileSystemClaim) -> Result<FileSystemClaim> {
        let api: Api<FileSystemClaim> = Api::namespaced(self.client.clone(), &self.namespace);
        let name = claim.metadata.name.clone().unwrap_or_default();

        info!(name = %name, devices = claim.spec.devices.len(), "Creating FileSystemClaim");
        api.create(&Self::post_params(), &claim)
            .await
            .map_err(|e| classify_kube_error(e, "FileSystemClaim", &name))
    }

    async fn create_cluster(&self, cluster: Cluster) -> Result<Cluster> {
        let api: Api<Cluster> = Api::namespaced(self.client.clone(), &self.namespace);
        let name = cluster.metadata.name.clone().unwrap_or_default();

        info!(name = %name, "Creating storage Cluster");
        api.create(&Self::post_params(), &cluster)
            .await
            .map_err(|e| classify_kube_error(e, "Cluster", &name))
    }
}

/// Convert our patch operations into the kube JSON-Patch document
pub fn to_json_patch(ops: &[JsonPatchOp]) -> Result<json_patch::Patch> {
    Ok(serde_json::from_value(serde_json::to_value(ops)?)?)
}

/// A failed `test` operation comes back as 422
fn classify_patch_error(err: kube::Error, name: &str) -> Error {
    match &err {
        kube::Error::Api(response) if response.code == 422 => Error::MutationFailed {
            kind: "Node".to_string(),
            name: name.to_string(),
            reason: format!("node changed since it was read: {}", response.message),
        },
        _ => classify_kube_error(err, "Node", name),
    }
}

/// Map well-known API status codes onto domain errors
fn classify_kube_error(err: kube::Error, kind: &str, name: &str) -> Error {
    match &err {
        kube::Error::Api(response) if response.code == 404 => Error::ResourceNotFound {
            kind: kind.to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(response) if response.code == 409 => Error::ResourceExists {
            kind: kind.to_string(),
            name: name.to_string(),
        },
        _ => Error::Kube(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::StorageNode;
    use kube::error::ErrorResponse;
    use std::collections::BTreeMap;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".into(),
            message: "boom".into(),
            reason: "".into(),
            code,
        })
    }

    #[test]
    fn test_to_json_patch() {
        let mut labels = BTreeMap::new();
        labels.insert("kubernetes.io/hostname".to_string(), "worker-0".to_string());
        let op = JsonPatchOp::set_label(&labels, "scale.spectrum.ibm.com/role", "storage", true);

        let patch = to_json_patch(&[op]).unwrap();
        assert_eq!(patch.0.len(), 1);

        let round = serde_json::to_value(&patch).unwrap();
        assert_eq!(round[0]["op"], "replace");
        assert_eq!(round[0]["path"], "/metadata/labels");
        assert_eq!(round[0]["value"]["scale.spectrum.ibm.com/role"], "storage");
    }

    #[test]
    fn test_to_json_patch_with_version_guard() {
        let node = StorageNode::new("worker-0", BTreeMap::new()).with_resource_version("12");
        let ops = node.label_patch("scale.spectrum.ibm.com/role", "storage", false);

        let round = serde_json::to_value(to_json_patch(&ops).unwrap()).unwrap();
        assert_eq!(round[0]["op"], "test");
        assert_eq!(round[0]["value"], "12");
        assert_eq!(round[1]["op"], "replace");
    }

    #[test]
    fn test_failed_version_guard_is_mutation_failure() {
        assert!(matches!(
            classify_patch_error(api_error(422), "worker-0"),
            Error::MutationFailed { .. }
        ));
        assert!(matches!(
            classify_patch_error(api_error(404), "worker-0"),
            Error::ResourceNotFound { .. }
        ));
    }

    #[test]
    fn test_classify_kube_error() {
        assert!(matches!(
            classify_kube_error(api_error(404), "Node", "worker-0"),
            Error::ResourceNotFound { .. }
        ));
        assert!(matches!(
            classify_kube_error(api_error(409), "Cluster", "ibm-spectrum-scale"),
            Error::ResourceExists { .. }
        ));
        assert!(matches!(
            classify_kube_error(api_error(500), "Node", "worker-0"),
            Error::Kube(_)
        ));
    }
}
