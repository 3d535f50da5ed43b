//! FileSystemClaim CRD
//!
//! Requests a shared filesystem built from a set of LUNs. Created by the
//! reconciler from the user's committed LUN selection.

use crate::error::{Error, Result};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// =============================================================================
// FileSystemClaim CRD
// =============================================================================

/// Claim for a filesystem on shared LUNs.
#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "fusion.storage.openshift.io",
    version = "v1alpha1",
    kind = "FileSystemClaim",
    plural = "filesystemclaims",
    shortname = "fsc",
    status = "FileSystemClaimStatus",
    printcolumn = r#"{"name": "Devices", "type": "integer", "jsonPath": ".spec.devices.length"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct FileSystemClaimSpec {
    /// WWNs of the LUNs backing the filesystem
    pub devices: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileSystemClaimStatus {
    #[serde(default)]
    pub conditions: Vec<ClaimCondition>,
}

/// Condition reported by the claim controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClaimCondition {
    /// Type of condition
    pub r#type: String,
    /// Status: True, False, Unknown
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Longest allowed filesystem name (DNS-1123 label)
pub const MAX_FILESYSTEM_NAME_LEN: usize = 63;

impl FileSystemClaim {
    /// Check a filesystem name: lowercase alphanumerics and '-', starting
    /// and ending with an alphanumeric, at most 63 characters
    pub fn validate_name(name: &str) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidFilesystemName {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        if name.is_empty() {
            return Err(invalid("name is required"));
        }
        if name.len() > MAX_FILESYSTEM_NAME_LEN {
            return Err(invalid("must be no more than 63 characters"));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(invalid("only lowercase alphanumeric characters and '-' are allowed"));
        }
        if name.starts_with('-') || name.ends_with('-') {
            return Err(invalid("must start and end with an alphanumeric character"));
        }
        Ok(())
    }

    /// Build a claim object ready for creation
    pub fn for_devices(name: &str, namespace: &str, devices: Vec<String>) -> Self {
        let mut claim = FileSystemClaim::new(name, FileSystemClaimSpec { devices });
        claim.metadata.namespace = Some(namespace.to_string());
        claim
    }
}
