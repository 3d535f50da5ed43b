//! Storage Console - The reconciled view
//!
//! Owns the latest snapshots pushed by the watchers, recomputes the shared
//! LUN candidates and the minimum-requirements state on every change, and
//! routes every write through the [`MutationGateway`]:
//! - storage role toggles on nodes (at most one in flight per node)
//! - FileSystemClaim creation from the selected LUNs
//! - storage Cluster creation once requirements are met

use crate::controlplane::config::ConsoleConfig;
use crate::controlplane::metrics::ConsoleMetrics;
use crate::controlplane::state::{reduce, Action, Alert, AlertVariant, CtaState, UiState};
use crate::crd::{Cluster, FileSystemClaim, LocalDisk, LocalVolumeDiscoveryResult};
use crate::domain::ports::{MutationGatewayRef, StorageNode, WatchSnapshot};
use crate::engine::{
    Lun, NodeRoleState, NodeSelection, RequirementCheck, SharedLunInputs, SharedLunRecomputer,
};
use crate::error::{Error, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Id of the alert explaining unmet minimum requirements
pub const REQUIREMENTS_ALERT_ID: &str = "minimum-requirements";

// =============================================================================
// Views
// =============================================================================

/// Watched resource lists feeding the console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    Nodes,
    DiscoveryResults,
    LocalDisks,
}

impl ResourceKind {
    fn alert_id(&self) -> String {
        format!("load-{}", self)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Nodes => write!(f, "nodes"),
            ResourceKind::DiscoveryResults => write!(f, "discovery-results"),
            ResourceKind::LocalDisks => write!(f, "local-disks"),
        }
    }
}

/// Result of a storage role toggle that reached the gateway (or did not
/// need to)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum ToggleOutcome {
    Applied { state: NodeRoleState },
    Unchanged { state: NodeRoleState },
    RolledBack { state: NodeRoleState, error: String },
}

/// A storage-eligible node and its role state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeView {
    pub name: String,
    pub role: NodeRoleState,
    pub selected: bool,
}

/// Console summary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleStatus {
    pub loaded: bool,
    pub storage_nodes: usize,
    pub shared_luns: usize,
    pub selected_luns: usize,
    pub requirements: RequirementCheck,
    pub rebuilds: u64,
}

// =============================================================================
// Console State
// =============================================================================

#[derive(Debug, Default)]
struct ConsoleState {
    nodes: WatchSnapshot<StorageNode>,
    discovery: WatchSnapshot<LocalVolumeDiscoveryResult>,
    local_disks: WatchSnapshot<LocalDisk>,
    node_selection: NodeSelection,
    recomputer: SharedLunRecomputer,
    requirements: Option<RequirementCheck>,
    ui: UiState,
}

impl ConsoleState {
    fn dispatch(&mut self, action: Action) {
        self.ui = reduce(std::mem::take(&mut self.ui), action);
    }
}

// =============================================================================
// Storage Console
// =============================================================================

pub struct StorageConsole {
    config: ConsoleConfig,
    gateway: MutationGatewayRef,
    state: RwLock<ConsoleState>,
    /// Nodes with an outstanding label patch
    in_flight: DashMap<String, ()>,
    metrics: ConsoleMetrics,
    alert_seq: AtomicU64,
}

impl StorageConsole {
    /// Create a new console
    pub fn new(config: ConsoleConfig, gateway: MutationGatewayRef) -> Result<Arc<Self>> {
        let metrics = ConsoleMetrics::new()
            .map_err(|e| Error::Internal(format!("Failed to register metrics: {}", e)))?;

        let console = Self {
            config,
            gateway,
            state: RwLock::new(ConsoleState::default()),
            in_flight: DashMap::new(),
            metrics,
            alert_seq: AtomicU64::new(0),
        };
        // Publish the initial (failing) requirements state
        console.recompute_locked(&mut console.state.write());

        Ok(Arc::new(console))
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ConsoleMetrics {
        &self.metrics
    }

    // =========================================================================
    // Snapshot intake
    // =========================================================================

    /// Apply the latest storage-eligible node list
    pub fn apply_nodes(&self, snapshot: WatchSnapshot<StorageNode>) {
        let mut state = self.state.write();
        self.track_load_error(&mut state, ResourceKind::Nodes, snapshot.error.as_deref());

        let role = &self.config.storage_role_label;
        state
            .node_selection
            .sync(&snapshot.data, &role.key, &role.value);
        state.nodes = snapshot;

        self.recompute_locked(&mut state);
    }

    /// Apply the latest discovery results
    pub fn apply_discovery(&self, snapshot: WatchSnapshot<LocalVolumeDiscoveryResult>) {
        let mut state = self.state.write();
        self.track_load_error(&mut state, ResourceKind::DiscoveryResults, snapshot.error.as_deref());
        state.discovery = snapshot;
        self.recompute_locked(&mut state);
    }

    /// Apply the latest LocalDisk list
    pub fn apply_local_disks(&self, snapshot: WatchSnapshot<LocalDisk>) {
        let mut state = self.state.write();
        self.track_load_error(&mut state, ResourceKind::LocalDisks, snapshot.error.as_deref());
        state.local_disks = snapshot;
        self.recompute_locked(&mut state);
    }

    fn track_load_error(&self, state: &mut ConsoleState, kind: ResourceKind, error: Option<&str>) {
        match error {
            Some(error) => {
                warn!(kind = %kind, error = %error, "Watch error, keeping last known data");
                self.metrics
                    .watch_errors
                    .with_label_values(&[&kind.to_string()])
                    .inc();
                state.dispatch(Action::RaiseAlert(
                    Alert::new(
                        kind.alert_id(),
                        AlertVariant::Danger,
                        format!("Failed to load {}", kind),
                        error,
                    )
                    .sticky(),
                ));
            }
            None => state.dispatch(Action::RetractAlert {
                id: kind.alert_id(),
            }),
        }
    }

    /// Rebuild candidates (if inputs changed) and re-evaluate requirements
    fn recompute_locked(&self, state: &mut ConsoleState) {
        let selected_nodes = state.node_selection.selected_nodes();
        let inputs = SharedLunInputs::project(
            &state.discovery.data,
            &state.local_disks.data,
            &selected_nodes,
        );

        if state.recomputer.recompute(inputs) {
            info!(
                storage_nodes = selected_nodes.len(),
                shared_luns = state.recomputer.selection().len(),
                "Shared LUN candidates recomputed"
            );
        }

        let shared = state.recomputer.selection().len();
        let check = self.config.requirements.check(selected_nodes.len(), shared);

        if state.requirements.as_ref() != Some(&check) {
            if check.passes() {
                debug!("Minimum requirements met");
                state.dispatch(Action::SetCta(CtaState {
                    enabled: true,
                    reason: None,
                }));
                state.dispatch(Action::RetractAlert {
                    id: REQUIREMENTS_ALERT_ID.to_string(),
                });
            } else {
                let message = check.message();
                debug!(reason = %message, "Minimum requirements not met");
                state.dispatch(Action::SetCta(CtaState {
                    enabled: false,
                    reason: Some(message.clone()),
                }));
                state.dispatch(Action::RaiseAlert(
                    Alert::new(
                        REQUIREMENTS_ALERT_ID,
                        AlertVariant::Warning,
                        "Minimum requirements not met",
                        message,
                    )
                    .sticky(),
                ));
            }
            state.requirements = Some(check.clone());
        }

        self.metrics.shared_luns.set(shared as i64);
        self.metrics
            .selected_luns
            .set(state.recomputer.selection().selected().count() as i64);
        self.metrics
            .storage_nodes_selected
            .set(selected_nodes.len() as i64);
        self.metrics
            .requirements_met
            .set(if check.passes() { 1 } else { 0 });
    }

    fn raise_failure(&self, state: &mut ConsoleState, title: String, error: &Error) {
        let seq = self.alert_seq.fetch_add(1, Ordering::Relaxed);
        state.dispatch(Action::RaiseAlert(Alert::new(
            format!("mutation-{}", seq),
            AlertVariant::Danger,
            title,
            error.to_string(),
        )));
    }

    // =========================================================================
    // LUN selection
    // =========================================================================

    /// Current candidates
    pub fn luns(&self) -> Vec<Lun> {
        self.state.read().recomputer.selection().luns().to_vec()
    }

    /// Select or deselect one candidate
    pub fn set_lun_selected(&self, wwn: &str, selected: bool) -> Result<()> {
        let mut state = self.state.write();
        if !state.recomputer.selection_mut().set_selected(wwn, selected) {
            return Err(Error::ResourceNotFound {
                kind: "Lun".into(),
                name: wwn.into(),
            });
        }
        self.recompute_locked(&mut state);
        Ok(())
    }

    /// Select or deselect every candidate
    pub fn set_all_luns_selected(&self, selected: bool) {
        let mut state = self.state.write();
        state.recomputer.selection_mut().set_all_selected(selected);
        self.recompute_locked(&mut state);
    }

    // =========================================================================
    // Node storage role
    // =========================================================================

    /// Storage-eligible nodes with their role state
    pub fn nodes(&self) -> Vec<NodeView> {
        self.state
            .read()
            .node_selection
            .states()
            .iter()
            .map(|(name, role)| NodeView {
                name: name.clone(),
                role: *role,
                selected: role.is_selected(),
            })
            .collect()
    }

    /// Add or remove the storage role label on a node.
    ///
    /// The node state only flips once the patch outcome is known. A second
    /// request for a node with a patch outstanding is rejected with
    /// [`Error::MutationInFlight`]. Gateway failures roll back, raise one
    /// alert and are reported as [`ToggleOutcome::RolledBack`].
    pub async fn toggle_node_storage_role(&self, node: &str, enabled: bool) -> Result<ToggleOutcome> {
        match self.in_flight.entry(node.to_string()) {
            Entry::Occupied(_) => {
                warn!(node = %node, "Storage role change already in flight");
                return Err(Error::MutationInFlight {
                    node: node.to_string(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(());
            }
        }

        let result = self.run_toggle(node, enabled).await;
        self.in_flight.remove(node);
        result
    }

    async fn run_toggle(&self, node: &str, enabled: bool) -> Result<ToggleOutcome> {
        let (ops, read_at) = {
            let mut state = self.state.write();
            let current = state
                .node_selection
                .state(node)
                .ok_or_else(|| Error::NodeNotFound {
                    node: node.to_string(),
                })?;
            if !current.is_pending() && current.is_selected() == enabled {
                return Ok(ToggleOutcome::Unchanged { state: current });
            }

            // Labels are patched from the cached copy
            let Some(cached) = state.nodes.data.iter().find(|n| n.name == node).cloned() else {
                state.node_selection.forget(node);
                self.recompute_locked(&mut state);
                warn!(node = %node, "Node missing from the latest snapshot");
                return Err(Error::NodeNotFound {
                    node: node.to_string(),
                });
            };

            state.node_selection.begin(node, enabled)?;
            let role = &self.config.storage_role_label;
            (
                cached.label_patch(&role.key, &role.value, enabled),
                cached.resource_version,
            )
        };

        info!(node = %node, enabled, "Patching storage role label");
        let result = self.gateway.patch_node(node, ops).await;

        let mut state = self.state.write();
        match result {
            Ok(()) => {
                let settled = state
                    .node_selection
                    .resolve(node)
                    .unwrap_or_else(|| NodeRoleState::from_flag(enabled));
                if let Some(version) = &read_at {
                    state.node_selection.supersede(node, version);
                }
                self.forget_if_gone(&mut state, node);
                self.metrics
                    .node_patches
                    .with_label_values(&["applied"])
                    .inc();
                self.recompute_locked(&mut state);
                info!(node = %node, state = %settled, "Storage role updated");
                Ok(ToggleOutcome::Applied { state: settled })
            }
            Err(error) => {
                let restored = state
                    .node_selection
                    .revert(node)
                    .unwrap_or_else(|| NodeRoleState::from_flag(!enabled));
                self.forget_if_gone(&mut state, node);
                self.metrics
                    .node_patches
                    .with_label_values(&["rolled_back"])
                    .inc();
                warn!(node = %node, error = %error, "Storage role patch failed, rolled back");
                self.raise_failure(
                    &mut state,
                    format!("Failed to update storage role of node {}", node),
                    &error,
                );
                self.recompute_locked(&mut state);
                Ok(ToggleOutcome::RolledBack {
                    state: restored,
                    error: error.to_string(),
                })
            }
        }
    }

    /// A node that left the snapshot while its patch was in flight
    fn forget_if_gone(&self, state: &mut ConsoleState, node: &str) {
        if !state.nodes.data.iter().any(|n| n.name == node) {
            state.node_selection.forget(node);
        }
    }

    // =========================================================================
    // Aggregate actions
    // =========================================================================

    /// Create a FileSystemClaim over the selected LUNs
    pub async fn create_filesystem(&self, name: &str) -> Result<FileSystemClaim> {
        FileSystemClaim::validate_name(name)?;

        let devices = self.state.read().recomputer.selection().selected_wwns();
        if devices.is_empty() {
            return Err(Error::NoLunsSelected);
        }

        let claim = FileSystemClaim::for_devices(name, &self.config.namespace, devices);
        match self.gateway.create_filesystem_claim(claim).await {
            Ok(created) => {
                info!(name = %name, devices = created.spec.devices.len(), "FileSystemClaim created");
                Ok(created)
            }
            Err(error) => {
                self.raise_failure(
                    &mut self.state.write(),
                    format!("Failed to create filesystem {}", name),
                    &error,
                );
                Err(error)
            }
        }
    }

    /// Create the storage cluster once the minimum requirements pass
    pub async fn create_storage_cluster(&self) -> Result<Cluster> {
        let check = self.requirements();
        if !check.passes() {
            return Err(Error::RequirementsNotMet(check.message()));
        }

        let role = &self.config.storage_role_label;
        let cluster = Cluster::for_storage_role(&self.config.namespace, &role.key, &role.value);
        match self.gateway.create_cluster(cluster).await {
            Ok(created) => {
                info!("Storage cluster created");
                Ok(created)
            }
            Err(error) => {
                self.raise_failure(
                    &mut self.state.write(),
                    "Failed to create storage cluster".to_string(),
                    &error,
                );
                Err(error)
            }
        }
    }

    // =========================================================================
    // Read side
    // =========================================================================

    pub fn requirements(&self) -> RequirementCheck {
        self.state.read().requirements.clone().unwrap_or_default()
    }

    pub fn ui(&self) -> UiState {
        self.state.read().ui.clone()
    }

    /// Dismiss an alert. Returns false when nothing was removed.
    pub fn dismiss_alert(&self, id: &str) -> bool {
        let mut state = self.state.write();
        let before = state.ui.alerts.len();
        state.dispatch(Action::DismissAlert { id: id.to_string() });
        state.ui.alerts.len() != before
    }

    /// True once every watched list has loaded at least once
    pub fn is_loaded(&self) -> bool {
        let state = self.state.read();
        state.nodes.loaded && state.discovery.loaded && state.local_disks.loaded
    }

    pub fn status(&self) -> ConsoleStatus {
        let state = self.state.read();
        ConsoleStatus {
            loaded: state.nodes.loaded && state.discovery.loaded && state.local_disks.loaded,
            storage_nodes: state.node_selection.selected_nodes().len(),
            shared_luns: state.recomputer.selection().len(),
            selected_luns: state.recomputer.selection().selected().count(),
            requirements: state.requirements.clone().unwrap_or_default(),
            rebuilds: state.recomputer.rebuilds(),
        }
    }
}

impl std::fmt::Debug for StorageConsole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConsole")
            .field("namespace", &self.config.namespace)
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::domain::ports::{JsonPatchOp, MockMutationGateway, MutationGateway, PatchOp};
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn console_with(gateway: MockMutationGateway) -> Arc<StorageConsole> {
        StorageConsole::new(ConsoleConfig::default(), Arc::new(gateway)).unwrap()
    }

    fn wwns(console: &StorageConsole) -> Vec<String> {
        console.luns().into_iter().map(|l| l.wwn).collect()
    }

    fn danger_alerts(console: &StorageConsole) -> usize {
        console
            .ui()
            .alerts
            .iter()
            .filter(|a| a.variant == AlertVariant::Danger)
            .count()
    }

    #[test]
    fn test_three_nodes_share_a_and_b() {
        let console = console_with(MockMutationGateway::new());
        seed_three_nodes(&console, &[]);

        assert_eq!(wwns(&console), vec!["A", "B"]);
        assert!(console.luns().iter().all(|l| !l.is_selected));
        assert!(console.is_loaded());
        assert!(console.requirements().passes());
        assert!(console.ui().cta.enabled);
    }

    #[test]
    fn test_claimed_disk_is_excluded() {
        let console = console_with(MockMutationGateway::new());
        seed_three_nodes(&console, &["A"]);

        assert_eq!(wwns(&console), vec!["B"]);
    }

    #[test]
    fn test_two_nodes_one_disk_disables_cta() {
        let console = console_with(MockMutationGateway::new());
        console.apply_nodes(WatchSnapshot::loaded(vec![
            storage_node("worker-0", true),
            storage_node("worker-1", true),
            storage_node("worker-2", false),
        ]));
        console.apply_discovery(WatchSnapshot::loaded(vec![
            lvdr("worker-0", &["A", "B"]),
            lvdr("worker-1", &["A", "C"]),
        ]));
        console.apply_local_disks(WatchSnapshot::loaded(vec![]));

        assert_eq!(wwns(&console), vec!["A"]);

        let ui = console.ui();
        assert!(!ui.cta.enabled);
        let reason = ui.cta.reason.unwrap();
        assert_eq!(reason.lines().count(), 1);
        assert!(reason.contains("storage nodes"));
        assert!(ui.alerts.iter().any(|a| a.id == REQUIREMENTS_ALERT_ID));
    }

    #[test]
    fn test_requirements_alert_retracted_when_met() {
        let console = console_with(MockMutationGateway::new());
        assert!(console.ui().alerts.iter().any(|a| a.id == REQUIREMENTS_ALERT_ID));

        seed_three_nodes(&console, &[]);
        assert!(!console.ui().alerts.iter().any(|a| a.id == REQUIREMENTS_ALERT_ID));
    }

    #[test]
    fn test_load_error_keeps_last_data() {
        let console = console_with(MockMutationGateway::new());
        seed_three_nodes(&console, &[]);

        let failed = WatchSnapshot::loaded(vec![
            lvdr("worker-0", &["A", "B", "C"]),
            lvdr("worker-1", &["A", "B", "D"]),
            lvdr("worker-2", &["A", "B", "E"]),
        ])
        .with_error("watch stream closed");
        console.apply_discovery(failed);

        assert_eq!(wwns(&console), vec!["A", "B"]);
        assert!(console.ui().alerts.iter().any(|a| a.id == "load-discovery-results"));
        assert!(!console.dismiss_alert("load-discovery-results"));

        seed_three_nodes(&console, &[]);
        assert!(!console.ui().alerts.iter().any(|a| a.id == "load-discovery-results"));
    }

    #[test]
    fn test_lun_selection_roundtrip() {
        let console = console_with(MockMutationGateway::new());
        seed_three_nodes(&console, &[]);

        console.set_lun_selected("B", true).unwrap();
        assert_matches!(
            console.set_lun_selected("Z", true),
            Err(Error::ResourceNotFound { .. })
        );

        console.set_all_luns_selected(true);
        assert_eq!(console.status().selected_luns, 2);
        console.set_all_luns_selected(false);
        console.set_all_luns_selected(false);
        assert_eq!(console.status().selected_luns, 0);
    }

    #[tokio::test]
    async fn test_toggle_applies_label_patch() {
        let mut gateway = MockMutationGateway::new();
        gateway
            .expect_patch_node()
            .withf(|name: &str, ops: &Vec<JsonPatchOp>| {
                name == "worker-3"
                    && ops.len() == 1
                    && ops[0].value[ROLE_KEY] == "storage"
                    && ops[0].value["kubernetes.io/hostname"] == "worker-3"
            })
            .times(1)
            .returning(|_, _| Ok(()));
        let console = console_with(gateway);
        console.apply_nodes(WatchSnapshot::loaded(vec![storage_node("worker-3", false)]));

        let outcome = console.toggle_node_storage_role("worker-3", true).await.unwrap();

        assert_eq!(
            outcome,
            ToggleOutcome::Applied {
                state: NodeRoleState::Selected
            }
        );
        assert!(console.nodes()[0].selected);
    }

    #[tokio::test]
    async fn test_toggle_failure_rolls_back_with_one_alert() {
        let mut gateway = MockMutationGateway::new();
        gateway.expect_patch_node().times(1).returning(|name, _| {
            Err(Error::MutationFailed {
                kind: "Node".into(),
                name: name.to_string(),
                reason: "forbidden".into(),
            })
        });
        let console = console_with(gateway);
        seed_three_nodes(&console, &[]);

        let outcome = console.toggle_node_storage_role("worker-1", false).await.unwrap();

        assert_matches!(
            outcome,
            ToggleOutcome::RolledBack {
                state: NodeRoleState::Selected,
                ..
            }
        );
        assert_eq!(danger_alerts(&console), 1);
        assert_eq!(wwns(&console), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_toggle_unknown_node_and_noop() {
        let console = console_with(MockMutationGateway::new());
        seed_three_nodes(&console, &[]);

        assert_matches!(
            console.toggle_node_storage_role("worker-9", true).await,
            Err(Error::NodeNotFound { .. })
        );
        assert_matches!(
            console.toggle_node_storage_role("worker-0", true).await,
            Ok(ToggleOutcome::Unchanged { .. })
        );
    }

    #[tokio::test]
    async fn test_deselecting_node_recomputes_candidates() {
        let mut gateway = MockMutationGateway::new();
        gateway.expect_patch_node().returning(|_, _| Ok(()));
        let console = console_with(gateway);
        seed_three_nodes(&console, &[]);
        console.set_all_luns_selected(true);

        console.toggle_node_storage_role("worker-2", false).await.unwrap();

        // worker-0 and worker-1 still share A and B; the rebuild clears selection
        assert_eq!(wwns(&console), vec!["A", "B"]);
        assert_eq!(console.status().selected_luns, 0);
        assert!(!console.requirements().passes());
    }

    /// Gateway whose patches wait until released
    struct HeldGateway {
        release: Notify,
        patches: AtomicUsize,
    }

    impl HeldGateway {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                release: Notify::new(),
                patches: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MutationGateway for HeldGateway {
        async fn patch_node(&self, _name: &str, _ops: Vec<JsonPatchOp>) -> Result<()> {
            self.patches.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            Ok(())
        }

        async fn create_filesystem_claim(&self, claim: FileSystemClaim) -> Result<FileSystemClaim> {
            Ok(claim)
        }

        async fn create_cluster(&self, cluster: Cluster) -> Result<Cluster> {
            Ok(cluster)
        }
    }

    #[tokio::test]
    async fn test_second_toggle_rejected_while_pending() {
        let gateway = HeldGateway::new();
        let console = StorageConsole::new(ConsoleConfig::default(), gateway.clone()).unwrap();
        console.apply_nodes(WatchSnapshot::loaded(vec![
            storage_node("worker-0", false),
            storage_node("worker-1", false),
        ]));

        let first = {
            let console = console.clone();
            tokio::spawn(async move { console.toggle_node_storage_role("worker-0", true).await })
        };

        tokio::time::timeout(Duration::from_secs(5), async {
            while !console.nodes()[0].role.is_pending() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert_matches!(
            console.toggle_node_storage_role("worker-0", false).await,
            Err(Error::MutationInFlight { .. })
        );
        // Pending state still reports the committed membership
        assert!(!console.nodes()[0].selected);

        gateway.release.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert_eq!(
            outcome,
            ToggleOutcome::Applied {
                state: NodeRoleState::Selected
            }
        );
    }

    async fn wait_for_pending(console: &StorageConsole, node: &str) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !console
                .nodes()
                .iter()
                .any(|n| n.name == node && n.role.is_pending())
            {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_node_removed_mid_toggle_is_not_patched_again() {
        let gateway = HeldGateway::new();
        let console = StorageConsole::new(ConsoleConfig::default(), gateway.clone()).unwrap();
        console.apply_nodes(WatchSnapshot::loaded(vec![storage_node("worker-0", false)]));

        let first = {
            let console = console.clone();
            tokio::spawn(async move { console.toggle_node_storage_role("worker-0", true).await })
        };
        wait_for_pending(&console, "worker-0").await;

        // The node leaves the snapshot while its patch is outstanding
        console.apply_nodes(WatchSnapshot::loaded(vec![]));
        assert_eq!(console.nodes().len(), 1);

        gateway.release.notify_one();
        first.await.unwrap().unwrap();
        assert!(console.nodes().is_empty());

        // Without cached labels the patch would wipe every other label
        assert_matches!(
            console.toggle_node_storage_role("worker-0", true).await,
            Err(Error::NodeNotFound { .. })
        );
        assert_eq!(gateway.patches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_toggle_patch_is_guarded_by_resource_version() {
        let mut gateway = MockMutationGateway::new();
        gateway
            .expect_patch_node()
            .withf(|_name: &str, ops: &Vec<JsonPatchOp>| {
                ops.len() == 2
                    && ops[0].op == PatchOp::Test
                    && ops[0].path == "/metadata/resourceVersion"
                    && ops[0].value == "7"
                    && ops[1].value["kubernetes.io/hostname"] == "worker-3"
            })
            .times(1)
            .returning(|_, _| Ok(()));
        let console = console_with(gateway);
        console.apply_nodes(WatchSnapshot::loaded(vec![
            storage_node("worker-3", false).with_resource_version("7"),
        ]));

        console.toggle_node_storage_role("worker-3", true).await.unwrap();

        // A relist read before the patch landed does not flip the node back
        console.apply_nodes(WatchSnapshot::loaded(vec![
            storage_node("worker-3", false).with_resource_version("7"),
        ]));
        assert!(console.nodes()[0].selected);

        console.apply_nodes(WatchSnapshot::loaded(vec![
            storage_node("worker-3", true).with_resource_version("8"),
        ]));
        assert!(console.nodes()[0].selected);
        assert!(!console.nodes()[0].role.is_pending());
    }

    #[tokio::test]
    async fn test_version_conflict_rolls_back() {
        let mut gateway = MockMutationGateway::new();
        gateway.expect_patch_node().times(1).returning(|name, _| {
            Err(Error::MutationFailed {
                kind: "Node".into(),
                name: name.to_string(),
                reason: "node changed since it was read".into(),
            })
        });
        let console = console_with(gateway);
        console.apply_nodes(WatchSnapshot::loaded(vec![
            storage_node("worker-3", false).with_resource_version("7"),
        ]));

        let outcome = console.toggle_node_storage_role("worker-3", true).await.unwrap();

        assert_matches!(
            outcome,
            ToggleOutcome::RolledBack {
                state: NodeRoleState::Unselected,
                ..
            }
        );
        assert_eq!(danger_alerts(&console), 1);
    }

    #[tokio::test]
    async fn test_create_filesystem_uses_selected_luns() {
        let mut gateway = MockMutationGateway::new();
        gateway
            .expect_create_filesystem_claim()
            .times(1)
            .returning(|claim| Ok(claim));
        let console = console_with(gateway);
        seed_three_nodes(&console, &[]);

        assert_matches!(console.create_filesystem("fs1").await, Err(Error::NoLunsSelected));
        assert_matches!(
            console.create_filesystem("Bad_Name").await,
            Err(Error::InvalidFilesystemName { .. })
        );

        console.set_lun_selected("B", true).unwrap();
        let claim = console.create_filesystem("fs1").await.unwrap();

        assert_eq!(claim.spec.devices, vec!["B".to_string()]);
        assert_eq!(claim.metadata.namespace.as_deref(), Some("ibm-spectrum-scale"));
    }

    #[tokio::test]
    async fn test_create_cluster_gated_by_requirements() {
        let mut gateway = MockMutationGateway::new();
        gateway
            .expect_create_cluster()
            .times(1)
            .returning(|cluster| Ok(cluster));
        let console = console_with(gateway);

        assert_matches!(
            console.create_storage_cluster().await,
            Err(Error::RequirementsNotMet(_))
        );

        seed_three_nodes(&console, &[]);
        let cluster = console.create_storage_cluster().await.unwrap();
        assert_eq!(
            cluster.spec.daemon.node_selector.get(ROLE_KEY),
            Some(&"storage".to_string())
        );
    }

    #[tokio::test]
    async fn test_create_cluster_failure_raises_alert() {
        let mut gateway = MockMutationGateway::new();
        gateway.expect_create_cluster().returning(|_| {
            Err(Error::ResourceExists {
                kind: "Cluster".into(),
                name: "ibm-spectrum-scale".into(),
            })
        });
        let console = console_with(gateway);
        seed_three_nodes(&console, &[]);

        assert_matches!(
            console.create_storage_cluster().await,
            Err(Error::ResourceExists { .. })
        );
        assert_eq!(danger_alerts(&console), 1);
    }
}
