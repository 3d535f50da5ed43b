//! Resource Watchers
//!
//! One reflector-backed watch per resource list feeding the console. Every
//! relist or change pushes a fresh [`WatchSnapshot`]; stream errors push the
//! last known-good list together with the error.

use crate::controlplane::console::{ResourceKind, StorageConsole};
use crate::crd::{LocalDisk, LocalVolumeDiscoveryResult};
use crate::domain::ports::{StorageNode, WatchSnapshot};
use crate::error::Error;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Node;
use kube::runtime::reflector::{self, Store};
use kube::runtime::watcher::{self, watcher, Config};
use kube::runtime::WatchStreamExt;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// =============================================================================
// Snapshot Tracking
// =============================================================================

/// Folds watch outcomes into the snapshot pushed to the console
#[derive(Debug)]
pub(crate) struct SnapshotTracker<T> {
    current: WatchSnapshot<T>,
}

impl<T: Clone> SnapshotTracker<T> {
    pub(crate) fn new() -> Self {
        Self {
            current: WatchSnapshot::default(),
        }
    }

    /// A successful (re)list or change
    pub(crate) fn listed(&mut self, data: Vec<T>) -> WatchSnapshot<T> {
        self.current.replace(data);
        self.current.clone()
    }

    /// A stream error; data stays as last seen
    pub(crate) fn failed(&mut self, error: impl Into<String>) -> WatchSnapshot<T> {
        self.current.error = Some(error.into());
        self.current.clone()
    }
}

// =============================================================================
// Watch Loop
// =============================================================================

/// Watch `api`, projecting every object through `project` and handing each
/// resulting snapshot to `publish` until the stream ends.
async fn watch_list<K, T>(
    api: Api<K>,
    config: Config,
    kind: ResourceKind,
    project: impl Fn(&K) -> T,
    publish: impl Fn(WatchSnapshot<T>),
) where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    K::DynamicType: Default + Eq + Hash + Clone,
    T: Clone,
{
    let (reader, writer) = reflector::store();
    let mut stream = watcher(api, config).default_backoff().reflect(writer).boxed();
    let mut tracker = SnapshotTracker::new();
    let mut ready = false;

    info!(kind = %kind, "Starting watch");
    while let Some(event) = stream.next().await {
        match event {
            Ok(event) => {
                if matches!(event, watcher::Event::Restarted(_)) {
                    ready = true;
                }
                if ready {
                    let data = current_list(&reader, &project);
                    debug!(kind = %kind, items = data.len(), "Publishing snapshot");
                    publish(tracker.listed(data));
                }
            }
            Err(e) => {
                let error = Error::WatchFailed {
                    kind: kind.to_string(),
                    reason: e.to_string(),
                };
                warn!(transient = error.is_transient(), "{}", error);
                publish(tracker.failed(error.to_string()));
            }
        }
    }
    warn!(kind = %kind, "Watch stream ended");
}

fn current_list<K, T>(reader: &Store<K>, project: impl Fn(&K) -> T) -> Vec<T>
where
    K: Resource + Clone + 'static,
    K::DynamicType: Eq + Hash + Clone,
{
    reader.state().iter().map(|obj| project(obj.as_ref())).collect()
}

/// Spawn `fut` until `token` is cancelled
fn spawn_cancellable(
    kind: ResourceKind,
    token: CancellationToken,
    fut: impl std::future::Future<Output = ()> + Send + 'static,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => info!(kind = %kind, "Watch shutdown requested"),
            _ = fut => {}
        }
    })
}

/// Start the node, discovery result and LocalDisk watchers
pub fn spawn_watchers(
    client: Client,
    console: Arc<StorageConsole>,
    token: CancellationToken,
) -> Vec<JoinHandle<()>> {
    let namespace = console.config().namespace.clone();
    let node_config = Config::default().labels(&console.config().worker_node_selector);

    let nodes = {
        let console = console.clone();
        let api: Api<Node> = Api::all(client.clone());
        spawn_cancellable(
            ResourceKind::Nodes,
            token.clone(),
            watch_list(
                api,
                node_config,
                ResourceKind::Nodes,
                |node: &Node| StorageNode::from(node),
                move |s| console.apply_nodes(s),
            ),
        )
    };

    let discovery = {
        let console = console.clone();
        let api: Api<LocalVolumeDiscoveryResult> = Api::namespaced(client.clone(), &namespace);
        spawn_cancellable(
            ResourceKind::DiscoveryResults,
            token.clone(),
            watch_list(
                api,
                Config::default(),
                ResourceKind::DiscoveryResults,
                |result: &LocalVolumeDiscoveryResult| result.clone(),
                move |s| console.apply_discovery(s),
            ),
        )
    };

    let local_disks = {
        let api: Api<LocalDisk> = Api::namespaced(client, &namespace);
        spawn_cancellable(
            ResourceKind::LocalDisks,
            token,
            watch_list(
                api,
                Config::default(),
                ResourceKind::LocalDisks,
                |disk: &LocalDisk| disk.clone(),
                move |s| console.apply_local_disks(s),
            ),
        )
    };

    vec![nodes, discovery, local_disks]
}
