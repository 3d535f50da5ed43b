//! Console Metrics
//!
//! Prometheus gauges and counters describing the reconciled view. Each
//! console owns its own registry, served by the metrics endpoint.

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Metrics for one console instance
#[derive(Clone)]
pub struct ConsoleMetrics {
    registry: Registry,
    pub shared_luns: IntGauge,
    pub selected_luns: IntGauge,
    pub storage_nodes_selected: IntGauge,
    pub requirements_met: IntGauge,
    pub node_patches: IntCounterVec,
    pub watch_errors: IntCounterVec,
}

impl ConsoleMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("fusion_access".to_string()), None)?;

        let shared_luns = IntGauge::new("shared_luns", "Shared, unclaimed LUN candidates")?;
        let selected_luns = IntGauge::new("selected_luns", "LUN candidates currently selected")?;
        let storage_nodes_selected =
            IntGauge::new("storage_nodes_selected", "Nodes carrying the storage role label")?;
        let requirements_met = IntGauge::new(
            "requirements_met",
            "1 when the minimum storage cluster requirements are met",
        )?;
        let node_patches = IntCounterVec::new(
            Opts::new("node_patches_total", "Storage role label patches by outcome"),
            &["outcome"],
        )?;
        let watch_errors = IntCounterVec::new(
            Opts::new("watch_errors_total", "Watch stream errors by resource kind"),
            &["kind"],
        )?;

        registry.register(Box::new(shared_luns.clone()))?;
        registry.register(Box::new(selected_luns.clone()))?;
        registry.register(Box::new(storage_nodes_selected.clone()))?;
        registry.register(Box::new(requirements_met.clone()))?;
        registry.register(Box::new(node_patches.clone()))?;
        registry.register(Box::new(watch_errors.clone()))?;

        Ok(Self {
            registry,
            shared_luns,
            selected_luns,
            storage_nodes_selected,
            requirements_met,
            node_patches,
            watch_errors,
        })
    }

    /// Encode the registry in the text exposition format
    pub fn encode(&self) -> prometheus::Result<(String, Vec<u8>)> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok((encoder.format_type().to_string(), buffer))
    }
}

impl std::fmt::Debug for ConsoleMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleMetrics")
            .field("shared_luns", &self.shared_luns.get())
            .field("storage_nodes_selected", &self.storage_nodes_selected.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_prefixed_names() {
        let metrics = ConsoleMetrics::new().unwrap();
        metrics.shared_luns.set(2);
        metrics.node_patches.with_label_values(&["applied"]).inc();

        let (content_type, body) = metrics.encode().unwrap();
        let body = String::from_utf8(body).unwrap();

        assert!(content_type.starts_with("text/plain"));
        assert!(body.contains("fusion_access_shared_luns 2"));
        assert!(body.contains("fusion_access_node_patches_total{outcome=\"applied\"} 1"));
    }

    #[test]
    fn test_independent_registries() {
        // Two consoles in one process must not collide
        assert!(ConsoleMetrics::new().is_ok());
        assert!(ConsoleMetrics::new().is_ok());
    }
}
