//! Process-wide tool registry (spec §4.3). Grounded in the agency's
//! `WorkerPoolManager`: a `DashMap`-keyed concurrent catalog with an
//! append-mostly lifecycle, minus the HTTP health-check client and
//! worker-stats machinery that AOC's adapters don't need.

use aoc_adapters::ToolAdapter;
use aoc_core::{AocError, AocResult, Tool, ToolAvailability, ToolCategory};
use aoc_resilience::AvailabilityCache;
use dashmap::DashMap;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

struct Entry {
    adapter: Arc<dyn ToolAdapter>,
    metadata: Tool,
}

/// Registered once at process startup (spec §4.3: "append-only
/// thereafter, or append-with-replace gated by an explicit `upsert`
/// flag").
pub struct ToolRegistry {
    entries: DashMap<String, Entry>,
    availability_cache: AvailabilityCache,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            availability_cache: AvailabilityCache::new(Duration::from_secs(30)),
        }
    }

    /// Inserts `adapter` keyed by `tool.id`. Rejects a duplicate id unless
    /// `upsert` is set (spec §4.3: duplicate ids are REGISTRY_CONFLICT by
    /// default).
    pub fn register(&self, adapter: Arc<dyn ToolAdapter>, upsert: bool) -> AocResult<()> {
        let metadata = adapter.metadata();
        let id = metadata.id.clone();

        if !upsert && self.entries.contains_key(&id) {
            return Err(AocError::RegistryConflict(id));
        }

        // No tool is ever marked non-optional (spec §4.3 invariant); a
        // violating adapter is still registered, the caller surfaces a
        // governance warning on the bus rather than failing registration.
        if !metadata.optional {
            warn!(tool_id = %id, "adapter declares optional=false, this violates registry policy");
        }

        self.availability_cache.invalidate(&id);
        self.entries.insert(id.clone(), Entry { adapter, metadata });
        info!(tool_id = %id, "tool registered");
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn ToolAdapter>> {
        self.entries.get(id).map(|e| e.adapter.clone())
    }

    pub fn metadata(&self, id: &str) -> Option<Tool> {
        self.entries.get(id).map(|e| e.metadata.clone())
    }

    pub fn by_layer(&self, layer: u8) -> Vec<Tool> {
        self.entries
            .iter()
            .filter(|e| e.metadata.layer == layer)
            .map(|e| e.metadata.clone())
            .collect()
    }

    pub fn by_category(&self, category: ToolCategory) -> Vec<Tool> {
        self.entries
            .iter()
            .filter(|e| e.metadata.category == category)
            .map(|e| e.metadata.clone())
            .collect()
    }

    pub fn all(&self) -> Vec<Tool> {
        self.entries.iter().map(|e| e.metadata.clone()).collect()
    }

    /// Computes availability for every registered tool in parallel, each
    /// probe bounded by `per_probe_timeout` (spec §4.3). A probe that
    /// times out is reported as `ExternalDown` rather than failing the
    /// whole snapshot.
    pub async fn availability_snapshot(
        &self,
        per_probe_timeout: Duration,
    ) -> std::collections::HashMap<String, ToolAvailability> {
        let ids: Vec<(String, Arc<dyn ToolAdapter>)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.adapter.clone()))
            .collect();

        let probes = ids.into_iter().map(|(id, adapter)| async move {
            let result = tokio::time::timeout(per_probe_timeout, adapter.availability()).await;
            let availability = result.unwrap_or(ToolAvailability::ExternalDown);
            (id, availability)
        });

        join_all(probes).await.into_iter().collect()
    }

    /// As `availability_snapshot`, but serves cached values younger than
    /// the cache TTL instead of re-probing every tool.
    pub async fn available_only(&self, per_probe_timeout: Duration) -> Vec<Tool> {
        let mut available = Vec::new();
        for entry in self.entries.iter() {
            let id = entry.key().clone();
            let availability = match self.availability_cache.get(&id) {
                Some(cached) => cached,
                None => {
                    let probed = tokio::time::timeout(per_probe_timeout, entry.adapter.availability())
                        .await
                        .unwrap_or(ToolAvailability::ExternalDown);
                    self.availability_cache.put(id.clone(), probed);
                    probed
                }
            };
            if availability.is_available() {
                available.push(entry.metadata.clone());
            }
        }
        available
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aoc_adapters::SlitherEqAdapter;

    #[test]
    fn register_rejects_duplicate_id_without_upsert() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(SlitherEqAdapter), false).unwrap();
        let err = registry.register(Arc::new(SlitherEqAdapter), false).unwrap_err();
        assert!(matches!(err, AocError::RegistryConflict(_)));
    }

    #[test]
    fn register_allows_duplicate_id_with_upsert() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(SlitherEqAdapter), false).unwrap();
        registry.register(Arc::new(SlitherEqAdapter), true).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn by_layer_filters_correctly() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(SlitherEqAdapter), false).unwrap();
        assert_eq!(registry.by_layer(1).len(), 1);
        assert_eq!(registry.by_layer(2).len(), 0);
    }

    #[tokio::test]
    async fn availability_snapshot_covers_every_registered_tool() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(SlitherEqAdapter), false).unwrap();
        let snapshot = registry.availability_snapshot(Duration::from_secs(2)).await;
        assert_eq!(snapshot.get("slither-eq"), Some(&ToolAvailability::Available));
    }
}
