//! TTL-cached availability probing (spec §4.3: "Availability is checked at
//! registration time and may be re-checked periodically; tool lookups must
//! not re-probe on every call").

use aoc_core::ToolAvailability;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::time::{Duration, Instant};

struct CacheEntry {
    availability: ToolAvailability,
    checked_at: Instant,
}

/// Caches the last-known `ToolAvailability` per tool id for a fixed TTL.
/// Not itself a health-check trait — adapters expose their own
/// `availability()`, this just avoids calling it on every scheduling
/// decision.
pub struct AvailabilityCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl AvailabilityCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached value if still fresh.
    pub fn get(&self, tool_id: &str) -> Option<ToolAvailability> {
        let entries = self.entries.read().unwrap();
        entries.get(tool_id).and_then(|entry| {
            if entry.checked_at.elapsed() < self.ttl {
                Some(entry.availability)
            } else {
                None
            }
        })
    }

    pub fn put(&self, tool_id: impl Into<String>, availability: ToolAvailability) {
        self.entries.write().unwrap().insert(
            tool_id.into(),
            CacheEntry {
                availability,
                checked_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, tool_id: &str) {
        self.entries.write().unwrap().remove(tool_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entry_is_returned() {
        let cache = AvailabilityCache::new(Duration::from_secs(60));
        cache.put("slither-eq", ToolAvailability::Available);
        assert_eq!(cache.get("slither-eq"), Some(ToolAvailability::Available));
    }

    #[test]
    fn missing_entry_is_none() {
        let cache = AvailabilityCache::new(Duration::from_secs(60));
        assert_eq!(cache.get("unknown"), None);
    }

    #[test]
    fn invalidate_clears_entry() {
        let cache = AvailabilityCache::new(Duration::from_secs(60));
        cache.put("mythril-eq", ToolAvailability::ExternalDown);
        cache.invalidate("mythril-eq");
        assert_eq!(cache.get("mythril-eq"), None);
    }
}
