//! Monitoring registry for locators.
//!
//! A registry is created by the application and handed to each locator it
//! wants to observe. Locators publish a [`LocatorStats`] record under their
//! name when built and after every update; monitoring code reads the records
//! without touching locator locks.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

/// Point-in-time view of one locator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LocatorStats {
    /// Locator variant, e.g. `"ketama"` or `"replica_ketama"`.
    pub kind: &'static str,
    /// Physical nodes tracked.
    pub nodes: usize,
    /// Replica groups tracked (0 for plain locators).
    pub groups: usize,
    /// Distinct ring positions.
    pub ring_points: usize,
    /// Membership updates applied since construction.
    pub updates: u64,
}

/// Shared, explicitly passed registry of locator stats.
#[derive(Debug, Default)]
pub struct LocatorRegistry {
    entries: DashMap<String, LocatorStats>,
}

impl LocatorRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn publish(&self, name: &str, stats: LocatorStats) {
        self.entries.insert(name.to_string(), stats);
    }

    pub fn unregister(&self, name: &str) -> Option<LocatorStats> {
        self.entries.remove(name).map(|(_, stats)| stats)
    }

    pub fn get(&self, name: &str) -> Option<LocatorStats> {
        self.entries.get(name).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All records, ordered by locator name.
    pub fn report(&self) -> Vec<(String, LocatorStats)> {
        let mut report: Vec<_> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        report.sort_by(|a, b| a.0.cmp(&b.0));
        report
    }

    /// The report as a JSON object keyed by locator name.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .report()
            .into_iter()
            .map(|(name, stats)| (name, serde_json::json!(stats)))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

/// A locator's binding to a registry entry.
#[derive(Clone, Debug)]
pub struct RegistryHandle {
    registry: Arc<LocatorRegistry>,
    name: String,
}

impl RegistryHandle {
    pub fn new(registry: Arc<LocatorRegistry>, name: impl Into<String>) -> Self {
        Self {
            registry,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn publish(&self, stats: LocatorStats) {
        self.registry.publish(&self.name, stats);
    }

    pub fn unregister(&self) {
        self.registry.unregister(&self.name);
    }
}
