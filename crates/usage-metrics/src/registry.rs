//! Counter registry — where counter families are published for export.
//!
//! The lifecycle controller registers its tenant and bucket caches here
//! before the first refresh and removes them on stop. Exporters hold a
//! clone of the registry and pull [`CounterSample`]s whenever they scrape.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tracing::debug;

use crate::cache::{CounterCache, UsageField};

/// One exported counter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterSample {
    pub family: String,
    pub key: String,
    pub field: UsageField,
    pub value: u64,
}

/// Shared map of family name → counter cache.
#[derive(Clone, Default)]
pub struct CounterRegistry {
    families: Arc<RwLock<BTreeMap<String, Arc<dyn CounterCache>>>>,
}

impl CounterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a family. Returns true if it replaced an existing one.
    pub fn register(&self, family: &str, cache: Arc<dyn CounterCache>) -> bool {
        let mut families = self.families.write().unwrap_or_else(PoisonError::into_inner);
        let replaced = families.insert(family.to_string(), cache).is_some();
        debug!(%family, replaced, "counter family registered");
        replaced
    }

    /// Withdraw a family. Returns true if it was registered.
    pub fn unregister(&self, family: &str) -> bool {
        let mut families = self.families.write().unwrap_or_else(PoisonError::into_inner);
        let existed = families.remove(family).is_some();
        debug!(%family, existed, "counter family unregistered");
        existed
    }

    pub fn family(&self, family: &str) -> Option<Arc<dyn CounterCache>> {
        let families = self.families.read().unwrap_or_else(PoisonError::into_inner);
        families.get(family).cloned()
    }

    pub fn family_names(&self) -> Vec<String> {
        let families = self.families.read().unwrap_or_else(PoisonError::into_inner);
        families.keys().cloned().collect()
    }

    /// Every counter of every family, ordered by family then key.
    pub fn collect(&self) -> Vec<CounterSample> {
        let families = self.families.read().unwrap_or_else(PoisonError::into_inner);
        let mut samples = Vec::new();
        for (family, cache) in families.iter() {
            let mut entries = cache.entries();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            for (key, counters) in entries {
                for field in UsageField::ALL {
                    samples.push(CounterSample {
                        family: family.clone(),
                        key: key.clone(),
                        field,
                        value: counters.get(field),
                    });
                }
            }
        }
        samples
    }
}
