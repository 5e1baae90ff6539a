//! Counter routing — picks the family a ledger key belongs to.

use std::sync::Arc;

use crate::cache::{CounterCache, UsageCounters};

/// Key prefix for tenant-scoped records.
pub const USER_PREFIX: &str = "user:";

/// Counter namespace of a ledger key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// `user:<id>` keys.
    Tenant,
    /// Everything else, including keys with no recognisable structure.
    Container,
}

impl Scope {
    pub fn classify(key: &str) -> Self {
        if key.starts_with(USER_PREFIX) {
            Scope::Tenant
        } else {
            Scope::Container
        }
    }
}

/// Forwards decoded records into the tenant or container cache.
#[derive(Clone, Default)]
pub struct CounterRouter {
    tenant: Option<Arc<dyn CounterCache>>,
    container: Option<Arc<dyn CounterCache>>,
}

impl CounterRouter {
    pub fn new(tenant: Arc<dyn CounterCache>, container: Arc<dyn CounterCache>) -> Self {
        Self {
            tenant: Some(tenant),
            container: Some(container),
        }
    }

    fn cache_for(&self, scope: Scope) -> Option<&Arc<dyn CounterCache>> {
        match scope {
            Scope::Tenant => self.tenant.as_ref(),
            Scope::Container => self.container.as_ref(),
        }
    }

    /// Overwrite both gauges for `key`. No-op when the target cache is absent.
    pub fn route(&self, key: &str, used_bytes: u64, num_objects: u64) {
        if let Some(cache) = self.cache_for(Scope::classify(key)) {
            cache.set_counters(key, UsageCounters::new(used_bytes, num_objects));
        }
    }
}
