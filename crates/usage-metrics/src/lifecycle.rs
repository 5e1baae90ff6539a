//! Lifecycle controller — owns the usage store, the counter caches and the
//! refresh thread.
//!
//! The refresh loop runs on a dedicated `usage_metrics` thread driving its
//! own current-thread tokio runtime, so `stop()` can block on a plain join
//! from any context, including `Drop` and code already inside a runtime.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::runtime::Runtime;
use tokio::sync::watch;
use tracing::{error, info};

use usage_state::UsageStore;

use crate::cache::LruCounterCache;
use crate::config::UsageMetricsConfig;
use crate::error::{MetricsError, MetricsResult};
use crate::refresh::RefreshLoop;
use crate::registry::CounterRegistry;
use crate::router::CounterRouter;

/// Registry family for `user:` keys.
pub const TENANT_FAMILY: &str = "usage.user";
/// Registry family for every other key.
pub const CONTAINER_FAMILY: &str = "usage.bucket";

const THREAD_NAME: &str = "usage_metrics";

/// Where the refresh loop is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// Resources that only exist between a successful `start` and `stop`.
struct Active {
    store: UsageStore,
    tenant: Arc<LruCounterCache>,
    container: Arc<LruCounterCache>,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Publishes usage ledger records as tenant and bucket counters.
///
/// `D` is an opaque service context handed in at start and kept for the
/// embedding service; the refresh loop never touches it.
pub struct UsageMetrics<D = ()> {
    registry: CounterRegistry,
    driver: Option<D>,
    config: Option<UsageMetricsConfig>,
    active: Option<Active>,
    state: LoopState,
}

impl<D> UsageMetrics<D> {
    pub fn new(registry: CounterRegistry) -> Self {
        Self {
            registry,
            driver: None,
            config: None,
            active: None,
            state: LoopState::Idle,
        }
    }

    /// Open the store, publish the counter families and start refreshing.
    ///
    /// On error nothing is left open and no thread is running.
    pub fn start(&mut self, driver: D, config: &UsageMetricsConfig) -> MetricsResult<()> {
        if self.active.is_some() {
            return Err(MetricsError::AlreadyRunning);
        }
        config.validate()?;

        let store = UsageStore::open(&config.db_path).map_err(|e| {
            error!(path = ?config.db_path, error = %e, "failed to open usage store");
            MetricsError::StoreOpen(e)
        })?;
        self.start_with_store(driver, store, config)
    }

    /// Start refreshing from a store the caller already holds.
    ///
    /// redb locks its file exclusively, so an in-process writer must share
    /// this handle (or [`UsageMetrics::store`]) to update the ledger while
    /// the loop runs. `config.db_path` is not consulted.
    pub fn start_with_store(
        &mut self,
        driver: D,
        store: UsageStore,
        config: &UsageMetricsConfig,
    ) -> MetricsResult<()> {
        if self.active.is_some() {
            return Err(MetricsError::AlreadyRunning);
        }
        config.validate()?;
        let capacity = NonZeroUsize::new(config.cache_capacity).ok_or_else(|| {
            MetricsError::InvalidConfig("cache_capacity must be positive".to_string())
        })?;
        let runtime = refresh_runtime().map_err(|e| {
            error!(error = %e, "failed to build usage refresh runtime");
            MetricsError::Spawn(e)
        })?;

        let tenant = Arc::new(LruCounterCache::new(capacity));
        let container = Arc::new(LruCounterCache::new(capacity));
        self.registry.register(TENANT_FAMILY, tenant.clone());
        self.registry.register(CONTAINER_FAMILY, container.clone());

        let router = CounterRouter::new(tenant.clone(), container.clone());
        let refresh = RefreshLoop::new(store.clone(), router, config.interval());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let spawned = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || runtime.block_on(refresh.run(shutdown_rx)));
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.registry.unregister(TENANT_FAMILY);
                self.registry.unregister(CONTAINER_FAMILY);
                return Err(MetricsError::Spawn(e));
            }
        };

        self.driver = Some(driver);
        self.config = Some(config.clone());
        self.active = Some(Active {
            store,
            tenant,
            container,
            shutdown_tx,
            handle,
        });
        self.state = LoopState::Running;

        info!(
            interval_secs = config.refresh_interval,
            cache_capacity = config.cache_capacity,
            "usage metrics started"
        );
        Ok(())
    }

    /// Cancel the refresh loop, wait for its thread, then release the store
    /// and caches. Does nothing if not running.
    pub fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        let Active {
            store,
            tenant,
            container,
            shutdown_tx,
            handle,
        } = active;

        self.state = LoopState::Stopping;
        // A send error means the loop already exited; join either way.
        let _ = shutdown_tx.send(true);
        if handle.join().is_err() {
            error!("usage refresh thread panicked");
        }

        self.registry.unregister(TENANT_FAMILY);
        self.registry.unregister(CONTAINER_FAMILY);
        drop(tenant);
        drop(container);
        drop(store);

        self.state = LoopState::Stopped;
        info!("usage metrics stopped");
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn driver(&self) -> Option<&D> {
        self.driver.as_ref()
    }

    /// Shared handle on the open ledger while running.
    pub fn store(&self) -> Option<&UsageStore> {
        self.active.as_ref().map(|active| &active.store)
    }

    /// Configuration of the most recent successful start.
    pub fn config(&self) -> Option<&UsageMetricsConfig> {
        self.config.as_ref()
    }

    pub fn registry(&self) -> &CounterRegistry {
        &self.registry
    }
}

impl<D> Drop for UsageMetrics<D> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Runtime for the refresh thread. Built on the caller's side so a failure
/// surfaces from `start`.
fn refresh_runtime() -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
}
