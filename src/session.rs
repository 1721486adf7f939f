//! Per-run session state: the container registry and the applied proxy
//! configuration. One `Session` exists per process run, owned by the
//! lifecycle controller and shared with the tasks that need it.

use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::container::ContainerRuntimeApi;
use crate::proxy::ProxySettings;

/// State owned by one run of the launcher process.
#[derive(Debug, Default)]
pub struct Session {
    registry: SessionRegistry,
    proxy: Mutex<Option<ProxySettings>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Record the proxy settings applied for this run.
    pub fn set_proxy(&self, settings: ProxySettings) {
        *lock_ignore_poison(&self.proxy) = Some(settings);
    }

    pub fn proxy(&self) -> Option<ProxySettings> {
        lock_ignore_poison(&self.proxy).clone()
    }
}

/// Growable, ordered, deduplicating set of container ids started by this
/// session. Ids are added only after a successful start and are never removed;
/// stopping is best-effort at shutdown.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    containers: Mutex<Vec<String>>,
}

impl SessionRegistry {
    /// Track a started container. Duplicate ids are ignored.
    pub fn register(&self, container_id: impl Into<String>) {
        let container_id = container_id.into();
        let mut containers = lock_ignore_poison(&self.containers);
        if containers.contains(&container_id) {
            debug!("container {container_id} already tracked");
            return;
        }
        containers.push(container_id);
    }

    /// Snapshot of tracked ids, in registration order.
    pub fn tracked(&self) -> Vec<String> {
        lock_ignore_poison(&self.containers).clone()
    }

    /// Issue one stop attempt per tracked container, in registration order,
    /// continuing past individual failures. Entries are not cleared, so a
    /// repeated drain re-attempts the same ids.
    pub async fn drain_and_stop_all(&self, runtime: &dyn ContainerRuntimeApi) {
        let ids = self.tracked();
        if ids.is_empty() {
            return;
        }

        info!("stopping {} auxiliary container(s)", ids.len());
        for id in ids {
            if let Err(err) = runtime.stop(&id).await {
                warn!("failed to stop container {id}: {err}");
            }
        }
    }
}

fn lock_ignore_poison<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
