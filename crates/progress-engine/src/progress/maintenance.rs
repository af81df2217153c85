use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::service::ProgressService;

/// Background jobs started by [`spawn_maintenance`]; aborted on drop of the owner.
pub struct MaintenanceTasks {
    handles: Vec<JoinHandle<()>>,
}

impl MaintenanceTasks {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn abort(&self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

impl Drop for MaintenanceTasks {
    fn drop(&mut self) {
        self.abort();
    }
}

fn every<F, Fut>(interval: Duration, mut job: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            job().await;
        }
    })
}

/// Start auto-save, periodic recalculation, idle-cache sweep and history pruning.
/// A zero interval disables that job.
pub fn spawn_maintenance(service: ProgressService) -> MaintenanceTasks {
    let scheduler = service.config().scheduler.clone();
    let eviction_enabled = service.config().cache.eviction_enabled;
    let mut handles = Vec::new();

    if scheduler.autosave_interval_secs > 0 {
        let service = service.clone();
        handles.push(every(
            Duration::from_secs(scheduler.autosave_interval_secs),
            move || {
                let service = service.clone();
                async move {
                    let saved = service.flush_all().await;
                    debug!(saved, "auto-save completed");
                }
            },
        ));
    }

    if scheduler.recalculation_interval_secs > 0 {
        let service = service.clone();
        handles.push(every(
            Duration::from_secs(scheduler.recalculation_interval_secs),
            move || {
                let queued = service.recalculate_all();
                debug!(queued, "periodic recalculation queued");
                async {}
            },
        ));
    }

    if eviction_enabled && scheduler.sweep_interval_secs > 0 {
        let service = service.clone();
        handles.push(every(
            Duration::from_secs(scheduler.sweep_interval_secs),
            move || {
                let service = service.clone();
                async move {
                    let evicted = service.evict_idle().await;
                    if evicted > 0 {
                        debug!(evicted, "idle participants evicted");
                    }
                }
            },
        ));
    }

    if scheduler.history_retention_days > 0 {
        let retention = chrono::Duration::days(i64::from(scheduler.history_retention_days));
        handles.push(every(Duration::from_secs(3600), move || {
            let service = service.clone();
            async move {
                match service.prune_history(Utc::now() - retention).await {
                    Ok(pruned) if pruned > 0 => info!(pruned, "old history pruned"),
                    Ok(_) => {}
                    Err(err) => warn!(error = %err, "history prune failed"),
                }
            }
        }));
    }

    info!(
        jobs = handles.len(),
        autosave_secs = scheduler.autosave_interval_secs,
        recalculation_secs = scheduler.recalculation_interval_secs,
        "maintenance tasks started"
    );
    MaintenanceTasks { handles }
}
