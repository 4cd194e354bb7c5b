pub mod due_scan;
pub mod message_id_cleanup;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::WorkerConfig;
use crate::store::Store;

pub use due_scan::{DueNotifier, LogNotifier};

/// Timeout for individual worker invocations (5 minutes).
const WORKER_TIMEOUT: Duration = Duration::from_secs(300);

/// Drain period before scheduler shutdown to let in-flight tasks complete.
#[cfg(test)]
const DRAIN_TIMEOUT: Duration = Duration::from_millis(10);
#[cfg(not(test))]
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerName {
    MessageIdCleanup,
    DueScan,
}

impl WorkerName {
    pub const ALL: [WorkerName; 2] = [WorkerName::MessageIdCleanup, WorkerName::DueScan];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MessageIdCleanup => "message_id_cleanup",
            Self::DueScan => "due_scan",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub name: WorkerName,
    pub cron: String,
    pub enabled: bool,
}

pub struct WorkerManager {
    store: Arc<Store>,
    notifier: Arc<dyn DueNotifier>,
    shutdown_rx: broadcast::Receiver<()>,
    config: WorkerConfig,
}

impl WorkerManager {
    pub fn new(
        store: Arc<Store>,
        notifier: Arc<dyn DueNotifier>,
        shutdown_rx: broadcast::Receiver<()>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            shutdown_rx,
            config: config.clone(),
        }
    }

    /// Single source of truth for all planned jobs and their cron schedules.
    pub fn planned_jobs(&self) -> Vec<JobSpec> {
        if !self.config.is_leader {
            return Vec::new();
        }

        vec![
            JobSpec {
                name: WorkerName::MessageIdCleanup,
                cron: self.config.message_cleanup_cron.clone(),
                enabled: true,
            },
            JobSpec {
                name: WorkerName::DueScan,
                cron: self.config.due_scan_cron.clone(),
                enabled: true,
            },
        ]
    }

    /// Start the worker scheduler. Returns an error if the scheduler cannot be created or started.
    pub async fn start(mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.config.is_leader {
            tracing::info!("Worker leader disabled; skipping worker startup");
            return Ok(());
        }

        let mut scheduler = JobScheduler::new().await?;
        self.register_jobs(&scheduler).await;
        scheduler.start().await?;

        tracing::info!("Worker manager started");
        let _ = self.shutdown_rx.recv().await;

        tracing::info!(
            "Worker manager shutting down, draining for {}s",
            DRAIN_TIMEOUT.as_secs()
        );
        tokio::time::sleep(DRAIN_TIMEOUT).await;
        let _ = scheduler.shutdown().await;
        Ok(())
    }

    async fn register_jobs(&self, scheduler: &JobScheduler) {
        for spec in self.planned_jobs() {
            if !spec.enabled {
                tracing::info!(name = spec.name.as_str(), "Skipping disabled worker");
                continue;
            }

            let store = self.store.clone();
            let name_str = spec.name.as_str();

            match spec.name {
                WorkerName::MessageIdCleanup => {
                    add_job(scheduler, &spec.cron, name_str, move || {
                        let store = store.clone();
                        async move {
                            message_id_cleanup::run(&store).await;
                        }
                    })
                    .await;
                }
                WorkerName::DueScan => {
                    let notifier = self.notifier.clone();
                    add_job(scheduler, &spec.cron, name_str, move || {
                        let store = store.clone();
                        let notifier = notifier.clone();
                        async move {
                            due_scan::run(&store, notifier.as_ref()).await;
                        }
                    })
                    .await;
                }
            }
            tracing::info!(name = name_str, cron = %spec.cron, "Registered worker");
        }
    }
}

/// Add a job to the scheduler with an overlap guard and timeout wrapper.
async fn add_job<Fut, F>(scheduler: &JobScheduler, cron: &str, name: &'static str, mut run: F)
where
    F: FnMut() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let running = Arc::new(AtomicBool::new(false));

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let guard = running.clone();

        if guard
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!(
                worker = name,
                "Skipping worker invocation: previous run still in progress"
            );
            return Box::pin(async {});
        }

        let fut = run();
        Box::pin(async move {
            if tokio::time::timeout(WORKER_TIMEOUT, fut).await.is_err() {
                tracing::error!(
                    worker = name,
                    timeout_secs = WORKER_TIMEOUT.as_secs(),
                    "Worker timed out"
                );
            }
            guard.store(false, Ordering::SeqCst);
        })
    });

    match job {
        Ok(job) => {
            if let Err(err) = scheduler.add(job).await {
                tracing::error!(error=%err, cron, worker = name, "Failed to add worker job");
            }
        }
        Err(err) => tracing::error!(error=%err, cron, worker = name, "Failed to create worker job"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::broadcast;

    use crate::config::Config;
    use crate::store::test_support::temp_store;

    use super::*;

    fn manager(is_leader: bool) -> (tempfile::TempDir, broadcast::Sender<()>, WorkerManager) {
        let (dir, store) = temp_store();
        let (tx, _) = broadcast::channel(2);
        let mut worker_cfg = Config::from_env().worker;
        worker_cfg.is_leader = is_leader;
        let manager = WorkerManager::new(
            Arc::new(store),
            Arc::new(LogNotifier),
            tx.subscribe(),
            &worker_cfg,
        );
        (dir, tx, manager)
    }

    #[tokio::test]
    async fn leader_switch_controls_job_registration() {
        let (_dir, _tx, follower) = manager(false);
        assert!(follower.planned_jobs().is_empty());

        let (_dir, _tx, leader) = manager(true);
        let names: Vec<WorkerName> = leader.planned_jobs().iter().map(|j| j.name).collect();
        assert_eq!(names, WorkerName::ALL.to_vec());
    }

    #[tokio::test]
    async fn shutdown_path_is_non_panicking() {
        let (_dir, _tx, follower) = manager(false);
        follower
            .start()
            .await
            .expect("non-leader start should succeed");
    }

    #[test]
    fn all_worker_names_have_str() {
        for name in WorkerName::ALL {
            assert!(!name.as_str().is_empty(), "{:?} has empty str", name);
        }
    }
}
