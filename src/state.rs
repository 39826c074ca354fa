use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;

use crate::report::ReportRunner;
use crate::scheduler::ReportScheduler;
use crate::store::operations::monitor_config::MonitorConfig;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    store: Arc<Store>,
    runner: Arc<ReportRunner>,
    /// None when this instance is not the scheduler leader (and in tests).
    scheduler: Option<Arc<ReportScheduler>>,
    config_tx: watch::Sender<MonitorConfig>,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        runner: Arc<ReportRunner>,
        scheduler: Option<Arc<ReportScheduler>>,
        config_tx: watch::Sender<MonitorConfig>,
    ) -> Self {
        Self {
            store,
            runner,
            scheduler,
            config_tx,
            started_at: Instant::now(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn runner(&self) -> &ReportRunner {
        &self.runner
    }

    pub fn scheduler(&self) -> Option<&Arc<ReportScheduler>> {
        self.scheduler.as_ref()
    }

    /// Publish an updated monitor configuration to watchers (the scheduler
    /// re-arm task). Persisting to the store happens before this call.
    pub fn publish_monitor_config(&self, config: MonitorConfig) {
        // 没有订阅者时 send 返回 Err，非 leader 实例属于正常情况
        let _ = self.config_tx.send(config);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
