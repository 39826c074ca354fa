use std::sync::Arc;

use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use uuid::Uuid;

use crate::report::ReportRunner;
use crate::store::Store;
use crate::validation::PushTime;

/// Local wall-clock time for the daily retention purge.
const RETENTION_CRON: &str = "0 30 3 * * *";

/// Drives the daily report job and the retention purge.
///
/// 状态机：未配置有效 push_time 时为 Idle；arm 之后进入 Armed，
/// 触发时执行一轮 ReportRunner::run_once，完成后由 cron 继续保持 Armed。
/// 任意时刻最多一个待触发的报告任务。
pub struct ReportScheduler {
    store: Arc<Store>,
    runner: Arc<ReportRunner>,
    scheduler: JobScheduler,
    report_job: Mutex<Option<Uuid>>,
}

impl ReportScheduler {
    /// Create the scheduler, register the retention job and arm the report
    /// job from the persisted configuration.
    pub async fn start(
        store: Arc<Store>,
        runner: Arc<ReportRunner>,
    ) -> Result<Arc<Self>, JobSchedulerError> {
        let scheduler = JobScheduler::new().await?;

        {
            let store = store.clone();
            let retention_job = Job::new_async_tz(RETENTION_CRON, Local, move |_uuid, _lock| {
                let store = store.clone();
                Box::pin(async move {
                    run_retention(&store).await;
                })
            })?;
            scheduler.add(retention_job).await?;
        }

        scheduler.start().await?;

        let this = Arc::new(Self {
            store: store.clone(),
            runner,
            scheduler,
            report_job: Mutex::new(None),
        });

        let config = store.get_monitor_config();
        match crate::validation::parse_push_time(&config.push_time) {
            Some(push_time) => this.arm(push_time).await?,
            None => {
                // 持久化配置损坏时保持 Idle，等待管理端写入有效时间
                tracing::warn!(push_time = %config.push_time, "No valid push time, scheduler idle");
            }
        }

        Ok(this)
    }

    /// (Re-)arm the daily report job at the given local time-of-day. The
    /// previous pending job, if any, is removed — re-arming is idempotent
    /// and there is never more than one pending report timer. Safe to call
    /// mid-firing: the in-flight run finishes and only the next arm moves.
    pub async fn arm(&self, push_time: PushTime) -> Result<(), JobSchedulerError> {
        let cron = format!("0 {} {} * * *", push_time.minute, push_time.hour);

        let store = self.store.clone();
        let runner = self.runner.clone();
        let job = Job::new_async_tz(cron.as_str(), Local, move |_uuid, _lock| {
            let store = store.clone();
            let runner = runner.clone();
            Box::pin(async move {
                let config = store.get_monitor_config();
                if let Err(error) = runner.run_once(&config).await {
                    tracing::warn!(error = %error, "Scheduled report run skipped");
                }
            })
        })?;

        let new_id = self.scheduler.add(job).await?;
        let previous = self.report_job.lock().await.replace(new_id);
        if let Some(old_id) = previous {
            if let Err(error) = self.scheduler.remove(&old_id).await {
                tracing::warn!(error = %error, "Failed to remove previous report job");
            }
        }

        tracing::info!(%cron, "Daily report armed");
        Ok(())
    }

    /// Run the firing logic immediately, without waiting for the scheduled
    /// time and without touching the armed job.
    pub async fn force_fire(&self) -> Result<crate::report::ReportOutcome, crate::report::ReportError> {
        let config = self.store.get_monitor_config();
        self.runner.run_once(&config).await
    }

    pub async fn is_armed(&self) -> bool {
        self.report_job.lock().await.is_some()
    }

    /// Next scheduled report fire instant, if armed.
    pub async fn next_fire_at(&self) -> Option<DateTime<Utc>> {
        let job_id = (*self.report_job.lock().await)?;
        let mut scheduler = self.scheduler.clone();
        scheduler.next_tick_for_job(job_id).await.ok().flatten()
    }

    /// Cancel pending jobs. In-flight store writes complete on their own;
    /// a firing loop either ran to completion or never started.
    pub async fn shutdown(&self) {
        let mut scheduler = self.scheduler.clone();
        if let Err(error) = scheduler.shutdown().await {
            tracing::warn!(error = %error, "Scheduler shutdown reported an error");
        }
    }
}

/// Retention worker: drop activity and presence records older than the
/// configured number of days. The cutoff is always a past date, so the
/// purge cannot race an increment for a still-current day.
pub async fn run_retention(store: &Store) {
    let config = store.get_monitor_config();
    let cutoff_date = retention_cutoff(Local::now().date_naive(), config.data_retention_days);
    let cutoff_ms = (Local::now() - Duration::days(i64::from(config.data_retention_days)))
        .timestamp_millis();

    match store.purge_activity_older_than(cutoff_date) {
        Ok(removed) => tracing::info!(%cutoff_date, removed, "Activity retention purge complete"),
        Err(error) => tracing::warn!(error = %error, "Activity retention purge failed"),
    }
    match store.purge_presence_older_than(cutoff_ms) {
        Ok(removed) => tracing::info!(removed, "Presence retention purge complete"),
        Err(error) => tracing::warn!(error = %error, "Presence retention purge failed"),
    }
}

pub fn retention_cutoff(today: NaiveDate, retention_days: u32) -> NaiveDate {
    today - Duration::days(i64::from(retention_days))
}
