use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Local};
use serde::Serialize;

use crate::aggregate;
use crate::constants::{DISPATCH_TIMEOUT_SECS, ONLINE_WINDOW_MINUTES, REPORT_TOP_MEMBERS};
use crate::dispatch::{GroupMembershipProvider, MessageSender};
use crate::store::operations::monitor_config::{MonitorConfig, PushScope};
use crate::store::Store;

/// Result of one firing run. A run is complete once every target group has
/// been attempted, regardless of per-group failures.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOutcome {
    pub attempted: usize,
    pub sent: usize,
    pub failed: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("a report run is already in progress")]
    AlreadyRunning,
}

/// Overlap-guarded report firing logic, shared by the cron job and the
/// administrative force-fire endpoint so two runs can never interleave.
pub struct ReportRunner {
    store: Arc<Store>,
    sender: Arc<dyn MessageSender>,
    membership: Arc<dyn GroupMembershipProvider>,
    running: AtomicBool,
}

impl ReportRunner {
    pub fn new(
        store: Arc<Store>,
        sender: Arc<dyn MessageSender>,
        membership: Arc<dyn GroupMembershipProvider>,
    ) -> Self {
        Self {
            store,
            sender,
            membership,
            running: AtomicBool::new(false),
        }
    }

    /// Run the per-group report loop once. Groups are processed
    /// sequentially to bound the outbound rate; a dispatch failure or
    /// timeout for one group is logged and does not abort the rest.
    pub async fn run_once(&self, config: &MonitorConfig) -> Result<ReportOutcome, ReportError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("Skipping report run: previous run still in progress");
            return Err(ReportError::AlreadyRunning);
        }

        let outcome = self.run_loop(config).await;
        self.running.store(false, Ordering::SeqCst);

        tracing::info!(
            attempted = outcome.attempted,
            sent = outcome.sent,
            failed = outcome.failed,
            "Report run complete"
        );
        Ok(outcome)
    }

    /// One-off dispatch outside the report loop (admin test messages).
    pub async fn dispatch_one(
        &self,
        group_id: &str,
        text: &str,
    ) -> Result<(), crate::dispatch::DispatchError> {
        let send = self.sender.send_group_message(group_id, text);
        match tokio::time::timeout(Duration::from_secs(DISPATCH_TIMEOUT_SECS), send).await {
            Ok(result) => result,
            Err(_) => Err(crate::dispatch::DispatchError::Network(
                "dispatch timed out".to_string(),
            )),
        }
    }

    async fn run_loop(&self, config: &MonitorConfig) -> ReportOutcome {
        let targets = self.resolve_targets(config);
        let mut outcome = ReportOutcome::default();

        for group_id in targets {
            outcome.attempted += 1;

            let text = match self.render_group_report(&group_id, config).await {
                Ok(text) => text,
                Err(error) => {
                    tracing::warn!(group_id, error = %error, "Failed to build report, skipping group");
                    outcome.failed += 1;
                    continue;
                }
            };

            let send = self.sender.send_group_message(&group_id, &text);
            match tokio::time::timeout(Duration::from_secs(DISPATCH_TIMEOUT_SECS), send).await {
                Ok(Ok(())) => {
                    tracing::info!(group_id, "Report dispatched");
                    outcome.sent += 1;
                }
                Ok(Err(error)) => {
                    tracing::warn!(group_id, error = %error, "Report dispatch failed");
                    outcome.failed += 1;
                }
                Err(_) => {
                    tracing::warn!(
                        group_id,
                        timeout_secs = DISPATCH_TIMEOUT_SECS,
                        "Report dispatch timed out"
                    );
                    outcome.failed += 1;
                }
            }
        }

        outcome
    }

    fn resolve_targets(&self, config: &MonitorConfig) -> Vec<String> {
        match config.push_scope {
            PushScope::None => Vec::new(),
            PushScope::ExplicitList => config.target_groups.clone(),
            PushScope::All => {
                let mut groups: Vec<String> = match self.store.list_groups() {
                    Ok(entries) => entries.into_iter().map(|e| e.group_id).collect(),
                    Err(error) => {
                        tracing::warn!(error = %error, "Failed to list groups for push scope all");
                        Vec::new()
                    }
                };
                groups.sort();
                groups
            }
        }
    }

    async fn render_group_report(
        &self,
        group_id: &str,
        config: &MonitorConfig,
    ) -> Result<String, crate::store::StoreError> {
        let now = Local::now();
        let online_cutoff_ms =
            (now - ChronoDuration::minutes(ONLINE_WINDOW_MINUTES)).timestamp_millis();
        let online_count = self.store.online_count(group_id, online_cutoff_ms)?;

        let summary = aggregate::summarize(
            &self.store,
            group_id,
            config.activity_time_window_hours,
            config.min_active_messages,
            now.naive_local(),
        )?;

        let mut text = render_template(
            &config.message_template,
            online_count,
            summary.active_user_count,
            &summary.ranked_members,
        );

        // 成员总数未知时省略活跃率行，报告其余部分照常生成
        if let Some(member_count) = self.membership.member_count(group_id).await {
            if member_count > 0 {
                let rate = summary.active_user_count as f64 / member_count as f64 * 100.0;
                text.push_str(&format!("\n成员活跃率: {rate:.1}%"));
            }
        }

        Ok(text)
    }
}

/// Fill the `{online_count}` / `{active_count}` / `{active_members}`
/// placeholders of a report template.
pub fn render_template(
    template: &str,
    online_count: u64,
    active_count: usize,
    ranked_members: &[(String, u64)],
) -> String {
    let members = ranked_members
        .iter()
        .take(REPORT_TOP_MEMBERS)
        .map(|(user_id, count)| format!("{user_id}({count}条)"))
        .collect::<Vec<_>>()
        .join(" ");

    template
        .replace("{online_count}", &online_count.to_string())
        .replace("{active_count}", &active_count.to_string())
        .replace("{active_members}", &members)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Local;

    use crate::dispatch::DispatchError;
    use crate::store::operations::monitor_config::MonitorConfig;

    use super::*;

    struct FakeSender {
        sent: Mutex<Vec<(String, String)>>,
        fail_groups: HashSet<String>,
    }

    impl FakeSender {
        fn new(fail_groups: &[&str]) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_groups: fail_groups.iter().map(|g| g.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl MessageSender for FakeSender {
        async fn send_group_message(
            &self,
            group_id: &str,
            text: &str,
        ) -> Result<(), DispatchError> {
            if self.fail_groups.contains(group_id) {
                return Err(DispatchError::ApiError { status: 502 });
            }
            self.sent
                .lock()
                .unwrap()
                .push((group_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    struct FixedMembership(Option<u64>);

    #[async_trait]
    impl GroupMembershipProvider for FixedMembership {
        async fn member_count(&self, _group_id: &str) -> Option<u64> {
            self.0
        }
    }

    fn open_store(name: &str) -> (tempfile::TempDir, Arc<Store>) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store =
            Arc::new(Store::open(tmp.path().join(name).to_str().unwrap()).expect("open store"));
        (tmp, store)
    }

    fn explicit_config(groups: &[&str]) -> MonitorConfig {
        let mut config = MonitorConfig::default();
        config.target_groups = groups.iter().map(|g| g.to_string()).collect();
        config
    }

    #[test]
    fn template_rendering_fills_placeholders() {
        let members = vec![("u1".to_string(), 5), ("u2".to_string(), 4)];
        let text = render_template(
            "在线: {online_count} 活跃: {active_count} 成员: {active_members}",
            7,
            2,
            &members,
        );
        assert_eq!(text, "在线: 7 活跃: 2 成员: u1(5条) u2(4条)");
    }

    #[test]
    fn template_rendering_caps_member_list() {
        let members: Vec<(String, u64)> =
            (0..10).map(|i| (format!("u{i}"), 10 - i as u64)).collect();
        let text = render_template("{active_members}", 0, members.len(), &members);
        assert_eq!(text.split(' ').count(), REPORT_TOP_MEMBERS);
    }

    #[tokio::test]
    async fn one_group_failing_does_not_abort_the_run() {
        let (_tmp, store) = open_store("report_fail.sled");
        let sender = Arc::new(FakeSender::new(&["g1"]));
        let runner = ReportRunner::new(
            store,
            sender.clone(),
            Arc::new(FixedMembership(None)),
        );

        let outcome = runner
            .run_once(&explicit_config(&["g1", "g2"]))
            .await
            .unwrap();

        assert_eq!(outcome.attempted, 2);
        assert_eq!(outcome.sent, 1);
        assert_eq!(outcome.failed, 1);

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "g2");
    }

    #[tokio::test]
    async fn push_scope_none_sends_nothing() {
        let (_tmp, store) = open_store("report_none.sled");
        let sender = Arc::new(FakeSender::new(&[]));
        let runner = ReportRunner::new(
            store,
            sender.clone(),
            Arc::new(FixedMembership(None)),
        );

        let mut config = explicit_config(&["g1"]);
        config.push_scope = PushScope::None;
        let outcome = runner.run_once(&config).await.unwrap();

        assert_eq!(outcome.attempted, 0);
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn push_scope_all_uses_group_registry() {
        let (_tmp, store) = open_store("report_all.sled");
        store.register_group("g2", chrono::Utc::now()).unwrap();
        store.register_group("g1", chrono::Utc::now()).unwrap();

        let sender = Arc::new(FakeSender::new(&[]));
        let runner = ReportRunner::new(
            store,
            sender.clone(),
            Arc::new(FixedMembership(None)),
        );

        let mut config = MonitorConfig::default();
        config.push_scope = PushScope::All;
        let outcome = runner.run_once(&config).await.unwrap();

        assert_eq!(outcome.attempted, 2);
        let sent = sender.sent.lock().unwrap();
        let groups: Vec<&str> = sent.iter().map(|(g, _)| g.as_str()).collect();
        assert_eq!(groups, vec!["g1", "g2"]);
    }

    #[tokio::test]
    async fn report_text_reflects_stored_activity() {
        let (_tmp, store) = open_store("report_text.sled");
        let today = Local::now().date_naive();
        for _ in 0..5 {
            store.increment_activity("g1", "u1", today).unwrap();
        }
        for _ in 0..2 {
            store.increment_activity("g1", "u2", today).unwrap();
        }

        let sender = Arc::new(FakeSender::new(&[]));
        let runner = ReportRunner::new(
            store,
            sender.clone(),
            Arc::new(FixedMembership(None)),
        );

        let mut config = explicit_config(&["g1"]);
        config.message_template = "活跃 {active_count}: {active_members}".to_string();
        runner.run_once(&config).await.unwrap();

        let sent = sender.sent.lock().unwrap();
        // u2 低于 min_active_messages=3，不计入
        assert_eq!(sent[0].1, "活跃 1: u1(5条)");
    }

    #[tokio::test]
    async fn rate_line_depends_on_membership_data() {
        let (_tmp, store) = open_store("report_rate.sled");
        let today = Local::now().date_naive();
        for _ in 0..4 {
            store.increment_activity("g1", "u1", today).unwrap();
        }

        let config = {
            let mut c = explicit_config(&["g1"]);
            c.message_template = "r".to_string();
            c
        };

        let sender = Arc::new(FakeSender::new(&[]));
        let runner = ReportRunner::new(
            store.clone(),
            sender.clone(),
            Arc::new(FixedMembership(Some(8))),
        );
        runner.run_once(&config).await.unwrap();
        assert_eq!(sender.sent.lock().unwrap()[0].1, "r\n成员活跃率: 12.5%");

        let sender = Arc::new(FakeSender::new(&[]));
        let runner = ReportRunner::new(store, sender.clone(), Arc::new(FixedMembership(None)));
        runner.run_once(&config).await.unwrap();
        assert_eq!(sender.sent.lock().unwrap()[0].1, "r");
    }
}
