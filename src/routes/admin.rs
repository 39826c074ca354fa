use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use chrono::{Local, NaiveDate};
use serde::Deserialize;

use crate::extractors::JsonBody;
use crate::report::ReportError;
use crate::response::{ok, AppError};
use crate::scheduler::retention_cutoff;
use crate::state::AppState;
use crate::store::operations::monitor_config::ConfigPatch;
use crate::validation::normalize_id;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/config", get(get_config).put(update_config))
        .route("/status", get(get_status))
        .route("/groups", get(list_groups))
        .route("/report/force", post(force_report))
        .route("/test-message", post(test_message))
        .route("/retention/purge", post(purge_retention))
}

async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    ok(state.store().get_monitor_config())
}

/// Merge a partial update into the persisted configuration. Invalid fields
/// fall back per field (see `ConfigPatch::apply_to`); the result is saved
/// and published so the scheduler can re-arm on a push-time change.
async fn update_config(
    State(state): State<AppState>,
    JsonBody(patch): JsonBody<ConfigPatch>,
) -> Result<impl IntoResponse, AppError> {
    let current = state.store().get_monitor_config();
    let next = patch.apply_to(&current);

    state.store().save_monitor_config(&next)?;
    state.publish_monitor_config(next.clone());

    tracing::info!(push_time = %next.push_time, "Monitor config updated");
    Ok(ok(next))
}

async fn get_status(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let config = state.store().get_monitor_config();
    let groups = state.store().list_groups()?;

    let (armed, next_fire_at) = match state.scheduler() {
        Some(scheduler) => (scheduler.is_armed().await, scheduler.next_fire_at().await),
        None => (false, None),
    };

    Ok(ok(serde_json::json!({
        "uptimeSecs": state.uptime_secs(),
        "schedulerArmed": armed,
        "nextFireAt": next_fire_at,
        "pushTime": config.push_time,
        "pushScope": config.push_scope,
        "targetGroupCount": config.target_groups.len(),
        "knownGroupCount": groups.len(),
    })))
}

async fn list_groups(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let mut groups = state.store().list_groups()?;
    groups.sort_by(|a, b| a.group_id.cmp(&b.group_id));
    Ok(ok(groups))
}

/// Run the report loop immediately. The armed schedule is not touched.
async fn force_report(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let config = state.store().get_monitor_config();
    match state.runner().run_once(&config).await {
        Ok(outcome) => Ok(ok(outcome)),
        Err(ReportError::AlreadyRunning) => Err(AppError::conflict(
            "REPORT_IN_PROGRESS",
            "报告正在执行中",
        )),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestMessageRequest {
    group_id: String,
    message: Option<String>,
}

async fn test_message(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<TestMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let group_id = normalize_id(&req.group_id)
        .ok_or_else(|| AppError::bad_request("INVALID_GROUP_ID", "群组 ID 无效"))?;
    let message = req.message.unwrap_or_else(|| "这是测试消息".to_string());

    state
        .runner()
        .dispatch_one(&group_id, &message)
        .await
        .map_err(|error| AppError::unavailable("DISPATCH_FAILED", &error.to_string()))?;

    Ok(ok(serde_json::json!({ "groupId": group_id, "sent": true })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PurgeRequest {
    /// Explicit cutoff; must be in the past. Defaults to
    /// today minus the configured retention days.
    cutoff_date: Option<NaiveDate>,
}

async fn purge_retention(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<PurgeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let today = Local::now().date_naive();
    let cutoff = match req.cutoff_date {
        Some(date) if date > today => {
            return Err(AppError::bad_request(
                "INVALID_CUTOFF",
                "清理日期不能晚于今天",
            ));
        }
        Some(date) => date,
        None => {
            let config = state.store().get_monitor_config();
            retention_cutoff(today, config.data_retention_days)
        }
    };

    let removed_activity = state.store().purge_activity_older_than(cutoff)?;
    let cutoff_ms = cutoff
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or(0);
    let removed_presence = state.store().purge_presence_older_than(cutoff_ms)?;

    tracing::info!(%cutoff, removed_activity, removed_presence, "Manual retention purge");
    Ok(ok(serde_json::json!({
        "cutoffDate": cutoff,
        "removedActivity": removed_activity,
        "removedPresence": removed_presence,
    })))
}
