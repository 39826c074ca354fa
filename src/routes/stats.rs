use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::{Duration, Local};

use crate::aggregate;
use crate::constants::ONLINE_WINDOW_MINUTES;
use crate::response::{ok, AppError};
use crate::state::AppState;
use crate::validation::normalize_id;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:group_id", get(group_summary))
        .route("/:group_id/today", get(today_stats))
        .route("/:group_id/yesterday", get(yesterday_stats))
        .route("/:group_id/online", get(online_count))
}

fn valid_group_id(raw: &str) -> Result<String, AppError> {
    normalize_id(raw).ok_or_else(|| AppError::bad_request("INVALID_GROUP_ID", "群组 ID 无效"))
}

fn online_cutoff_ms() -> i64 {
    (Local::now() - Duration::minutes(ONLINE_WINDOW_MINUTES)).timestamp_millis()
}

/// Combined view: online count, today-so-far snapshot, windowed summary.
async fn group_summary(
    Path(group_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let group_id = valid_group_id(&group_id)?;
    let config = state.store().get_monitor_config();
    let now = Local::now();

    let online = state.store().online_count(&group_id, online_cutoff_ms())?;
    let today = aggregate::snapshot_for_day(state.store(), &group_id, now.date_naive())?;
    let summary = aggregate::summarize(
        state.store(),
        &group_id,
        config.activity_time_window_hours,
        config.min_active_messages,
        now.naive_local(),
    )?;

    Ok(ok(serde_json::json!({
        "groupId": group_id,
        "onlineCount": online,
        "today": today,
        "window": {
            "windowHours": config.activity_time_window_hours,
            "minActiveMessages": config.min_active_messages,
            "activeUserCount": summary.active_user_count,
            "rankedMembers": summary.ranked_members,
        },
    })))
}

async fn today_stats(
    Path(group_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let group_id = valid_group_id(&group_id)?;
    let date = Local::now().date_naive();
    let snapshot = aggregate::snapshot_for_day(state.store(), &group_id, date)?;
    Ok(ok(serde_json::json!({
        "groupId": group_id,
        "date": date,
        "activeUserCount": snapshot.active_user_count,
        "totalMessageCount": snapshot.total_message_count,
    })))
}

async fn yesterday_stats(
    Path(group_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let group_id = valid_group_id(&group_id)?;
    let date = Local::now().date_naive() - Duration::days(1);
    let snapshot = aggregate::snapshot_for_day(state.store(), &group_id, date)?;
    Ok(ok(serde_json::json!({
        "groupId": group_id,
        "date": date,
        "activeUserCount": snapshot.active_user_count,
        "totalMessageCount": snapshot.total_message_count,
    })))
}

/// "Online" is approximated as "sent a message within the last 10 minutes".
async fn online_count(
    Path(group_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let group_id = valid_group_id(&group_id)?;
    let online = state.store().online_count(&group_id, online_cutoff_ms())?;
    Ok(ok(serde_json::json!({
        "groupId": group_id,
        "onlineCount": online,
        "windowMinutes": ONLINE_WINDOW_MINUTES,
    })))
}
