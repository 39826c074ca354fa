use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use chrono::{DateTime, Local, Utc};
use serde::Deserialize;

use crate::extractors::JsonBody;
use crate::response::{ok, AppError};
use crate::state::AppState;
use crate::validation::normalize_id;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(ingest_event))
}

/// One inbound group message, delivered at-least-once by the host bot.
/// Redelivery may over-count; there is no idempotency key by design.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageEvent {
    group_id: String,
    user_id: String,
    /// Event time; defaults to the ingestion time when absent.
    timestamp: Option<DateTime<Utc>>,
}

/// Record a message event: group registry, presence, day counter.
///
/// 统计写入失败只记日志并在响应中标记 recorded=false，
/// 绝不能因为统计问题阻塞宿主的消息处理。
async fn ingest_event(
    State(state): State<AppState>,
    JsonBody(event): JsonBody<MessageEvent>,
) -> Result<impl IntoResponse, AppError> {
    let group_id = normalize_id(&event.group_id)
        .ok_or_else(|| AppError::bad_request("INVALID_GROUP_ID", "群组 ID 无效"))?;
    let user_id = normalize_id(&event.user_id)
        .ok_or_else(|| AppError::bad_request("INVALID_USER_ID", "用户 ID 无效"))?;

    let seen_at = event.timestamp.unwrap_or_else(Utc::now);
    let config = state.store().get_monitor_config();
    let mut recorded = true;

    if let Err(error) = state.store().register_group(&group_id, seen_at) {
        tracing::warn!(group_id, error = %error, "Failed to register group");
        recorded = false;
    }

    if config.enable_online_monitor {
        if let Err(error) =
            state
                .store()
                .touch_presence(&group_id, &user_id, seen_at.timestamp_millis())
        {
            tracing::warn!(group_id, user_id, error = %error, "Failed to record presence");
            recorded = false;
        }
    }

    if config.enable_activity_summary {
        let date = seen_at.with_timezone(&Local).date_naive();
        if let Err(error) = state.store().increment_activity(&group_id, &user_id, date) {
            tracing::warn!(group_id, user_id, error = %error, "Failed to increment activity");
            recorded = false;
        }
    }

    Ok(ok(serde_json::json!({ "recorded": recorded })))
}
