use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MESSAGE_TEMPLATE, DEFAULT_MIN_ACTIVE_MESSAGES, DEFAULT_PUSH_TIME,
    DEFAULT_RETENTION_DAYS, DEFAULT_WINDOW_HOURS,
};
use crate::store::keys;
use crate::store::{Store, StoreError};
use crate::validation::{coerce_group_list, parse_push_time};

const CONFIG_TYPE: &str = "monitor";

/// Who receives the scheduled daily report.
///
/// 源需求里 "target_groups 为空" 的语义含糊（推给所有群 vs 不推送），
/// 这里用显式的 scope 字段消除歧义。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushScope {
    /// No scheduled push at all.
    None,
    /// Push to every group in the registry.
    All,
    /// Push to `target_groups` only; an empty list pushes to nobody.
    ExplicitList,
}

/// Runtime-mutable monitor configuration, persisted in the store and
/// replaced atomically by admin updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorConfig {
    pub push_time: String,
    pub push_scope: PushScope,
    pub target_groups: Vec<String>,
    pub message_template: String,
    pub activity_time_window_hours: u32,
    pub min_active_messages: u64,
    pub data_retention_days: u32,
    pub enable_online_monitor: bool,
    pub enable_activity_summary: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            push_time: DEFAULT_PUSH_TIME.to_string(),
            push_scope: PushScope::ExplicitList,
            target_groups: Vec::new(),
            message_template: DEFAULT_MESSAGE_TEMPLATE.to_string(),
            activity_time_window_hours: DEFAULT_WINDOW_HOURS,
            min_active_messages: DEFAULT_MIN_ACTIVE_MESSAGES,
            data_retention_days: DEFAULT_RETENTION_DAYS,
            enable_online_monitor: true,
            enable_activity_summary: true,
        }
    }
}

/// Partial admin update. Absent fields keep their current values; present
/// but invalid fields fall back per field (never a hard failure).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    pub push_time: Option<String>,
    pub push_scope: Option<PushScope>,
    /// Arbitrary JSON on purpose: non-list input coerces to the empty set.
    pub target_groups: Option<serde_json::Value>,
    pub message_template: Option<String>,
    pub activity_time_window_hours: Option<u32>,
    pub min_active_messages: Option<u64>,
    pub data_retention_days: Option<u32>,
    pub enable_online_monitor: Option<bool>,
    pub enable_activity_summary: Option<bool>,
}

impl ConfigPatch {
    pub fn apply_to(&self, current: &MonitorConfig) -> MonitorConfig {
        let mut next = current.clone();

        if let Some(raw) = &self.push_time {
            match parse_push_time(raw) {
                Some(_) => next.push_time = raw.trim().to_string(),
                None => {
                    tracing::warn!(value = %raw, "Invalid push_time in update, keeping previous");
                }
            }
        }

        if let Some(scope) = self.push_scope {
            next.push_scope = scope;
        }

        if let Some(value) = &self.target_groups {
            next.target_groups = coerce_group_list(value);
        }

        if let Some(template) = &self.message_template {
            if template.trim().is_empty() {
                tracing::warn!("Empty message_template in update, using default");
                next.message_template = DEFAULT_MESSAGE_TEMPLATE.to_string();
            } else {
                next.message_template = template.clone();
            }
        }

        if let Some(hours) = self.activity_time_window_hours {
            next.activity_time_window_hours = hours.max(1);
        }
        if let Some(min) = self.min_active_messages {
            next.min_active_messages = min.max(1);
        }
        if let Some(days) = self.data_retention_days {
            next.data_retention_days = days.max(1);
        }

        if let Some(enabled) = self.enable_online_monitor {
            next.enable_online_monitor = enabled;
        }
        if let Some(enabled) = self.enable_activity_summary {
            next.enable_activity_summary = enabled;
        }

        next
    }
}

impl Store {
    /// Load the persisted monitor configuration. Never fails: a missing or
    /// corrupt value falls back to defaults with a warning.
    pub fn get_monitor_config(&self) -> MonitorConfig {
        let key = keys::config_latest_key(CONFIG_TYPE);
        match self.config_versions.get(key.as_bytes()) {
            Ok(Some(raw)) => match serde_json::from_slice::<MonitorConfig>(&raw) {
                Ok(config) => config,
                Err(error) => {
                    tracing::warn!(error = %error, "Corrupt monitor config, using defaults");
                    MonitorConfig::default()
                }
            },
            Ok(None) => MonitorConfig::default(),
            Err(error) => {
                tracing::warn!(error = %error, "Failed to read monitor config, using defaults");
                MonitorConfig::default()
            }
        }
    }

    pub fn save_monitor_config(&self, config: &MonitorConfig) -> Result<(), StoreError> {
        let key = keys::config_latest_key(CONFIG_TYPE);
        self.config_versions
            .insert(key.as_bytes(), Self::serialize(config)?)?;
        Ok(())
    }
}
