pub mod activity;
pub mod groups;
pub mod monitor_config;
pub mod presence;
