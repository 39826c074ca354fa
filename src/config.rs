use std::env;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

/// 进程级配置（环境变量加载，启动后只读）。
/// 运行时可变的监控配置见 `store::operations::monitor_config::MonitorConfig`。
#[derive(Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub sled_path: String,
    pub cors_origin: String,
    pub scheduler: SchedulerConfig,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub is_leader: bool,
}

/// 宿主机器人网关（出站消息下发与群成员数查询）。
#[derive(Clone)]
pub struct GatewayConfig {
    pub enabled: bool,
    pub mock: bool,
    pub base_url: String,
    pub api_token: String,
    pub timeout_secs: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("enable_file_logs", &self.enable_file_logs)
            .field("log_dir", &self.log_dir)
            .field("sled_path", &self.sled_path)
            .field("cors_origin", &self.cors_origin)
            .field("scheduler", &self.scheduler)
            .field("gateway", &self.gateway)
            .finish()
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("enabled", &self.enabled)
            .field("mock", &self.mock)
            .field("base_url", &self.base_url)
            .field("api_token", &"***REDACTED***")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 3900_u16),
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            sled_path: env_or("SLED_PATH", "./data/monitor.sled"),
            cors_origin: env_or("CORS_ORIGIN", "http://localhost:5173"),
            scheduler: SchedulerConfig {
                is_leader: env_or_bool("SCHEDULER_LEADER", true),
            },
            gateway: GatewayConfig {
                enabled: env_or_bool("GATEWAY_ENABLED", true),
                mock: env_or_bool("GATEWAY_MOCK", true),
                base_url: env_or("GATEWAY_BASE_URL", ""),
                api_token: env_or("GATEWAY_API_TOKEN", ""),
                timeout_secs: env_or_parse("GATEWAY_TIMEOUT_SECS", 10_u64),
            },
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, OnceLock};

    use super::*;

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn managed_keys() -> &'static [&'static str] {
        &[
            "HOST",
            "PORT",
            "RUST_LOG",
            "SCHEDULER_LEADER",
            "GATEWAY_ENABLED",
            "GATEWAY_MOCK",
            "GATEWAY_TIMEOUT_SECS",
        ]
    }

    fn clear_keys(keys: &[&str]) {
        for key in keys {
            env::remove_var(key);
        }
    }

    #[test]
    fn loads_defaults_when_missing() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        let cfg = Config::from_env();
        assert_eq!(cfg.port, 3900);
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.scheduler.is_leader);
        assert!(cfg.gateway.mock);
    }

    #[test]
    fn parses_numeric_values() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("PORT", "4000");
        env::set_var("GATEWAY_TIMEOUT_SECS", "42");

        let cfg = Config::from_env();
        assert_eq!(cfg.port, 4000);
        assert_eq!(cfg.gateway.timeout_secs, 42);
    }

    #[test]
    fn invalid_values_fall_back() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("PORT", "bad");
        env::set_var("GATEWAY_TIMEOUT_SECS", "x");

        let cfg = Config::from_env();
        assert_eq!(cfg.port, 3900);
        assert_eq!(cfg.gateway.timeout_secs, 10);
    }

    #[test]
    fn bool_flags_accept_common_spellings() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("SCHEDULER_LEADER", "off");
        env::set_var("GATEWAY_MOCK", "YES");

        let cfg = Config::from_env();
        assert!(!cfg.scheduler.is_leader);
        assert!(cfg.gateway.mock);
    }
}
