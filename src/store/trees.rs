pub const ACTIVITY: &str = "activity";
pub const PRESENCE: &str = "presence";
pub const GROUPS: &str = "groups";
pub const CONFIG_VERSIONS: &str = "config_versions";
