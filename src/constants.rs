/// 默认每日报告推送时间
pub const DEFAULT_PUSH_TIME: &str = "09:00";

/// 默认每日报告模板
pub const DEFAULT_MESSAGE_TEMPLATE: &str =
    "📊 今日群聊报告\n在线人数: {online_count}\n昨日活跃: {active_count}\n活跃成员: {active_members}";

/// 默认活跃度统计时间窗口（小时）
pub const DEFAULT_WINDOW_HOURS: u32 = 24;

/// 默认活跃用户最低消息数
pub const DEFAULT_MIN_ACTIVE_MESSAGES: u64 = 3;

/// 默认活跃记录保留天数
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// "在线" 判定窗口：最近 N 分钟内发过消息
pub const ONLINE_WINDOW_MINUTES: i64 = 10;

/// 每日报告中列出的活跃成员数量上限
pub const REPORT_TOP_MEMBERS: usize = 3;

/// 单个群组消息下发超时（秒）
pub const DISPATCH_TIMEOUT_SECS: u64 = 10;

/// 群组 / 用户标识符最大长度
pub const MAX_ID_LENGTH: usize = 64;
