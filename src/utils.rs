use chrono::{DateTime, Utc};
use uuid::Uuid;

pub fn current_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// 生成一个随机唯一 ID，作为卷标识
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}

/// 秒级时间戳转成可读的 UTC 时间
pub fn format_timestamp(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("@{secs}"))
}
