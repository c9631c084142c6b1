use chrono::{DateTime, SecondsFormat, Utc};

/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Current time as a fixed-width ISO-8601 UTC string (`2026-01-02T03:04:05.678Z`).
///
/// Fixed millisecond precision keeps lexicographic order equal to temporal
/// order, which the store relies on when sorting by `updatedAt`/`createdAt`.
pub fn now_iso() -> String {
    format_iso(Utc::now())
}

/// Format a UTC instant the same way [`now_iso`] does.
pub fn format_iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an ISO-8601 timestamp; `None` for empty or malformed input.
pub fn parse_iso(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Local wall-clock `HH:MM` (display only)
pub fn local_hhmm() -> String {
    chrono::Local::now().format("%H:%M").to_string()
}

/// Generate a client-side id: `{prefix}_{millis}_{random hex}`.
///
/// Time component plus 64 random bits; collision-free at walk-up stand scale
/// even when several editors create recipes offline at the same millisecond.
pub fn client_id(prefix: &str) -> String {
    use rand::Rng;
    let rand_bits: u64 = rand::thread_rng().r#gen();
    format!("{}_{}_{:x}", prefix, now_millis(), rand_bits)
}
