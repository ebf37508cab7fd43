// MIT License - Copyright (c) 2026 Peter Wright
// Typed readers over raw entity fields

pub mod input;
pub mod partition;

pub use input::{InputView, LineStatus};
pub use partition::{AlarmPanelState, PartitionState, PartitionView};

/// Lenient integer read: absent, blank or unparsable values become 0.
pub fn safe_int(value: Option<&str>) -> i64 {
    value
        .map(str::trim)
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(0)
}

/// Lenient boolean read: non-zero integers and `true` (any case) are true,
/// everything else is false.
pub fn safe_bool(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        Some(s) if s.eq_ignore_ascii_case("true") => true,
        other => safe_int(other) != 0,
    }
}
