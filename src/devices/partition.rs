// MIT License - Copyright (c) 2026 Peter Wright
// Partition readers

use std::fmt;

use super::{safe_bool, safe_int};
use crate::store::FieldMap;

/// Partition state reported in the `status` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionState {
    Disarmed,
    Armed,
    ArmedNight,
    EntryTime,
    ExitTime,
    AlarmIntruder,
    AlarmFire,
    AlarmGas,
    AlarmCo,
    AlarmMedical,
    AlarmDefined,
    AlarmSabotageTamper,
    AlarmFlood,
    AlarmTemperature,
    EntryTimeNight,
    ExitTimeNight,
    AlarmPanic,
    AlarmHoldup,
    AlarmSabotageZone,
    AlarmInMemory,
    Unknown,
}

const PARTITION_STATE_CODES: [(i64, PartitionState); 20] = [
    (0, PartitionState::Disarmed),
    (1, PartitionState::Armed),
    (2, PartitionState::ArmedNight),
    (3, PartitionState::EntryTime),
    (4, PartitionState::ExitTime),
    (5, PartitionState::AlarmIntruder),
    (6, PartitionState::AlarmFire),
    (7, PartitionState::AlarmGas),
    (8, PartitionState::AlarmCo),
    (9, PartitionState::AlarmMedical),
    (10, PartitionState::AlarmDefined),
    (11, PartitionState::AlarmSabotageTamper),
    (12, PartitionState::AlarmFlood),
    (13, PartitionState::AlarmTemperature),
    (14, PartitionState::EntryTimeNight),
    (15, PartitionState::ExitTimeNight),
    (16, PartitionState::AlarmPanic),
    (17, PartitionState::AlarmHoldup),
    (18, PartitionState::AlarmSabotageZone),
    (19, PartitionState::AlarmInMemory),
];

impl PartitionState {
    pub fn from_code(code: i64) -> Self {
        PARTITION_STATE_CODES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, state)| *state)
            .unwrap_or(Self::Unknown)
    }

    /// Wire code, `-1` for `Unknown`.
    pub fn code(&self) -> i64 {
        PARTITION_STATE_CODES
            .iter()
            .find(|(_, state)| state == self)
            .map(|(c, _)| *c)
            .unwrap_or(-1)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Disarmed => "Disarmed",
            Self::Armed => "Armed",
            Self::ArmedNight => "Armed (night)",
            Self::EntryTime => "Entry time",
            Self::ExitTime => "Exit time",
            Self::AlarmIntruder => "Intruder alarm",
            Self::AlarmFire => "Fire alarm",
            Self::AlarmGas => "Gas alarm",
            Self::AlarmCo => "CO alarm",
            Self::AlarmMedical => "Medical alarm",
            Self::AlarmDefined => "User-defined alarm",
            Self::AlarmSabotageTamper => "Sabotage / tamper",
            Self::AlarmFlood => "Flood alarm",
            Self::AlarmTemperature => "Temperature alarm",
            Self::EntryTimeNight => "Entry time (night)",
            Self::ExitTimeNight => "Exit time (night)",
            Self::AlarmPanic => "Panic alarm",
            Self::AlarmHoldup => "Hold-up alarm",
            Self::AlarmSabotageZone => "Zone sabotage",
            Self::AlarmInMemory => "Alarm in memory",
            Self::Unknown => "Unknown",
        }
    }

    /// Collapse into the coarse states an alarm-panel UI shows.
    pub fn panel_state(&self) -> AlarmPanelState {
        match self {
            Self::Disarmed => AlarmPanelState::Disarmed,
            Self::Armed => AlarmPanelState::ArmedAway,
            Self::ArmedNight => AlarmPanelState::ArmedNight,
            Self::ExitTime | Self::ExitTimeNight => AlarmPanelState::Arming,
            _ => AlarmPanelState::Pending,
        }
    }
}

impl fmt::Display for PartitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Coarse alarm-panel state of a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlarmPanelState {
    Disarmed,
    ArmedAway,
    ArmedNight,
    /// Entry delay running, alarms, and unrecognized states
    Pending,
    /// Exit delay running
    Arming,
}

/// Snapshot of one partition's fields with lenient accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionView {
    pub id: String,
    pub fields: FieldMap,
}

impl PartitionView {
    pub fn new(id: impl Into<String>, fields: FieldMap) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn is_unknown(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn state(&self) -> PartitionState {
        PartitionState::from_code(safe_int(self.get("status")))
    }

    pub fn panel_state(&self) -> AlarmPanelState {
        self.state().panel_state()
    }

    /// Exit delay in seconds.
    pub fn exit_time(&self) -> i64 { safe_int(self.get("exit_time")) }
    pub fn is_ready(&self) -> bool { safe_bool(self.get("ready")) }

    /// Night mode advertised. Panels send `true`/`false` text here, so the
    /// text `true` reads as true alongside non-zero integers; a plain
    /// integer read would report `true` as 0.
    pub fn night_mode(&self) -> bool { safe_bool(self.get("night_mode")) }

    /// Partition in use. Same text handling as [`night_mode`](Self::night_mode).
    pub fn is_active(&self) -> bool { safe_bool(self.get("active")) }

    pub fn is_armed(&self) -> bool { self.state() != PartitionState::Disarmed }
    pub fn is_armed_night(&self) -> bool { self.state() == PartitionState::ArmedNight }

    /// Whether an arm command makes sense right now.
    pub fn can_arm(&self) -> bool {
        self.is_ready()
    }

    /// Night arming additionally needs the partition to advertise night
    /// mode with a literal `true`.
    pub fn can_arm_night(&self) -> bool {
        self.is_ready() && self.get("night_mode") == Some("true")
    }

    /// Whether the partition is usable from an alarm panel at all.
    pub fn panel_available(&self) -> bool {
        self.is_ready()
            && self
                .get("active")
                .is_some_and(|v| v.to_ascii_lowercase().starts_with("true"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(pairs: &[(&str, &str)]) -> PartitionView {
        let fields = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PartitionView::new("1", fields)
    }

    #[test]
    fn test_partition_state_codes() {
        assert_eq!(PartitionState::from_code(0), PartitionState::Disarmed);
        assert_eq!(PartitionState::from_code(2), PartitionState::ArmedNight);
        assert_eq!(PartitionState::from_code(19), PartitionState::AlarmInMemory);
        assert_eq!(PartitionState::from_code(20), PartitionState::Unknown);
        assert_eq!(PartitionState::from_code(-1), PartitionState::Unknown);
        for code in 0..20 {
            assert_eq!(PartitionState::from_code(code).code(), code);
        }
        assert_eq!(PartitionState::Unknown.code(), -1);
    }

    #[test]
    fn test_panel_state_mapping() {
        assert_eq!(PartitionState::Disarmed.panel_state(), AlarmPanelState::Disarmed);
        assert_eq!(PartitionState::Armed.panel_state(), AlarmPanelState::ArmedAway);
        assert_eq!(PartitionState::ArmedNight.panel_state(), AlarmPanelState::ArmedNight);
        assert_eq!(PartitionState::EntryTime.panel_state(), AlarmPanelState::Pending);
        assert_eq!(PartitionState::EntryTimeNight.panel_state(), AlarmPanelState::Pending);
        assert_eq!(PartitionState::ExitTime.panel_state(), AlarmPanelState::Arming);
        assert_eq!(PartitionState::ExitTimeNight.panel_state(), AlarmPanelState::Arming);
        assert_eq!(PartitionState::AlarmFire.panel_state(), AlarmPanelState::Pending);
        assert_eq!(PartitionState::Unknown.panel_state(), AlarmPanelState::Pending);
    }

    #[test]
    fn test_partition_view_reads() {
        let part = view(&[
            ("status", "2"),
            ("ready", "1"),
            ("night_mode", "true"),
            ("active", "True"),
            ("exit_time", "30"),
        ]);
        assert_eq!(part.state(), PartitionState::ArmedNight);
        assert!(part.is_armed());
        assert!(part.is_armed_night());
        assert!(part.is_ready());
        assert!(part.night_mode());
        assert!(part.is_active());
        assert_eq!(part.exit_time(), 30);
        assert!(part.can_arm());
        assert!(part.can_arm_night());
        assert!(part.panel_available());
    }

    #[test]
    fn test_night_arm_needs_literal_true() {
        let part = view(&[("ready", "1"), ("night_mode", "1")]);
        assert!(part.night_mode());
        assert!(!part.can_arm_night());
    }

    #[test]
    fn test_text_booleans_read_as_true() {
        let part = view(&[("night_mode", "true"), ("active", "TRUE")]);
        assert!(part.night_mode());
        assert!(part.is_active());

        let part = view(&[("night_mode", "false"), ("active", "0")]);
        assert!(!part.night_mode());
        assert!(!part.is_active());
    }

    #[test]
    fn test_unknown_partition_defaults() {
        let part = PartitionView::new("9", FieldMap::new());
        assert!(part.is_unknown());
        // A missing status reads as 0, i.e. disarmed
        assert_eq!(part.state(), PartitionState::Disarmed);
        assert!(!part.is_armed());
        assert!(!part.can_arm());
        assert!(!part.panel_available());
    }

    #[test]
    fn test_not_ready_blocks_everything() {
        let part = view(&[("ready", "0"), ("night_mode", "true"), ("active", "true")]);
        assert!(!part.can_arm());
        assert!(!part.can_arm_night());
        assert!(!part.panel_available());
    }
}
