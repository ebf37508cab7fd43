// MIT License - Copyright (c) 2026 Peter Wright
// Outbound command catalogue

use crate::topic::Category;

/// How the user code is combined with a command value.
///
/// The firmware is not consistent across command families, so each command
/// keeps the form its family has always used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeFormat {
    /// `{code}{value}`
    Concatenated,
    /// `{code}/{value}`
    Slashed,
}

impl CodeFormat {
    pub fn apply(&self, code: &str, value: &str) -> String {
        match self {
            Self::Concatenated => format!("{code}{value}"),
            Self::Slashed => format!("{code}/{value}"),
        }
    }
}

/// Commands that can be sent to the panel.
///
/// All commands are fire-and-forget: the panel never acknowledges them, and
/// the only evidence of success is a later state update for the same ID.
///
/// | Command | Subtopic | Value | Retained |
/// |---|---|---|---|
/// | `Arm` | `partitions/{id}/set_arm` | `1` | no |
/// | `ArmNight` | `partitions/{id}/set_arm` | `2` | no |
/// | `Disarm` | `partitions/{id}/set_disarm` | `0` | no |
/// | `Block` | `inputs/{id}/block_set` | `1` / `0` | yes |
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Full arm of a partition.
    Arm { partition: String },
    /// Night arm of a partition.
    ArmNight { partition: String },
    /// Disarm a partition.
    Disarm { partition: String },
    /// Block (`true`) or unblock (`false`) an input line. Retained so the
    /// block state survives broker reconnects.
    Block { input: String, blocked: bool },
}

impl Command {
    /// Category of the entity the command targets.
    pub fn category(&self) -> Category {
        match self {
            Self::Arm { .. } | Self::ArmNight { .. } | Self::Disarm { .. } => Category::Partitions,
            Self::Block { .. } => Category::Inputs,
        }
    }

    /// ID of the entity the command targets.
    pub fn target(&self) -> &str {
        match self {
            Self::Arm { partition } | Self::ArmNight { partition } | Self::Disarm { partition } => {
                partition
            }
            Self::Block { input, .. } => input,
        }
    }

    /// Last topic segment.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Arm { .. } | Self::ArmNight { .. } => "set_arm",
            Self::Disarm { .. } => "set_disarm",
            Self::Block { .. } => "block_set",
        }
    }

    /// Namespace-relative topic, e.g. `partitions/1/set_arm`.
    pub fn subtopic(&self) -> String {
        format!("{}/{}/{}", self.category(), self.target(), self.action())
    }

    /// Command value before the user code is applied.
    pub fn value(&self) -> &'static str {
        match self {
            Self::Arm { .. } => "1",
            Self::ArmNight { .. } => "2",
            Self::Disarm { .. } => "0",
            Self::Block { blocked: true, .. } => "1",
            Self::Block { blocked: false, .. } => "0",
        }
    }

    pub fn retain(&self) -> bool {
        matches!(self, Self::Block { .. })
    }

    pub fn code_format(&self) -> CodeFormat {
        match self {
            Self::Block { .. } => CodeFormat::Concatenated,
            _ => CodeFormat::Slashed,
        }
    }

    /// Wire payload authorized with `code`.
    pub fn payload(&self, code: &str) -> String {
        self.code_format().apply(code, self.value())
    }

    /// Field the panel will eventually report back, with the value it
    /// should carry once the command took effect.
    pub fn expected_field(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::Block { .. } => Some(("block", self.value())),
            _ => None,
        }
    }
}
