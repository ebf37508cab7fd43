// MIT License - Copyright (c) 2026 Peter Wright
// Alarm input (line) readers

use std::fmt;

use super::{safe_bool, safe_int};
use crate::store::FieldMap;

/// Line state reported in the `status` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineStatus {
    /// 0, or anything unrecognized
    Unknown,
    /// 1 - Closed
    Closed,
    /// 2 - Open (violated)
    Open,
    /// 3 - Tamper
    Tamper,
    /// 4 - Fault
    Fault,
}

impl LineStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Closed,
            2 => Self::Open,
            3 => Self::Tamper,
            4 => Self::Fault,
            _ => Self::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Closed => "Closed",
            Self::Open => "Open",
            Self::Tamper => "Tamper",
            Self::Fault => "Fault",
        }
    }
}

impl fmt::Display for LineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Snapshot of one input's fields with lenient accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputView {
    pub id: String,
    pub fields: FieldMap,
}

impl InputView {
    pub fn new(id: impl Into<String>, fields: FieldMap) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// No field has arrived for this input yet.
    pub fn is_unknown(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn status(&self) -> LineStatus {
        LineStatus::from_code(safe_int(self.get("status")))
    }

    pub fn is_blocked(&self) -> bool { safe_bool(self.get("block")) }
    pub fn block_available(&self) -> bool { safe_bool(self.get("block_enable")) }
    pub fn is_open(&self) -> bool { self.status() == LineStatus::Open }
    pub fn is_tamper(&self) -> bool { self.status() == LineStatus::Tamper }
    pub fn is_fault(&self) -> bool { self.status() == LineStatus::Fault }
}
