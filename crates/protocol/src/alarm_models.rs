//! Alarm models and the fixed alarm code table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Alarm codes raised by the vacuum stages.
pub mod codes {
    /// Rough vacuum did not reach its target pressure in time.
    pub const ROUGH_VACUUM_TIMEOUT: i32 = -110401;

    /// Base for the fine-vacuum stage timeouts: stage `k` raises `BASE - k`.
    pub const FINE_VACUUM_TIMEOUT_BASE: i32 = -110403;

    /// Vacuum break did not bring the chamber back near atmosphere in time.
    pub const VACUUM_BREAK_TIMEOUT: i32 = -110503;

    /// Codes strictly below this value are critical.
    pub const CRITICAL_THRESHOLD: i32 = -110500;

    /// Timeout alarm code for fine-vacuum stage `number` (1-based).
    pub fn fine_vacuum_timeout(number: usize) -> i32 {
        FINE_VACUUM_TIMEOUT_BASE - number as i32
    }
}

/// Alarm severity.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmSeverity {
    /// Informational notice.
    Info,
    /// The machine may keep running.
    Warning,
    /// Operator intervention required.
    Error,
    /// Stop the machine immediately.
    Critical,
}

impl AlarmSeverity {
    /// Severity of a process alarm code.
    ///
    /// Codes below [`codes::CRITICAL_THRESHOLD`] are critical, all others are errors.
    pub fn classify(code: i32) -> Self {
        if code < codes::CRITICAL_THRESHOLD {
            AlarmSeverity::Critical
        } else {
            AlarmSeverity::Error
        }
    }
}

/// One raised alarm.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct AlarmRecord {
    pub code: i32,
    pub message: String,
    pub severity: AlarmSeverity,

    /// State label of the process when the alarm was raised.
    pub source: String,

    #[ts(type = "string")]
    pub occurred_at: DateTime<Utc>,

    #[ts(type = "string | null")]
    pub acknowledged_at: Option<DateTime<Utc>>,

    #[ts(type = "string | null")]
    pub cleared_at: Option<DateTime<Utc>>,
}

impl AlarmRecord {
    /// Create a fresh, active, unacknowledged alarm.
    pub fn new(code: i32, message: impl Into<String>, severity: AlarmSeverity, source: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            severity,
            source: source.into(),
            occurred_at: Utc::now(),
            acknowledged_at: None,
            cleared_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.cleared_at.is_none()
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged_at.is_some()
    }
}
