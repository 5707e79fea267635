//! Alarm collection.
//!
//! The process core only raises alarms; where they go is decided by an
//! [`AlarmSink`]. [`AlarmManager`] is the in-memory sink used by the
//! controller: an active list keyed by code plus a bounded history.

use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error, warn};
use vd_protocol::alarm_models::{AlarmRecord, AlarmSeverity};

/// Default number of records kept in the history.
pub const DEFAULT_HISTORY_LIMIT: usize = 10_000;

/// Receiver of raised alarms.
pub trait AlarmSink: Send + Sync {
    fn raise(&self, code: i32, message: &str, severity: AlarmSeverity, source: &str);
}

#[derive(Debug, Default)]
struct Alarms {
    active: Vec<AlarmRecord>,
    history: VecDeque<AlarmRecord>,
}

/// In-memory alarm list.
///
/// Raising a code that is already active refreshes its message instead of
/// adding a second entry. Every raise is appended to the history.
#[derive(Debug)]
pub struct AlarmManager {
    alarms: Mutex<Alarms>,
    history_limit: usize,
}

impl Default for AlarmManager {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl AlarmManager {
    pub fn new(history_limit: usize) -> Self {
        Self {
            alarms: Mutex::new(Alarms::default()),
            history_limit,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Alarms> {
        self.alarms.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn active(&self) -> Vec<AlarmRecord> {
        self.lock().active.clone()
    }

    /// History, oldest first.
    pub fn history(&self) -> Vec<AlarmRecord> {
        self.lock().history.iter().cloned().collect()
    }

    pub fn has_active(&self) -> bool {
        !self.lock().active.is_empty()
    }

    pub fn has_critical(&self) -> bool {
        self.lock()
            .active
            .iter()
            .any(|alarm| alarm.severity == AlarmSeverity::Critical)
    }

    /// True if any active alarm is at least an error.
    pub fn has_error(&self) -> bool {
        self.lock()
            .active
            .iter()
            .any(|alarm| alarm.severity >= AlarmSeverity::Error)
    }

    /// Returns false if `code` is not active.
    pub fn acknowledge(&self, code: i32) -> bool {
        let mut alarms = self.lock();
        match alarms.active.iter_mut().find(|alarm| alarm.code == code) {
            Some(alarm) => {
                alarm.acknowledged_at.get_or_insert_with(Utc::now);
                true
            }
            None => false,
        }
    }

    pub fn acknowledge_all(&self) {
        let now = Utc::now();
        for alarm in self.lock().active.iter_mut() {
            alarm.acknowledged_at.get_or_insert(now);
        }
    }

    /// Remove `code` from the active list. Returns false if it was not active.
    pub fn clear(&self, code: i32) -> bool {
        let mut alarms = self.lock();
        let Some(index) = alarms.active.iter().position(|alarm| alarm.code == code) else {
            return false;
        };
        let mut alarm = alarms.active.remove(index);
        alarm.cleared_at = Some(Utc::now());
        debug!(code, "alarm cleared");
        Self::record(&mut alarms.history, alarm, self.history_limit);
        true
    }

    pub fn clear_all(&self) {
        let mut alarms = self.lock();
        let now = Utc::now();
        let cleared: Vec<_> = alarms.active.drain(..).collect();
        for mut alarm in cleared {
            alarm.cleared_at = Some(now);
            Self::record(&mut alarms.history, alarm, self.history_limit);
        }
    }

    fn record(history: &mut VecDeque<AlarmRecord>, alarm: AlarmRecord, limit: usize) {
        history.push_back(alarm);
        while history.len() > limit {
            history.pop_front();
        }
    }
}

impl AlarmSink for AlarmManager {
    fn raise(&self, code: i32, message: &str, severity: AlarmSeverity, source: &str) {
        match severity {
            AlarmSeverity::Critical | AlarmSeverity::Error => {
                error!(code, %message, ?severity, %source, "alarm raised")
            }
            _ => warn!(code, %message, ?severity, %source, "alarm raised"),
        }

        let record = AlarmRecord::new(code, message, severity, source);
        let mut alarms = self.lock();
        match alarms.active.iter_mut().find(|alarm| alarm.code == code) {
            Some(existing) => {
                existing.message = record.message.clone();
                existing.severity = severity;
                existing.source = record.source.clone();
                existing.occurred_at = record.occurred_at;
                existing.acknowledged_at = None;
            }
            None => alarms.active.push(record.clone()),
        }
        Self::record(&mut alarms.history, record, self.history_limit);
    }
}
