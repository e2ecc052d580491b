//! Reminder scheduling bridge — translates enabled reminders into
//! platform alarm registrations and re-arms them after restart.
//!
//! The platform's alarm/notification facility sits behind [`AlarmBackend`];
//! the bridge owns the policy: one alarm per fixed time entry (keyed by
//! reminder id + slot so each can be cancelled independently), one
//! repeating alarm per interval reminder, nothing for PRN. Updates never
//! diff: all alarms for a reminder are cancelled and recomputed from
//! scratch. Firing an alarm delivers a notification payload only — an
//! intake log is written solely when the user acts on it.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Medication, Reminder, ScheduleType};
use crate::store::ReminderStore;
use crate::validation::is_valid_time_hhmm;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("platform alarm call failed: {0}")]
    Platform(String),

    #[error("reminder {reminder_id} has no usable schedule: {reason}")]
    InvalidSchedule { reminder_id: Uuid, reason: String },
}

/// Identity of one platform alarm. `slot` is the index into `times` for
/// fixed schedules and 0 for interval schedules, so each fixed entry
/// fires and cancels independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct AlarmKey {
    pub reminder_id: Uuid,
    pub slot: u32,
}

/// How a registered alarm recurs after its first firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    Daily,
    EveryHours(u32),
}

/// What the delivered notification shows.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationPayload {
    pub medication_name: String,
    pub dose: f64,
    pub unit: String,
    pub time_label: String,
}

/// A concrete registration handed to the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmRequest {
    pub key: AlarmKey,
    /// Wall clock in the reminder's timezone.
    pub fire_at: NaiveDateTime,
    pub timezone: String,
    pub repeat: Repeat,
    pub payload: NotificationPayload,
}

/// Seam to the OS alarm/notification facility. Platform alarms do not
/// survive a reboot; the bridge re-registers through this trait at start.
pub trait AlarmBackend: Send {
    /// Register (or replace) the alarm for `request.key`.
    fn register(&mut self, request: &AlarmRequest) -> Result<(), ScheduleError>;

    /// Cancel every alarm keyed by this reminder id. Returns how many
    /// were live.
    fn cancel_reminder(&mut self, reminder_id: Uuid) -> Result<usize, ScheduleError>;
}

// ═══════════════════════════════════════════
// Bridge
// ═══════════════════════════════════════════

pub struct ReminderScheduler<B: AlarmBackend> {
    backend: B,
}

impl<B: AlarmBackend> ReminderScheduler<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Bring the platform in line with one reminder: cancel everything it
    /// holds, then register the current schedule if enabled. Returns the
    /// number of alarms registered.
    pub fn sync(
        &mut self,
        reminder: &Reminder,
        medication: &Medication,
        now: NaiveDateTime,
    ) -> Result<usize, ScheduleError> {
        let cancelled = self.backend.cancel_reminder(reminder.id)?;
        if cancelled > 0 {
            tracing::debug!(reminder = %reminder.id, cancelled, "cleared prior alarms");
        }
        if !reminder.enabled {
            return Ok(0);
        }

        let registered = match reminder.schedule_type {
            ScheduleType::FixedTimes => {
                let mut count = 0;
                for (slot, time) in reminder.times.iter().enumerate() {
                    let fire_at = next_fixed_occurrence(now, time).ok_or_else(|| {
                        ScheduleError::InvalidSchedule {
                            reminder_id: reminder.id,
                            reason: format!("bad time entry '{time}'"),
                        }
                    })?;
                    self.backend.register(&AlarmRequest {
                        key: AlarmKey {
                            reminder_id: reminder.id,
                            slot: slot as u32,
                        },
                        fire_at,
                        timezone: reminder.timezone.clone(),
                        repeat: Repeat::Daily,
                        payload: payload(medication, time.clone()),
                    })?;
                    count += 1;
                }
                count
            }
            ScheduleType::Interval => {
                let hours = reminder.interval_hours.ok_or_else(|| {
                    ScheduleError::InvalidSchedule {
                        reminder_id: reminder.id,
                        reason: "interval reminder without hours".to_string(),
                    }
                })?;
                self.backend.register(&AlarmRequest {
                    key: AlarmKey {
                        reminder_id: reminder.id,
                        slot: 0,
                    },
                    fire_at: now + Duration::hours(i64::from(hours)),
                    timezone: reminder.timezone.clone(),
                    repeat: Repeat::EveryHours(hours),
                    payload: payload(medication, format!("every {hours}h")),
                })?;
                1
            }
            ScheduleType::Prn => 0,
        };

        tracing::info!(
            reminder = %reminder.id,
            schedule = %reminder.schedule_type,
            registered,
            "alarms synced"
        );
        Ok(registered)
    }

    /// Drop every alarm for a deleted reminder.
    pub fn remove(&mut self, reminder_id: Uuid) -> Result<usize, ScheduleError> {
        self.backend.cancel_reminder(reminder_id)
    }

    /// Re-register all enabled reminders after a process or device
    /// restart. A reminder whose medication is gone (the non-atomic
    /// cascade gap) is skipped with a warning rather than failing the
    /// whole restore.
    pub fn restore(
        &mut self,
        store: &ReminderStore,
        now: NaiveDateTime,
    ) -> Result<usize, ScheduleError> {
        let mut total = 0;
        for reminder in store.enabled_reminders() {
            match store.medication(reminder.medication_id) {
                Some(medication) => total += self.sync(reminder, medication, now)?,
                None => {
                    tracing::warn!(
                        reminder = %reminder.id,
                        medication = %reminder.medication_id,
                        "orphaned reminder skipped during restore"
                    );
                }
            }
        }
        Ok(total)
    }
}

fn payload(medication: &Medication, time_label: String) -> NotificationPayload {
    NotificationPayload {
        medication_name: medication.name.clone(),
        dose: medication.dose,
        unit: medication.unit.clone(),
        time_label,
    }
}

/// Next occurrence of an `HH:MM` wall-clock time: today if still ahead of
/// `now`, else tomorrow. A time equal to `now` counts as passed.
pub fn next_fixed_occurrence(now: NaiveDateTime, time: &str) -> Option<NaiveDateTime> {
    if !is_valid_time_hhmm(time) {
        return None;
    }
    let t = NaiveTime::parse_from_str(time, "%H:%M").ok()?;
    if now.time() < t {
        Some(now.date().and_time(t))
    } else {
        Some(now.date().succ_opt()?.and_time(t))
    }
}

// ═══════════════════════════════════════════
// MemoryAlarmBackend — recording backend
// ═══════════════════════════════════════════

/// In-memory backend recording live registrations and cancellations.
/// Used by tests and by hosts without a platform alarm facility.
#[derive(Debug, Default)]
pub struct MemoryAlarmBackend {
    alarms: Vec<AlarmRequest>,
    cancelled_total: usize,
}

impl MemoryAlarmBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alarms(&self) -> &[AlarmRequest] {
        &self.alarms
    }

    pub fn alarms_for(&self, reminder_id: Uuid) -> Vec<&AlarmRequest> {
        self.alarms
            .iter()
            .filter(|a| a.key.reminder_id == reminder_id)
            .collect()
    }

    /// Running count of cancelled registrations.
    pub fn cancelled_total(&self) -> usize {
        self.cancelled_total
    }
}

impl AlarmBackend for MemoryAlarmBackend {
    fn register(&mut self, request: &AlarmRequest) -> Result<(), ScheduleError> {
        self.alarms.retain(|a| a.key != request.key);
        self.alarms.push(request.clone());
        Ok(())
    }

    fn cancel_reminder(&mut self, reminder_id: Uuid) -> Result<usize, ScheduleError> {
        let before = self.alarms.len();
        self.alarms.retain(|a| a.key.reminder_id != reminder_id);
        let cancelled = before - self.alarms.len();
        self.cancelled_total += cancelled;
        Ok(cancelled)
    }
}
