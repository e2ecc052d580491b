//! Local reminder store — medications, their reminders, and the intake
//! log, persisted whole after every mutation.
//!
//! Deleting a medication cascades to its reminders; deleting a reminder
//! prunes its logs. The cascade is two separate persisted writes of the
//! same document, not a transaction — a crash between them can leave a
//! log entry referencing a missing reminder. Known gap, kept as-is.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{load_document, persist_document, DocumentStorage, StoreError, REMINDER_DOC};
use crate::models::{
    LogStatus, Medication, MedicationPatch, NewMedication, NewReminder, Reminder, ReminderLog,
    ReminderPatch, ScheduleType,
};
use crate::validation::is_valid_time_hhmm;

/// Validation failures for medication/reminder input. Returned as values
/// for inline display, never thrown past the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReminderError {
    #[error("medication name must not be blank")]
    BlankName,

    #[error("dose must be positive")]
    NonPositiveDose,

    #[error("no medication with id {0}")]
    UnknownMedication(Uuid),

    #[error("no reminder with id {0}")]
    UnknownReminder(Uuid),

    #[error("a fixed-times reminder needs at least one time entry")]
    EmptyTimes,

    #[error("invalid time entry '{0}', expected HH:MM")]
    InvalidTime(String),

    #[error("interval hours must be at least 1")]
    InvalidInterval,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct ReminderState {
    medications: Vec<Medication>,
    reminders: Vec<Reminder>,
    logs: Vec<ReminderLog>,
}

/// State-owner for on-device medication and reminder data.
pub struct ReminderStore {
    state: ReminderState,
    storage: Box<dyn DocumentStorage>,
}

impl ReminderStore {
    /// Load persisted reminder state, or start empty when none exists.
    pub fn load(storage: Box<dyn DocumentStorage>) -> Result<Self, StoreError> {
        let state = load_document(storage.as_ref(), REMINDER_DOC)?.unwrap_or_default();
        Ok(Self { state, storage })
    }

    // ── Medications ─────────────────────────────────────────

    pub fn add_medication(&mut self, input: NewMedication) -> Result<Medication, ReminderError> {
        if input.name.trim().is_empty() {
            return Err(ReminderError::BlankName);
        }
        if !(input.dose > 0.0) {
            return Err(ReminderError::NonPositiveDose);
        }

        let medication = Medication {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            name: input.name.trim().to_string(),
            dose: input.dose,
            unit: input.unit,
            instructions: input.instructions,
            created_at: Utc::now(),
        };
        self.state.medications.push(medication.clone());
        self.persist();
        Ok(medication)
    }

    pub fn update_medication(
        &mut self,
        id: Uuid,
        patch: MedicationPatch,
    ) -> Result<Medication, ReminderError> {
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(ReminderError::BlankName);
            }
        }
        if let Some(dose) = patch.dose {
            if !(dose > 0.0) {
                return Err(ReminderError::NonPositiveDose);
            }
        }

        let medication = self
            .state
            .medications
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(ReminderError::UnknownMedication(id))?;

        if let Some(name) = patch.name {
            medication.name = name.trim().to_string();
        }
        if let Some(dose) = patch.dose {
            medication.dose = dose;
        }
        if let Some(unit) = patch.unit {
            medication.unit = unit;
        }
        if let Some(instructions) = patch.instructions {
            medication.instructions = instructions;
        }

        let updated = medication.clone();
        self.persist();
        Ok(updated)
    }

    /// Remove a medication and every reminder referencing it. Returns
    /// false when the id is unknown. Cascades one level only: logs of the
    /// removed reminders are left in place.
    pub fn delete_medication(&mut self, id: Uuid) -> bool {
        let before = self.state.medications.len();
        self.state.medications.retain(|m| m.id != id);
        if self.state.medications.len() == before {
            return false;
        }
        self.state.reminders.retain(|r| r.medication_id != id);
        self.persist();
        true
    }

    pub fn medication(&self, id: Uuid) -> Option<&Medication> {
        self.state.medications.iter().find(|m| m.id == id)
    }

    pub fn medications(&self) -> &[Medication] {
        &self.state.medications
    }

    // ── Reminders ───────────────────────────────────────────

    pub fn add_reminder(&mut self, input: NewReminder) -> Result<Reminder, ReminderError> {
        if self.medication(input.medication_id).is_none() {
            return Err(ReminderError::UnknownMedication(input.medication_id));
        }
        validate_schedule(input.schedule_type, &input.times, input.interval_hours)?;

        let reminder = Reminder {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            medication_id: input.medication_id,
            schedule_type: input.schedule_type,
            times: match input.schedule_type {
                ScheduleType::FixedTimes => input.times,
                _ => Vec::new(),
            },
            interval_hours: match input.schedule_type {
                ScheduleType::Interval => input.interval_hours,
                _ => None,
            },
            timezone: input.timezone,
            enabled: true,
            created_at: Utc::now(),
        };
        self.state.reminders.push(reminder.clone());
        self.persist();
        Ok(reminder)
    }

    /// Merge patch fields and re-validate the resulting schedule whole.
    pub fn update_reminder(
        &mut self,
        id: Uuid,
        patch: ReminderPatch,
    ) -> Result<Reminder, ReminderError> {
        let idx = self
            .state
            .reminders
            .iter()
            .position(|r| r.id == id)
            .ok_or(ReminderError::UnknownReminder(id))?;

        let current = &self.state.reminders[idx];
        let schedule_type = patch.schedule_type.unwrap_or(current.schedule_type);
        let times = patch.times.unwrap_or_else(|| current.times.clone());
        let interval_hours = patch.interval_hours.unwrap_or(current.interval_hours);
        validate_schedule(schedule_type, &times, interval_hours)?;

        let reminder = &mut self.state.reminders[idx];
        reminder.schedule_type = schedule_type;
        reminder.times = match schedule_type {
            ScheduleType::FixedTimes => times,
            _ => Vec::new(),
        };
        reminder.interval_hours = match schedule_type {
            ScheduleType::Interval => interval_hours,
            _ => None,
        };
        if let Some(timezone) = patch.timezone {
            reminder.timezone = timezone;
        }

        let updated = reminder.clone();
        self.persist();
        Ok(updated)
    }

    /// Remove a reminder and prune its logs. Returns false when unknown.
    pub fn delete_reminder(&mut self, id: Uuid) -> bool {
        let before = self.state.reminders.len();
        self.state.reminders.retain(|r| r.id != id);
        if self.state.reminders.len() == before {
            return false;
        }
        self.state.logs.retain(|l| l.reminder_id != id);
        self.persist();
        true
    }

    /// Flip only the enabled flag; the record stays intact either way.
    pub fn toggle_reminder(&mut self, id: Uuid, enabled: bool) -> Option<Reminder> {
        let reminder = self.state.reminders.iter_mut().find(|r| r.id == id)?;
        reminder.enabled = enabled;
        let updated = reminder.clone();
        self.persist();
        Some(updated)
    }

    pub fn reminder(&self, id: Uuid) -> Option<&Reminder> {
        self.state.reminders.iter().find(|r| r.id == id)
    }

    pub fn reminders(&self) -> &[Reminder] {
        &self.state.reminders
    }

    pub fn reminders_for(&self, medication_id: Uuid) -> Vec<&Reminder> {
        self.state
            .reminders
            .iter()
            .filter(|r| r.medication_id == medication_id)
            .collect()
    }

    pub fn enabled_reminders(&self) -> Vec<&Reminder> {
        self.state.reminders.iter().filter(|r| r.enabled).collect()
    }

    // ── Intake log ──────────────────────────────────────────

    /// Append an audit entry for a user acting on a notification.
    pub fn record_intake(
        &mut self,
        reminder_id: Uuid,
        status: LogStatus,
        note: Option<String>,
    ) -> Result<ReminderLog, ReminderError> {
        let reminder = self
            .reminder(reminder_id)
            .ok_or(ReminderError::UnknownReminder(reminder_id))?;

        let log = ReminderLog {
            id: Uuid::new_v4(),
            user_id: reminder.user_id,
            reminder_id,
            status,
            taken_at: Utc::now(),
            note,
        };
        self.state.logs.push(log.clone());
        self.persist();
        Ok(log)
    }

    pub fn logs_for(&self, reminder_id: Uuid) -> Vec<&ReminderLog> {
        self.state
            .logs
            .iter()
            .filter(|l| l.reminder_id == reminder_id)
            .collect()
    }

    pub fn logs(&self) -> &[ReminderLog] {
        &self.state.logs
    }

    fn persist(&self) {
        persist_document(self.storage.as_ref(), REMINDER_DOC, &self.state);
    }
}

/// Schedule invariants: fixed times need a non-empty `HH:MM` list, an
/// interval needs at least one hour, PRN carries no schedule at all.
fn validate_schedule(
    schedule_type: ScheduleType,
    times: &[String],
    interval_hours: Option<u32>,
) -> Result<(), ReminderError> {
    match schedule_type {
        ScheduleType::FixedTimes => {
            if times.is_empty() {
                return Err(ReminderError::EmptyTimes);
            }
            for time in times {
                if !is_valid_time_hhmm(time) {
                    return Err(ReminderError::InvalidTime(time.clone()));
                }
            }
            Ok(())
        }
        ScheduleType::Interval => match interval_hours {
            Some(h) if h >= 1 => Ok(()),
            _ => Err(ReminderError::InvalidInterval),
        },
        ScheduleType::Prn => Ok(()),
    }
}
