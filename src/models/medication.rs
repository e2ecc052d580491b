use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A medication tracked by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    /// Dose amount, always positive. Paired with `unit` ("mg", "ml", ...).
    pub dose: f64,
    pub unit: String,
    pub instructions: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a medication.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMedication {
    pub user_id: Uuid,
    pub name: String,
    pub dose: f64,
    pub unit: String,
    pub instructions: Option<String>,
}

/// Per-field medication update. Unset field = no change; for
/// `instructions`, `Some(None)` clears the field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MedicationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dose: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<Option<String>>,
}

/// How a reminder schedules its alarms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleType {
    /// Fires at one or more specific clock times daily.
    FixedTimes,
    /// Fires repeatedly every N hours.
    Interval,
    /// "As needed" — no automatic schedule.
    Prn,
}

impl std::fmt::Display for ScheduleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FixedTimes => write!(f, "fixed times"),
            Self::Interval => write!(f, "interval"),
            Self::Prn => write!(f, "as needed"),
        }
    }
}

/// A scheduled reminder for one medication.
///
/// Invariants (enforced at creation and update):
/// - `FixedTimes` has a non-empty `times` list of `HH:MM` 24-hour entries.
/// - `Interval` has `interval_hours >= 1`.
/// - `medication_id` references an existing medication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub medication_id: Uuid,
    pub schedule_type: ScheduleType,
    /// Ordered `HH:MM` wall-clock entries; empty unless `FixedTimes`.
    #[serde(default)]
    pub times: Vec<String>,
    pub interval_hours: Option<u32>,
    /// IANA zone name the wall-clock times are anchored to.
    pub timezone: String,
    /// Disabled reminders keep their record but hold no live alarms.
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a reminder.
#[derive(Debug, Clone, Deserialize)]
pub struct NewReminder {
    pub user_id: Uuid,
    pub medication_id: Uuid,
    pub schedule_type: ScheduleType,
    #[serde(default)]
    pub times: Vec<String>,
    pub interval_hours: Option<u32>,
    pub timezone: String,
}

/// Per-field reminder update. Unset field = no change.
/// The resulting schedule is re-validated as a whole.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReminderPatch {
    pub schedule_type: Option<ScheduleType>,
    pub times: Option<Vec<String>>,
    pub interval_hours: Option<Option<u32>>,
    pub timezone: Option<String>,
}

/// Outcome recorded when the user acts on a reminder notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Taken,
    Skipped,
    Missed,
}

/// Append-only intake audit entry. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub reminder_id: Uuid,
    pub status: LogStatus,
    pub taken_at: DateTime<Utc>,
    pub note: Option<String>,
}
