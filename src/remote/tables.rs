//! Table-style resource access to the backend's REST row surface, plus
//! the entity services built on it.
//!
//! Rows live in the backend and are the source of truth; everything a
//! caller holds locally is a read-through projection, reconciled by
//! last-write-wins overwrite only.

use std::sync::Arc;

use chrono::Local;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use super::session::AuthClient;
use super::ServiceError;
use crate::config::AppConfig;
use crate::models::{
    Appointment, AppointmentPatch, AppointmentStatus, Medication, MedicationPatch,
    NewAppointment, ProfileUpdate, UserProfile,
};

const TABLE_MEDICINES: &str = "medicines";
const TABLE_APPOINTMENTS: &str = "appointments";
const TABLE_PROFILES: &str = "profiles";

/// PostgREST equality filter value.
fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

/// Pull a human-readable message out of a REST error body.
fn rest_error_message(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct RestErrorBody {
        message: Option<String>,
        error: Option<String>,
        hint: Option<String>,
    }

    if let Ok(parsed) = serde_json::from_str::<RestErrorBody>(body) {
        if let Some(msg) = parsed
            .message
            .or(parsed.error)
            .or(parsed.hint)
            .filter(|m| !m.is_empty())
        {
            return msg;
        }
    }
    if body.is_empty() {
        "no further detail".to_string()
    } else {
        body.chars().take(200).collect()
    }
}

// ═══════════════════════════════════════════
// TableClient
// ═══════════════════════════════════════════

/// Row-level access: select filtered by column equality, insert returning
/// the representation, update/delete by primary id.
pub struct TableClient {
    base_url: String,
    anon_key: String,
    http: reqwest::Client,
    auth: Arc<AuthClient>,
}

impl TableClient {
    pub fn new(config: &AppConfig, auth: Arc<AuthClient>) -> Self {
        Self {
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
            http: reqwest::Client::new(),
            auth,
        }
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ServiceError> {
        let response = self
            .http
            .get(self.rest_url(table))
            .header("apikey", &self.anon_key)
            .bearer_auth(self.auth.bearer_token())
            .query(query)
            .send()
            .await?;
        Self::rows_from(response).await
    }

    async fn insert<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &str,
        row: &B,
    ) -> Result<T, ServiceError> {
        let response = self
            .http
            .post(self.rest_url(table))
            .header("apikey", &self.anon_key)
            .header("Prefer", "return=representation")
            .bearer_auth(self.auth.bearer_token())
            .json(row)
            .send()
            .await?;
        Self::single_row(response).await
    }

    /// Update one row via an equality filter on `id`.
    async fn update_row<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &str,
        id: Uuid,
        patch: &B,
    ) -> Result<T, ServiceError> {
        let response = self
            .http
            .patch(self.rest_url(table))
            .header("apikey", &self.anon_key)
            .header("Prefer", "return=representation")
            .bearer_auth(self.auth.bearer_token())
            .query(&[("id", eq(id))])
            .json(patch)
            .send()
            .await?;
        Self::single_row(response).await
    }

    async fn delete_row(&self, table: &str, id: Uuid) -> Result<(), ServiceError> {
        let response = self
            .http
            .delete(self.rest_url(table))
            .header("apikey", &self.anon_key)
            .bearer_auth(self.auth.bearer_token())
            .query(&[("id", eq(id))])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ServiceError::Backend {
                status: status.as_u16(),
                message: rest_error_message(&body),
            })
        }
    }

    async fn rows_from<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<Vec<T>, ServiceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Backend {
                status: status.as_u16(),
                message: rest_error_message(&body),
            });
        }
        response
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))
    }

    /// The row surface always answers with an array; an empty one means
    /// the filter matched nothing.
    async fn single_row<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ServiceError> {
        Self::rows_from(response)
            .await?
            .into_iter()
            .next()
            .ok_or(ServiceError::NotFound)
    }
}

// ═══════════════════════════════════════════
// Entity services
// ═══════════════════════════════════════════

/// Appointments — backend-owned rows; never hard-deleted from the client,
/// cancellation is a status change.
pub struct AppointmentService {
    tables: Arc<TableClient>,
}

impl AppointmentService {
    pub fn new(tables: Arc<TableClient>) -> Self {
        Self { tables }
    }

    /// All of a user's appointments, soonest first.
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Appointment>, ServiceError> {
        self.tables
            .select(
                TABLE_APPOINTMENTS,
                &[
                    ("select", "*".to_string()),
                    ("user_id", eq(user_id)),
                    ("order", "date.asc,time.asc".to_string()),
                ],
            )
            .await
    }

    /// Scheduled appointments dated today or later.
    pub async fn upcoming(&self, user_id: Uuid) -> Result<Vec<Appointment>, ServiceError> {
        let today = Local::now().date_naive();
        self.tables
            .select(
                TABLE_APPOINTMENTS,
                &[
                    ("select", "*".to_string()),
                    ("user_id", eq(user_id)),
                    ("status", eq("scheduled")),
                    ("date", format!("gte.{today}")),
                    ("order", "date.asc,time.asc".to_string()),
                ],
            )
            .await
    }

    pub async fn create(&self, input: &NewAppointment) -> Result<Appointment, ServiceError> {
        self.tables.insert(TABLE_APPOINTMENTS, input).await
    }

    pub async fn update(
        &self,
        id: Uuid,
        patch: &AppointmentPatch,
    ) -> Result<Appointment, ServiceError> {
        self.tables.update_row(TABLE_APPOINTMENTS, id, patch).await
    }

    pub async fn set_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, ServiceError> {
        self.update(
            id,
            &AppointmentPatch {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn cancel(&self, id: Uuid) -> Result<Appointment, ServiceError> {
        self.set_status(id, AppointmentStatus::Cancelled).await
    }

    /// Flag that the lead-time notification for this appointment went out.
    pub async fn mark_reminder_sent(&self, id: Uuid) -> Result<Appointment, ServiceError> {
        self.update(
            id,
            &AppointmentPatch {
                reminder_sent: Some(true),
                ..Default::default()
            },
        )
        .await
    }
}

/// User profiles — one backend row per user.
pub struct ProfileService {
    tables: Arc<TableClient>,
}

impl ProfileService {
    pub fn new(tables: Arc<TableClient>) -> Self {
        Self { tables }
    }

    pub async fn fetch(&self, user_id: Uuid) -> Result<UserProfile, ServiceError> {
        self.tables
            .select(
                TABLE_PROFILES,
                &[("select", "*".to_string()), ("id", eq(user_id))],
            )
            .await?
            .into_iter()
            .next()
            .ok_or(ServiceError::NotFound)
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        patch: &ProfileUpdate,
    ) -> Result<UserProfile, ServiceError> {
        self.tables.update_row(TABLE_PROFILES, user_id, patch).await
    }
}

/// Remote mirror of the medicines table, for callers pushing local
/// medications to the backend. There is no automatic sync: reconciliation
/// is the caller's explicit last-write-wins overwrite.
pub struct MedicineService {
    tables: Arc<TableClient>,
}

impl MedicineService {
    pub fn new(tables: Arc<TableClient>) -> Self {
        Self { tables }
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Medication>, ServiceError> {
        self.tables
            .select(
                TABLE_MEDICINES,
                &[
                    ("select", "*".to_string()),
                    ("user_id", eq(user_id)),
                    ("order", "created_at.asc".to_string()),
                ],
            )
            .await
    }

    /// Push a locally-created medication, keeping its client-side id.
    pub async fn push(&self, medication: &Medication) -> Result<Medication, ServiceError> {
        self.tables.insert(TABLE_MEDICINES, medication).await
    }

    pub async fn update(
        &self,
        id: Uuid,
        patch: &MedicationPatch,
    ) -> Result<Medication, ServiceError> {
        self.tables.update_row(TABLE_MEDICINES, id, patch).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.tables.delete_row(TABLE_MEDICINES, id).await
    }
}
