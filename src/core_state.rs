//! Composition root — the explicit owner of stores, remote services, and
//! the scheduling bridge.
//!
//! Screens receive a reference to `CoreState` and go through its members;
//! nothing here is an ambient global. Any screen may still read or mutate
//! any store, but the dependency is visible and each store is testable in
//! isolation.

use std::sync::{Arc, Mutex};

use chrono::Local;

use crate::config::AppConfig;
use crate::remote::{
    AppointmentService, AuthClient, ChatService, MedicineService, ProfileService, TableClient,
};
use crate::scheduler::{AlarmBackend, ReminderScheduler};
use crate::store::{ChatStore, DocumentStorage, ReminderStore, SettingsStore, StoreError};

pub struct CoreState<B: AlarmBackend> {
    pub chat: Mutex<ChatStore>,
    pub reminders: Mutex<ReminderStore>,
    pub settings: Mutex<SettingsStore>,
    pub scheduler: Mutex<ReminderScheduler<B>>,
    pub auth: Arc<AuthClient>,
    pub chat_service: ChatService,
    pub appointments: AppointmentService,
    pub profiles: ProfileService,
    pub medicines: MedicineService,
}

impl<B: AlarmBackend> CoreState<B> {
    /// Load all three stores from storage, wire the remote services, and
    /// re-register alarms for every enabled reminder (platform alarms do
    /// not survive a restart). An alarm-facility failure is logged, not
    /// fatal — the stores still come up.
    pub fn bootstrap<S>(config: &AppConfig, storage: S, alarm_backend: B) -> Result<Self, StoreError>
    where
        S: DocumentStorage + Clone + 'static,
    {
        let chat = ChatStore::load(Box::new(storage.clone()))?;
        let reminders = ReminderStore::load(Box::new(storage.clone()))?;
        let settings = SettingsStore::load(Box::new(storage))?;

        let mut scheduler = ReminderScheduler::new(alarm_backend);
        match scheduler.restore(&reminders, Local::now().naive_local()) {
            Ok(restored) => tracing::info!(restored, "alarms re-registered at startup"),
            Err(e) => tracing::warn!(error = %e, "could not restore alarms at startup"),
        }

        let auth = Arc::new(AuthClient::new(config));
        let tables = Arc::new(TableClient::new(config, Arc::clone(&auth)));

        Ok(Self {
            chat: Mutex::new(chat),
            reminders: Mutex::new(reminders),
            settings: Mutex::new(settings),
            scheduler: Mutex::new(scheduler),
            chat_service: ChatService::from_config(config),
            appointments: AppointmentService::new(Arc::clone(&tables)),
            profiles: ProfileService::new(Arc::clone(&tables)),
            medicines: MedicineService::new(tables),
            auth,
        })
    }
}
