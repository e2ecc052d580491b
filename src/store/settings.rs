//! Local settings store — theme, AI message limit, notification and
//! accessibility flags, persisted whole after every mutation.

use super::{load_document, persist_document, DocumentStorage, StoreError, SETTINGS_DOC};
use crate::models::{Settings, SettingsPatch};

/// State-owner for on-device application settings.
pub struct SettingsStore {
    settings: Settings,
    storage: Box<dyn DocumentStorage>,
}

impl SettingsStore {
    /// Load persisted settings, or defaults when none exist.
    pub fn load(storage: Box<dyn DocumentStorage>) -> Result<Self, StoreError> {
        let settings = load_document(storage.as_ref(), SETTINGS_DOC)?.unwrap_or_default();
        Ok(Self { settings, storage })
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    /// Merge set fields into the current settings. Unset field = no change.
    pub fn update(&mut self, patch: SettingsPatch) -> Settings {
        if let Some(theme) = patch.theme {
            self.settings.theme = theme;
        }
        if let Some(limit) = patch.daily_ai_message_limit {
            self.settings.daily_ai_message_limit = limit;
        }
        if let Some(enabled) = patch.notifications_enabled {
            self.settings.notifications_enabled = enabled;
        }
        if let Some(locale) = patch.locale {
            self.settings.locale = locale;
        }
        if let Some(large_text) = patch.large_text {
            self.settings.large_text = large_text;
        }
        if let Some(reduce_motion) = patch.reduce_motion {
            self.settings.reduce_motion = reduce_motion;
        }
        self.persist();
        self.settings.clone()
    }

    /// Restore defaults.
    pub fn reset(&mut self) -> Settings {
        self.settings = Settings::default();
        self.persist();
        self.settings.clone()
    }

    fn persist(&self) {
        persist_document(self.storage.as_ref(), SETTINGS_DOC, &self.settings);
    }
}
