use serde::{Deserialize, Serialize};

/// UI theme preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    System,
    Light,
    Dark,
}

/// On-device application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub theme: Theme,
    /// Cap on assistant messages per day; 0 = unlimited.
    pub daily_ai_message_limit: u32,
    pub notifications_enabled: bool,
    /// BCP 47 tag, e.g. "es-ES".
    pub locale: String,
    pub large_text: bool,
    pub reduce_motion: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::System,
            daily_ai_message_limit: 50,
            notifications_enabled: true,
            locale: "en-US".to_string(),
            large_text: false,
            reduce_motion: false,
        }
    }
}

/// Per-field settings update. Unset field = no change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    pub theme: Option<Theme>,
    pub daily_ai_message_limit: Option<u32>,
    pub notifications_enabled: Option<bool>,
    pub locale: Option<String>,
    pub large_text: Option<bool>,
    pub reduce_motion: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_safe() {
        let s = Settings::default();
        assert_eq!(s.theme, Theme::System);
        assert!(s.notifications_enabled);
        assert!(s.daily_ai_message_limit > 0);
    }

    #[test]
    fn theme_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Theme::System).unwrap(), "\"system\"");
        assert_eq!(serde_json::to_string(&Theme::Dark).unwrap(), "\"dark\"");
    }
}
