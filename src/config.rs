//! Environment-provided configuration and data directories.
//!
//! The hosted backend's URL and anon key are required — the app cannot
//! start without them. The direct-LLM key is optional and only gates one
//! fallback tier of the chat service.

use std::path::PathBuf;

use thiserror::Error;

pub const APP_NAME: &str = "MedicAI";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable names.
pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "SUPABASE_ANON_KEY";
pub const ENV_LLM_API_KEY: &str = "MEDICAI_LLM_API_KEY";
pub const ENV_LLM_BASE_URL: &str = "MEDICAI_LLM_BASE_URL";
pub const ENV_CHAT_MODEL: &str = "MEDICAI_CHAT_MODEL";

const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Errors raised while assembling configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Fatal at startup: the backend cannot be reached without credentials.
    #[error("missing backend configuration: {0} is not set")]
    MissingBackend(&'static str),
}

/// Runtime configuration assembled from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the hosted backend project.
    pub supabase_url: String,
    /// Anonymous API key for the hosted backend.
    pub supabase_anon_key: String,
    /// Key for the direct-LLM fallback tier. `None` disables that tier.
    pub llm_api_key: Option<String>,
    /// Base URL of the LLM provider's chat-completions API.
    pub llm_base_url: String,
    /// Model name sent to both the backend function and the direct tier.
    pub chat_model: String,
}

impl AppConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary lookup. Values are trimmed;
    /// empty strings count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| -> Option<String> {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let supabase_url = get(ENV_SUPABASE_URL)
            .ok_or(ConfigError::MissingBackend(ENV_SUPABASE_URL))?
            .trim_end_matches('/')
            .to_string();
        let supabase_anon_key = get(ENV_SUPABASE_ANON_KEY)
            .ok_or(ConfigError::MissingBackend(ENV_SUPABASE_ANON_KEY))?;

        Ok(Self {
            supabase_url,
            supabase_anon_key,
            llm_api_key: get(ENV_LLM_API_KEY),
            llm_base_url: get(ENV_LLM_BASE_URL)
                .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            chat_model: get(ENV_CHAT_MODEL).unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
        })
    }
}

/// Get the application data directory: ~/MedicAI/ on all platforms.
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join(APP_NAME)
}

/// Directory holding the persisted JSON state documents.
pub fn state_dir() -> PathBuf {
    app_data_dir().join("state")
}

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    "info,medicai_core=debug".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn full_environment_parses() {
        let vars = env(&[
            (ENV_SUPABASE_URL, "https://proj.supabase.co/"),
            (ENV_SUPABASE_ANON_KEY, "anon-key"),
            (ENV_LLM_API_KEY, "sk-test"),
            (ENV_CHAT_MODEL, "gpt-4o"),
        ]);
        let config = AppConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.supabase_url, "https://proj.supabase.co");
        assert_eq!(config.supabase_anon_key, "anon-key");
        assert_eq!(config.llm_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.chat_model, "gpt-4o");
        assert_eq!(config.llm_base_url, DEFAULT_LLM_BASE_URL);
    }

    #[test]
    fn missing_backend_url_is_fatal() {
        let vars = env(&[(ENV_SUPABASE_ANON_KEY, "anon-key")]);
        let err = AppConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingBackend(ENV_SUPABASE_URL)));
    }

    #[test]
    fn missing_anon_key_is_fatal() {
        let vars = env(&[(ENV_SUPABASE_URL, "https://proj.supabase.co")]);
        let err = AppConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingBackend(ENV_SUPABASE_ANON_KEY)
        ));
    }

    #[test]
    fn missing_llm_key_is_not_fatal() {
        let vars = env(&[
            (ENV_SUPABASE_URL, "https://proj.supabase.co"),
            (ENV_SUPABASE_ANON_KEY, "anon-key"),
        ]);
        let config = AppConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert!(config.llm_api_key.is_none());
    }

    #[test]
    fn blank_values_count_as_unset() {
        let vars = env(&[
            (ENV_SUPABASE_URL, "https://proj.supabase.co"),
            (ENV_SUPABASE_ANON_KEY, "   "),
        ]);
        let err = AppConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingBackend(ENV_SUPABASE_ANON_KEY)
        ));
    }

    #[test]
    fn app_data_dir_under_home() {
        let dir = app_data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with(APP_NAME));
    }

    #[test]
    fn state_dir_under_app_data() {
        assert!(state_dir().starts_with(app_data_dir()));
    }
}
