//! Auth session provider — sign-in/sign-up and password flows against the
//! hosted backend's auth API.
//!
//! Holds the current session behind a lock; the table client borrows the
//! access token for row-level-security'd requests and falls back to the
//! anon key while signed out.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ServiceError;
use crate::config::AppConfig;

/// An authenticated backend session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user_id: Uuid,
    pub email: Option<String>,
}

#[derive(Serialize)]
struct CredentialsBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    user: TokenUser,
}

#[derive(Deserialize)]
struct TokenUser {
    id: Uuid,
    email: Option<String>,
}

/// Error body shapes the auth API answers with, all fields optional.
#[derive(Deserialize)]
struct AuthErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    error: Option<String>,
}

pub struct AuthClient {
    base_url: String,
    anon_key: String,
    http: reqwest::Client,
    session: RwLock<Option<Session>>,
}

impl AuthClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
            http: reqwest::Client::new(),
            session: RwLock::new(None),
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    // ── Session state ───────────────────────────────────────

    pub fn session(&self) -> Option<Session> {
        self.session.read().ok()?.clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.session().is_some()
    }

    /// Token for authorized requests: the session's access token, or the
    /// anon key while signed out.
    pub fn bearer_token(&self) -> String {
        self.session()
            .map(|s| s.access_token)
            .unwrap_or_else(|| self.anon_key.clone())
    }

    pub fn sign_out(&self) {
        if let Ok(mut slot) = self.session.write() {
            *slot = None;
        }
    }

    fn store_session(&self, session: Session) {
        if let Ok(mut slot) = self.session.write() {
            *slot = Some(session);
        }
    }

    // ── Auth flows ──────────────────────────────────────────

    /// Password sign-in. On success the session is stored and returned.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ServiceError> {
        let response = self
            .http
            .post(format!("{}?grant_type=password", self.auth_url("token")))
            .header("apikey", &self.anon_key)
            .json(&CredentialsBody { email, password })
            .send()
            .await?;
        self.session_from(response).await
    }

    /// Create an account. The backend answers with a session when email
    /// confirmation is disabled.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Session, ServiceError> {
        let response = self
            .http
            .post(self.auth_url("signup"))
            .header("apikey", &self.anon_key)
            .json(&CredentialsBody { email, password })
            .send()
            .await?;
        self.session_from(response).await
    }

    /// Ask the backend to email a password-recovery link.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), ServiceError> {
        let response = self
            .http
            .post(self.auth_url("recover"))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ServiceError::Backend {
                status: status.as_u16(),
                message: auth_error_message(&body),
            })
        }
    }

    /// Change the signed-in user's password.
    pub async fn update_password(&self, new_password: &str) -> Result<(), ServiceError> {
        let session = self.session().ok_or(ServiceError::NotAuthenticated)?;
        let response = self
            .http
            .put(self.auth_url("user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .json(&serde_json::json!({ "password": new_password }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ServiceError::Backend {
                status: status.as_u16(),
                message: auth_error_message(&body),
            })
        }
    }

    async fn session_from(&self, response: reqwest::Response) -> Result<Session, ServiceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Backend {
                status: status.as_u16(),
                message: auth_error_message(&body),
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;

        let session = Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            user_id: token.user.id,
            email: token.user.email,
        };
        self.store_session(session.clone());
        tracing::info!(user = %session.user_id, "signed in");
        Ok(session)
    }
}

/// Pull a human-readable message out of an auth error body, falling back
/// to the raw text.
fn auth_error_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<AuthErrorBody>(body) {
        if let Some(msg) = parsed
            .error_description
            .or(parsed.msg)
            .or(parsed.error)
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

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig {
            supabase_url: "https://proj.supabase.co".to_string(),
            supabase_anon_key: "anon-key".to_string(),
            llm_api_key: None,
            llm_base_url: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
        }
    }

    #[test]
    fn bearer_falls_back_to_anon_key_when_signed_out() {
        let auth = AuthClient::new(&config());
        assert!(!auth.is_signed_in());
        assert_eq!(auth.bearer_token(), "anon-key");
    }

    #[test]
    fn stored_session_provides_the_bearer() {
        let auth = AuthClient::new(&config());
        auth.store_session(Session {
            access_token: "jwt".to_string(),
            refresh_token: None,
            user_id: Uuid::new_v4(),
            email: Some("user@example.com".to_string()),
        });
        assert!(auth.is_signed_in());
        assert_eq!(auth.bearer_token(), "jwt");

        auth.sign_out();
        assert_eq!(auth.bearer_token(), "anon-key");
    }

    #[test]
    fn auth_urls_are_rooted_at_the_project() {
        let auth = AuthClient::new(&config());
        assert_eq!(
            auth.auth_url("recover"),
            "https://proj.supabase.co/auth/v1/recover"
        );
    }

    #[test]
    fn error_message_prefers_description_fields() {
        assert_eq!(
            auth_error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(auth_error_message(r#"{"msg":"User already registered"}"#), "User already registered");
        assert_eq!(auth_error_message("plain text"), "plain text");
        assert_eq!(auth_error_message(""), "no further detail");
    }

    #[tokio::test]
    async fn update_password_requires_a_session() {
        let auth = AuthClient::new(&config());
        let err = auth.update_password("new-password").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotAuthenticated));
    }
}
