//! Assistant chat service — an explicit, ordered chain of reply tiers.
//!
//! Tier order: the managed backend function, the direct LLM call (present
//! only when a client-side key is configured), and a deterministic echo
//! (test/ops fallback, not a production guarantee). Each tier is attempted
//! exactly once with no retry or backoff; a tier failure is logged and
//! absorbed by the next tier. Only a hard failure of the final tier
//! surfaces, and it does so as assistant content — behavior inherited from
//! the mobile client, kept deliberately and logged loudly.
//!
//! Sends on the same thread are not serialized here; two concurrent sends
//! may resolve out of order. Callers that care must sequence their calls.

use std::time::Instant;

use futures_util::future::{AbortHandle, AbortRegistration, Abortable};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ServiceError;
use crate::config::AppConfig;
use crate::models::ChatMessage;

/// Fixed timeouts for the direct LLM client, mirroring the native wrapper.
const LLM_CONNECT_TIMEOUT_SECS: u64 = 10;
const LLM_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Which stage of the chain produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TierKind {
    BackendFunction,
    DirectLlm,
    Echo,
}

impl std::fmt::Display for TierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BackendFunction => write!(f, "backend function"),
            Self::DirectLlm => write!(f, "direct LLM"),
            Self::Echo => write!(f, "echo"),
        }
    }
}

/// Message as sent on the wire: role + content only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    pub role: String,
    pub content: String,
}

impl From<&ChatMessage> for OutboundMessage {
    fn from(m: &ChatMessage) -> Self {
        Self {
            role: m.role.to_string(),
            content: m.content.clone(),
        }
    }
}

/// A send request. The cancellation signal applies to the direct-LLM tier
/// only; the backend-function tier runs to completion once issued.
pub struct ChatRequest {
    pub thread_id: Option<Uuid>,
    pub messages: Vec<OutboundMessage>,
    pub cancel: Option<AbortRegistration>,
}

impl ChatRequest {
    pub fn new(messages: Vec<OutboundMessage>) -> Self {
        Self {
            thread_id: None,
            messages,
            cancel: None,
        }
    }

    pub fn with_thread(mut self, thread_id: Uuid) -> Self {
        self.thread_id = Some(thread_id);
        self
    }

    /// Attach a cancellation signal; aborting the returned handle cancels
    /// the direct-LLM tier if and when it runs.
    pub fn cancellable(mut self) -> (Self, AbortHandle) {
        let (handle, registration) = AbortHandle::new_pair();
        self.cancel = Some(registration);
        (self, handle)
    }
}

/// The resolved assistant reply, recording which tier answered.
#[derive(Debug, Clone, Serialize)]
pub struct AssistantReply {
    pub content: String,
    pub model: Option<String>,
    pub latency_ms: Option<u64>,
    pub tier: TierKind,
}

// ═══════════════════════════════════════════
// Tier 1 — managed backend function
// ═══════════════════════════════════════════

#[derive(Serialize)]
struct FunctionBody<'a> {
    messages: &'a [OutboundMessage],
    #[serde(rename = "threadId", skip_serializing_if = "Option::is_none")]
    thread_id: Option<Uuid>,
    model: &'a str,
}

#[derive(Deserialize)]
struct FunctionReply {
    content: String,
    model: Option<String>,
    latency_ms: Option<u64>,
}

#[derive(Deserialize)]
struct FunctionErrorBody {
    error: Option<String>,
}

pub struct BackendFunctionClient {
    url: String,
    anon_key: String,
    model: String,
    http: reqwest::Client,
}

impl BackendFunctionClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            url: format!("{}/functions/v1/ai-chat", config.supabase_url),
            anon_key: config.supabase_anon_key.clone(),
            model: config.chat_model.clone(),
            http: reqwest::Client::new(),
        }
    }

    async fn attempt(
        &self,
        messages: &[OutboundMessage],
        thread_id: Option<Uuid>,
    ) -> Result<AssistantReply, ServiceError> {
        let response = self
            .http
            .post(&self.url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .json(&FunctionBody {
                messages,
                thread_id,
                model: &self.model,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<FunctionErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .unwrap_or(body);
            return Err(ServiceError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        let reply: FunctionReply = response
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;
        if reply.content.is_empty() {
            return Err(ServiceError::Decode("function returned no content".to_string()));
        }

        Ok(AssistantReply {
            content: reply.content,
            model: reply.model,
            latency_ms: reply.latency_ms,
            tier: TierKind::BackendFunction,
        })
    }
}

// ═══════════════════════════════════════════
// Tier 2 — direct LLM call
// ═══════════════════════════════════════════

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [OutboundMessage],
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: String,
}

pub struct DirectLlmClient {
    url: String,
    api_key: String,
    model: String,
    http: reqwest::Client,
}

impl DirectLlmClient {
    pub fn new(config: &AppConfig, api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(LLM_CONNECT_TIMEOUT_SECS))
            .timeout(std::time::Duration::from_secs(LLM_REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            url: format!("{}/chat/completions", config.llm_base_url),
            api_key,
            model: config.chat_model.clone(),
            http,
        }
    }

    async fn attempt(
        &self,
        messages: &[OutboundMessage],
        cancel: Option<AbortRegistration>,
    ) -> Result<AssistantReply, ServiceError> {
        let started = Instant::now();
        let call = self.request(messages);
        let content = match cancel {
            Some(registration) => Abortable::new(call, registration)
                .await
                .map_err(|_| ServiceError::Cancelled)??,
            None => call.await?,
        };

        Ok(AssistantReply {
            content,
            model: Some(self.model.clone()),
            latency_ms: Some(started.elapsed().as_millis() as u64),
            tier: TierKind::DirectLlm,
        })
    }

    async fn request(&self, messages: &[OutboundMessage]) -> Result<String, ServiceError> {
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&CompletionBody {
                model: &self.model,
                messages,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Backend {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ServiceError::Decode("completion carried no choices".to_string()))
    }
}

// ═══════════════════════════════════════════
// Tier 3 — deterministic echo
// ═══════════════════════════════════════════

fn echo_reply(messages: &[OutboundMessage]) -> Result<AssistantReply, ServiceError> {
    let last_user = messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .ok_or_else(|| ServiceError::Decode("no user message to echo".to_string()))?;

    Ok(AssistantReply {
        content: last_user.content.clone(),
        model: None,
        latency_ms: None,
        tier: TierKind::Echo,
    })
}

// ═══════════════════════════════════════════
// The chain
// ═══════════════════════════════════════════

/// One stage of the reply chain.
pub enum Tier {
    BackendFunction(BackendFunctionClient),
    DirectLlm(DirectLlmClient),
    Echo,
}

impl Tier {
    pub fn kind(&self) -> TierKind {
        match self {
            Self::BackendFunction(_) => TierKind::BackendFunction,
            Self::DirectLlm(_) => TierKind::DirectLlm,
            Self::Echo => TierKind::Echo,
        }
    }

    async fn attempt(
        &self,
        messages: &[OutboundMessage],
        thread_id: Option<Uuid>,
        cancel: &mut Option<AbortRegistration>,
    ) -> Result<AssistantReply, ServiceError> {
        match self {
            Self::BackendFunction(client) => client.attempt(messages, thread_id).await,
            Self::DirectLlm(client) => client.attempt(messages, cancel.take()).await,
            Self::Echo => echo_reply(messages),
        }
    }
}

/// The assistant reply service. The chain is data, not control flow:
/// inspect it with [`ChatService::tier_kinds`].
pub struct ChatService {
    tiers: Vec<Tier>,
}

impl ChatService {
    pub fn new(tiers: Vec<Tier>) -> Self {
        Self { tiers }
    }

    /// The standard chain for this configuration. The direct tier exists
    /// only when an LLM key is configured.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut tiers = vec![Tier::BackendFunction(BackendFunctionClient::new(config))];
        if let Some(key) = &config.llm_api_key {
            tiers.push(Tier::DirectLlm(DirectLlmClient::new(config, key.clone())));
        }
        tiers.push(Tier::Echo);
        Self::new(tiers)
    }

    pub fn tier_kinds(&self) -> Vec<TierKind> {
        self.tiers.iter().map(Tier::kind).collect()
    }

    /// Resolve an assistant reply by walking the chain. This never returns
    /// an error: if every tier fails, the failure text itself becomes the
    /// reply content so the conversation shows it inline.
    pub async fn send(&self, request: ChatRequest) -> AssistantReply {
        let ChatRequest {
            thread_id,
            messages,
            mut cancel,
        } = request;

        let mut last_error: Option<ServiceError> = None;
        for tier in &self.tiers {
            match tier.attempt(&messages, thread_id, &mut cancel).await {
                Ok(reply) => {
                    tracing::info!(tier = %reply.tier, "assistant reply resolved");
                    return reply;
                }
                Err(err) => {
                    tracing::warn!(tier = %tier.kind(), error = %err, "chat tier failed, falling back");
                    last_error = Some(err);
                }
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no reply tiers configured".to_string());
        tracing::error!(error = %reason, "all chat tiers failed; surfacing error as assistant content");
        AssistantReply {
            content: format!("The assistant is unavailable right now ({reason})."),
            model: None,
            latency_ms: None,
            tier: self.tiers.last().map(Tier::kind).unwrap_or(TierKind::Echo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageRole;
    use chrono::Utc;

    fn config_without_key() -> AppConfig {
        AppConfig {
            supabase_url: "https://proj.supabase.co".to_string(),
            supabase_anon_key: "anon-key".to_string(),
            llm_api_key: None,
            llm_base_url: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
        }
    }

    fn config_with_key() -> AppConfig {
        AppConfig {
            llm_api_key: Some("sk-test".to_string()),
            ..config_without_key()
        }
    }

    /// Config pointing every remote tier at a port nothing listens on.
    fn unreachable_config() -> AppConfig {
        AppConfig {
            supabase_url: "http://127.0.0.1:1".to_string(),
            llm_base_url: "http://127.0.0.1:1".to_string(),
            ..config_with_key()
        }
    }

    fn user(content: &str) -> OutboundMessage {
        OutboundMessage {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }

    fn assistant(content: &str) -> OutboundMessage {
        OutboundMessage {
            role: "assistant".to_string(),
            content: content.to_string(),
        }
    }

    // ── Chain shape ──

    #[test]
    fn chain_without_key_skips_direct_tier() {
        let service = ChatService::from_config(&config_without_key());
        assert_eq!(
            service.tier_kinds(),
            vec![TierKind::BackendFunction, TierKind::Echo]
        );
    }

    #[test]
    fn chain_with_key_carries_all_three_tiers() {
        let service = ChatService::from_config(&config_with_key());
        assert_eq!(
            service.tier_kinds(),
            vec![TierKind::BackendFunction, TierKind::DirectLlm, TierKind::Echo]
        );
    }

    // ── Echo tier ──

    #[tokio::test]
    async fn echo_answers_the_last_user_message() {
        let service = ChatService::new(vec![Tier::Echo]);
        let reply = service
            .send(ChatRequest::new(vec![
                user("first"),
                assistant("ignored"),
                user("Hola"),
                assistant("..."),
            ]))
            .await;

        assert_eq!(reply.content, "Hola");
        assert_eq!(reply.tier, TierKind::Echo);
        assert!(reply.model.is_none());
    }

    #[tokio::test]
    async fn echo_without_user_message_surfaces_error_as_content() {
        let service = ChatService::new(vec![Tier::Echo]);
        let reply = service
            .send(ChatRequest::new(vec![assistant("orphan placeholder")]))
            .await;
        assert!(reply.content.contains("unavailable"));
    }

    #[tokio::test]
    async fn empty_chain_still_yields_a_reply() {
        let service = ChatService::new(Vec::new());
        let reply = service.send(ChatRequest::new(vec![user("anyone there?")])).await;
        assert!(reply.content.contains("unavailable"));
    }

    // ── Fallback behavior ──

    #[tokio::test]
    async fn unreachable_tiers_fall_through_to_echo() {
        let service = ChatService::from_config(&unreachable_config());
        let reply = service.send(ChatRequest::new(vec![user("Hola")])).await;

        assert_eq!(reply.tier, TierKind::Echo);
        assert_eq!(reply.content, "Hola");
    }

    #[tokio::test]
    async fn aborted_direct_tier_is_absorbed_by_echo() {
        let config = unreachable_config();
        let service = ChatService::new(vec![
            Tier::DirectLlm(DirectLlmClient::new(&config, "sk-test".to_string())),
            Tier::Echo,
        ]);

        let (request, handle) = ChatRequest::new(vec![user("cancel me")]).cancellable();
        handle.abort();
        let reply = service.send(request).await;

        assert_eq!(reply.tier, TierKind::Echo);
        assert_eq!(reply.content, "cancel me");
    }

    // ── Wire shapes ──

    #[test]
    fn outbound_message_from_chat_message() {
        let message = ChatMessage {
            id: Uuid::new_v4(),
            thread_id: Uuid::new_v4(),
            role: MessageRole::Assistant,
            content: "hello".to_string(),
            user_id: None,
            created_at: Utc::now(),
            meta: None,
        };
        let outbound = OutboundMessage::from(&message);
        assert_eq!(outbound.role, "assistant");
        assert_eq!(outbound.content, "hello");
    }

    #[test]
    fn function_body_uses_wire_field_names() {
        let thread_id = Uuid::new_v4();
        let body = FunctionBody {
            messages: &[user("hi")],
            thread_id: Some(thread_id),
            model: "gpt-4o-mini",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["threadId"], serde_json::json!(thread_id));
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["model"], "gpt-4o-mini");
    }
}
