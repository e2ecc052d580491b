//! Remote data-access services — typed wrappers over the hosted backend's
//! auth, row, and function endpoints, plus the assistant reply chain.
//!
//! Every call is attempted exactly once (no retry/backoff) and every
//! failure crosses the service boundary as a [`ServiceError`] value. A
//! failed remote write leaves any optimistic local state in place; callers
//! re-fetch explicitly if they want to reconcile.

pub mod chat_service;
pub mod session;
pub mod tables;

pub use chat_service::{AssistantReply, ChatRequest, ChatService, OutboundMessage, Tier, TierKind};
pub use session::{AuthClient, Session};
pub use tables::{AppointmentService, MedicineService, ProfileService, TableClient};

use thiserror::Error;

/// Failure of a remote call, carrying a human-readable message for inline
/// display.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("network error: {0}")]
    Network(String),

    #[error("backend rejected the request ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("unexpected response shape: {0}")]
    Decode(String),

    #[error("not signed in")]
    NotAuthenticated,

    #[error("request cancelled")]
    Cancelled,

    #[error("row not found")]
    NotFound,
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}
