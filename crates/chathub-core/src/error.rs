//! Hub errors.

use crate::router::RouteError;
use crate::session::{RegistryError, SessionId};
use crate::validate::Rejection;
use thiserror::Error;

/// Errors from handling a client event.
///
/// Every error is scoped to the operation that raised it.
#[derive(Debug, Error)]
pub enum HubError {
    /// The message failed validation.
    #[error("invalid message: {0}")]
    InvalidMessage(#[from] Rejection),

    /// The sender exceeded the rate limit.
    #[error("rate limit exceeded, slow down")]
    RateLimited,

    /// Direct-message target is not connected.
    #[error("recipient not found: {0}")]
    RecipientNotFound(String),

    /// The session is gone, typically a disconnect race.
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),

    /// The requested room name is unusable.
    #[error("invalid room name: {0}")]
    InvalidRoom(&'static str),

    /// The connection id is already registered.
    #[error("session already registered: {0}")]
    DuplicateSession(SessionId),
}

impl HubError {
    /// Whether the client should be told with a `loi` event.
    #[must_use]
    pub fn is_user_visible(&self) -> bool {
        !matches!(
            self,
            HubError::UnknownSession(_) | HubError::DuplicateSession(_)
        )
    }

    /// Short label for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            HubError::InvalidMessage(_) => "invalid_message",
            HubError::RateLimited => "rate_limited",
            HubError::RecipientNotFound(_) => "recipient_not_found",
            HubError::UnknownSession(_) => "unknown_session",
            HubError::InvalidRoom(_) => "invalid_room",
            HubError::DuplicateSession(_) => "duplicate_session",
        }
    }
}

impl From<RouteError> for HubError {
    fn from(err: RouteError) -> Self {
        match err {
            RouteError::RecipientNotFound(name) => HubError::RecipientNotFound(name),
        }
    }
}

impl From<RegistryError> for HubError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::AlreadyRegistered(id) => HubError::DuplicateSession(id),
        }
    }
}
