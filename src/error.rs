//! Error types shared by the engine components

use thiserror::Error;

use crate::graph::UserId;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Typed failures surfaced by the core
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// Self-loop or duplicate follow
    #[error("invalid edge {follower} -> {followee}: {reason}")]
    InvalidEdge {
        follower: UserId,
        followee: UserId,
        reason: &'static str,
    },

    #[error("{0} not found")]
    NotFound(String),

    /// A user with this username, or this id, is already registered.
    /// The payload names whichever key collided.
    #[error("already registered: {0}")]
    DuplicateUsername(String),

    /// Not enough comparable data to run a model
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl EngineError {
    pub(crate) fn user_not_found(id: UserId) -> Self {
        EngineError::NotFound(format!("user {}", id))
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        EngineError::MalformedPayload(msg.into())
    }
}
