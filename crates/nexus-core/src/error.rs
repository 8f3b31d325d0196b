// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Nexus bridge engine.

use serde::Serialize;
use strum::{AsRefStr, Display};
use thiserror::Error;

use crate::types::Platform;

/// The primary error type shared by every Nexus crate.
///
/// The variants mirror the routing engine's error taxonomy: callers branch on
/// [`NexusError::kind`] to decide between "retry automatically" and
/// "fix configuration".
#[derive(Debug, Error)]
pub enum NexusError {
    /// Invalid or missing credentials, illegal state transition, or a bridge
    /// that has not been configured yet.
    #[error("configuration error: {0}")]
    Config(String),

    /// The credential vault could not produce plaintext credentials.
    ///
    /// Never collapse this into "not configured": the vault fails closed.
    #[error("credentials unavailable: {message}")]
    CredentialUnavailable { message: String },

    /// The platform rejected the credentials.
    #[error("{platform} rejected credentials: {message}")]
    Auth { platform: Platform, message: String },

    /// Network failure, timeout, rate limit or upstream 5xx. Retryable.
    #[error("transient failure: {message}")]
    Transient {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Malformed recipient or unsupported operation. Not retried.
    #[error("permanent failure: {message}")]
    Permanent { message: String },

    /// A webhook payload could not be parsed into inbound events.
    #[error("cannot normalize {platform} payload: {message}")]
    Normalization { platform: Platform, message: String },

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl NexusError {
    /// Shorthand for a [`NexusError::Transient`] without an underlying source.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a [`NexusError::Permanent`].
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
        }
    }

    /// Shorthand for a [`NexusError::Auth`].
    pub fn auth(platform: Platform, message: impl Into<String>) -> Self {
        Self::Auth {
            platform,
            message: message.into(),
        }
    }

    /// Shorthand for a [`NexusError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Shorthand for a [`NexusError::CredentialUnavailable`].
    pub fn credential_unavailable(message: impl Into<String>) -> Self {
        Self::CredentialUnavailable {
            message: message.into(),
        }
    }

    /// Classifies the error for API consumers and metrics labels.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::ConfigurationError,
            Self::CredentialUnavailable { .. } => ErrorKind::CredentialUnavailable,
            Self::Auth { .. } => ErrorKind::AuthError,
            Self::Transient { .. } => ErrorKind::TransientError,
            Self::Permanent { .. } => ErrorKind::PermanentError,
            Self::Normalization { .. } => ErrorKind::NormalizationError,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Storage { .. } => ErrorKind::StorageError,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// Whether a caller may retry the same operation unchanged.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Stable, serializable label for a [`NexusError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConfigurationError,
    CredentialUnavailable,
    AuthError,
    TransientError,
    PermanentError,
    NormalizationError,
    NotFound,
    StorageError,
    Timeout,
    InternalError,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::TransientError | Self::Timeout)
    }
}
