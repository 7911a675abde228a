use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::acl::Op;

pub type Result<T> = std::result::Result<T, DataHubError>;

#[derive(Debug, Error)]
pub enum DataHubError {
    #[error("malformed path: {0}")]
    MalformedPath(String),

    #[error("incomplete key: {0}")]
    IncompleteKey(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("path({path}) restricts user({user}) operation({op})")]
    OperationRestricted { path: String, user: String, op: Op },

    #[error("path({path}) must be a sub-path of corpus({corpus})")]
    InvalidSubPath { path: String, corpus: String },

    #[error("no such parent corpus({parent}) for corpus({corpus})")]
    UnknownParentCorpus { parent: String, corpus: String },

    #[error("invalid subscription id: {0}")]
    InvalidSubscriptionId(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{service} failed: {message}")]
    Service {
        service: &'static str,
        message: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub operation: String,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl DataHubError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedPath(_) => "MALFORMED_PATH",
            Self::IncompleteKey(_) => "INCOMPLETE_KEY",
            Self::NotFound(_) => "NOT_FOUND",
            Self::OperationRestricted { .. } => "OPERATION_RESTRICTED",
            Self::InvalidSubPath { .. } => "INVALID_SUB_PATH",
            Self::UnknownParentCorpus { .. } => "UNKNOWN_PARENT_CORPUS",
            Self::InvalidSubscriptionId(_) => "INVALID_SUBSCRIPTION_ID",
            Self::InvalidQuery(_) => "INVALID_QUERY",
            Self::Conflict(_) => "CONFLICT",
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::Service { .. } => "SERVICE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Sqlite(_) => "SQLITE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn to_payload(&self, operation: impl Into<String>, path: Option<String>) -> ErrorPayload {
        ErrorPayload {
            code: self.code().to_string(),
            message: self.to_string(),
            operation: operation.into(),
            trace_id: Uuid::new_v4().to_string(),
            path,
            details: None,
        }
    }

    /// Wraps a failure reported by a backing service so it is always surfaced.
    pub fn service(service: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Service {
            service,
            message: err.to_string(),
        }
    }

    pub(crate) fn mutex_poisoned(name: &str) -> Self {
        Self::Internal(format!("{name} lock poisoned"))
    }

    pub(crate) fn restricted(path: &crate::path::Path, user: &crate::user::User, op: Op) -> Self {
        Self::OperationRestricted {
            path: path.to_string(),
            user: user.effective_id().to_string(),
            op,
        }
    }
}
