use crate::types::{ProfileId, ReportId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeskError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Report {report_id} not found")]
    ReportNotFound { report_id: ReportId },

    #[error("Profile '{profile_id}' not found")]
    ProfileNotFound { profile_id: ProfileId },

    #[error("Report {report_id} is already verified and linked")]
    AlreadyLinked { report_id: ReportId },

    #[error("Report {report_id} cannot be updated in status {status}")]
    NotEditable { report_id: ReportId, status: String },

    #[error("Session expired or not in a flow")]
    SessionExpired,

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Lookup '{service}' failed: {reason}")]
    Lookup { service: String, reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DeskError {
    /// Conflicts end the current action; the user should start over.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DeskError::AlreadyLinked { .. } | DeskError::NotEditable { .. })
    }
}

pub type DeskResult<T> = Result<T, DeskError>;
