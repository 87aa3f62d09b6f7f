//! Error types for rcaledger.
//!
//! This module defines all error types used throughout the rcaledger crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for rcaledger operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A read or write against the database failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Ledger Errors ===
    /// A record failed validation and was not written.
    #[error("invalid {field}: {message}")]
    Validation {
        /// Name of the offending field.
        field: &'static str,
        /// Description of the validation failure.
        message: String,
    },

    /// The eviction policy asked for more victims than the AWB has live records.
    ///
    /// This can only happen if the bounded-history invariant is already broken.
    #[error("capacity eviction failed for AWB {awb}: {live} live records, max {max}")]
    CapacityEviction {
        /// The AWB being appended to.
        awb: String,
        /// Live records found for the AWB.
        live: usize,
        /// Configured maximum.
        max: usize,
    },

    /// A bulk submission stopped on a storage failure.
    #[error("batch aborted after {appended} appended records: {source}")]
    BatchAborted {
        /// Number of records appended before the failure.
        appended: usize,
        /// The failure that stopped the batch.
        #[source]
        source: Box<Error>,
    },

    // === Access Errors ===
    /// Email or password did not match.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The caller's role does not allow the action.
    #[error("role '{role}' is not permitted to {action}")]
    PermissionDenied {
        /// The caller's role.
        role: String,
        /// What was attempted.
        action: &'static str,
    },

    /// A user with this email already exists.
    #[error("user already exists: {email}")]
    UserExists {
        /// The duplicate email.
        email: String,
    },

    /// No user with this email exists.
    #[error("user not found: {email}")]
    UserNotFound {
        /// The missing email.
        email: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Export Errors ===
    /// Writing the spreadsheet failed.
    #[error("export failed: {0}")]
    Export(#[from] rust_xlsxwriter::XlsxError),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for rcaledger operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a validation error for the named field.
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Create a permission error for the given role and action.
    #[must_use]
    pub fn permission_denied(role: impl std::fmt::Display, action: &'static str) -> Self {
        Self::PermissionDenied {
            role: role.to_string(),
            action,
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error only affects a single record.
    ///
    /// Bulk submissions skip such records and keep going; anything else
    /// stops the batch.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Check if this error is an access-control rejection.
    #[must_use]
    pub fn is_permission_error(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }
}
