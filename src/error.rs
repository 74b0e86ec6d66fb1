//! Error Handling Module
//!
//! This module defines the failure taxonomy for both pipeline stages using the
//! `thiserror` crate. Expected skips (wrong part count, unrecognized attachment,
//! malformed XML) are not errors and never appear here; they are reported through
//! the outcome enums of the entry points.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DmarcError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Email parse error: {0}")]
    Mail(#[from] mailparse::MailParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid trigger event: {0}")]
    Event(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Object {bucket}/{key} not found")]
    NotFound { bucket: String, key: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Object {bucket}/{key} did not become readable within {waited:?}")]
    WaitTimeout {
        bucket: String,
        key: String,
        waited: Duration,
    },

    #[error("Invocation deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// The wording keeps the "Error" keyword that log alerting matches on.
    #[error("Error: Injection attempt in {bucket}/{key}")]
    InjectionAttempt { bucket: String, key: String },

    #[error("Unusable attachment: {0}")]
    Attachment(String),

    #[error("File too large: {0}")]
    FileTooLarge(String),
}

pub type Result<T> = std::result::Result<T, DmarcError>;
