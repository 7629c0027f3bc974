// src/core/errors.rs

//! Defines the primary error type for the entire application.

use thiserror::Error;

/// The main error enum, matching the error kinds of spec.md §7. Using
/// `thiserror` gives clean `Display` impls and automatic `From` conversions
/// without hand-rolling either.
#[derive(Error, Debug)]
pub enum PgAutoCtlError {
    #[error("bad arguments: {0}")]
    BadArgs(String),

    #[error("bad configuration: {0}")]
    BadConfig(String),

    #[error("bad state: {0}")]
    BadState(String),

    #[error("postgres control command failed: {0}")]
    PgCtlError(String),

    #[error("monitor error: {0}")]
    MonitorError(String),

    #[error("keeper error: {0}")]
    KeeperError(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl PgAutoCtlError {
    /// The process exit code for this error kind, per spec.md §6.
    pub fn exit_code(&self) -> i32 {
        match self {
            PgAutoCtlError::BadArgs(_) => 1,
            PgAutoCtlError::BadConfig(_) => 12,
            PgAutoCtlError::BadState(_) => 13,
            PgAutoCtlError::KeeperError(_) => 14,
            PgAutoCtlError::MonitorError(_) => 15,
            PgAutoCtlError::PgCtlError(_) => 16,
            PgAutoCtlError::InternalError(_) => 17,
        }
    }
}

impl From<std::io::Error> for PgAutoCtlError {
    fn from(e: std::io::Error) -> Self {
        PgAutoCtlError::InternalError(format!("I/O error: {e}"))
    }
}

impl From<config::ConfigError> for PgAutoCtlError {
    fn from(e: config::ConfigError) -> Self {
        PgAutoCtlError::BadConfig(e.to_string())
    }
}

impl From<bincode::error::EncodeError> for PgAutoCtlError {
    fn from(e: bincode::error::EncodeError) -> Self {
        PgAutoCtlError::InternalError(format!("encode error: {e}"))
    }
}

impl From<bincode::error::DecodeError> for PgAutoCtlError {
    fn from(e: bincode::error::DecodeError) -> Self {
        PgAutoCtlError::InternalError(format!("decode error: {e}"))
    }
}
