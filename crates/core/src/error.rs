//! Error types for the core engine

use std::io;
use thiserror::Error;

/// Reasons a section could not be inserted
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SectionError {
    #[error("section {0} is already registered")]
    Duplicate(String),
    #[error("section {0} is disabled by an override")]
    Disabled(String),
}

/// Invalid `std`, `tcp:host:port` or `unix:path` address
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("empty address")]
    Empty,
    #[error("unknown address kind in {0:?} (expected std, tcp:host:port or unix:path)")]
    UnknownKind(String),
    #[error("invalid tcp address {0:?} (expected tcp:host:port)")]
    InvalidTcp(String),
    #[error("unix address {0:?} has no path")]
    MissingPath(String),
    #[error("{0:?} cannot be used as a listening address")]
    NotListenable(String),
}

/// Malformed inbound action message
#[derive(Debug, Error)]
pub enum ActionParseError {
    #[error("invalid action JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("action message has no section name")]
    MissingName,
}

/// Failure of one stream; never affects any other stream
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("protocol error: {0}")]
    Parse(#[from] ActionParseError),
}

impl StreamError {
    /// Broken pipe is the consumer going away, not a fault
    pub fn is_disconnect(&self) -> bool {
        matches!(self, StreamError::Io(e) if e.kind() == io::ErrorKind::BrokenPipe)
    }
}
