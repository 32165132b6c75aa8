//! # Error Handling
//!
//! Error types for the engine: a hand-rolled `Display` impl over an
//! `ErrorKind` enum, plain `std::error::Error`, extended with a
//! source/destination/cause/severity/timestamp on every instance.

use chrono::{DateTime, Utc};
use std::fmt;

/// Where in the pipeline an error originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSource {
    Write,
    Rotate,
    Compress,
    Lock,
    Flush,
}

impl ErrorSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorSource::Write => "write",
            ErrorSource::Rotate => "rotate",
            ErrorSource::Compress => "compress",
            ErrorSource::Lock => "lock",
            ErrorSource::Flush => "flush",
        }
    }

    /// Index into the fixed-size `errors_by_source` metrics array.
    pub fn index(self) -> usize {
        self as usize
    }

    pub const COUNT: usize = 5;
}

/// How serious an error is, used by the severity-threshold error handler
/// wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// The kind of failure underlying an [`EngineError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidIndex,
    Closed,
    Cancelled,
    InvalidConfig,
    WriteFailed,
    RotateFailed,
    CompressFailed,
    LockAcquisitionFailed,
    FlushFailed,
    ShutdownTimeout,
}

impl ErrorKind {
    fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidIndex => "invalid-index",
            ErrorKind::Closed => "closed",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::InvalidConfig => "invalid-config",
            ErrorKind::WriteFailed => "write-failed",
            ErrorKind::RotateFailed => "rotate-failed",
            ErrorKind::CompressFailed => "compress-failed",
            ErrorKind::LockAcquisitionFailed => "lock-acquisition-failed",
            ErrorKind::FlushFailed => "flush-failed",
            ErrorKind::ShutdownTimeout => "shutdown-timeout",
        }
    }
}

/// An engine error, carrying enough context for an error handler to decide
/// what to do with it without unwinding back to the producer.
#[derive(Debug, Clone)]
pub struct EngineError {
    pub kind: ErrorKind,
    pub source: Option<ErrorSource>,
    pub destination: Option<String>,
    pub cause: Option<String>,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

impl EngineError {
    pub fn new(kind: ErrorKind, severity: Severity) -> Self {
        EngineError {
            kind,
            source: None,
            destination: None,
            cause: None,
            severity,
            timestamp: Utc::now(),
        }
    }

    pub fn with_source(mut self, source: ErrorSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_destination(mut self, name: impl Into<String>) -> Self {
        self.destination = Some(name.into());
        self
    }

    pub fn with_cause(mut self, cause: impl fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    pub fn closed() -> Self {
        EngineError::new(ErrorKind::Closed, Severity::Low)
    }

    pub fn cancelled() -> Self {
        EngineError::new(ErrorKind::Cancelled, Severity::Low)
    }

    pub fn shutdown_timeout() -> Self {
        EngineError::new(ErrorKind::ShutdownTimeout, Severity::High)
    }

    pub fn invalid_config(cause: impl fmt::Display) -> Self {
        EngineError::new(ErrorKind::InvalidConfig, Severity::Medium).with_cause(cause)
    }

    pub fn write_failed(destination: impl Into<String>, cause: impl fmt::Display) -> Self {
        EngineError::new(ErrorKind::WriteFailed, Severity::Medium)
            .with_source(ErrorSource::Write)
            .with_destination(destination)
            .with_cause(cause)
    }

    pub fn rotate_failed(destination: impl Into<String>, cause: impl fmt::Display) -> Self {
        EngineError::new(ErrorKind::RotateFailed, Severity::Medium)
            .with_source(ErrorSource::Rotate)
            .with_destination(destination)
            .with_cause(cause)
    }

    pub fn compress_failed(destination: impl Into<String>, cause: impl fmt::Display) -> Self {
        EngineError::new(ErrorKind::CompressFailed, Severity::Low)
            .with_source(ErrorSource::Compress)
            .with_destination(destination)
            .with_cause(cause)
    }

    pub fn lock_failed(destination: impl Into<String>, cause: impl fmt::Display) -> Self {
        EngineError::new(ErrorKind::LockAcquisitionFailed, Severity::High)
            .with_source(ErrorSource::Lock)
            .with_destination(destination)
            .with_cause(cause)
    }

    pub fn flush_failed(destination: impl Into<String>, cause: impl fmt::Display) -> Self {
        EngineError::new(ErrorKind::FlushFailed, Severity::Medium)
            .with_source(ErrorSource::Flush)
            .with_destination(destination)
            .with_cause(cause)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.as_str())?;
        if let Some(dest) = &self.destination {
            write!(f, " (destination={dest})")?;
        }
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}

impl std::error::Error for EngineError {}

pub type Result<T> = std::result::Result<T, EngineError>;
