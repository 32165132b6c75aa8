//! # Record
//!
//! The immutable value a producer creates and the router dispatches to
//! every enabled destination.

use crate::levels::Level;
use crate::value::Fields;
use chrono::{DateTime, Utc};

/// Where in the caller's source a record was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub file: &'static str,
    pub line: u32,
}

/// An immutable log event, created at the producer call site and consumed
/// by the router. Never mutated after being handed to the ingest channel.
#[derive(Debug, Clone)]
pub struct Record {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub fields: Fields,
    pub location: Option<Location>,
    pub stack_trace: Option<String>,
}

impl Record {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Record {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            fields: Fields::new(),
            location: None,
            stack_trace: None,
        }
    }

    pub fn with_fields(level: Level, message: impl Into<String>, fields: Fields) -> Self {
        Record {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            fields,
            location: None,
            stack_trace: None,
        }
    }
}
