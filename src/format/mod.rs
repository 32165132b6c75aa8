//! # Formatter Contract
//!
//! The core consumes an abstract `format(record) -> bytes` collaborator.
//! The formatter registry, template-string DSL, and any third-party
//! formatter plugins are out of scope; this module ships the two concrete
//! formatters used as defaults (`text`, `json`) behind a `Formatter` trait
//! object the router and destinations hold.

mod json;
mod text;

pub use json::JsonFormatter;
pub use text::TextFormatter;

use crate::record::Record;

/// Turns one [`Record`] into the bytes written to a destination's sink.
///
/// Implementors must be stateless with respect to a single call: the same
/// record formatted twice must produce identical bytes.
pub trait Formatter: Send + Sync {
    fn format(&self, record: &Record) -> Vec<u8>;

    /// Formats into a caller-supplied, possibly pool-recycled buffer rather
    /// than allocating a fresh one. `buf` is cleared first; the default
    /// implementation still allocates internally and copies, which is
    /// correct for any formatter but gives none of the pool's benefit —
    /// override it to format directly into `buf` when that's worth doing.
    fn format_into(&self, record: &Record, buf: &mut Vec<u8>) {
        buf.clear();
        buf.extend_from_slice(&self.format(record));
    }
}
