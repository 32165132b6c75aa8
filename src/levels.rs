//! # Level Utilities
//!
//! Severity levels and their ordering, parsing, and text/symbol rendering.
//!
//! A six-variant ordering, `TRACE < DEBUG < INFO < WARN < ERROR < FATAL`,
//! wider than `tracing::Level`'s five.

use std::fmt;

/// Severity of a log record.
///
/// Ordered so `level_a < level_b` matches "less severe than".
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

/// How a level should be rendered by a text formatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelFormat {
    /// `"INFO"`
    Name,
    /// `"INFO"` (already uppercase; kept distinct from `Name` for clarity)
    Upper,
    /// `"info"`
    Lower,
    /// Single-character symbol, e.g. `"I"`
    Symbol,
}

impl Level {
    pub const ALL: [Level; 6] = [
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Fatal,
    ];

    /// Parses a level name, case-insensitively, with common aliases.
    ///
    /// `"warning"` is accepted alongside `"warn"`, and `"critical"` alongside
    /// `"fatal"`.
    pub fn parse(name: &str) -> Option<Level> {
        match name.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "fatal" | "critical" => Some(Level::Fatal),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }

    pub fn as_symbol(self) -> &'static str {
        match self {
            Level::Trace => "T",
            Level::Debug => "D",
            Level::Info => "I",
            Level::Warn => "W",
            Level::Error => "E",
            Level::Fatal => "F",
        }
    }

    pub fn render(self, format: LevelFormat) -> std::borrow::Cow<'static, str> {
        match format {
            LevelFormat::Name | LevelFormat::Upper => std::borrow::Cow::Borrowed(self.as_str()),
            LevelFormat::Lower => std::borrow::Cow::Owned(self.as_str().to_ascii_lowercase()),
            LevelFormat::Symbol => std::borrow::Cow::Borrowed(self.as_symbol()),
        }
    }

    /// Index into fixed-size per-level metric arrays.
    pub fn index(self) -> usize {
        self as u8 as usize
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_severity() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Fatal);
    }

    #[test]
    fn parses_aliases_case_insensitively() {
        assert_eq!(Level::parse("info"), Some(Level::Info));
        assert_eq!(Level::parse("WARNING"), Some(Level::Warn));
        assert_eq!(Level::parse("Critical"), Some(Level::Fatal));
        assert_eq!(Level::parse("nonsense"), None);
    }

    #[test]
    fn renders_requested_format() {
        assert_eq!(Level::Info.render(LevelFormat::Lower), "info");
        assert_eq!(Level::Error.render(LevelFormat::Symbol), "E");
        assert_eq!(Level::Warn.render(LevelFormat::Name), "WARN");
    }
}
