//! # Text Formatter
//!
//! Default line-oriented format:
//! `[<timestamp>] [<LEVEL>] <message><sep>k1=v1<sep>k2=v2...<sep>file=<path>:<line>[\nStack Trace:\n<trace>]\n`.
//!
//! A formatter with discrete, independently-toggled options rather than a
//! free-form template DSL (template strings are the out-of-scope
//! formatter-registry surface).

use super::Formatter;
use crate::levels::LevelFormat;
use crate::record::Record;
use chrono::{DateTime, Local, Utc};

/// Which clock a [`TextFormatter`] renders timestamps in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeZone {
    Utc,
    Local,
}

pub struct TextFormatter {
    pub timestamp_format: String,
    pub time_zone: TimeZone,
    pub include_level: bool,
    pub include_location: bool,
    pub field_separator: String,
    pub level_format: LevelFormat,
}

impl Default for TextFormatter {
    fn default() -> Self {
        TextFormatter {
            timestamp_format: "%Y-%m-%d %H:%M:%S%.3f".to_string(),
            time_zone: TimeZone::Local,
            include_level: true,
            include_location: true,
            field_separator: " ".to_string(),
            level_format: LevelFormat::Name,
        }
    }
}

impl TextFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    fn render_timestamp(&self, timestamp: DateTime<Utc>) -> String {
        match self.time_zone {
            TimeZone::Utc => timestamp.format(&self.timestamp_format).to_string(),
            TimeZone::Local => timestamp
                .with_timezone(&Local)
                .format(&self.timestamp_format)
                .to_string(),
        }
    }
}

impl Formatter for TextFormatter {
    fn format(&self, record: &Record) -> Vec<u8> {
        let mut out = String::with_capacity(64 + record.message.len());
        out.push('[');
        out.push_str(&self.render_timestamp(record.timestamp));
        out.push(']');

        if self.include_level {
            out.push_str(" [");
            out.push_str(&record.level.render(self.level_format));
            out.push(']');
        }

        out.push(' ');
        out.push_str(&record.message);

        for (key, value) in record.fields.iter() {
            out.push_str(&self.field_separator);
            out.push_str(key);
            out.push('=');
            out.push_str(&value.to_string());
        }

        if self.include_location {
            if let Some(location) = &record.location {
                out.push_str(&self.field_separator);
                out.push_str("file=");
                out.push_str(location.file);
                out.push(':');
                out.push_str(&location.line.to_string());
            }
        }

        if let Some(trace) = &record.stack_trace {
            out.push_str("\nStack Trace:\n");
            out.push_str(trace);
        }

        out.push('\n');
        out.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::levels::Level;

    #[test]
    fn renders_basic_line() {
        let formatter = TextFormatter {
            time_zone: TimeZone::Utc,
            include_location: false,
            ..Default::default()
        };
        let mut record = Record::new(Level::Info, "hello 42");
        record.timestamp = "2024-01-02T03:04:05.678Z".parse().unwrap();
        let bytes = formatter.format(&record);
        let line = String::from_utf8(bytes).unwrap();
        assert_eq!(line, "[2024-01-02 03:04:05.678] [INFO] hello 42\n");
    }

    #[test]
    fn appends_fields_and_location() {
        let formatter = TextFormatter {
            time_zone: TimeZone::Utc,
            ..Default::default()
        };
        let mut record = Record::new(Level::Warn, "disk low");
        record.timestamp = "2024-01-02T03:04:05Z".parse().unwrap();
        record.fields.insert("pct", 91);
        record.location = Some(crate::record::Location {
            file: "disk.rs",
            line: 42,
        });
        let line = String::from_utf8(formatter.format(&record)).unwrap();
        assert!(line.contains("pct=91"));
        assert!(line.contains("file=disk.rs:42"));
    }
}
