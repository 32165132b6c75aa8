//! # JSON Formatter
//!
//! One JSON object per line.
//! Mandatory keys `timestamp`, `level`, `message`; optional `fields`,
//! `file`, `line`, `stack_trace`. A `#[derive(Serialize)]` struct working
//! directly off [`Record`] and this crate's typed [`crate::value::Value`].

use super::Formatter;
use crate::record::Record;
use serde_json::{Map, Value as Json};

pub struct JsonFormatter {
    pub indent: bool,
}

impl Default for JsonFormatter {
    fn default() -> Self {
        JsonFormatter { indent: false }
    }
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    fn to_json(&self, record: &Record) -> Json {
        let mut obj = Map::new();
        obj.insert(
            "timestamp".to_string(),
            Json::String(record.timestamp.to_rfc3339()),
        );
        obj.insert("level".to_string(), Json::String(record.level.to_string()));
        obj.insert("message".to_string(), Json::String(record.message.clone()));

        if !record.fields.is_empty() {
            let mut fields = Map::with_capacity(record.fields.len());
            for (key, value) in record.fields.iter() {
                fields.insert(key.clone(), value.to_json());
            }
            obj.insert("fields".to_string(), Json::Object(fields));
        }

        if let Some(location) = &record.location {
            obj.insert("file".to_string(), Json::String(location.file.to_string()));
            obj.insert("line".to_string(), Json::from(location.line));
        }

        if let Some(trace) = &record.stack_trace {
            obj.insert("stack_trace".to_string(), Json::String(trace.clone()));
        }

        Json::Object(obj)
    }
}

impl Formatter for JsonFormatter {
    fn format(&self, record: &Record) -> Vec<u8> {
        let json = self.to_json(record);
        let mut out = if self.indent {
            serde_json::to_vec_pretty(&json).unwrap_or_default()
        } else {
            serde_json::to_vec(&json).unwrap_or_default()
        };
        out.push(b'\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::levels::Level;

    #[test]
    fn includes_mandatory_and_field_keys() {
        let formatter = JsonFormatter::new();
        let mut record = Record::new(Level::Info, "User logged in");
        record.fields.insert("user_id", 42);
        record.fields.insert("action", "login");
        let bytes = formatter.format(&record);
        let line = String::from_utf8(bytes).unwrap();
        let parsed: Json = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(parsed["message"], "User logged in");
        assert_eq!(parsed["level"], "INFO");
        assert_eq!(parsed["fields"]["user_id"], 42);
        assert_eq!(parsed["fields"]["action"], "login");
    }

    #[test]
    fn omits_absent_optional_keys() {
        let formatter = JsonFormatter::new();
        let record = Record::new(Level::Debug, "plain");
        let line = String::from_utf8(formatter.format(&record)).unwrap();
        let parsed: Json = serde_json::from_str(line.trim_end()).unwrap();
        assert!(parsed.get("fields").is_none());
        assert!(parsed.get("file").is_none());
    }
}
