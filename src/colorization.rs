//! # Console Colorization
//!
//! ANSI color codes keyed by level, consumed by [`crate::sink::ConsoleSink`].
//! A fixed built-in per-level palette; a pluggable custom-color API is out
//! of this core's scope.

use crate::levels::Level;

/// Named ANSI codes, kept so a caller constructing a custom per-level
/// palette can still go through `color_name_to_code`-style lookups.
pub fn color_name_to_code(color: &str) -> &'static str {
    match color.to_uppercase().as_str() {
        "BLACK" => "30",
        "RED" => "31",
        "GREEN" => "32",
        "YELLOW" => "33",
        "BLUE" => "34",
        "MAGENTA" => "35",
        "CYAN" => "36",
        "WHITE" => "37",
        "BRIGHT_BLACK" | "GRAY" => "90",
        "BRIGHT_RED" => "91",
        "BRIGHT_GREEN" => "92",
        "BRIGHT_YELLOW" => "93",
        "BRIGHT_BLUE" => "94",
        "BRIGHT_MAGENTA" => "95",
        "BRIGHT_CYAN" => "96",
        "BRIGHT_WHITE" => "97",
        _ => "39",
    }
}

/// The built-in ANSI escape prefix for a level, used by `ConsoleSink` when
/// colorization is enabled.
pub fn level_color_code(level: Level) -> &'static str {
    match level {
        Level::Trace => "\x1b[90m",
        Level::Debug => "\x1b[36m",
        Level::Info => "\x1b[32m",
        Level::Warn => "\x1b[33m",
        Level::Error => "\x1b[31m",
        Level::Fatal => "\x1b[91m",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_named_colors() {
        assert_eq!(color_name_to_code("RED"), "31");
        assert_eq!(color_name_to_code("red"), "31");
        assert_eq!(color_name_to_code("bright_green"), "92");
    }

    #[test]
    fn error_and_fatal_use_red_family() {
        assert_eq!(level_color_code(Level::Error), "\x1b[31m");
        assert_eq!(level_color_code(Level::Fatal), "\x1b[91m");
    }
}
