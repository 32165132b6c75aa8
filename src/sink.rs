//! # Sink Contract
//!
//! Capability-set interface a destination's backend honors. Non-file
//! backends (syslog, network, database) are out of scope; the core only
//! needs the abstract contract plus one concrete console sink.
//! `supports_atomic` lets the router skip the destination's file lock for
//! backends that already serialize writes internally (e.g. a
//! single-threaded network client).

use crate::levels::Level;
use std::io;

pub trait Sink: Send {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
    fn close(&mut self) -> io::Result<()>;
    fn supports_atomic(&self) -> bool {
        false
    }
}

/// Writes to stdout/stderr, optionally ANSI-colored by level.
///
/// A standalone sink so a destination can target the console as readily as
/// a file.
pub struct ConsoleSink {
    use_stderr: bool,
    colorize: bool,
}

impl ConsoleSink {
    pub fn stdout() -> Self {
        ConsoleSink {
            use_stderr: false,
            colorize: false,
        }
    }

    pub fn stderr() -> Self {
        ConsoleSink {
            use_stderr: true,
            colorize: false,
        }
    }

    pub fn with_color(mut self, colorize: bool) -> Self {
        self.colorize = colorize;
        self
    }

    /// Wraps `bytes` in the level's ANSI color code when colorization is
    /// enabled. `level` is `None` for already-formatted bytes that carry no
    /// single associated level (e.g. a batch flush of mixed records).
    fn colorize(&self, level: Option<Level>, bytes: &[u8]) -> Vec<u8> {
        if !self.colorize {
            return bytes.to_vec();
        }
        let Some(level) = level else {
            return bytes.to_vec();
        };
        let code = crate::colorization::level_color_code(level);
        let mut out = Vec::with_capacity(bytes.len() + 16);
        out.extend_from_slice(code.as_bytes());
        out.extend_from_slice(bytes);
        out.extend_from_slice(b"\x1b[0m");
        out
    }
}

impl Sink for ConsoleSink {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        use io::Write as _;
        let payload = self.colorize(None, bytes);
        if self.use_stderr {
            io::stderr().write_all(&payload)
        } else {
            io::stdout().write_all(&payload)
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        use io::Write as _;
        if self.use_stderr {
            io::stderr().flush()
        } else {
            io::stdout().flush()
        }
    }

    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }

    fn supports_atomic(&self) -> bool {
        // Line-buffered std streams interleave safely enough for a console
        // sink; the engine still serializes through the destination lock.
        false
    }
}
