// Licensed under the Apache-2.0 license

//! Logging hooks shared by the driver modules.
//!
//! Drivers take a `Logger` type parameter that defaults to [`NoOpLogger`], so
//! a build without a console pays nothing for the log calls. On hardware with
//! a serial port, [`WriteLogger`] forwards each line to any
//! `embedded_io::Write` sink.

use core::fmt::Write as _;
use embedded_io::Write;

/// Line sink used by drivers for diagnostics.
pub trait Logger {
    fn debug(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
}

/// Discards every message.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn debug(&mut self, _msg: &str) {}
    fn error(&mut self, _msg: &str) {}
}

/// Writes `[LEVEL] message\r\n` lines to a serial sink.
///
/// Write errors are dropped: a failing console must never stall the bus
/// handler that is logging through it.
pub struct WriteLogger<W: Write> {
    sink: W,
}

impl<W: Write> WriteLogger<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    fn line(&mut self, level: &str, msg: &str) {
        let _ = self.sink.write_all(b"[");
        let _ = self.sink.write_all(level.as_bytes());
        let _ = self.sink.write_all(b"] ");
        let _ = self.sink.write_all(msg.as_bytes());
        let _ = self.sink.write_all(b"\r\n");
    }
}

impl<W: Write> Logger for WriteLogger<W> {
    fn debug(&mut self, msg: &str) {
        self.line("DEBUG", msg);
    }

    fn error(&mut self, msg: &str) {
        self.line("ERROR", msg);
    }
}

/// Capacity of the stack buffer used by [`log_fmt`].
pub const LOG_LINE_CAPACITY: usize = 64;

/// Formats a message into a fixed buffer and hands it to `emit`.
///
/// Output longer than [`LOG_LINE_CAPACITY`] is truncated at the point where
/// the buffer filled up.
pub fn log_fmt(args: core::fmt::Arguments<'_>, emit: impl FnOnce(&str)) {
    let mut line = TruncatingLine(heapless::String::new());
    let _ = line.write_fmt(args);
    emit(line.0.as_str());
}

struct TruncatingLine(heapless::String<LOG_LINE_CAPACITY>);

impl core::fmt::Write for TruncatingLine {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}
