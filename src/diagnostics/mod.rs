//! Diagnostics: bounded message formatting and message routing.
//!
//! Every message is logged through `tracing` and, when the host installed
//! one, handed to its [`MessageHandler`] tagged with the session id.
//!
//! ## Example
//!
//! ```
//! use ccg_script::diagnostics::MessageBuffer;
//!
//! let mut buffer = MessageBuffer::new(16);
//! assert_eq!(buffer.format(format_args!("card {}", 42)), "card 42");
//! // Messages that do not fit render as nothing
//! assert_eq!(buffer.format(format_args!("{}", "x".repeat(17))), "");
//! // or are cut at the capacity
//! assert_eq!(buffer.format_truncated(format_args!("{}", "x".repeat(17))).len(), 16);
//! ```

mod report;

use std::fmt::{self, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::SessionId;

/// Category of a diagnostic message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// A script or bridge failure.
    Error,
    /// Output requested by a script (`Debug.Message`).
    FromScript,
    /// Advisory output such as stack traces.
    ForDebug,
}

/// Host receiver of diagnostic messages.
pub trait MessageHandler {
    fn handle_message(&self, session: SessionId, message: &str, kind: MessageType);
}

impl<F> MessageHandler for F
where
    F: Fn(SessionId, &str, MessageType),
{
    fn handle_message(&self, session: SessionId, message: &str, kind: MessageType) {
        self(session, message, kind);
    }
}

/// A message did not fit the buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("message exceeds buffer capacity of {capacity} bytes")]
pub struct MessageOverflow {
    pub capacity: usize,
}

/// Fixed-capacity message buffer.
///
/// A message fits when its rendering is at most `capacity` bytes. The
/// buffer never grows past its capacity. Only [`MessageBuffer::format_truncated`]
/// leaves a partial message in it.
#[derive(Clone, Debug)]
pub struct MessageBuffer {
    buf: String,
    capacity: usize,
}

impl MessageBuffer {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: String::with_capacity(capacity),
            capacity,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Render `args`, or report that they do not fit.
    pub fn try_format(&mut self, args: fmt::Arguments<'_>) -> Result<&str, MessageOverflow> {
        self.buf.clear();
        let mut writer = BoundedWriter {
            buf: &mut self.buf,
            capacity: self.capacity,
            truncate: false,
        };
        if writer.write_fmt(args).is_err() {
            self.buf.clear();
            return Err(MessageOverflow {
                capacity: self.capacity,
            });
        }
        Ok(&self.buf)
    }

    /// Render `args`; empty when they do not fit.
    pub fn format(&mut self, args: fmt::Arguments<'_>) -> &str {
        match self.try_format(args) {
            Ok(text) => text,
            Err(_) => "",
        }
    }

    /// Render `args`, cut at the last character boundary within capacity.
    pub fn format_truncated(&mut self, args: fmt::Arguments<'_>) -> &str {
        self.buf.clear();
        let mut writer = BoundedWriter {
            buf: &mut self.buf,
            capacity: self.capacity,
            truncate: true,
        };
        // Err only marks the cut
        let _ = writer.write_fmt(args);
        &self.buf
    }
}

struct BoundedWriter<'a> {
    buf: &'a mut String,
    capacity: usize,
    /// Keep the prefix that fits instead of nothing.
    truncate: bool,
}

impl Write for BoundedWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.buf.len() + s.len() > self.capacity {
            if self.truncate {
                let mut end = self.capacity - self.buf.len();
                while !s.is_char_boundary(end) {
                    end -= 1;
                }
                self.buf.push_str(&s[..end]);
            }
            return Err(fmt::Error);
        }
        self.buf.push_str(s);
        Ok(())
    }
}
