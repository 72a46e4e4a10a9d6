use std::fmt::Write;

use tracing::{debug, error, info};

use super::{MessageHandler, MessageType};
use crate::core::BridgeError;
use crate::interpreter::Interpreter;

impl<'lua> Interpreter<'lua> {
    /// Log a message and hand it to the host's handler.
    pub fn emit_message(&self, message: &str, kind: MessageType) {
        match kind {
            MessageType::Error => error!(session = ?self.session(), "{message}"),
            MessageType::FromScript => info!(session = ?self.session(), "{message}"),
            MessageType::ForDebug => debug!(session = ?self.session(), "{message}"),
        }
        self.dispatch(message, kind);
    }

    /// Report a failure raised at `site`.
    ///
    /// The handler receives `"site": message` as an `Error`, cut to the
    /// buffer capacity. A Lua traceback carried by the error follows as a
    /// separate `ForDebug` message.
    pub fn report_error(&self, site: &str, err: &BridgeError) {
        error!(session = ?self.session(), site, error = %err, "script failure");
        let rendered = err.to_string();
        let (head, traceback) = split_traceback(&rendered);
        let text = self
            .with_state(|state| {
                state
                    .messages
                    .format_truncated(format_args!("\"{site}\": {head}"))
                    .to_string()
            })
            .unwrap_or_default();
        if !text.is_empty() {
            self.dispatch(&text, MessageType::Error);
        }
        if let Some(traceback) = traceback {
            self.emit_message(traceback, MessageType::ForDebug);
        }
    }

    /// Convert a Lua failure at `site` into a reported script error.
    pub(crate) fn script_failure(&self, site: &str, err: mlua::Error) -> BridgeError {
        let err = BridgeError::Script(err.to_string());
        self.report_error(site, &err);
        err
    }

    /// Emit a traceback of the active script frames as a debug message.
    ///
    /// Returns the number of frames reported; nothing is emitted when no
    /// script frame is active.
    pub fn print_stacktrace(&self) -> usize {
        let mut trace = String::from("stack traceback:");
        let mut level = 1;
        while let Some(frame) = self.lua().inspect_stack(level) {
            let source = frame.source();
            let names = frame.names();
            let short_src = source.short_src.as_deref().unwrap_or("?");
            let _ = match names.name.as_deref() {
                Some(name) => write!(
                    trace,
                    "\n\t{short_src}:{}: in function '{name}'",
                    frame.curr_line()
                ),
                None => write!(trace, "\n\t{short_src}:{}: in ?", frame.curr_line()),
            };
            level += 1;
        }

        let frames = level - 1;
        if frames > 0 {
            self.emit_message(&trace, MessageType::ForDebug);
        }
        frames
    }

    fn dispatch(&self, message: &str, kind: MessageType) {
        let Some(session) = self.session() else {
            return;
        };
        if let Some(handler) = self.lua().app_data_ref::<Box<dyn MessageHandler>>() {
            handler.handle_message(session, message, kind);
        }
    }
}

/// Split a rendered error into its message and its `stack traceback:` tail.
fn split_traceback(rendered: &str) -> (&str, Option<&str>) {
    match rendered.find(TRACEBACK_MARKER) {
        Some(at) => (
            rendered[..at].trim_end(),
            Some(rendered[at..].trim_end()),
        ),
        None => (rendered.trim_end(), None),
    }
}

const TRACEBACK_MARKER: &str = "stack traceback:";
