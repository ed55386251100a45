//! Tracing subscriber writing to the browser console.
//!
//! Each formatted event is buffered and handed to the `console` method that
//! matches its level when the writer is dropped.

use std::io;

use tracing::{Level, Metadata};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

/// `MakeWriter` producing one [`ConsoleWriter`] per event.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleMakeWriter;

/// Buffers one formatted event.
#[derive(Debug)]
pub struct ConsoleWriter {
    level: Level,
    buffer: Vec<u8>,
}

impl ConsoleWriter {
    fn new(level: Level) -> Self {
        Self {
            level,
            buffer: Vec::new(),
        }
    }
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        let line = String::from_utf8_lossy(&self.buffer);
        let line = line.trim_end();
        if line.is_empty() {
            return;
        }
        let line = wasm_bindgen::JsValue::from_str(line);
        match self.level {
            Level::ERROR => web_sys::console::error_1(&line),
            Level::WARN => web_sys::console::warn_1(&line),
            Level::INFO => web_sys::console::info_1(&line),
            Level::DEBUG | Level::TRACE => web_sys::console::debug_1(&line),
        }
    }
}

impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter::new(Level::INFO)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        ConsoleWriter::new(*meta.level())
    }
}

/// Filter for `directive`, falling back to `info` when it does not parse.
pub fn filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the console subscriber. Later calls are ignored.
pub fn init(directive: &str) {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter(directive))
        .with_writer(ConsoleMakeWriter)
        .without_time()
        .with_target(false)
        .try_init();
    if installed.is_ok() {
        tracing::debug!(directive, "Console logging installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_directive_falls_back() {
        assert_eq!(filter("xrecon_core=loud").to_string(), "info");
        assert_eq!(filter("xrecon_core=debug").to_string(), "xrecon_core=debug");
    }
}
