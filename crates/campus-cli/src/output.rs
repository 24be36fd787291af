//! Output writing for command results
//!
//! Results go to stdout as JSON; status lines go to stderr and are
//! suppressed by `--quiet`.

use crate::error::Result;
use colored::Colorize;
use serde::Serialize;
use std::io::{self, Write};

/// Writes command results and status messages
pub struct OutputWriter {
    use_color: bool,
    quiet: bool,
    writer: Box<dyn Write>,
}

impl OutputWriter {
    /// Create a new output writer on stdout
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self::with_writer(use_color, quiet, Box::new(io::stdout()))
    }

    /// Create an output writer with a custom writer
    pub fn with_writer(use_color: bool, quiet: bool, writer: Box<dyn Write>) -> Self {
        Self {
            use_color,
            quiet,
            writer,
        }
    }

    /// Write a result as pretty-printed JSON
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let text = serde_json::to_string_pretty(value)?;
        writeln!(self.writer, "{text}")?;
        Ok(())
    }

    /// Report a completed action
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        if self.use_color {
            eprintln!("{} {}", "✓".green().bold(), message);
        } else {
            eprintln!("{message}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_json_output() {
        let captured = Captured::default();
        let mut output = OutputWriter::with_writer(false, true, Box::new(captured.clone()));

        output.json(&json!({"id": 42, "name": "Ada"})).unwrap();

        let text = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["id"], 42);
        assert!(text.ends_with('\n'));
    }
}
