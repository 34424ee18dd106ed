//! DocBook to HTML conversion through pandoc.

use std::io::Write;
use std::process::{Command, Stdio};

use nixdex_core::{Error, MarkupConverter, Result};

/// Converter that pipes fragments through an external `pandoc`.
#[derive(Debug, Clone)]
pub struct PandocConverter {
    program: String,
    args: Vec<String>,
}

impl Default for PandocConverter {
    fn default() -> Self {
        Self::with_command(
            "pandoc",
            ["-f", "docbook", "-t", "html"].map(str::to_string).to_vec(),
        )
    }
}

impl PandocConverter {
    /// `pandoc -f docbook -t html`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different converter command reading stdin and writing stdout.
    pub fn with_command(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl MarkupConverter for PandocConverter {
    fn to_html(&self, docbook: &str) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::io_with_path(e, &self.program)
                } else {
                    Error::command(&self.program, e.to_string())
                }
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::command(&self.program, "stdin was not captured"))?;
        stdin
            .write_all(docbook.as_bytes())
            .map_err(|e| Error::command(&self.program, e.to_string()))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .map_err(|e| Error::command(&self.program, e.to_string()))?;
        if !output.status.success() {
            return Err(Error::command(
                &self.program,
                format!(
                    "exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        String::from_utf8(output.stdout)
            .map_err(|e| Error::command(&self.program, format!("output is not UTF-8: {e}")))
    }
}

// ============================================================================
// Tests
// ============================================================================
