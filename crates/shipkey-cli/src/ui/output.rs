//! User-facing messages.
//!
//! Results go to stdout, everything else to stderr. Colour is only used when
//! the stream is a terminal.

use std::io::{IsTerminal, Write};

use crossterm::style::Stylize;

/// Prints status lines for commands.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    color: bool,
}

impl Output {
    /// Detect colour support from stderr.
    pub fn new() -> Self {
        Self {
            color: std::io::stderr().is_terminal(),
        }
    }

    /// Print a command result, e.g. a checksum, to stdout.
    pub fn result(&self, value: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{value}");
    }

    /// Prints an informational message.
    pub fn info(&self, msg: &str) {
        self.line("·", msg, Severity::Info);
    }

    /// Prints a success message.
    pub fn success(&self, msg: &str) {
        self.line("✓", msg, Severity::Success);
    }

    /// Prints a warning.
    pub fn warning(&self, msg: &str) {
        self.line("!", msg, Severity::Warning);
    }

    /// Prints an error as `error: <msg>`.
    pub fn error(&self, msg: &str) {
        let label = if self.color {
            "error:".red().bold().to_string()
        } else {
            "error:".to_string()
        };
        let _ = writeln!(std::io::stderr().lock(), "{label} {msg}");
    }

    fn line(&self, icon: &str, msg: &str, severity: Severity) {
        let icon = if self.color {
            match severity {
                Severity::Info => icon.dark_grey().to_string(),
                Severity::Success => icon.green().to_string(),
                Severity::Warning => icon.yellow().to_string(),
            }
        } else {
            icon.to_string()
        };
        let _ = writeln!(std::io::stderr().lock(), "  {icon} {msg}");
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
enum Severity {
    Info,
    Success,
    Warning,
}
