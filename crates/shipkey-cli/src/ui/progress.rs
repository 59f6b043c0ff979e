//! Byte-count progress line on stderr.

use std::io::{IsTerminal, Write};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crossterm::{
    QueueableCommand,
    cursor::MoveToColumn,
    terminal::{Clear, ClearType},
};
use shipkey_core::{Progress, ProgressStage};

const REDRAW_INTERVAL: Duration = Duration::from_millis(100);

/// Renders `stage  done / total` on one line, redrawn in place.
///
/// Silent when stderr is not a terminal.
#[derive(Debug)]
pub struct TerminalProgress {
    enabled: bool,
    last_draw: Mutex<Option<Instant>>,
}

impl TerminalProgress {
    /// Progress line for the current terminal.
    pub fn new() -> Self {
        Self {
            enabled: std::io::stderr().is_terminal(),
            last_draw: Mutex::new(None),
        }
    }

    /// Clear the line once the operation is over.
    pub fn finish(&self) {
        if self.enabled {
            let _ = redraw(&mut std::io::stderr(), None);
        }
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress for TerminalProgress {
    fn on_progress(&self, stage: ProgressStage, done: u64, total: Option<u64>) {
        if !self.enabled {
            return;
        }
        let complete = total.is_some_and(|t| done >= t);
        {
            let Ok(mut last) = self.last_draw.lock() else {
                return;
            };
            if !complete && last.is_some_and(|at| at.elapsed() < REDRAW_INTERVAL) {
                return;
            }
            *last = Some(Instant::now());
        }
        let line = format_progress(stage, done, total);
        let _ = redraw(&mut std::io::stderr(), Some(&line));
    }
}

/// Rewrite the current line with `line`, or blank it.
fn redraw<W: Write>(out: &mut W, line: Option<&str>) -> std::io::Result<()> {
    out.queue(MoveToColumn(0))?;
    if let Some(line) = line {
        write!(out, "  {line}")?;
    }
    out.queue(Clear(ClearType::UntilNewLine))?;
    out.flush()
}

/// `"uploading   1.5 MiB / 3.0 MiB"`
pub fn format_progress(stage: ProgressStage, done: u64, total: Option<u64>) -> String {
    let label = stage.to_string();
    match total.filter(|&t| t > 0) {
        Some(total) => format!("{label:<12}{} / {}", format_bytes(done), format_bytes(total)),
        None => format!("{label:<12}{}", format_bytes(done)),
    }
}

/// Human readable size with binary units.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
