//! Upgrade confirmation.

use std::io::Write;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal;
use crossterm::tty::IsTty;
use tracing::debug;

/// Asks whether to go ahead with an upgrade.
pub trait Confirm: Send + Sync {
    /// `true` to install.
    fn confirm(&self, question: &str) -> bool;
}

/// Single-keypress prompt on the controlling terminal.
///
/// Without an interactive terminal the answer is "no".
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

impl Confirm for TerminalPrompt {
    fn confirm(&self, question: &str) -> bool {
        if !std::io::stdin().is_tty() || !std::io::stderr().is_tty() {
            debug!("no interactive terminal, declining upgrade");
            return false;
        }

        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "{question} [Y/n] ");
        let _ = stderr.flush();
        let key = read_key();
        let _ = writeln!(stderr);

        key.is_some_and(accepts)
    }
}

fn read_key() -> Option<KeyCode> {
    if let Err(e) = terminal::enable_raw_mode() {
        debug!("cannot enter raw mode: {e}");
        return None;
    }
    let key = loop {
        match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => break Some(key.code),
            Ok(_) => {}
            Err(e) => {
                debug!("reading key failed: {e}");
                break None;
            }
        }
    };
    let _ = terminal::disable_raw_mode();
    key
}

/// Enter, `y` and `Y` accept; every other key declines.
pub fn accepts(key: KeyCode) -> bool {
    matches!(key, KeyCode::Enter | KeyCode::Char('y' | 'Y'))
}

/// Fixed answer, for `--yes` style flags and tests.
#[derive(Debug, Clone, Copy)]
pub struct AutoAnswer(pub bool);

impl Confirm for AutoAnswer {
    fn confirm(&self, _question: &str) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_keys() {
        assert!(accepts(KeyCode::Enter));
        assert!(accepts(KeyCode::Char('y')));
        assert!(accepts(KeyCode::Char('Y')));
        assert!(!accepts(KeyCode::Char('n')));
        assert!(!accepts(KeyCode::Char('c')));
        assert!(!accepts(KeyCode::Esc));
    }
}
