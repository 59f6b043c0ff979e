//! Terminal output.

pub mod output;
pub mod progress;

pub use output::Output;
pub use progress::TerminalProgress;
