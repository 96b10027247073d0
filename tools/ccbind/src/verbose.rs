//! Output levels for ccbind diagnostics.
//!
//! - **Quiet** (`-q`): errors and the final summary
//! - **Normal**: one line per toolchain and library, plus the above
//! - **Verbose** (`-v`): lookup paths, skipped alias branches, timings

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

/// Output verbosity level, ordered from least to most output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet = 0,
    Normal = 1,
    Verbose = 2,
}

impl Verbosity {
    /// Level selected by the `-q` / `-v` flags; `-q` wins.
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, true) => Self::Verbose,
            (false, false) => Self::Normal,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Quiet,
            2 => Self::Verbose,
            _ => Self::Normal,
        }
    }
}

static LEVEL: AtomicU8 = AtomicU8::new(Verbosity::Normal as u8);

/// Set the process-wide level. Called once from `main`.
pub fn init(level: Verbosity) {
    LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Whether messages at `level` should be printed.
pub fn enabled(level: Verbosity) -> bool {
    Verbosity::from_u8(LEVEL.load(Ordering::Relaxed)) >= level
}

/// `println!` that only prints with `-v`.
macro_rules! vprintln {
    ($($arg:tt)*) => {
        if $crate::verbose::enabled($crate::verbose::Verbosity::Verbose) {
            println!($($arg)*);
        }
    };
}

pub(crate) use vprintln;

/// `println!` that is silenced by `-q`.
macro_rules! dprintln {
    ($($arg:tt)*) => {
        if $crate::verbose::enabled($crate::verbose::Verbosity::Normal) {
            println!($($arg)*);
        }
    };
}

pub(crate) use dprintln;

/// Prints the elapsed time of a labeled step on drop, in verbose mode.
pub struct Timer {
    label: String,
    start: Instant,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            start: Instant::now(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if enabled(Verbosity::Verbose) {
            println!("  {}: {:.1?}", self.label, self.start.elapsed());
        }
    }
}
