//! Rule-based password candidate generation.
//!
//! Rule text describes a candidate position by position: one line per
//! position, alternatives separated by `|`, and every position optional.
//! The generator enumerates all combinations whose length falls within an
//! inclusive window and streams them out one per line, in a deterministic
//! order, stopping early when a shared cancellation flag is raised.
//!
//! ```
//! use std::sync::atomic::AtomicBool;
//!
//! let cancel = AtomicBool::new(false);
//! let mut out = Vec::new();
//! let report = runlock::generate_candidates("a|b\nc", 1, 3, &cancel, &mut out).unwrap();
//!
//! assert_eq!(report.written, 5);
//! assert_eq!(out, b"ac\na\nbc\nb\nc\n");
//! ```

pub mod error;
pub mod generate;
pub mod rules;
pub mod wordlist;

pub use error::GenerateError;
pub use generate::{enumerate, generate_candidates, GenerationReport, LengthWindow, LineSink};
pub use rules::{Fragment, PositionGroup, RuleSet};
pub use wordlist::{dedup_lines, CleanStats};
