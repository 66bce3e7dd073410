//! Candidate enumeration and output.
//!
//! Candidates are produced depth-first over the position groups, trying each
//! group's alternatives in rule order. Output order is therefore deterministic:
//! lexicographic over the alternative lists, with the skip choice last.

use std::io::{self, BufWriter, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::GenerateError;
use crate::rules::{PositionGroup, RuleSet};

/// Inclusive `[min, max]` bounds on candidate length, in chars
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthWindow {
    min: usize,
    max: usize,
}

impl LengthWindow {
    /// Validate the bounds. Fails with `InvalidRange` if `min < 0` or `max < min`.
    pub fn new(min: i64, max: i64) -> Result<Self, GenerateError> {
        if min < 0 || max < min {
            return Err(GenerateError::InvalidRange { min, max });
        }
        Ok(Self {
            min: usize::try_from(min).unwrap_or(usize::MAX),
            max: usize::try_from(max).unwrap_or(usize::MAX),
        })
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn contains(&self, len: usize) -> bool {
        (self.min..=self.max).contains(&len)
    }
}

/// Outcome of one generation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationReport {
    /// Candidates accepted by the sink
    pub written: u64,
    /// The cancellation flag was observed before enumeration finished
    pub cancelled: bool,
}

/// Appends each candidate as a newline-terminated line to a buffered writer
pub struct LineSink<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> LineSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: BufWriter::new(inner),
        }
    }

    pub fn emit(&mut self, candidate: &str) -> io::Result<()> {
        self.writer.write_all(candidate.as_bytes())?;
        self.writer.write_all(b"\n")
    }

    /// Flush buffered lines and hand back the underlying writer
    pub fn finish(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|err| err.into_error())
    }
}

/// One position group being worked through
struct Frame {
    group: usize,
    next: usize,
    /// Buffer size (bytes, chars) before this group appended anything
    mark_bytes: usize,
    mark_len: usize,
}

/// What happened on entering a position
enum Entry {
    Cancelled,
    Leaf,
    Pushed,
}

struct Enumerator<'a, F> {
    groups: &'a [PositionGroup],
    window: LengthWindow,
    cancel: &'a AtomicBool,
    emit: F,
    current: String,
    current_len: usize,
    written: u64,
    cancelled: bool,
}

impl<F> Enumerator<'_, F>
where
    F: FnMut(&str) -> io::Result<()>,
{
    fn is_cancelled(&mut self) -> bool {
        if !self.cancelled && self.cancel.load(Ordering::Relaxed) {
            self.cancelled = true;
        }
        self.cancelled
    }

    fn restore(&mut self, bytes: usize, len: usize) {
        self.current.truncate(bytes);
        self.current_len = len;
    }

    /// Start position `index`: emit if every group is resolved, otherwise push a frame
    fn enter(&mut self, index: usize, stack: &mut Vec<Frame>) -> Result<Entry, GenerateError> {
        if self.is_cancelled() {
            return Ok(Entry::Cancelled);
        }

        if index == self.groups.len() {
            if self.window.contains(self.current_len) {
                (self.emit)(&self.current).map_err(GenerateError::SinkWriteFailure)?;
                self.written += 1;
            }
            return Ok(Entry::Leaf);
        }

        stack.push(Frame {
            group: index,
            next: 0,
            mark_bytes: self.current.len(),
            mark_len: self.current_len,
        });
        Ok(Entry::Pushed)
    }

    // Depth is bounded by the number of groups, so frames live on the heap
    fn run(&mut self) -> Result<(), GenerateError> {
        let groups = self.groups;
        let mut stack: Vec<Frame> = Vec::new();

        if let Entry::Cancelled = self.enter(0, &mut stack)? {
            return Ok(());
        }

        while let Some(frame) = stack.last_mut() {
            let Some(fragment) = groups[frame.group].alternatives().get(frame.next) else {
                stack.pop();
                // The parent's current alternative is now fully explored
                if let Some(parent) = stack.last() {
                    let (bytes, len) = (parent.mark_bytes, parent.mark_len);
                    self.restore(bytes, len);
                    if self.is_cancelled() {
                        return Ok(());
                    }
                }
                continue;
            };
            frame.next += 1;
            let (index, bytes, len) = (frame.group, frame.mark_bytes, frame.mark_len);

            // Prune: nothing below this branch can fit the window
            if self.current_len + fragment.len() <= self.window.max() {
                self.current.push_str(fragment.as_str());
                self.current_len += fragment.len();

                match self.enter(index + 1, &mut stack)? {
                    Entry::Cancelled => return Ok(()),
                    Entry::Pushed => continue,
                    Entry::Leaf => self.restore(bytes, len),
                }
            }

            if self.is_cancelled() {
                return Ok(());
            }
        }

        Ok(())
    }
}

/// Enumerate every candidate of `rules` that fits `window`, passing each to `emit` in order.
///
/// `cancel` is polled at the start of every step and after every alternative.
/// Once it reads true no further candidates are emitted and the report is
/// marked cancelled. An `emit` error aborts enumeration with `SinkWriteFailure`.
pub fn enumerate<F>(
    rules: &RuleSet,
    window: LengthWindow,
    cancel: &AtomicBool,
    emit: F,
) -> Result<GenerationReport, GenerateError>
where
    F: FnMut(&str) -> io::Result<()>,
{
    let mut enumerator = Enumerator {
        groups: rules.groups(),
        window,
        cancel,
        emit,
        current: String::with_capacity(window.max().min(1024)),
        current_len: 0,
        written: 0,
        cancelled: false,
    };
    enumerator.run()?;

    Ok(GenerationReport {
        written: enumerator.written,
        cancelled: enumerator.cancelled,
    })
}

/// Parse `rule_text` and write every candidate within `[min_len, max_len]` to `writer`, one per line.
///
/// The range is checked before anything is written. Output is buffered and
/// flushed once at the end, including after a cancelled run, so the writer
/// always ends up holding a prefix of the full output.
pub fn generate_candidates<W: Write>(
    rule_text: &str,
    min_len: i64,
    max_len: i64,
    cancel: &AtomicBool,
    writer: W,
) -> Result<GenerationReport, GenerateError> {
    let window = LengthWindow::new(min_len, max_len)?;
    let rules = RuleSet::parse(rule_text);

    let mut sink = LineSink::new(writer);
    let report = enumerate(&rules, window, cancel, |candidate| sink.emit(candidate))?;
    sink.finish()?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(rules: &str, min: i64, max: i64) -> Vec<String> {
        let cancel = AtomicBool::new(false);
        let mut out = Vec::new();
        let report = generate_candidates(rules, min, max, &cancel, &mut out).unwrap();
        assert!(!report.cancelled);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<String> = text.split_terminator('\n').map(str::to_string).collect();
        assert_eq!(report.written as usize, lines.len());
        lines
    }

    // Straightforward cartesian product, filtered afterwards
    fn brute_force(rules: &str, min: usize, max: usize) -> Vec<String> {
        let rules = RuleSet::parse(rules);
        let mut partials = vec![String::new()];
        for group in rules.groups() {
            partials = partials
                .iter()
                .flat_map(|prefix| group.fragments().into_iter().map(move |f| format!("{}{}", prefix, f)))
                .collect();
        }
        partials
            .into_iter()
            .filter(|c| (min..=max).contains(&c.chars().count()))
            .collect()
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn test_single_group() {
        assert_eq!(run("a|b", 0, 1), vec!["a", "b", ""]);
    }

    #[test]
    fn test_single_group_raw_output() {
        let cancel = AtomicBool::new(false);
        let mut out = Vec::new();
        generate_candidates("a|b", 0, 1, &cancel, &mut out).unwrap();
        assert_eq!(out, b"a\nb\n\n");
    }

    #[test]
    fn test_two_groups_order() {
        assert_eq!(run("a|b\nc", 1, 3), vec!["ac", "a", "bc", "b", "c"]);
    }

    #[test]
    fn test_empty_rules_emit_empty_candidate() {
        assert_eq!(run("", 0, 0), vec![""]);
        assert_eq!(run("", 0, 5), vec![""]);
    }

    #[test]
    fn test_empty_rules_below_min() {
        assert!(run("", 1, 5).is_empty());
    }

    #[test]
    fn test_invalid_range() {
        let cancel = AtomicBool::new(false);
        let mut out = Vec::new();
        let err = generate_candidates("a|b", 2, 1, &cancel, &mut out).unwrap_err();
        assert!(matches!(err, GenerateError::InvalidRange { min: 2, max: 1 }));
        assert!(out.is_empty());
    }

    #[test]
    fn test_negative_min_is_invalid() {
        let cancel = AtomicBool::new(false);
        let mut out = Vec::new();
        let err = generate_candidates("a", -1, 3, &cancel, &mut out).unwrap_err();
        assert!(matches!(err, GenerateError::InvalidRange { min: -1, max: 3 }));
        assert!(out.is_empty());
    }

    #[test]
    fn test_length_window() {
        let window = LengthWindow::new(2, 4).unwrap();
        assert!(!window.contains(1));
        assert!(window.contains(2));
        assert!(window.contains(4));
        assert!(!window.contains(5));
        assert!(LengthWindow::new(3, 3).is_ok());
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancel = AtomicBool::new(true);
        let mut out = Vec::new();
        let report = generate_candidates("a|b\nc", 0, 10, &cancel, &mut out).unwrap();
        assert_eq!(report, GenerationReport { written: 0, cancelled: true });
        assert!(out.is_empty());
    }

    #[test]
    fn test_duplicates_are_kept() {
        assert_eq!(run("a\na", 1, 1), vec!["a", "a"]);
    }

    #[test]
    fn test_prune_respects_max() {
        let rules = "abc|d\nef|g\nh|ijkl";
        for max in 0..8 {
            for candidate in run(rules, 0, max) {
                assert!(candidate.chars().count() <= max as usize);
            }
        }
    }

    #[test]
    fn test_matches_brute_force() {
        let cases = [
            ("a|b\nc", 0, 3),
            ("abc|d\nef|g\nh|ijkl", 2, 5),
            ("x|yy|zzz\n1|22\n!|@@", 3, 4),
            ("pass|Pass|PASS\n123|2024\n!", 4, 9),
            ("a\na\na", 1, 2),
        ];
        for (rules, min, max) in cases {
            assert_eq!(
                run(rules, min, max),
                brute_force(rules, min as usize, max as usize),
                "rules {:?} window [{}, {}]",
                rules,
                min,
                max
            );
        }
    }

    #[test]
    fn test_all_skip_candidate_considered() {
        assert_eq!(run("abc\ndef", 0, 0), vec![""]);
    }

    #[test]
    fn test_length_counts_chars_not_bytes() {
        assert_eq!(run("日本|é", 2, 2), vec!["日本"]);
        assert_eq!(run("日本|é", 1, 1), vec!["é"]);
    }

    #[test]
    fn test_deterministic_output() {
        let rules = "a|b|c\n1|2\nx|yz";
        let cancel = AtomicBool::new(false);
        let mut first = Vec::new();
        let mut second = Vec::new();
        generate_candidates(rules, 0, 4, &cancel, &mut first).unwrap();
        generate_candidates(rules, 0, 4, &cancel, &mut second).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_cancellation_yields_prefix() {
        let rules = RuleSet::parse("a|b|c\n1|2\nx|yz");
        let window = LengthWindow::new(0, 4).unwrap();
        let full = brute_force("a|b|c\n1|2\nx|yz", 0, 4);

        for stop_after in 1..full.len() {
            let cancel = AtomicBool::new(false);
            let mut seen = Vec::new();
            let report = enumerate(&rules, window, &cancel, |candidate| {
                seen.push(candidate.to_string());
                if seen.len() == stop_after {
                    cancel.store(true, Ordering::Relaxed);
                }
                Ok(())
            })
            .unwrap();

            assert!(report.cancelled);
            assert_eq!(report.written as usize, stop_after);
            assert_eq!(seen, full[..stop_after]);
        }
    }

    #[test]
    fn test_cancelled_run_flushes_prefix() {
        let rules = RuleSet::parse("a|b\nc");
        let window = LengthWindow::new(1, 3).unwrap();
        let cancel = AtomicBool::new(false);
        let mut sink = LineSink::new(Vec::new());
        let mut count = 0;
        let report = enumerate(&rules, window, &cancel, |candidate| {
            count += 1;
            if count == 2 {
                cancel.store(true, Ordering::Relaxed);
            }
            sink.emit(candidate)
        })
        .unwrap();
        assert!(report.cancelled);
        assert_eq!(sink.finish().unwrap(), b"ac\na\n");
    }

    #[test]
    fn test_sink_failure_aborts() {
        let rules = RuleSet::parse("a|b|c");
        let window = LengthWindow::new(0, 1).unwrap();
        let cancel = AtomicBool::new(false);
        let mut seen = Vec::new();
        let err = enumerate(&rules, window, &cancel, |candidate| {
            if seen.len() == 2 {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            seen.push(candidate.to_string());
            Ok(())
        })
        .unwrap_err();

        assert!(matches!(err, GenerateError::SinkWriteFailure(_)));
        assert_eq!(seen, vec!["a", "b"]);
    }

    #[test]
    fn test_sink_failure_from_writer() {
        let cancel = AtomicBool::new(false);
        let err = generate_candidates("a|b", 0, 1, &cancel, FailingWriter).unwrap_err();
        assert!(matches!(err, GenerateError::SinkWriteFailure(_)));
    }

    #[test]
    fn test_many_positions_with_zero_max() {
        let rules = vec!["a"; 100_000].join("\n");
        assert_eq!(run(&rules, 0, 0), vec![""]);
    }

    #[test]
    fn test_many_positions_cancelled_midway() {
        let rules = RuleSet::parse(&vec!["a|b"; 50_000].join("\n"));
        let window = LengthWindow::new(0, 3).unwrap();
        let cancel = AtomicBool::new(false);
        let mut seen = Vec::new();
        let report = enumerate(&rules, window, &cancel, |candidate| {
            seen.push(candidate.to_string());
            cancel.store(true, Ordering::Relaxed);
            Ok(())
        })
        .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.written, 1);
        assert_eq!(seen, vec!["aaa"]);
    }

    #[test]
    fn test_report_counts_written() {
        let cancel = AtomicBool::new(false);
        let report = generate_candidates("a|b\nc|d", 2, 2, &cancel, io::sink()).unwrap();
        assert_eq!(report, GenerationReport { written: 4, cancelled: false });
    }
}
