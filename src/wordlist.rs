use std::collections::HashSet;
use std::io::{BufRead, Write};

use anyhow::{Context, Result};

/// Counts reported by [`dedup_lines`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanStats {
    pub total_lines: usize,
    pub duplicates_removed: usize,
    pub unique_lines: usize,
}

/// Copy lines from `reader` to `writer`, dropping repeats and keeping first-occurrence order.
///
/// The empty line is treated like any other candidate: kept once.
pub fn dedup_lines<R: BufRead, W: Write>(reader: R, mut writer: W) -> Result<CleanStats> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut stats = CleanStats::default();

    for line in reader.lines() {
        let line = line.context("Failed to read line from wordlist")?;
        stats.total_lines += 1;

        if seen.contains(&line) {
            stats.duplicates_removed += 1;
            continue;
        }

        writeln!(writer, "{}", line).context("Failed to write to output wordlist")?;
        seen.insert(line);
        stats.unique_lines += 1;
    }

    writer.flush().context("Failed to flush output wordlist")?;
    Ok(stats)
}
