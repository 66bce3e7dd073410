use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use runlock::{dedup_lines, enumerate, GenerateError, LengthWindow, LineSink, RuleSet};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Rule-based password candidate generator for archive password recovery
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the rule file: one position per line, alternatives separated by '|' ("-" reads stdin)
    #[arg(short, long)]
    rules: Option<String>,

    /// Path to the output wordlist (one candidate per line)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Minimum candidate length in characters (inclusive)
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    min: i64,

    /// Maximum candidate length in characters (inclusive, default: longest candidate the rules allow)
    #[arg(long, allow_negative_numbers = true)]
    max: Option<i64>,

    /// Skip the first N candidates (optional, for resuming/chunking)
    #[arg(long)]
    offset: Option<u64>,

    /// Stop after writing N candidates (optional)
    #[arg(short, long)]
    limit: Option<u64>,

    /// Cancel generation after this many seconds (optional)
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Quiet mode - only output a one-line summary
    #[arg(short, long, default_value_t = false)]
    quiet: bool,

    /// Verbose mode - show the latest candidate while generating
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Clean up a wordlist by removing duplicate lines
    Clean {
        /// Path to the input wordlist file
        #[arg(short, long)]
        input: PathBuf,

        /// Path to the output wordlist file
        #[arg(short, long)]
        output: PathBuf,

        /// Quiet mode - only output summary
        #[arg(short, long, default_value_t = false)]
        quiet: bool,
    },
    /// Show how a rule file is parsed and how large its search space is
    Inspect {
        /// Path to the rule file ("-" reads stdin)
        #[arg(short, long)]
        rules: String,
    },
}

/// Settings for one generation run, resolved from the command line
#[derive(Debug, Clone)]
struct GenerateConfig {
    rules: String,
    output: PathBuf,
    min: i64,
    max: Option<i64>,
    offset: u64,
    limit: Option<u64>,
    timeout: Option<Duration>,
    quiet: bool,
    verbose: bool,
}

/// Why a generation run stopped
#[derive(Debug, Clone, Copy, PartialEq)]
enum StopReason {
    /// Every combination was enumerated
    Completed,
    /// The --limit count was written
    LimitReached,
    /// The --timeout timer fired
    TimedOut,
}

/// Result of a generation run as seen by the command line
#[derive(Debug, Clone, Copy, PartialEq)]
struct GenerateOutcome {
    written: u64,
    skipped: u64,
    stop: StopReason,
}

/// Applies --offset and --limit on top of the line sink
struct CandidateWriter<W: Write> {
    sink: LineSink<W>,
    offset: u64,
    limit: Option<u64>,
    accepted: u64,
    written: u64,
}

impl<W: Write> CandidateWriter<W> {
    fn new(inner: W, offset: u64, limit: Option<u64>) -> Self {
        Self {
            sink: LineSink::new(inner),
            offset,
            limit,
            accepted: 0,
            written: 0,
        }
    }

    fn emit(&mut self, candidate: &str) -> io::Result<()> {
        self.accepted += 1;
        if self.accepted <= self.offset || self.limit_reached() {
            return Ok(());
        }
        self.sink.emit(candidate)?;
        self.written += 1;
        Ok(())
    }

    fn limit_reached(&self) -> bool {
        self.limit.is_some_and(|limit| self.written >= limit)
    }

    fn skipped(&self) -> u64 {
        self.accepted.min(self.offset)
    }

    fn finish(self) -> io::Result<W> {
        self.sink.finish()
    }
}

/// Read rule text from a file, or from stdin when the source is "-"
fn read_rules(source: &str) -> Result<String> {
    if source == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read rules from stdin")?;
        return Ok(text);
    }

    let path = Path::new(source);
    if !path.exists() {
        bail!("Rules file not found: {}", path.display());
    }
    std::fs::read_to_string(path).context("Failed to read rules file")
}

/// Raise the cancellation flag once `timeout` has elapsed
fn spawn_timeout(timeout: Duration, cancel: Arc<AtomicBool>, timed_out: Arc<AtomicBool>) {
    thread::spawn(move || {
        thread::sleep(timeout);
        timed_out.store(true, Ordering::Relaxed);
        cancel.store(true, Ordering::Relaxed);
    });
}

/// Generate candidates from a rule file into the output wordlist
fn generate_wordlist(config: &GenerateConfig) -> Result<GenerateOutcome> {
    let rule_text = read_rules(&config.rules)?;
    let rule_set = RuleSet::parse(&rule_text);

    let window = match config.max {
        Some(max) => LengthWindow::new(config.min, max)?,
        None => {
            let longest = i64::try_from(rule_set.longest_candidate()).unwrap_or(i64::MAX);
            LengthWindow::new(config.min, longest).with_context(|| {
                format!(
                    "No --max given; the longest candidate the rules allow is {} characters",
                    longest
                )
            })?
        }
    };

    if !config.quiet {
        println!(
            "{} Password Candidate Generator v{}",
            style("⚡").cyan(),
            env!("CARGO_PKG_VERSION")
        );
        println!("{}", style("─".repeat(50)).dim());
        println!("  Rules:     {}", style(&config.rules).green());
        println!("  Positions: {}", style(rule_set.len()).yellow());
        println!(
            "  Length:    {}..={}",
            style(window.min()).yellow(),
            style(window.max()).yellow()
        );
        match rule_set.combination_bound() {
            Some(bound) => println!("  Branches:  up to {}", style(bound).yellow()),
            None => println!("  Branches:  {}", style("more than 2^128").red()),
        }
        println!("  Output:    {}", style(config.output.display()).green());
        if config.offset > 0 {
            println!("  Offset:    {}", style(config.offset).yellow());
        }
        if let Some(limit) = config.limit {
            println!("  Limit:     {}", style(limit).yellow());
        }
        if let Some(timeout) = config.timeout {
            println!("  Timeout:   {}s", style(timeout.as_secs()).yellow());
        }
        println!("{}", style("─".repeat(50)).dim());
    }

    let file = File::create(&config.output).context("Failed to create output file")?;
    let mut writer = CandidateWriter::new(file, config.offset, config.limit);

    // Atomic flags for early termination
    let cancel = Arc::new(AtomicBool::new(writer.limit_reached()));
    let timed_out = Arc::new(AtomicBool::new(false));
    if let Some(timeout) = config.timeout {
        spawn_timeout(timeout, Arc::clone(&cancel), Arc::clone(&timed_out));
    }

    let pb = if config.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {pos} candidates {msg}")
                .expect("Invalid template"),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    };

    let started = Instant::now();
    let result = enumerate(&rule_set, window, &cancel, |candidate| {
        writer.emit(candidate)?;
        if writer.limit_reached() {
            cancel.store(true, Ordering::Relaxed);
        }
        if config.verbose {
            pb.set_message(format!("Last: {}", candidate));
        }
        if writer.accepted.is_multiple_of(1000) {
            pb.set_position(writer.written);
        }
        Ok(())
    });
    pb.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(err @ GenerateError::SinkWriteFailure(_)) => {
            return Err(anyhow::Error::new(err).context(format!(
                "Generation aborted after {} candidates",
                writer.written
            )));
        }
        Err(err) => return Err(err.into()),
    };

    let outcome = GenerateOutcome {
        written: writer.written,
        skipped: writer.skipped(),
        stop: if !report.cancelled {
            StopReason::Completed
        } else if writer.limit_reached() {
            StopReason::LimitReached
        } else if timed_out.load(Ordering::Relaxed) {
            StopReason::TimedOut
        } else {
            StopReason::Completed
        },
    };

    writer
        .finish()
        .context("Failed to flush output file")?
        .sync_all()
        .context("Failed to sync output file")?;

    if !config.quiet {
        println!("{} Summary", style("📊").cyan().bold());
        println!("{}", style("─".repeat(50)).dim());
        println!(
            "  Candidates written:   {}",
            style(outcome.written).green().bold()
        );
        if outcome.skipped > 0 {
            println!("  Skipped (offset):     {}", style(outcome.skipped).dim());
        }
        println!(
            "  Elapsed:              {}",
            style(format!("{:.2}s", started.elapsed().as_secs_f64())).yellow()
        );
        match outcome.stop {
            StopReason::Completed => {
                println!("  Status:               {}", style("complete").green())
            }
            StopReason::LimitReached => {
                println!("  Status:               {}", style("stopped at limit").yellow())
            }
            StopReason::TimedOut => {
                println!("  Status:               {}", style("cancelled (timeout)").red())
            }
        }
        println!("{}", style("─".repeat(50)).dim());
        println!(
            "{} Wordlist written to: {}",
            style("✓").green().bold(),
            style(config.output.display()).green()
        );
    } else {
        let status = match outcome.stop {
            StopReason::Completed => "",
            StopReason::LimitReached => ", limit reached",
            StopReason::TimedOut => ", timed out",
        };
        println!(
            "{} ({} candidates{})",
            config.output.display(),
            outcome.written,
            status
        );
    }

    Ok(outcome)
}

/// Print the parsed position groups and the size of the search space
fn inspect_rules(source: &str) -> Result<()> {
    let rule_text = read_rules(source)?;
    let rule_set = RuleSet::parse(&rule_text);

    println!("{} Rule Inspection", style("🔍").cyan());
    println!("{}", style("─".repeat(50)).dim());

    if rule_set.is_empty() {
        println!("  {} No positions (only the empty candidate)", style("ℹ").blue());
    }
    for (idx, group) in rule_set.groups().iter().enumerate() {
        let shown: Vec<String> = group
            .fragments()
            .iter()
            .map(|fragment| {
                if fragment.is_empty() {
                    style("<skip>").dim().to_string()
                } else {
                    format!("{:?}", fragment)
                }
            })
            .collect();
        println!("  {:>3}. {}", style(idx + 1).yellow(), shown.join(" | "));
    }

    println!("{}", style("─".repeat(50)).dim());
    println!("  Positions:         {}", style(rule_set.len()).yellow());
    println!(
        "  Longest candidate: {}",
        style(rule_set.longest_candidate()).yellow()
    );
    match rule_set.combination_bound() {
        Some(bound) => println!("  Combinations:      {}", style(bound).yellow()),
        None => println!("  Combinations:      {}", style("more than 2^128").red()),
    }

    Ok(())
}

/// Clean up a wordlist by removing duplicates while preserving order
fn clean_wordlist(input: &PathBuf, output: &PathBuf, quiet: bool) -> Result<()> {
    if !input.exists() {
        bail!("Input wordlist not found: {}", input.display());
    }

    if !quiet {
        println!("{} Wordlist Cleanup Tool", style("🧹").cyan());
        println!("{}", style("─".repeat(50)).dim());
        println!("  Input:  {}", style(input.display()).green());
        println!("  Output: {}", style(output.display()).green());
        println!("{}", style("─".repeat(50)).dim());
    }

    let file = File::open(input).context("Failed to open input wordlist")?;
    let out_file = File::create(output).context("Failed to create output wordlist")?;
    let stats = dedup_lines(BufReader::new(file), BufWriter::new(out_file))?;

    if !quiet {
        println!("{} Summary", style("📊").cyan().bold());
        println!("{}", style("─".repeat(50)).dim());
        println!("  Total lines read:     {}", style(stats.total_lines).yellow());
        println!(
            "  Duplicates removed:   {}",
            style(stats.duplicates_removed).red()
        );
        println!(
            "  Unique candidates:    {}",
            style(stats.unique_lines).green().bold()
        );
        println!("{}", style("─".repeat(50)).dim());
        println!(
            "{} Cleaned wordlist written to: {}",
            style("✓").green().bold(),
            style(output.display()).green()
        );
    } else {
        println!(
            "{} -> {} ({} unique, {} duplicates removed)",
            input.display(),
            output.display(),
            stats.unique_lines,
            stats.duplicates_removed
        );
    }

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Handle subcommands
    if let Some(command) = args.command {
        return match command {
            Commands::Clean {
                input,
                output,
                quiet,
            } => clean_wordlist(&input, &output, quiet),
            Commands::Inspect { rules } => inspect_rules(&rules),
        };
    }

    // Regular generation mode - require rules and output
    let rules = args.rules.ok_or_else(|| {
        anyhow::anyhow!("Rules file is required. Use --rules <PATH> or run 'runlock --help' for usage.")
    })?;
    let output = args.output.ok_or_else(|| {
        anyhow::anyhow!("Output path is required. Use --output <PATH> or run 'runlock --help' for usage.")
    })?;

    let config = GenerateConfig {
        rules,
        output,
        min: args.min,
        max: args.max,
        offset: args.offset.unwrap_or(0),
        limit: args.limit,
        timeout: args.timeout.map(Duration::from_secs),
        quiet: args.quiet,
        verbose: args.verbose,
    };

    generate_wordlist(&config)?;
    Ok(())
}
