use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::Mutex;

use flog_logs::{ConsoleSummary, FlushHandle, Level, PrintStats, Printer};

mod config;

use config::{Options, Settings};

/// Exit status after SIGINT or SIGTERM (128 + SIGINT)
const INTERRUPTED: i32 = 130;

/// flog - Filter logs on their severity (even multiline logs), with automatic
/// detection of log formats
#[derive(Parser, Debug)]
#[command(name = "flog")]
#[command(author, version, about, long_about = None)]
#[command(after_help = severities_help())]
struct Args {
    /// Log files to read (reads STDIN when none are given)
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Omit logs below specified severity
    #[arg(short = 's', long, value_name = "SEVERITY")]
    min: Option<Level>,

    /// Omit logs above specified severity
    #[arg(short = 'S', long, value_name = "SEVERITY")]
    max: Option<Level>,

    /// Omit logs of specified severity (can be specified multiple times)
    #[arg(short, long, value_name = "SEVERITY", value_delimiter = ',')]
    exclude: Vec<Level>,

    /// Omit logs of severity not specified with this flag (can be specified multiple times)
    #[arg(short, long, value_name = "SEVERITY", value_delimiter = ',')]
    include: Vec<Level>,

    /// Omit the "omitted logs" messages
    #[arg(short, long, overrides_with = "no_quiet")]
    quiet: bool,

    /// Show the "omitted logs" messages, even when the config file sets `quiet`
    #[arg(long, overrides_with = "quiet")]
    no_quiet: bool,

    /// Enable verbose diagnostics (can be specified up to 2 times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Read default options from a TOML file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Args {
    fn options(&self) -> Options {
        Options {
            min: self.min,
            max: self.max,
            exclude: self.exclude.clone(),
            include: self.include.clone(),
            quiet: match (self.quiet, self.no_quiet) {
                (true, _) => Some(true),
                (false, true) => Some(false),
                (false, false) => None,
            },
            verbose: self.verbose,
        }
    }
}

fn severities_help() -> String {
    let mut help = String::from("Severities:\n");
    for level in Level::ALL {
        help.push_str(&format!(
            "  {:<14} {}\n",
            level.as_str(),
            level.synonyms().join(", ")
        ));
    }
    help
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    let file_options = match &args.config {
        Some(path) => Options::load(path)?,
        None => Options::default(),
    };
    let settings = Settings::from(file_options.merge(args.options()));

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(settings.log_level.into()),
        )
        .with_writer(io::stderr)
        .init();

    tracing::debug!(
        min = ?settings.filter.min,
        max = ?settings.filter.max,
        exclude = %settings.filter.exclude,
        include = %settings.filter.include,
        "parsed filter"
    );

    // The stream being printed right now, for the SIGINT/SIGTERM handler
    let current: Arc<Mutex<Option<FlushHandle>>> = Arc::new(Mutex::new(None));
    {
        let current = Arc::clone(&current);
        ctrlc::set_handler(move || {
            let handle = current.lock().clone();
            match handle {
                Some(handle) => handle.flush_and_exit(INTERRUPTED),
                None => std::process::exit(INTERRUPTED),
            }
        })
        .context("failed to register interrupt handler")?;
    }

    if args.files.is_empty() {
        let stats = print_stream("STDIN", io::stdin().lock(), &settings, &current);
        return Ok(exit_code(finish("STDIN", stats)));
    }

    let ok = print_files(&args.files, |name, input| {
        print_stream(name, input, &settings, &current)
    });
    Ok(exit_code(ok))
}

/// Print each file in turn; `false` when any of them failed
fn print_files<F>(paths: &[PathBuf], mut print: F) -> bool
where
    F: FnMut(&str, BufReader<File>) -> io::Result<PrintStats>,
{
    let mut ok = true;
    for path in paths {
        let name = path.display().to_string();
        let file = match File::open(path).with_context(|| format!("failed to open file: {name}")) {
            Ok(file) => file,
            Err(e) => {
                tracing::error!("{:#}", e);
                ok = false;
                continue;
            }
        };
        let stats = print(&name, BufReader::new(file));
        if stdout_closed(&stats) {
            tracing::debug!(source = %name, "output closed, skipping remaining files");
            break;
        }
        ok &= finish(&name, stats);
    }
    ok
}

/// Filter one stream to stdout with a fresh printer
fn print_stream<R: BufRead>(
    name: &str,
    input: R,
    settings: &Settings,
    current: &Mutex<Option<FlushHandle>>,
) -> io::Result<PrintStats> {
    let stdout = io::stdout();
    let mut printer = Printer::new(
        name,
        input,
        stdout.lock(),
        settings.filter,
        Box::new(ConsoleSummary::stderr(settings.summaries)),
    );

    *current.lock() = Some(printer.flush_handle());
    let result = printer.run();
    *current.lock() = None;
    result
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Downstream closed early, e.g. `flog app.log | head`
fn stdout_closed(stats: &io::Result<PrintStats>) -> bool {
    matches!(stats, Err(e) if e.kind() == io::ErrorKind::BrokenPipe)
}

/// Log the outcome of one stream; `false` when it failed
fn finish(name: &str, stats: io::Result<PrintStats>) -> bool {
    match stats {
        Ok(stats) => {
            tracing::debug!(
                source = name,
                read = stats.lines_read,
                printed = stats.lines_printed,
                omitted = stats.lines_omitted,
                "finished"
            );
            true
        }
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => true,
        Err(e) => {
            tracing::error!(source = name, error = %e, "failed to read logs");
            false
        }
    }
}
