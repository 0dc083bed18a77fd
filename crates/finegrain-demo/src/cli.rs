#![forbid(unsafe_code)]

//! Command-line argument parsing for the demo.
//!
//! Arguments are parsed by hand. Environment variables with the
//! `FINEGRAIN_DEMO_*` prefix override defaults; explicit flags override both.

use std::env;
use std::fmt;
use std::process;

use crate::logging::LogFormat;
use crate::screens::Example;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP_TEXT: &str = "\
finegrain-demo: coarse re-rendering vs. fine-grained observable updates

USAGE:
    finegrain-demo [OPTIONS]

OPTIONS:
    --ticks=N            Number of ticks to run (default: 5)
    --tick-ms=N          Milliseconds between ticks, 0 runs flat out (default: 1000)
    --example=NAME       'all', 'compare', 'props' or 'context' (default: all)
    --log-format=FMT     'pretty' or 'json' (default: pretty)
    --click=LABEL@TICK   Press the button LABEL after tick TICK (repeatable)
    --snapshot           Print a JSON snapshot of every store on exit
    --help, -h           Show this help message
    --version, -V        Show version

EXAMPLES:
    compare   Normal counter re-renders; fine-grained counter patches one slot
    props     Parent hands store nodes to Child and Child2
    context   Provider shares a store; ContextChild and ContextTrigger read it

ENVIRONMENT VARIABLES:
    FINEGRAIN_DEMO_TICKS       Override --ticks
    FINEGRAIN_DEMO_TICK_MS     Override --tick-ms
    FINEGRAIN_DEMO_EXAMPLE     Override --example
    FINEGRAIN_DEMO_LOG_FORMAT  Override --log-format
    FINEGRAIN_DEMO_SNAPSHOT    Enable --snapshot (1/true)
    FINEGRAIN_LOG              Log filter directives (falls back to RUST_LOG)";

/// A button press scheduled for a given tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedClick {
    pub label: String,
    /// Pressed after this tick completes; 0 presses before the first tick.
    pub tick: u64,
}

/// Parsed command-line options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opts {
    /// Number of ticks to drive.
    pub ticks: u64,
    /// Wall-clock milliseconds per tick.
    pub tick_ms: u64,
    /// Which examples to mount.
    pub example: Example,
    /// Log line format.
    pub log_format: LogFormat,
    /// Print store snapshots at exit.
    pub snapshot: bool,
    /// Button presses to replay.
    pub clicks: Vec<ScriptedClick>,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            ticks: 5,
            tick_ms: 1000,
            example: Example::All,
            log_format: LogFormat::Pretty,
            snapshot: false,
            clicks: Vec::new(),
        }
    }
}

/// Why parsing stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliError {
    /// `--help` was given.
    Help,
    /// `--version` was given.
    Version,
    InvalidValue { flag: &'static str, value: String },
    UnknownArg(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Help => f.write_str(HELP_TEXT),
            Self::Version => write!(f, "finegrain-demo {VERSION}"),
            Self::InvalidValue { flag, value } => write!(f, "Invalid {flag} value: {value}"),
            Self::UnknownArg(arg) => write!(f, "Unknown argument: {arg}"),
        }
    }
}

impl std::error::Error for CliError {}

fn invalid(flag: &'static str, value: &str) -> CliError {
    CliError::InvalidValue {
        flag,
        value: value.to_string(),
    }
}

fn parse_click(val: &str) -> Option<ScriptedClick> {
    let (label, tick) = val.rsplit_once('@')?;
    let label = label.trim();
    if label.is_empty() {
        return None;
    }
    Some(ScriptedClick {
        label: label.to_string(),
        tick: tick.trim().parse().ok()?,
    })
}

fn truthy(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true")
}

impl Opts {
    /// Parse process arguments and environment, exiting on `--help`,
    /// `--version` or bad input.
    #[must_use]
    pub fn parse() -> Self {
        match Self::parse_from(env::args().skip(1), |key| env::var(key).ok()) {
            Ok(opts) => opts,
            Err(err @ (CliError::Help | CliError::Version)) => {
                println!("{err}");
                process::exit(0);
            }
            Err(err) => {
                eprintln!("{err}");
                eprintln!("Run with --help for usage information.");
                process::exit(2);
            }
        }
    }

    /// Parse `args` (without the program name), reading overrides through
    /// `get_env`.
    ///
    /// # Errors
    ///
    /// [`CliError::Help`] and [`CliError::Version`] when asked for; the other
    /// variants for malformed input.
    pub fn parse_from<I, S, F>(args: I, get_env: F) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(&str) -> Option<String>,
    {
        let mut opts = Self::default();

        if let Some(val) = get_env("FINEGRAIN_DEMO_TICKS")
            && let Ok(n) = val.trim().parse()
        {
            opts.ticks = n;
        }
        if let Some(val) = get_env("FINEGRAIN_DEMO_TICK_MS")
            && let Ok(n) = val.trim().parse()
        {
            opts.tick_ms = n;
        }
        if let Some(val) = get_env("FINEGRAIN_DEMO_EXAMPLE")
            && let Ok(example) = val.trim().parse()
        {
            opts.example = example;
        }
        if let Some(val) = get_env("FINEGRAIN_DEMO_LOG_FORMAT")
            && let Ok(format) = val.parse()
        {
            opts.log_format = format;
        }
        if let Some(val) = get_env("FINEGRAIN_DEMO_SNAPSHOT") {
            opts.snapshot = truthy(val.trim());
        }

        for arg in args {
            let arg = arg.as_ref();
            match arg {
                "--help" | "-h" => return Err(CliError::Help),
                "--version" | "-V" => return Err(CliError::Version),
                "--snapshot" => opts.snapshot = true,
                other => {
                    if let Some(val) = other.strip_prefix("--ticks=") {
                        opts.ticks = val.parse().map_err(|_| invalid("--ticks", val))?;
                    } else if let Some(val) = other.strip_prefix("--tick-ms=") {
                        opts.tick_ms = val.parse().map_err(|_| invalid("--tick-ms", val))?;
                    } else if let Some(val) = other.strip_prefix("--example=") {
                        opts.example = val.parse().map_err(|()| invalid("--example", val))?;
                    } else if let Some(val) = other.strip_prefix("--log-format=") {
                        opts.log_format =
                            val.parse().map_err(|()| invalid("--log-format", val))?;
                    } else if let Some(val) = other.strip_prefix("--click=") {
                        let click = parse_click(val).ok_or_else(|| invalid("--click", val))?;
                        opts.clicks.push(click);
                    } else {
                        return Err(CliError::UnknownArg(other.to_string()));
                    }
                }
            }
        }

        Ok(opts)
    }
}
