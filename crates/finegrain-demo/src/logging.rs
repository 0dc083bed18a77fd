#![forbid(unsafe_code)]

//! Subscriber setup for the demo binary.
//!
//! Filtering comes from `FINEGRAIN_LOG`, then `RUST_LOG`, then `info`.
//! Component renders are logged at `info`, store traffic at `debug` and
//! `trace`, so `FINEGRAIN_LOG=finegrain_state=debug` shows every commit.

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "FINEGRAIN_LOG";

const DEFAULT_DIRECTIVE: &str = "info";

/// Output format of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(()),
        }
    }
}

/// Build the filter from `FINEGRAIN_LOG` / `RUST_LOG`.
///
/// Unparseable directives fall back to the default level.
pub fn env_filter(get_env: impl Fn(&str) -> Option<String>) -> EnvFilter {
    let directives = get_env(LOG_ENV)
        .or_else(|| get_env("RUST_LOG"))
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string());
    EnvFilter::try_new(&directives).unwrap_or_else(|err| {
        eprintln!("ignoring {LOG_ENV}={directives}: {err}");
        EnvFilter::new(DEFAULT_DIRECTIVE)
    })
}

/// Install the global subscriber. Logs go to stderr so frames on stdout stay
/// clean. A second call is a no-op.
pub fn init(format: LogFormat) {
    let filter = env_filter(|key| std::env::var(key).ok());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    let _ = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    };
}
