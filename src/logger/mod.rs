//! Structured logging setup.
//!
//! `HBSDMON_LOG` takes an env-filter directive (default `info`).
//! `HBSDMON_LOG_FORMAT=json` switches to one JSON object per line. All
//! output goes to stderr so stdout stays clean for `check --json`.

use std::env;
use std::io;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Filter directive variable.
pub const LOG_ENV: &str = "HBSDMON_LOG";
/// Output format variable (`json` or anything else for compact text).
pub const LOG_FORMAT_ENV: &str = "HBSDMON_LOG_FORMAT";

/// Log line layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    /// Parse a format name; unknown names fall back to compact.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Compact
        }
    }

    fn from_env() -> Self {
        env::var(LOG_FORMAT_ENV).map_or(Self::Compact, |raw| Self::parse(&raw))
    }
}

/// Install the global subscriber at `default_level` (`debug` for
/// `--verbose`) unless `HBSDMON_LOG` says otherwise. Later calls are no-ops.
pub fn init_with(default_level: LevelFilter) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();

    let layer = match LogFormat::from_env() {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(io::stderr)
            .with_filter(env_filter)
            .boxed(),
    };

    // A subscriber may already be set (tests, embedding); keep it.
    let _ = tracing_subscriber::registry().with(layer).try_init();
}
