//! Category-aware logging, metrics, and argument parsing for confidential
//! pipelines.
//!
//! Provides:
//! - [`ConfidentialLogger`]: tags each message as public or private and
//!   prefixes public ones so log scrapers can tell them apart
//! - [`Metrics`] and [`RunRecorder`]: metric helpers that record to an
//!   experiment run or a local JSON lines file
//! - [`parse_compliant`]: clap parsing that logs usage errors publicly and
//!   exits with `EINVAL`
//!
//! # Usage
//!
//! ```ignore
//! use cmu_log::{init_logging, ConfidentialLogger, DataCategory, LogConfig};
//!
//! init_logging(&LogConfig::from_env(None, None))?;
//!
//! let log = ConfidentialLogger::default();
//! log.info(DataCategory::Public, "loaded 1200 rows");
//! log.info(DataCategory::Private, "first row: alice@example.com");
//! ```
//!
//! # Design Notes
//!
//! - stdout is reserved for command payloads
//! - stderr receives all log output (human or JSONL)

pub mod args;
pub mod category;
pub mod config;
pub mod error;
pub mod metrics;

pub use args::{parse_compliant, parse_known, ArgsExit, EINVAL};
pub use category::{ConfidentialLogger, DataCategory, DEFAULT_LOG_PREFIX};
pub use config::{LogConfig, LogFormat, LogLevel};
pub use error::{LogError, Result};
pub use metrics::{DirectoryStats, Metrics, RunRecord, RunRecorder, TimeBlock};

use std::io::IsTerminal;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// Call once at startup. A second call returns [`LogError::Init`].
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from(config.level).into())
        .with_env_var("CMU_LOG")
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Human => {
            let use_ansi = std::io::stderr().is_terminal();
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(use_ansi);

            if config.timestamps {
                registry.with(fmt_layer).try_init()
            } else {
                registry.with(fmt_layer.without_time()).try_init()
            }
        }
        LogFormat::Jsonl => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false),
            )
            .try_init(),
    };

    installed.map_err(|e| LogError::Init(e.to_string()))
}

/// Initialize logging from the environment only.
pub fn init_default_logging() -> Result<()> {
    init_logging(&LogConfig::from_env(None, None))
}
