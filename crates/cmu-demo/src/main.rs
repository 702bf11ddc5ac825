//! Sample pipeline steps that fail with confidential payloads.
//!
//! Each subcommand runs inside a scrubbing harness. Failures print a
//! prefixed, scrubbed stack trace on stderr and exit with status 1.

use clap::{Args, Parser, Subcommand};
use cmu_log::{
    init_default_logging, init_logging, parse_compliant, ConfidentialLogger, DataCategory,
    LogConfig, LogFormat, LogLevel, Metrics, RunRecorder,
};
use cmu_scrub::{
    exception, Exception, Harness, HarnessError, ScrubPolicy, ARITHMETIC_ERROR,
    MODULE_NOT_FOUND_ERROR, PUBLIC_VALUE_ERROR, ZERO_DIVISION_ERROR,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Run sample steps inside an exception-scrubbing harness
#[derive(Parser, Debug)]
#[command(name = "cmu-demo")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Harness and logging options
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Prefix for every emitted trace line
    #[arg(long, global = true)]
    prefix: Option<String>,

    /// Replacement for redacted messages
    #[arg(long, global = true)]
    scrub_marker: Option<String>,

    /// Show every message verbatim
    #[arg(long, global = true)]
    keep_message: bool,

    /// Disclose messages whose type or text matches PATTERN
    #[arg(long = "allow", value_name = "PATTERN", global = true)]
    allow: Vec<String>,

    /// Timestamp each trace line
    #[arg(long, global = true)]
    timestamp: bool,

    /// Run without scrubbing
    #[arg(long, global = true)]
    disable: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format (human, jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Load the harness policy from a JSON file
    #[arg(long, value_name = "FILE", global = true)]
    policy: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Divide two numbers; fails with ZeroDivisionError by default
    Divide {
        #[arg(long, default_value_t = 1)]
        numerator: i64,
        #[arg(long, default_value_t = 0)]
        denominator: i64,
    },

    /// Fail with a missing module wrapped in an ArithmeticError
    Nested,

    /// Fail with a PublicValueError carrying MESSAGE
    Public { message: String },

    /// Log public and private sample messages
    Categories,
}

fn main() {
    let logger = ConfidentialLogger::default();

    let cli = match parse_compliant::<Cli, _, _>(&logger, std::env::args_os()) {
        Ok(cli) => cli,
        Err(exit) if exit.is_error() => {
            // The subscriber is not installed yet.
            if init_default_logging().is_ok() {
                logger.error(DataCategory::Public, exit.message.trim_end());
            } else {
                eprint!("{}", exit.message);
            }
            std::process::exit(exit.code)
        }
        Err(exit) => exit.exit(),
    };

    let log_config = LogConfig::from_env(cli.global.log_level, cli.global.log_format);
    if let Err(e) = init_logging(&log_config) {
        eprintln!("warning: {}", e);
    }
    let logger = log_config.logger();

    let policy = match build_policy(&cli.global) {
        Ok(policy) => policy,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(2);
        }
    };

    let harness = Harness::new(policy);
    let code = match run(&cli.command, &harness, &logger) {
        Ok(()) => 0,
        Err(HarnessError::Raised(exception)) => {
            eprintln!("{}: {}", exception.type_name(), exception);
            1
        }
        Err(HarnessError::Pipeline(e)) => {
            eprintln!("error: {}", e);
            2
        }
    };
    std::process::exit(code);
}

/// Policy file (or environment) overlaid with command line flags.
fn build_policy(opts: &GlobalOpts) -> cmu_scrub::Result<ScrubPolicy> {
    let mut policy = match &opts.policy {
        Some(path) => ScrubPolicy::load(path)?,
        None => ScrubPolicy::from_env()?,
    };

    if let Some(prefix) = &opts.prefix {
        policy = policy.with_prefix(prefix.clone());
    }
    if let Some(marker) = &opts.scrub_marker {
        policy = policy.with_scrub_marker(marker.clone());
    }
    if opts.keep_message {
        policy = policy.with_keep_message(true);
    }
    for pattern in &opts.allow {
        policy = policy.allow(pattern.clone());
    }
    if opts.timestamp {
        policy = policy.with_timestamp(true);
    }
    if opts.disable {
        policy = policy.with_disabled(true);
    }

    policy.validate()?;
    Ok(policy)
}

fn run(command: &Commands, harness: &Harness, logger: &ConfidentialLogger) -> Result<(), HarnessError> {
    match command {
        Commands::Divide {
            numerator,
            denominator,
        } => {
            let quotient = harness.call(|| divide(*numerator, *denominator))?;
            println!("{}", quotient);
            Ok(())
        }
        Commands::Nested => harness.call(compute_statistics),
        Commands::Public { message } => harness.call(|| validate_input(message)),
        Commands::Categories => {
            categories(logger);
            Ok(())
        }
    }
}

fn divide(numerator: i64, denominator: i64) -> Result<i64, Exception> {
    if denominator == 0 {
        return Err(exception!(&ZERO_DIVISION_ERROR, "division by zero"));
    }
    Ok(numerator / denominator)
}

fn load_module(name: &str) -> Result<(), Exception> {
    Err(exception!(
        &MODULE_NOT_FOUND_ERROR,
        format!("No module named '{}'", name)
    ))
}

fn compute_statistics() -> Result<(), Exception> {
    load_module("secret_training_lib").map_err(|err| {
        exception!(
            &ARITHMETIC_ERROR,
            "statistics unavailable for secret_training_lib"
        )
        .caused_by(err)
    })
}

fn validate_input(message: &str) -> Result<(), Exception> {
    Err(exception!(&PUBLIC_VALUE_ERROR, message.to_string()))
}

fn categories(logger: &ConfidentialLogger) {
    logger.info(DataCategory::Public, "public info");
    logger.info(DataCategory::Private, "private row: alice@example.com");

    let metrics = Metrics::new(Arc::new(RunRecorder::offline()), logger.clone());
    let rows = metrics.time_function("count_rows", || 2);
    if let Err(e) = metrics.log_metric(DataCategory::Public, "rows", rows) {
        logger.warn(DataCategory::Public, &format!("failed to record rows: {}", e));
    }
}
