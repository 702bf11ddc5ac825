//! Scrub policy configuration.
//!
//! A [`ScrubPolicy`] is plain data: it can be saved, loaded, and shipped to
//! another process to rebuild an identical harness there. Defaults come from
//! compiled-in values, overridable through environment variables.

use crate::allow::AllowList;
use crate::printer::Sink;
use crate::{Result, ScrubError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Token prepended to every emitted line.
pub const DEFAULT_PREFIX: &str = "SystemLog:";

/// Placeholder substituted for redacted messages.
pub const DEFAULT_SCRUB_MARKER: &str = "**Exception message scrubbed**";

/// Debug-mode signal; when truthy, harnesses default to disabled.
pub const ENV_DEBUG: &str = "CMU_DEBUG";

const ENV_PREFIX: &str = "CMU_SCRUB_PREFIX";
const ENV_MARKER: &str = "CMU_SCRUB_MARKER";
const ENV_KEEP_MESSAGE: &str = "CMU_SCRUB_KEEP_MESSAGE";
const ENV_ALLOW_LIST: &str = "CMU_SCRUB_ALLOW_LIST";
const ENV_TIMESTAMP: &str = "CMU_SCRUB_TIMESTAMP";
const ENV_DISABLE: &str = "CMU_SCRUB_DISABLE";

/// Redaction settings for one harness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrubPolicy {
    /// Prefix for every output line and every rewritten argument.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Replacement for messages that may not be disclosed.
    #[serde(default = "default_scrub_marker")]
    pub scrub_marker: String,

    /// Never redact.
    #[serde(default)]
    pub keep_message: bool,

    /// Regex patterns exempting an exception from redaction.
    #[serde(default)]
    pub allow_list: AllowList,

    /// Prepend a local timestamp to each output line.
    #[serde(default)]
    pub add_timestamp: bool,

    /// Make the harness a pure passthrough.
    #[serde(default = "debug_mode")]
    pub disabled: bool,

    /// Where traces are written.
    #[serde(default)]
    pub sink: Sink,
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_scrub_marker() -> String {
    DEFAULT_SCRUB_MARKER.to_string()
}

/// Whether the process runs in debug mode.
pub fn debug_mode() -> bool {
    std::env::var(ENV_DEBUG)
        .ok()
        .and_then(|v| parse_flag(&v))
        .unwrap_or(false)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

impl Default for ScrubPolicy {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            scrub_marker: default_scrub_marker(),
            keep_message: false,
            allow_list: AllowList::default(),
            add_timestamp: false,
            disabled: debug_mode(),
            sink: Sink::default(),
        }
    }
}

impl ScrubPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with `CMU_SCRUB_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut policy = Self::default();

        if let Ok(prefix) = std::env::var(ENV_PREFIX) {
            policy.prefix = prefix;
        }
        if let Ok(marker) = std::env::var(ENV_MARKER) {
            policy.scrub_marker = marker;
        }
        if let Some(keep) = env_flag(ENV_KEEP_MESSAGE)? {
            policy.keep_message = keep;
        }
        if let Ok(list) = std::env::var(ENV_ALLOW_LIST) {
            policy.allow_list = AllowList::new(
                list.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty()),
            );
        }
        if let Some(timestamp) = env_flag(ENV_TIMESTAMP)? {
            policy.add_timestamp = timestamp;
        }
        if let Some(disabled) = env_flag(ENV_DISABLE)? {
            policy.disabled = disabled;
        }

        Ok(policy)
    }

    /// Load a policy from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let policy: ScrubPolicy = serde_json::from_str(&content)?;
        Ok(policy)
    }

    /// Save the policy to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Compile the allow-list now rather than on the first failure.
    pub fn validate(&self) -> Result<()> {
        self.allow_list.validate()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_scrub_marker(mut self, marker: impl Into<String>) -> Self {
        self.scrub_marker = marker.into();
        self
    }

    pub fn with_keep_message(mut self, keep: bool) -> Self {
        self.keep_message = keep;
        self
    }

    pub fn with_allow_list<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow_list = AllowList::new(patterns);
        self
    }

    /// Add one pattern to the allow-list.
    pub fn allow(mut self, pattern: impl Into<String>) -> Self {
        let mut patterns = self.allow_list.patterns().to_vec();
        patterns.push(pattern.into());
        self.allow_list = AllowList::new(patterns);
        self
    }

    pub fn with_timestamp(mut self, enabled: bool) -> Self {
        self.add_timestamp = enabled;
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn with_sink(mut self, sink: Sink) -> Self {
        self.sink = sink;
        self
    }
}

fn env_flag(name: &str) -> Result<Option<bool>> {
    match std::env::var(name) {
        Ok(value) => parse_flag(&value)
            .map(Some)
            .ok_or_else(|| ScrubError::Config(format!("{name}: expected a boolean, got {value:?}"))),
        Err(_) => Ok(None),
    }
}
