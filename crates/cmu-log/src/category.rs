//! Public/private message categories.

use serde::{Deserialize, Serialize};
use tracing::Level;

/// Prefix added to public messages.
pub const DEFAULT_LOG_PREFIX: &str = "SystemLog:";

/// Whether a message may be read by people without data access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataCategory {
    /// Derived from user data. Never prefixed.
    #[default]
    Private,
    /// Safe for anyone with log access.
    Public,
}

impl std::fmt::Display for DataCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataCategory::Private => write!(f, "private"),
            DataCategory::Public => write!(f, "public"),
        }
    }
}

/// Logger that prefixes public messages.
///
/// Each logger is an ordinary value; components that should share a prefix
/// share a logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfidentialLogger {
    prefix: String,
}

impl Default for ConfidentialLogger {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_PREFIX)
    }
}

impl ConfidentialLogger {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The text emitted for `message` under `category`.
    pub fn format(&self, category: DataCategory, message: &str) -> String {
        match category {
            DataCategory::Public => format!("{}{}", self.prefix, message),
            DataCategory::Private => message.to_string(),
        }
    }

    pub fn log(&self, level: Level, category: DataCategory, message: &str) {
        let text = self.format(category, message);
        match level {
            Level::TRACE => tracing::trace!(target: "cmu_log", %category, "{}", text),
            Level::DEBUG => tracing::debug!(target: "cmu_log", %category, "{}", text),
            Level::INFO => tracing::info!(target: "cmu_log", %category, "{}", text),
            Level::WARN => tracing::warn!(target: "cmu_log", %category, "{}", text),
            _ => tracing::error!(target: "cmu_log", %category, "{}", text),
        }
    }

    pub fn debug(&self, category: DataCategory, message: &str) {
        self.log(Level::DEBUG, category, message);
    }

    pub fn info(&self, category: DataCategory, message: &str) {
        self.log(Level::INFO, category, message);
    }

    pub fn warn(&self, category: DataCategory, message: &str) {
        self.log(Level::WARN, category, message);
    }

    pub fn error(&self, category: DataCategory, message: &str) {
        self.log(Level::ERROR, category, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_category_is_private() {
        assert_eq!(DataCategory::default(), DataCategory::Private);
    }

    #[test]
    fn test_public_is_prefixed() {
        let log = ConfidentialLogger::default();
        assert_eq!(
            log.format(DataCategory::Public, "public info"),
            "SystemLog:public info"
        );
    }

    #[test]
    fn test_private_is_untouched() {
        let log = ConfidentialLogger::new("Custom:");
        assert_eq!(log.format(DataCategory::Private, "row 3"), "row 3");
    }

    #[test]
    fn test_category_serde() {
        let json = serde_json::to_string(&DataCategory::Public).unwrap();
        assert_eq!(json, "\"public\"");
        let back: DataCategory = serde_json::from_str("\"private\"").unwrap();
        assert_eq!(back, DataCategory::Private);
    }
}
