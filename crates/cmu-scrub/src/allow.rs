//! Allow-list matching.
//!
//! An exception's message may be disclosed when any pattern, user supplied
//! or default, is found (case-insensitively, anywhere) in either its type
//! name or its message.

use crate::exception::{PUBLIC_ARGUMENT_ERROR, PUBLIC_RUNTIME_ERROR, PUBLIC_VALUE_ERROR};
use crate::{Result, ScrubError};
use once_cell::sync::OnceCell;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Patterns always appended to the user's allow-list.
pub fn default_patterns() -> [&'static str; 3] {
    [
        PUBLIC_VALUE_ERROR.name(),
        PUBLIC_RUNTIME_ERROR.name(),
        PUBLIC_ARGUMENT_ERROR.name(),
    ]
}

/// User allow-list patterns, compiled on first use.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct AllowList {
    patterns: Vec<String>,
    compiled: OnceCell<std::result::Result<Vec<Regex>, (String, String)>>,
}

impl AllowList {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
            compiled: OnceCell::new(),
        }
    }

    /// The user patterns, without the defaults.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether an exception with this type name and message may be
    /// disclosed verbatim.
    pub fn is_allowed(&self, type_name: &str, message: &str) -> Result<bool> {
        let regexes = self.compiled()?;
        Ok(regexes
            .iter()
            .any(|re| re.is_match(message) || re.is_match(type_name)))
    }

    /// Compile every pattern now instead of at first evaluation.
    pub fn validate(&self) -> Result<()> {
        self.compiled().map(|_| ())
    }

    fn compiled(&self) -> Result<&[Regex]> {
        let compiled = self.compiled.get_or_init(|| {
            self.patterns
                .iter()
                .map(String::as_str)
                .chain(default_patterns())
                .map(|pattern| {
                    RegexBuilder::new(pattern)
                        .case_insensitive(true)
                        .build()
                        .map_err(|e| (pattern.to_string(), e.to_string()))
                })
                .collect()
        });

        match compiled {
            Ok(regexes) => Ok(regexes.as_slice()),
            Err((pattern, reason)) => Err(ScrubError::Pattern {
                pattern: pattern.clone(),
                reason: reason.clone(),
            }),
        }
    }
}

impl From<Vec<String>> for AllowList {
    fn from(patterns: Vec<String>) -> Self {
        AllowList::new(patterns)
    }
}

impl From<AllowList> for Vec<String> {
    fn from(list: AllowList) -> Self {
        list.patterns
    }
}

impl PartialEq for AllowList {
    fn eq(&self, other: &Self) -> bool {
        self.patterns == other.patterns
    }
}

/// One-shot check against a pattern list.
pub fn is_allowed(type_name: &str, message: &str, user_patterns: &[String]) -> Result<bool> {
    AllowList::new(user_patterns.iter().cloned()).is_allowed(type_name, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(p: &[&str]) -> Vec<String> {
        p.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_matches_type_name() {
        let ok = is_allowed(
            "ModuleNotFoundError",
            "Bingo. It is a pickle.",
            &patterns(&["argparse", "ModuleNotFound"]),
        )
        .unwrap();
        assert!(ok);
    }

    #[test]
    fn test_no_match() {
        let ok = is_allowed(
            "ModuleNotFoundError",
            "Bingo. It is a pickle.",
            &patterns(&["argparse", "type"]),
        )
        .unwrap();
        assert!(!ok);
    }

    #[test]
    fn test_regex_search_in_message() {
        let ok = is_allowed(
            "ModuleNotFoundError",
            "Bingo. It is a pickle.",
            &patterns(&["Bingo..+Pickle"]),
        )
        .unwrap();
        assert!(ok);
    }

    #[test]
    fn test_empty_list_denies_ordinary_types() {
        assert!(!is_allowed("ModuleNotFoundError", "Bingo. It is a pickle.", &[]).unwrap());
    }

    #[test]
    fn test_defaults_always_apply() {
        for name in default_patterns() {
            assert!(is_allowed(name, "secret", &[]).unwrap(), "{name}");
        }
        assert!(is_allowed("ValueError", "see PublicValueError docs", &[]).unwrap());
    }

    #[test]
    fn test_case_insensitive() {
        assert!(is_allowed("ArithmeticError", "", &patterns(&["arithmetic"])).unwrap());
        assert!(is_allowed("KeyError", "MISSING KEY", &patterns(&["missing key"])).unwrap());
    }

    #[test]
    fn test_invalid_pattern_fails_every_time() {
        let list = AllowList::new(["(unclosed"]);
        for _ in 0..2 {
            match list.is_allowed("ValueError", "x") {
                Err(ScrubError::Pattern { pattern, .. }) => assert_eq!(pattern, "(unclosed"),
                other => panic!("expected pattern error, got {other:?}"),
            }
        }
        assert!(list.validate().is_err());
    }

    #[test]
    fn test_serde_as_plain_list() {
        let list = AllowList::new(["ValueError", "arith.*"]);
        let json = serde_json::to_string(&list).unwrap();
        assert_eq!(json, r#"["ValueError","arith.*"]"#);
        let back: AllowList = serde_json::from_str(&json).unwrap();
        assert_eq!(back, list);
    }
}
