//! Tolerant environment-variable lookup.
//!
//! Operators name the same credential many ways (`GITHUB_TOKEN`, `GH_TOKEN`,
//! `GITHUB_PAT`). [`EnvLookup`] tries the canonical name first, then a
//! per-key list of case-insensitive patterns in priority order.

use std::collections::BTreeMap;

use regex::{Regex, RegexBuilder};

/// Logical settings that may be supplied under several variable names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogicalKey {
    GithubToken,
    GithubRepo,
    CohereKey,
    SlackWebhook,
    DbUrl,
}

impl LogicalKey {
    pub const ALL: [LogicalKey; 5] = [
        LogicalKey::GithubToken,
        LogicalKey::GithubRepo,
        LogicalKey::CohereKey,
        LogicalKey::SlackWebhook,
        LogicalKey::DbUrl,
    ];

    /// Exact variable name checked before any pattern.
    pub fn canonical_name(self) -> &'static str {
        match self {
            LogicalKey::GithubToken => "GITHUB_TOKEN",
            LogicalKey::GithubRepo => "GITHUB_REPOSITORY",
            LogicalKey::CohereKey => "COHERE_API_KEY",
            LogicalKey::SlackWebhook => "SLACK_WEBHOOK_URL",
            LogicalKey::DbUrl => "DATABASE_URL",
        }
    }

    fn patterns(self) -> &'static [&'static str] {
        match self {
            LogicalKey::GithubToken => &[
                r"^GITHUB.*TOKEN$",
                r"^GH.*TOKEN$",
                r"^GITHUB.*PAT$",
                r"^.*GITHUB.*TOKEN.*$",
            ],
            LogicalKey::GithubRepo => &[
                r"^GITHUB.*REPO",
                r"^GH.*REPO",
                r"^REPO.*NAME$",
                r"^.*REPOSITORY.*$",
            ],
            LogicalKey::CohereKey => &[r"^COHERE.*KEY$", r"^COHERE.*API", r"^.*COHERE.*$"],
            LogicalKey::SlackWebhook => &[r"^SLACK.*WEBHOOK", r"^WEBHOOK.*URL$", r"^.*SLACK.*$"],
            LogicalKey::DbUrl => &[
                r"^.*DB.*URL$",
                r"^DATABASE.*URL$",
                r"^.*CONNECTION.*STRING$",
            ],
        }
    }
}

/// Snapshot of environment variables with compiled lookup patterns.
#[derive(Debug, Clone)]
pub struct EnvLookup {
    vars: BTreeMap<String, String>,
    patterns: BTreeMap<LogicalKey, Vec<Regex>>,
}

impl EnvLookup {
    pub fn from_process_env() -> Result<Self, regex::Error> {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut patterns = BTreeMap::new();
        for key in LogicalKey::ALL {
            let compiled = key
                .patterns()
                .iter()
                .map(|pattern| RegexBuilder::new(pattern).case_insensitive(true).build())
                .collect::<Result<Vec<_>, _>>()?;
            patterns.insert(key, compiled);
        }
        Ok(Self {
            vars: vars.into_iter().collect(),
            patterns,
        })
    }

    /// Resolves `key`, ignoring empty values.
    ///
    /// ```
    /// use tollgate_settings::{EnvLookup, LogicalKey};
    ///
    /// let lookup = EnvLookup::from_vars([("GH_TOKEN".to_string(), "ghp_x".to_string())])
    ///     .expect("patterns compile");
    /// assert_eq!(lookup.get(LogicalKey::GithubToken), Some("ghp_x"));
    /// ```
    pub fn get(&self, key: LogicalKey) -> Option<&str> {
        if let Some(value) = self.non_empty(key.canonical_name()) {
            return Some(value);
        }
        let patterns = self.patterns.get(&key)?;
        for pattern in patterns {
            let matched = self
                .vars
                .iter()
                .find(|(name, value)| !value.is_empty() && pattern.is_match(name));
            if let Some((name, value)) = matched {
                tracing::debug!(key = key.canonical_name(), variable = %name, "resolved setting by pattern");
                return Some(value.as_str());
            }
        }
        None
    }

    /// Variable names matched by any pattern of `key`, for diagnostics.
    pub fn matches(&self, key: LogicalKey) -> Vec<&str> {
        let Some(patterns) = self.patterns.get(&key) else {
            return Vec::new();
        };
        self.vars
            .keys()
            .filter(|name| patterns.iter().any(|pattern| pattern.is_match(name)))
            .map(String::as_str)
            .collect()
    }

    fn non_empty(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}
