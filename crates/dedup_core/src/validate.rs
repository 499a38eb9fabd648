use serde::{Deserialize, Serialize};

use crate::normalize::normalize;

/// Fragments rejected when the blacklist is enabled.
pub const DEFAULT_BLACKLIST: &[&str] = &[
    "haihua",
    "chuhai",
    "benchi",
    "818",
    "databox",
    "dolphin",
    "diggoldsl",
    "juejin",
];

const BOT: &str = "bot";

/// How blacklist fragments are matched against an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlacklistMatching {
    /// Plain substring containment on the identifier exactly as given.
    #[default]
    CaseSensitive,
    /// Both the identifier and the fragments are lower-cased before matching.
    IgnoreCase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub blacklist_enabled: bool,
    pub blacklist: Vec<String>,
    /// Reject any identifier containing `bot`; only consulted while the
    /// blacklist is enabled.
    pub reject_bot_substring: bool,
    pub blacklist_matching: BlacklistMatching,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            blacklist_enabled: false,
            blacklist: DEFAULT_BLACKLIST.iter().map(|s| s.to_string()).collect(),
            reject_bot_substring: true,
            blacklist_matching: BlacklistMatching::CaseSensitive,
        }
    }
}

/// Policy gate deciding whether a normalized identifier is kept.
#[derive(Debug, Clone)]
pub struct Validator {
    config: ValidatorConfig,
    /// Fragments prepared for the configured matching mode.
    fragments: Vec<String>,
}

impl Validator {
    pub fn new(config: ValidatorConfig) -> Self {
        let fragments = config
            .blacklist
            .iter()
            .filter(|f| !f.is_empty())
            .map(|f| match config.blacklist_matching {
                BlacklistMatching::CaseSensitive => f.clone(),
                BlacklistMatching::IgnoreCase => f.to_lowercase(),
            })
            .collect();
        Self { config, fragments }
    }

    pub fn is_valid(&self, identifier: &str) -> bool {
        if !is_valid(identifier) {
            return false;
        }
        if self.config.blacklist_enabled {
            return !self.is_blacklisted(identifier);
        }
        true
    }

    /// Normalizes a raw line and returns it if it passes validation.
    pub fn admit(&self, raw_line: &str) -> Option<String> {
        let identifier = normalize(raw_line);
        self.is_valid(&identifier).then_some(identifier)
    }

    fn is_blacklisted(&self, identifier: &str) -> bool {
        let subject = match self.config.blacklist_matching {
            BlacklistMatching::CaseSensitive => identifier.to_string(),
            BlacklistMatching::IgnoreCase => identifier.to_lowercase(),
        };
        if self.config.reject_bot_substring && subject.contains(BOT) {
            return true;
        }
        self.fragments.iter().any(|f| subject.contains(f.as_str()))
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ValidatorConfig::default())
    }
}

/// Validates with the default policy: non-empty and no `bot` suffix.
pub fn is_valid(identifier: &str) -> bool {
    !identifier.is_empty() && !ends_with_bot(identifier)
}

fn ends_with_bot(identifier: &str) -> bool {
    identifier
        .get(identifier.len().saturating_sub(BOT.len())..)
        .is_some_and(|tail| tail.eq_ignore_ascii_case(BOT))
}
