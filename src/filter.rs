//! Match predicates deciding which files take part in change detection.
//!
//! The predicate is applied to every file record during stability checks and
//! diffing. Any `Fn(&Path) -> bool` closure is a predicate, so callers can
//! plug in their own rules without implementing the trait by hand.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use regex::RegexSet;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, FilterSettings};

/// Decides whether a file participates in change detection.
pub trait MatchPredicate: Send + Sync {
    fn accept(&self, path: &Path) -> bool;
}

impl<F> MatchPredicate for F
where
    F: Fn(&Path) -> bool + Send + Sync,
{
    fn accept(&self, path: &Path) -> bool {
        self(path)
    }
}

/// Accepts every file. Equivalent to having no predicate at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl MatchPredicate for AcceptAll {
    fn accept(&self, _path: &Path) -> bool {
        true
    }
}

/// Accepts files whose extension matches one of a set of suffixes,
/// ignoring case.
///
/// Suffixes may be given as `txt`, `.txt` or even `notes.txt`; only the part
/// after the last dot is kept. File names without a dot never match.
#[derive(Debug, Clone)]
pub struct SuffixFilter {
    suffixes: BTreeSet<String>,
}

impl SuffixFilter {
    pub fn new<I, S>(suffixes: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized = BTreeSet::new();
        for raw in suffixes {
            let raw = raw.as_ref();
            let suffix = match raw.rfind('.') {
                Some(dot) => &raw[dot + 1..],
                None => raw,
            };
            if suffix.is_empty() {
                return Err(ConfigError::InvalidFilter {
                    reason: format!("suffix '{raw}' has nothing after its last dot"),
                });
            }
            normalized.insert(suffix.to_lowercase());
        }
        if normalized.is_empty() {
            return Err(ConfigError::InvalidFilter {
                reason: "suffix filter needs at least one suffix".to_string(),
            });
        }
        Ok(Self {
            suffixes: normalized,
        })
    }

    pub fn suffixes(&self) -> impl Iterator<Item = &str> + '_ {
        self.suffixes.iter().map(String::as_str)
    }
}

impl MatchPredicate for SuffixFilter {
    fn accept(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = name.to_string_lossy();
        match name.rfind('.') {
            Some(dot) => self.suffixes.contains(&name[dot + 1..].to_lowercase()),
            None => false,
        }
    }
}

/// Accepts files whose name fully matches any of a set of regular expressions.
#[derive(Debug, Clone)]
pub struct RegexFilter {
    patterns: RegexSet,
}

impl RegexFilter {
    pub fn new<I, S>(patterns: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let anchored: Vec<String> = patterns
            .into_iter()
            .map(|p| format!("^(?:{})$", p.as_ref()))
            .collect();
        if anchored.is_empty() {
            return Err(ConfigError::InvalidFilter {
                reason: "regex filter needs at least one pattern".to_string(),
            });
        }
        let patterns = RegexSet::new(&anchored).map_err(|e| ConfigError::InvalidFilter {
            reason: format!("invalid regex: {e}"),
        })?;
        Ok(Self { patterns })
    }
}

impl MatchPredicate for RegexFilter {
    fn accept(&self, path: &Path) -> bool {
        path.file_name()
            .is_some_and(|name| self.patterns.is_match(&name.to_string_lossy()))
    }
}

/// How the configured patterns are interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchingStrategy {
    #[default]
    Any,
    Suffix,
    Regex,
}

/// Build the predicate described by the filter settings.
pub fn build_predicate(settings: &FilterSettings) -> Result<Arc<dyn MatchPredicate>, ConfigError> {
    let predicate: Arc<dyn MatchPredicate> = match settings.strategy {
        MatchingStrategy::Any => Arc::new(AcceptAll),
        MatchingStrategy::Suffix => Arc::new(SuffixFilter::new(&settings.patterns)?),
        MatchingStrategy::Regex => Arc::new(RegexFilter::new(&settings.patterns)?),
    };
    crate::debug_event!("filter", "selected", "{:?}", settings.strategy);
    Ok(predicate)
}
