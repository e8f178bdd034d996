use regex::Regex;
use serde::Serialize;

use crate::error::SearchError;

/// First match of the search pattern, with its capture groups in order.
/// Groups that did not take part in the match are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchMatch {
    pub full: String,
    pub groups: Vec<Option<String>>,
}

impl SearchMatch {
    /// The match followed by its groups, unmatched groups as empty strings.
    pub fn submatches(&self) -> Vec<&str> {
        std::iter::once(self.full.as_str())
            .chain(self.groups.iter().map(|g| g.as_deref().unwrap_or_default()))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Searcher {
    regex: Regex,
}

impl Searcher {
    pub fn new(pattern: &str) -> Result<Self, SearchError> {
        let regex = Regex::new(pattern).map_err(|source| SearchError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { regex })
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    pub fn find(&self, body: &str) -> Option<SearchMatch> {
        let caps = self.regex.captures(body)?;
        let full = caps.get(0)?.as_str().to_string();
        let groups = caps
            .iter()
            .skip(1)
            .map(|g| g.map(|m| m.as_str().to_string()))
            .collect();
        Some(SearchMatch { full, groups })
    }
}
