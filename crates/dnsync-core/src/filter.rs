//! Annotation filters
//!
//! A filter is a comma-separated list of terms, all of which must match:
//!
//! | term          | matches when                       |
//! |---------------|------------------------------------|
//! | `key=value`   | annotation `key` equals `value`    |
//! | `key==value`  | same as `key=value`                |
//! | `key!=value`  | annotation `key` is not `value`    |
//! | `key`         | annotation `key` is present        |
//! | `!key`        | annotation `key` is absent         |
//!
//! An empty filter matches everything.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
    Equals(String, String),
    NotEquals(String, String),
    Exists(String),
    Absent(String),
}

impl Term {
    fn matches(&self, annotations: &BTreeMap<String, String>) -> bool {
        match self {
            Term::Equals(key, value) => annotations.get(key) == Some(value),
            Term::NotEquals(key, value) => annotations.get(key) != Some(value),
            Term::Exists(key) => annotations.contains_key(key),
            Term::Absent(key) => !annotations.contains_key(key),
        }
    }
}

/// Parsed annotation filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationFilter {
    terms: Vec<Term>,
    raw: String,
}

impl AnnotationFilter {
    /// Whether the filter has no terms
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Whether `annotations` satisfy every term
    pub fn matches(&self, annotations: &BTreeMap<String, String>) -> bool {
        self.terms.iter().all(|term| term.matches(annotations))
    }
}

fn checked_key(key: &str, term: &str) -> Result<String, Error> {
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return Err(Error::config(format!(
            "invalid annotation filter term '{}'",
            term
        )));
    }
    Ok(key.to_string())
}

impl FromStr for AnnotationFilter {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut terms = Vec::new();
        for term in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let parsed = if let Some((key, value)) = term.split_once("!=") {
                Term::NotEquals(checked_key(key, term)?, value.trim().to_string())
            } else if let Some((key, value)) = term.split_once("==") {
                Term::Equals(checked_key(key, term)?, value.trim().to_string())
            } else if let Some((key, value)) = term.split_once('=') {
                Term::Equals(checked_key(key, term)?, value.trim().to_string())
            } else if let Some(key) = term.strip_prefix('!') {
                Term::Absent(checked_key(key, term)?)
            } else {
                Term::Exists(checked_key(term, term)?)
            };
            terms.push(parsed);
        }

        Ok(Self {
            terms,
            raw: raw.trim().to_string(),
        })
    }
}

impl fmt::Display for AnnotationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotations(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let filter: AnnotationFilter = "".parse().unwrap();
        assert!(filter.is_empty());
        assert!(filter.matches(&BTreeMap::new()));
    }

    #[test]
    fn test_all_terms_must_match() {
        let filter: AnnotationFilter = "team=web, tier!=batch, dns/enabled, !dns/ignore".parse().unwrap();

        assert!(filter.matches(&annotations(&[("team", "web"), ("dns/enabled", "")])));
        assert!(!filter.matches(&annotations(&[("team", "web")])));
        assert!(!filter.matches(&annotations(&[
            ("team", "web"),
            ("dns/enabled", "yes"),
            ("tier", "batch")
        ])));
        assert!(!filter.matches(&annotations(&[
            ("team", "web"),
            ("dns/enabled", "yes"),
            ("dns/ignore", "true")
        ])));
    }

    #[test]
    fn test_double_equals() {
        let filter: AnnotationFilter = "team==web".parse().unwrap();
        assert!(filter.matches(&annotations(&[("team", "web")])));
        assert!(!filter.matches(&annotations(&[("team", "db")])));
    }

    #[test]
    fn test_rejects_empty_key() {
        assert!("=web".parse::<AnnotationFilter>().is_err());
        assert!("!".parse::<AnnotationFilter>().is_err());
        assert!("bad key".parse::<AnnotationFilter>().is_err());
    }
}
