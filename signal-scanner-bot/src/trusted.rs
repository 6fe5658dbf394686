//! Trusted sender set - the microblog accounts whose statuses may be relayed.
//!
//! Accepted formats:
//! - Comma list: `12345,67890`
//! - Json sequence: `["12345", "67890"]`
//! - Json map of id to a display name, used only in logs: `{"12345": "scanner_one"}`
//!
//! Entries must be numeric account ids. Handles (`@name`) are rejected, because
//! the stream reports authors by id and a handle would never match.

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// An immutable set of trusted author ids, with optional display names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrustedSenderSet {
    map: HashMap<String, Option<String>>,
}

impl TrustedSenderSet {
    /// Check if an author id is trusted.
    pub fn contains(&self, author_id: &str) -> bool {
        self.map.contains_key(author_id)
    }

    /// All trusted ids, sorted for stable output.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.map.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// A display name for logs: the configured name, or the id.
    pub fn display_name<'a>(&'a self, author_id: &'a str) -> &'a str {
        match self.map.get(author_id) {
            Some(Some(name)) => name,
            _ => author_id,
        }
    }

    /// Get the number of trusted ids.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn insert(&mut self, id: &str, name: Option<String>) -> Result<(), String> {
        let id = id.trim();
        if id.starts_with('@') {
            return Err(format!(
                "Trusted tweeter '{id}' is a handle, use the numeric account id instead"
            ));
        }
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("Trusted tweeter '{id}' is not a numeric account id"));
        }
        self.map.insert(id.to_owned(), name);
        Ok(())
    }
}

impl FromStr for TrustedSenderSet {
    type Err = String;

    /// Parse either json, or a comma separated list of ids.
    fn from_str(src: &str) -> Result<Self, Self::Err> {
        let trimmed = src.trim();
        if trimmed.starts_with('[') || trimmed.starts_with('{') {
            return serde_json::from_str(trimmed).map_err(|err| err.to_string());
        }
        let mut result = Self::default();
        for id in trimmed.split(',').filter(|s| !s.trim().is_empty()) {
            result.insert(id, None)?;
        }
        Ok(result)
    }
}

impl<'de> Deserialize<'de> for TrustedSenderSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(TrustedSenderSetVisitor)
    }
}

struct TrustedSenderSetVisitor;

impl<'de> Visitor<'de> for TrustedSenderSetVisitor {
    type Value = TrustedSenderSet;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a sequence of account ids, or a map of account ids to names")
    }

    fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        let mut result = TrustedSenderSet::default();
        while let Some((key, value)) = access.next_entry::<String, Option<String>>()? {
            result.insert(&key, value).map_err(de::Error::custom)?;
        }
        Ok(result)
    }

    fn visit_seq<S>(self, mut access: S) -> Result<Self::Value, S::Error>
    where
        S: SeqAccess<'de>,
    {
        let mut result = TrustedSenderSet::default();
        while let Some(id) = access.next_element::<String>()? {
            result.insert(&id, None).map_err(de::Error::custom)?;
        }
        Ok(result)
    }
}

impl FromIterator<String> for TrustedSenderSet {
    /// Collect ids without validation. Meant for tests and programmatic setup.
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            map: iter.into_iter().map(|id| (id, None)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_comma_list() {
        let set: TrustedSenderSet = "123, 456,,789".parse().unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.contains("456"));
        assert!(!set.contains("45"));
        assert_eq!(set.ids(), vec!["123", "456", "789"]);
    }

    #[test]
    fn test_parse_json_seq() {
        let set: TrustedSenderSet = r#"["1", "2"]"#.parse().unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.display_name("1"), "1");
    }

    #[test]
    fn test_parse_json_map() {
        let set: TrustedSenderSet = r#"{"1": "scanner_one", "2": null}"#.parse().unwrap();
        assert_eq!(set.display_name("1"), "scanner_one");
        assert_eq!(set.display_name("2"), "2");
    }

    #[test]
    fn test_reject_handles() {
        let err = "123,@someone".parse::<TrustedSenderSet>().unwrap_err();
        assert!(err.contains("handle"), "{err}");
        assert!(r#"["@someone"]"#.parse::<TrustedSenderSet>().is_err());
        assert!("abc".parse::<TrustedSenderSet>().is_err());
    }

    #[test]
    fn test_empty() {
        assert!("".parse::<TrustedSenderSet>().unwrap().is_empty());
        assert!("[]".parse::<TrustedSenderSet>().unwrap().is_empty());
    }
}
