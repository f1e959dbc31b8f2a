//! Verb vocabulary: short aliases mapped to full verb URIs.
//!
//! The vocabulary is built once at startup and never mutated. Lookups
//! are case-sensitive exact matches; an unknown alias is a validation
//! error, never a silent default.

use std::collections::BTreeMap;

use crate::statement::Verb;

/// Immutable alias -> verb mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct VerbVocabulary {
    verbs: BTreeMap<String, Verb>,
}

impl VerbVocabulary {
    /// The built-in vocabulary: the four ADL verbs learnlrs records.
    pub fn builtin() -> Self {
        let mut verbs = BTreeMap::new();
        for alias in ["experienced", "practiced", "achieved", "mastered"] {
            verbs.insert(
                alias.to_string(),
                Verb::new(format!("http://adlnet.gov/expapi/verbs/{alias}"), alias),
            );
        }
        Self { verbs }
    }

    /// Build a vocabulary from explicit alias -> verb entries.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, Verb)>) -> Self {
        Self {
            verbs: entries.into_iter().collect(),
        }
    }

    /// Look up a verb by alias. Case-sensitive exact match.
    pub fn get(&self, alias: &str) -> Option<&Verb> {
        self.verbs.get(alias)
    }

    /// Whether an alias exists in the vocabulary.
    pub fn contains(&self, alias: &str) -> bool {
        self.verbs.contains_key(alias)
    }

    /// All known aliases, sorted.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.verbs.keys().map(String::as_str)
    }

    /// Snapshot of alias -> verb URI, for the listVerbs operation.
    pub fn to_uri_map(&self) -> BTreeMap<String, String> {
        self.verbs
            .iter()
            .map(|(alias, verb)| (alias.clone(), verb.id.clone()))
            .collect()
    }
}

impl Default for VerbVocabulary {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_contains_the_four_adl_verbs() {
        let vocab = VerbVocabulary::builtin();
        for alias in ["experienced", "practiced", "achieved", "mastered"] {
            assert!(vocab.contains(alias), "missing alias: {alias}");
        }
    }

    #[test]
    fn practiced_maps_to_adl_uri() {
        let vocab = VerbVocabulary::builtin();
        let verb = vocab.get("practiced").unwrap();
        assert_eq!(verb.id, "http://adlnet.gov/expapi/verbs/practiced");
        assert_eq!(verb.display["en-US"], "practiced");
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let vocab = VerbVocabulary::builtin();
        assert!(vocab.get("Practiced").is_none());
        assert!(vocab.get("PRACTICED").is_none());
    }

    #[test]
    fn unknown_alias_returns_none() {
        let vocab = VerbVocabulary::builtin();
        assert!(vocab.get("studied").is_none());
    }

    #[test]
    fn uri_map_snapshot_covers_all_aliases() {
        let vocab = VerbVocabulary::builtin();
        let map = vocab.to_uri_map();
        assert_eq!(map.len(), 4);
        assert_eq!(
            map["mastered"],
            "http://adlnet.gov/expapi/verbs/mastered"
        );
    }

    #[test]
    fn custom_vocabulary_from_entries() {
        let vocab = VerbVocabulary::from_entries([(
            "reviewed".to_string(),
            Verb::new("https://example.org/verbs/reviewed", "reviewed"),
        )]);
        assert!(vocab.contains("reviewed"));
        assert!(!vocab.contains("practiced"));
    }
}
