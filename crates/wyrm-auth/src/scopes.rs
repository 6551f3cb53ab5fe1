//! Scope sets and the recognized-scope catalog.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Read/write access to the user's profile.
pub const USER_SCOPE: &str = "user";

/// An unordered set of scope names.
///
/// Serialized as the space-separated form used on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ScopeSet(BTreeSet<String>);

impl ScopeSet {
    /// Parses a space-separated scope string. Repeated names collapse.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self(raw.split_whitespace().map(str::to_string).collect())
    }

    /// Returns `true` if the set contains `scope`.
    #[must_use]
    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }

    /// Returns `true` if every scope in `self` is also in `other`.
    #[must_use]
    pub fn is_subset_of(&self, other: &ScopeSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Returns `true` if no scope is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of scopes in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates the scope names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for scope in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(scope)?;
            first = false;
        }
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<S> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl Serialize for ScopeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ScopeSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Scopes this server recognizes, with the text shown on the consent page.
#[derive(Debug, Clone)]
pub struct ScopeCatalog {
    scopes: BTreeMap<String, String>,
}

impl Default for ScopeCatalog {
    fn default() -> Self {
        let mut scopes = BTreeMap::new();
        scopes.insert(
            USER_SCOPE.to_string(),
            "Read/write access to profile info.".to_string(),
        );
        Self { scopes }
    }
}

impl ScopeCatalog {
    /// Adds or replaces a scope.
    #[must_use]
    pub fn with_scope(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.scopes.insert(name.into(), description.into());
        self
    }

    /// Adds every `(name, description)` pair.
    #[must_use]
    pub fn with_scopes<I, K, V>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.scopes
            .extend(scopes.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Number of recognized scopes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Returns `true` if no scope is recognized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Returns `true` if `scope` is recognized.
    #[must_use]
    pub fn recognizes(&self, scope: &str) -> bool {
        self.scopes.contains_key(scope)
    }

    /// Returns the first scope in `requested` that is not recognized.
    #[must_use]
    pub fn first_unknown<'a>(&self, requested: &'a ScopeSet) -> Option<&'a str> {
        requested.iter().find(|s| !self.recognizes(s))
    }

    /// Consent text for `scope`.
    #[must_use]
    pub fn describe(&self, scope: &str) -> Option<&str> {
        self.scopes.get(scope).map(String::as_str)
    }

    /// Consent text for every scope in `scopes`, skipping unknown ones.
    #[must_use]
    pub fn describe_all(&self, scopes: &ScopeSet) -> Vec<&str> {
        scopes.iter().filter_map(|s| self.describe(s)).collect()
    }
}
