//! Ordered environment variables with override semantics.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Ordered name/value pairs. Names keep their first insertion position when
/// overridden.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct EnvironmentVariables(IndexMap<String, String>);

impl EnvironmentVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a variable.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy of `self` with every variable of `overrides` applied on top.
    pub fn overridden_by(&self, overrides: &EnvironmentVariables) -> EnvironmentVariables {
        let mut merged = self.clone();
        merged.apply(overrides);
        merged
    }

    /// Apply `overrides` in place; the override wins on conflicts.
    pub fn apply(&mut self, overrides: &EnvironmentVariables) {
        for (name, value) in overrides.iter() {
            self.add(name, value);
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvironmentVariables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut vars = Self::new();
        for (k, v) in iter {
            vars.add(k, v);
        }
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins_and_keeps_position() {
        let base: EnvironmentVariables = [("A", "1"), ("B", "2")].into_iter().collect();
        let overrides: EnvironmentVariables = [("B", "override"), ("C", "3")].into_iter().collect();

        let merged = base.overridden_by(&overrides);

        let pairs: Vec<_> = merged.iter().collect();
        assert_eq!(pairs, vec![("A", "1"), ("B", "override"), ("C", "3")]);
        assert_eq!(base.get("B"), Some("2"));
    }
}
