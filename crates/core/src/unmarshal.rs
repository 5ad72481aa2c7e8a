//! YAML helpers for fields that accept a single value or a list.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::ops::{Deref, DerefMut};

/// A list that may be written as a bare scalar in YAML.
///
/// `aliases: gr` and `aliases: [gr]` both deserialize to `["gr"]`; `null`
/// yields an empty list. Always serializes as a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OneOrMany<T>(pub Vec<T>);

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Repr<T> {
    Many(Vec<T>),
    One(T),
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for OneOrMany<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<Repr<T>>::deserialize(deserializer)? {
            None => Self::default(),
            Some(Repr::Many(items)) => Self(items),
            Some(Repr::One(item)) => Self(vec![item]),
        })
    }
}

impl<T: Serialize> Serialize for OneOrMany<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<T> Deref for OneOrMany<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for OneOrMany<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(items: Vec<T>) -> Self {
        Self(items)
    }
}

impl<T> FromIterator<T> for OneOrMany<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<T> IntoIterator for OneOrMany<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a OneOrMany<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct Holder {
        #[serde(default)]
        items: OneOrMany<String>,
    }

    #[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
    struct Skip {
        condition: String,
        reason: String,
    }

    #[test]
    fn test_scalar() {
        let h: Holder = serde_yaml::from_str("items: one").unwrap();
        assert_eq!(h.items.0, vec!["one"]);
    }

    #[test]
    fn test_sequence() {
        let h: Holder = serde_yaml::from_str("items: [one, two]").unwrap();
        assert_eq!(h.items.0, vec!["one", "two"]);
    }

    #[test]
    fn test_missing_and_null() {
        let h: Holder = serde_yaml::from_str("{}").unwrap();
        assert!(h.items.is_empty());
        let h: Holder = serde_yaml::from_str("items: null").unwrap();
        assert!(h.items.is_empty());
    }

    #[test]
    fn test_single_mapping() {
        let skips: OneOrMany<Skip> =
            serde_yaml::from_str("condition: 'true'\nreason: nope\n").unwrap();
        assert_eq!(skips.len(), 1);
        assert_eq!(skips[0].reason, "nope");
    }

    #[test]
    fn test_serializes_as_sequence() {
        let h = Holder {
            items: vec!["a".to_string()].into(),
        };
        let out = serde_yaml::to_string(&h).unwrap();
        assert!(out.contains("- a"), "{out}");
    }
}
