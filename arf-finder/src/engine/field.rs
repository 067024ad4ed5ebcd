//! Field vocabulary, report shape and selection sets

use crate::source::SourceError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One relationship category of a report
///
/// Implemented by a fieldless enum per root kind; `ALL` fixes the vocabulary.
pub trait ReportField: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    const ALL: &'static [Self];

    /// Wire name used in selection sets and response bodies
    fn key(self) -> &'static str;

    fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|field| field.key() == key)
    }
}

/// Per-root-entity report record (also the cache entry shape)
pub trait Report: Default + Clone + Send + Sync + 'static {
    type Field: ReportField;
    /// Tagged payload for exactly one field
    type Value: Send + 'static;

    /// Root kind name used in log spans
    const KIND: &'static str;

    /// Copy of a field's value, or `None` when the field is empty
    fn value(&self, field: Self::Field) -> Option<Self::Value>;

    fn is_filled(&self, field: Self::Field) -> bool;

    /// Store a value in the field its tag names
    fn set(&mut self, value: Self::Value);

    fn field_of(value: &Self::Value) -> Self::Field;

    /// Fill empty fields from `newer`; filled fields are never replaced
    fn merge_from(&mut self, newer: &Self) {
        for &field in Self::Field::ALL {
            if self.is_filled(field) {
                continue;
            }
            if let Some(value) = newer.value(field) {
                self.set(value);
            }
        }
    }
}

/// Fetch operation table for one root entity
#[async_trait]
pub trait FieldPlan<R: Report>: Send + Sync + 'static {
    async fn fetch(
        &self,
        field: R::Field,
        cancel: CancellationToken,
    ) -> Result<R::Value, SourceError>;
}

/// Helper for list-valued fields: `Some` only when non-empty
pub fn filled<T: Clone>(items: &[T]) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items.to_vec())
    }
}

/// Caller-chosen subset of a report's fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection<F: ReportField> {
    fields: Vec<F>,
}

impl<F: ReportField> Selection<F> {
    /// Build from a request's `{"fieldKey": bool}` map
    ///
    /// Keys outside the vocabulary are ignored. Field order follows the
    /// vocabulary, not the map.
    pub fn from_flags(flags: &HashMap<String, bool>) -> Self {
        for key in flags.keys() {
            if F::from_key(key).is_none() {
                debug!(key = %key, "Ignoring unknown selection key");
            }
        }

        let fields = F::ALL
            .iter()
            .copied()
            .filter(|field| flags.get(field.key()).copied().unwrap_or(false))
            .collect();

        Self { fields }
    }

    pub fn all() -> Self {
        Self {
            fields: F::ALL.to_vec(),
        }
    }

    pub fn contains(&self, field: F) -> bool {
        self.fields.contains(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = F> + '_ {
        self.fields.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<F: ReportField> FromIterator<F> for Selection<F> {
    fn from_iter<I: IntoIterator<Item = F>>(iter: I) -> Self {
        let mut fields: Vec<F> = Vec::new();
        for field in iter {
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        Self { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Colour {
        Red,
        Blue,
    }

    impl ReportField for Colour {
        const ALL: &'static [Self] = &[Colour::Red, Colour::Blue];

        fn key(self) -> &'static str {
            match self {
                Colour::Red => "red",
                Colour::Blue => "blue",
            }
        }
    }

    fn flags(pairs: &[(&str, bool)]) -> HashMap<String, bool> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn false_and_unknown_keys_are_not_selected() {
        let selection = Selection::<Colour>::from_flags(&flags(&[
            ("red", false),
            ("blue", true),
            ("green", true),
        ]));
        assert_eq!(selection.iter().collect::<Vec<_>>(), vec![Colour::Blue]);
    }

    #[test]
    fn selection_follows_vocabulary_order() {
        let selection = Selection::<Colour>::from_flags(&flags(&[("blue", true), ("red", true)]));
        assert_eq!(
            selection.iter().collect::<Vec<_>>(),
            vec![Colour::Red, Colour::Blue]
        );
    }

    #[test]
    fn from_iter_deduplicates() {
        let selection: Selection<Colour> = [Colour::Blue, Colour::Blue].into_iter().collect();
        assert_eq!(selection.len(), 1);
    }

    #[test]
    fn from_key_round_trips_vocabulary() {
        for &colour in Colour::ALL {
            assert_eq!(Colour::from_key(colour.key()), Some(colour));
        }
        assert_eq!(Colour::from_key("RED"), None);
    }
}
