//! Labeled landmark samples.

use std::sync::Arc;

use crate::landmark::LandmarkVector;

/// A complete [`LandmarkVector`] tagged with a user-chosen label.
///
/// Samples are immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSample {
    landmarks: LandmarkVector,
    label: String,
}

impl LabeledSample {
    pub(crate) fn new(landmarks: LandmarkVector, label: String) -> Self {
        Self { landmarks, label }
    }

    #[inline]
    pub fn landmarks(&self) -> &LandmarkVector {
        &self.landmarks
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Append-only list of [`LabeledSample`]s, in capture order.
///
/// Samples are reference-counted so that a training run can work on a snapshot of the dataset
/// while new samples keep being captured.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    samples: Vec<Arc<LabeledSample>>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sample, returning the new number of samples.
    pub(crate) fn push(&mut self, sample: LabeledSample) -> usize {
        self.samples.push(Arc::new(sample));
        self.samples.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&LabeledSample> {
        self.samples.get(index).map(|s| &**s)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabeledSample> + '_ {
        self.samples.iter().map(|s| &**s)
    }

    /// Returns the label of every sample, in capture order.
    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.iter().map(LabeledSample::label)
    }

    /// Builds the table of distinct labels in this dataset.
    pub fn label_table(&self) -> LabelTable {
        let mut table = LabelTable::default();
        for label in self.labels() {
            table.insert(label);
        }
        table
    }
}

/// Distinct labels, indexed in the order they were first seen.
///
/// The same table is used to encode training targets and to decode predicted class indices, so
/// the label of a class never depends on how labels happen to be spelled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    /// Adds `label` if it isn't in the table yet, and returns its index.
    pub fn insert(&mut self, label: &str) -> usize {
        match self.index_of(label) {
            Some(index) => index,
            None => {
                self.labels.push(label.to_string());
                self.labels.len() - 1
            }
        }
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Number of distinct labels, which is also the number of classifier outputs.
    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.labels.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(label: &str) -> LabeledSample {
        LabeledSample::new(LandmarkVector::from_raw(vec![0.5; 63]), label.into())
    }

    #[test]
    fn insertion_order() {
        let mut dataset = Dataset::new();
        for label in ["C", "A", "C", "B"] {
            dataset.push(sample(label));
        }
        assert_eq!(dataset.labels().collect::<Vec<_>>(), ["C", "A", "C", "B"]);
    }

    #[test]
    fn label_table_first_seen() {
        let mut dataset = Dataset::new();
        for label in ["thumbs up", "A", "thumbs up", "B", "A"] {
            dataset.push(sample(label));
        }
        let table = dataset.label_table();
        assert_eq!(table.len(), 3);
        assert_eq!(table.iter().collect::<Vec<_>>(), ["thumbs up", "A", "B"]);
        for (index, label) in table.iter().enumerate() {
            assert_eq!(table.index_of(label), Some(index));
            assert_eq!(table.label(index), Some(label));
        }
        assert_eq!(table.index_of("Z"), None);
        assert_eq!(table.label(3), None);
    }

    #[test]
    fn insert_is_idempotent() {
        let mut table = LabelTable::default();
        assert_eq!(table.insert("x"), 0);
        assert_eq!(table.insert("y"), 1);
        assert_eq!(table.insert("x"), 0);
        assert_eq!(table.len(), 2);
    }
}
