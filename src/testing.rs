//! Testing utilities for queryosity dataflows.
//!
//! [`VecSource`] is the one concrete [`Source`] the crate ships: an
//! in-memory, column-major provider over named `Vec<T>` columns -- a
//! minimal way to exercise the engine end-to-end without a real dataset
//! reader. A couple of assertion helpers with detailed panic messages
//! (not bare `assert_eq!`) round out the module.

use crate::column::Value;
use crate::error::{QueryosityError, Result};
use crate::partition::{Partition, Range};
use crate::source::{box_reader, Source};
use std::any::Any;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

trait ColumnStore: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn make_reader(&self) -> Box<dyn Any + Send>;
}

struct VecColumn<T> {
    values: Arc<Vec<T>>,
}

impl<T: Value> ColumnStore for VecColumn<T> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn make_reader(&self) -> Box<dyn Any + Send> {
        let values = self.values.clone();
        box_reader::<T, _>(move |_slot: u32, entry: u64| values[entry as usize].clone())
    }
}

/// An in-memory, column-major [`Source`] over named `Vec<T>` columns, all
/// sharing one entry count (a single, unpartitioned range -- real multi-file
/// sources are expected to report finer partitions, but one range is enough
/// to drive the engine end-to-end in tests).
#[derive(Default)]
pub struct VecSource {
    entries: u64,
    columns: HashMap<String, Box<dyn ColumnStore>>,
}

impl VecSource {
    /// Construct an empty source with `entries` rows.
    pub fn new(entries: u64) -> Self {
        Self {
            entries,
            columns: HashMap::new(),
        }
    }

    /// Register a named column.
    ///
    /// # Panics
    ///
    /// Panics if `values.len()` does not match the entry count passed to
    /// [`VecSource::new`] -- a test-setup bug, not a runtime condition
    /// callers need to handle.
    pub fn with_column<T: Value>(mut self, name: impl Into<String>, values: Vec<T>) -> Self {
        let name = name.into();
        assert_eq!(
            values.len() as u64,
            self.entries,
            "column {name:?} has {} rows, source declared {} entries",
            values.len(),
            self.entries
        );
        self.columns.insert(
            name,
            Box::new(VecColumn {
                values: Arc::new(values),
            }),
        );
        self
    }
}

impl Source for VecSource {
    fn partition(&self) -> Partition {
        vec![Range::new(0, self.entries)]
    }

    fn open_column(&self, _slot: u32, name: &str, type_name: &'static str) -> Result<Box<dyn Any + Send>> {
        let col = self
            .columns
            .get(name)
            .ok_or_else(|| QueryosityError::MissingColumn { name: name.to_string() })?;
        if col.type_name() != type_name {
            return Err(QueryosityError::TypeMismatch {
                name: name.to_string(),
                expected: col.type_name(),
            });
        }
        Ok(col.make_reader())
    }
}

/// Assert that two slices are equal in order and content, panicking with a
/// detailed message (both full slices, plus the first differing index) on
/// mismatch rather than a bare `assert_eq!`.
pub fn assert_results_equal<T: Debug + PartialEq>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "result length mismatch:\n  expected len: {}\n  actual len: {}\n  expected: {expected:?}\n  actual: {actual:?}",
        expected.len(),
        actual.len(),
    );
    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert_eq!(
            a, e,
            "result mismatch at index {i}:\n  expected: {e:?}\n  actual: {a:?}\n  full expected: {expected:?}\n  full actual: {actual:?}"
        );
    }
}

/// Assert that two `f64` scalars agree within `epsilon`, panicking with both
/// values and the observed difference on mismatch. Merged query results are
/// sums/products of floats accumulated in an order the engine does not
/// guarantee across slots, so exact equality is the wrong tool.
pub fn assert_close(actual: f64, expected: f64, epsilon: f64) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= epsilon,
        "value mismatch: expected {expected}, got {actual} (difference {diff} exceeds epsilon {epsilon})"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ColumnReader;

    #[test]
    fn vec_source_reads_registered_column() {
        let source = VecSource::new(3).with_column("x", vec![10i64, 20, 30]);
        let boxed = source.open_column(0, "x", std::any::type_name::<i64>()).unwrap();
        let mut reader = crate::source::downcast_reader::<i64>(boxed, "x").unwrap();
        assert_eq!(reader.read(0, 0), 10);
        assert_eq!(reader.read(0, 2), 30);
    }

    #[test]
    fn vec_source_missing_column_is_an_error() {
        let source = VecSource::new(1).with_column("x", vec![1i64]);
        let err = source.open_column(0, "y", std::any::type_name::<i64>()).unwrap_err();
        assert!(matches!(err, QueryosityError::MissingColumn { .. }));
    }

    #[test]
    fn vec_source_type_mismatch_is_an_error() {
        let source = VecSource::new(1).with_column("x", vec![1i64]);
        let err = source.open_column(0, "x", std::any::type_name::<f64>()).unwrap_err();
        assert!(matches!(err, QueryosityError::TypeMismatch { .. }));
    }

    #[test]
    #[should_panic(expected = "result length mismatch")]
    fn assert_results_equal_panics_on_length_mismatch() {
        assert_results_equal(&[1, 2], &[1, 2, 3]);
    }

    #[test]
    fn assert_close_accepts_within_epsilon() {
        assert_close(1.0000001, 1.0, 1e-4);
    }
}
