//! Records of scalar and array valued metrics.
use crate::error::ForesightError;
use chrono::prelude::{DateTime, Local};
use ndarray::{ArrayView1, ArrayView2};
use std::collections::{
    hash_map::{Iter, Keys},
    HashMap,
};

/// Represents possible types of values that can be stored in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A single floating-point value, e.g., a loss or a return.
    Scalar(f32),

    /// A timestamp with local timezone.
    DateTime(DateTime<Local>),

    /// A 1-dimensional array, e.g., per-iteration elite returns.
    Array1(Vec<f32>),

    /// A 2-dimensional array with its shape, e.g., a planned action sequence.
    Array2(Vec<f32>, [usize; 2]),

    /// A text value.
    String(String),
}

impl From<ArrayView1<'_, f32>> for RecordValue {
    fn from(a: ArrayView1<'_, f32>) -> Self {
        Self::Array1(a.to_vec())
    }
}

impl From<ArrayView2<'_, f32>> for RecordValue {
    fn from(a: ArrayView2<'_, f32>) -> Self {
        let (n, m) = a.dim();
        Self::Array2(a.iter().cloned().collect(), [n, m])
    }
}

/// A container for storing key-value pairs of metrics.
///
/// Keys produced by this crate are namespaced with a slash, e.g.,
/// `dynamics/mse` or `planner/best_return`.
#[derive(Debug, Clone, Default)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record containing a single scalar value.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        Self(HashMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Creates a record from a slice of key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Returns an iterator over the keys in the record.
    pub fn keys(&self) -> Keys<String, RecordValue> {
        self.0.keys()
    }

    /// Inserts a key-value pair into the record.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Returns an iterator over the key-value pairs in the record.
    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    /// Gets a reference to the value associated with the given key.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks if the record is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merges two records, consuming both.
    ///
    /// Values of `record` overwrite those of `self` on key collision.
    pub fn merge(self, record: Record) -> Self {
        Record(self.0.into_iter().chain(record.0).collect())
    }

    /// Merges another record into this one in place.
    pub fn merge_inplace(&mut self, record: Record) {
        self.0.extend(record.0);
    }

    /// Merges another record, prefixing its keys with `prefix/`.
    pub fn merge_with_prefix(&mut self, prefix: &str, record: Record) {
        for (k, v) in record.0.into_iter() {
            self.0.insert(format!("{}/{}", prefix, k), v);
        }
    }

    /// Gets a scalar value from the record.
    ///
    /// # Errors
    ///
    /// Returns an error if the key does not exist or the value is not a scalar.
    pub fn get_scalar(&self, k: &str) -> Result<f32, ForesightError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            Some(_) => Err(ForesightError::RecordValueTypeError("Scalar".to_string())),
            None => Err(ForesightError::RecordKeyError(k.to_string())),
        }
    }

    /// Gets a 1-dimensional array from the record.
    pub fn get_array1(&self, k: &str) -> Result<Vec<f32>, ForesightError> {
        match self.0.get(k) {
            Some(RecordValue::Array1(v)) => Ok(v.clone()),
            Some(_) => Err(ForesightError::RecordValueTypeError("Array1".to_string())),
            None => Err(ForesightError::RecordKeyError(k.to_string())),
        }
    }

    /// Gets a 2-dimensional array and its shape from the record.
    pub fn get_array2(&self, k: &str) -> Result<(Vec<f32>, [usize; 2]), ForesightError> {
        match self.0.get(k) {
            Some(RecordValue::Array2(v, s)) => Ok((v.clone(), *s)),
            Some(_) => Err(ForesightError::RecordValueTypeError("Array2".to_string())),
            None => Err(ForesightError::RecordKeyError(k.to_string())),
        }
    }

    /// Gets a string value from the record.
    pub fn get_string(&self, k: &str) -> Result<String, ForesightError> {
        match self.0.get(k) {
            Some(RecordValue::String(s)) => Ok(s.clone()),
            Some(_) => Err(ForesightError::RecordValueTypeError("String".to_string())),
            None => Err(ForesightError::RecordKeyError(k.to_string())),
        }
    }
}
