//! Record store - parsed metric rows grouped per source file
//!
//! Global invariants enforced:
//! - Buckets are iterated in first-seen order of their filename
//! - Rows inside a bucket keep CSV row order
//! - A row belongs to exactly one bucket

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Aggregation level of a metric row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowKind {
    /// File-scope code outside any named region
    Global,
    /// Aggregate over a whole file
    File,
    /// Any finer-grained region (function, class, ...), label as emitted by metrix++
    Other(String),
}

impl RowKind {
    pub fn parse(s: &str) -> Self {
        match s {
            "global" => RowKind::Global,
            "file" => RowKind::File,
            other => RowKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RowKind::Global => "global",
            RowKind::File => "file",
            RowKind::Other(s) => s,
        }
    }
}

impl fmt::Display for RowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One numeric criterion cell
///
/// Empty and unparseable cells are stored as `Int(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
}

impl MetricValue {
    /// Parse a CSV cell; returns `None` for non-numeric text
    pub fn parse(cell: &str) -> Option<Self> {
        let cell = cell.trim();
        if cell.is_empty() {
            return Some(MetricValue::Int(0));
        }
        if let Ok(i) = cell.parse::<i64>() {
            return Some(MetricValue::Int(i));
        }
        cell.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(MetricValue::Float)
    }

    pub fn is_zero(&self) -> bool {
        match *self {
            MetricValue::Int(i) => i == 0,
            MetricValue::Float(f) => f == 0.0,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            MetricValue::Int(i) => i as f64,
            MetricValue::Float(f) => f,
        }
    }
}

impl Default for MetricValue {
    fn default() -> Self {
        MetricValue::Int(0)
    }
}

impl std::ops::Add for MetricValue {
    type Output = MetricValue;

    fn add(self, rhs: MetricValue) -> MetricValue {
        match (self, rhs) {
            (MetricValue::Int(a), MetricValue::Int(b)) => MetricValue::Int(a.saturating_add(b)),
            (a, b) => MetricValue::Float(a.as_f64() + b.as_f64()),
        }
    }
}

impl std::ops::AddAssign for MetricValue {
    fn add_assign(&mut self, rhs: MetricValue) {
        *self = *self + rhs;
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Int(i) => write!(f, "{}", i),
            MetricValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// A single row of a metrix++ export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub filename: String,
    pub region: String,
    pub kind: RowKind,
    pub modified: String,
    pub line_start: i64,
    pub line_end: i64,
    /// One value per schema criterion, positionally aligned
    pub values: Vec<MetricValue>,
}

impl MetricRow {
    /// Rows describing file-scope code carry an off-by-one line end in the export
    pub fn is_global_region(&self) -> bool {
        self.region.is_empty() || self.region == "__global__"
    }

    fn absorb(&mut self, values: &[MetricValue]) {
        for (target, add) in self.values.iter_mut().zip(values) {
            *target += *add;
        }
    }
}

/// All rows of one source file, in CSV order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileBucket {
    pub filename: String,
    pub rows: Vec<MetricRow>,
}

impl FileBucket {
    fn new(filename: String) -> Self {
        FileBucket {
            filename,
            rows: Vec::new(),
        }
    }

    /// Reconcile `incoming` against existing rows, then append it
    ///
    /// A `global` row adds its values into every `file` row already present.
    /// A `file` row adds its values into every `global` row already present
    /// and relabels those rows as `file`. The incoming row is always appended
    /// with its own values.
    fn insert(&mut self, incoming: MetricRow) {
        let (target_kind, relabel) = match incoming.kind {
            RowKind::Global => (RowKind::File, false),
            RowKind::File => (RowKind::Global, true),
            RowKind::Other(_) => {
                self.rows.push(incoming);
                return;
            }
        };

        // Collect targets first, then update
        let targets: Vec<usize> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.kind == target_kind)
            .map(|(idx, _)| idx)
            .collect();

        for idx in targets {
            let row = &mut self.rows[idx];
            row.absorb(&incoming.values);
            if relabel {
                row.kind = RowKind::File;
            }
        }

        self.rows.push(incoming);
    }
}

/// Ordered mapping filename -> bucket
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordStore {
    buckets: Vec<FileBucket>,
    index: HashMap<String, usize>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row into its file's bucket, applying the global/file merge
    pub fn insert(&mut self, row: MetricRow) {
        let idx = match self.index.get(&row.filename) {
            Some(&idx) => idx,
            None => {
                let idx = self.buckets.len();
                self.buckets.push(FileBucket::new(row.filename.clone()));
                self.index.insert(row.filename.clone(), idx);
                idx
            }
        };
        self.buckets[idx].insert(row);
    }

    pub fn get(&self, filename: &str) -> Option<&FileBucket> {
        self.index.get(filename).map(|&idx| &self.buckets[idx])
    }

    pub fn buckets(&self) -> impl Iterator<Item = &FileBucket> {
        self.buckets.iter()
    }

    pub fn rows(&self) -> impl Iterator<Item = &MetricRow> {
        self.buckets.iter().flat_map(|b| b.rows.iter())
    }

    /// Number of distinct files
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.buckets.iter().map(|b| b.rows.len()).sum()
    }
}
