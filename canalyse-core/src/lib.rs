//! canalyse core library - turns metrix++ exports into browsable reports

#![deny(warnings)]

// Global invariants enforced in this crate:
// - Stores are explicit values returned by ingest, never globals
// - Files are processed in first-seen order, rows in input order
// - No threads, clocks, or randomness
// - Existing output files are replaced atomically
// - Identical input yields byte-for-byte identical output

pub mod config;
pub mod datafile;
pub mod html;
pub mod ingest;
pub mod layout;
pub mod output;
pub mod pyliteral;
pub mod record;
pub mod report;
pub mod tags;
pub mod view;

pub use config::ResolvedConfig;
pub use ingest::{read_csv, read_csv_file, Ingested, Schema};
pub use record::{FileBucket, MetricRow, MetricValue, RecordStore, RowKind};
pub use report::{generate_distributions, generate_report, ReportSummary, ViewSummary};
pub use tags::{apply_plan, TagPlan, TagTable};
pub use view::{read_view_file, Distribution, ViewDump};
