//! CSV ingest for `metrix++ export` output
//!
//! The header row declares six fixed columns followed by one column per
//! criterion. Every data row is parsed into a [`MetricRow`] and inserted into
//! a [`RecordStore`], which applies the global/file merge.

use crate::record::{MetricRow, MetricValue, RecordStore, RowKind};
use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

/// Fixed leading columns of every export row
pub const LEADING_COLUMNS: [&str; 6] = [
    "filename",
    "region",
    "type",
    "modified",
    "line start",
    "line end",
];

const FILENAME: usize = 0;
const REGION: usize = 1;
const KIND: usize = 2;
const MODIFIED: usize = 3;
const LINE_START: usize = 4;
const LINE_END: usize = 5;

/// Criteria declared by the header row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    criteria: Vec<String>,
}

impl Schema {
    /// Build the schema from a raw header record
    ///
    /// Criterion mnemonics are exported with `:` separators; they are
    /// normalized to the dotted form used everywhere else.
    pub fn from_header<'a, I>(header: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let columns: Vec<&str> = header.into_iter().collect();
        if columns.len() < LEADING_COLUMNS.len() {
            anyhow::bail!(
                "malformed header: expected at least {} leading columns ({}), found {}",
                LEADING_COLUMNS.len(),
                LEADING_COLUMNS.join(", "),
                columns.len()
            );
        }

        let criteria: Vec<String> = columns[LEADING_COLUMNS.len()..]
            .iter()
            .map(|c| c.trim().replace(':', "."))
            .collect();

        Ok(Schema { criteria })
    }

    pub fn criteria(&self) -> &[String] {
        &self.criteria
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }
}

/// Result of one ingest pass
#[derive(Debug, Clone, Default)]
pub struct Ingested {
    pub store: RecordStore,
    pub schema: Schema,
    /// Data rows seen, including skipped ones
    pub rows_read: usize,
    /// Data rows rejected for an invalid line range
    pub rows_skipped: usize,
}

/// Read and merge a metrix++ CSV export from disk
pub fn read_csv_file(path: &Path) -> Result<Ingested> {
    log::info!("Reading metrics file {}", path.display());
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open CSV file: {}", path.display()))?;
    let ingested =
        read_csv(file).with_context(|| format!("failed to read CSV file: {}", path.display()))?;
    log::info!(
        "Read {} entries ({} skipped) for {} files",
        ingested.rows_read,
        ingested.rows_skipped,
        ingested.store.len()
    );
    Ok(ingested)
}

/// Read and merge a metrix++ CSV export from any reader
pub fn read_csv<R: Read>(reader: R) -> Result<Ingested> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut records = csv_reader.records();
    let header = match records.next() {
        Some(record) => record.context("failed to read CSV header")?,
        None => anyhow::bail!("malformed header: CSV input is empty"),
    };
    let schema = Schema::from_header(header.iter())?;
    log::debug!("Processing criteria: {}", schema.criteria().join(", "));

    let mut ingested = Ingested {
        schema,
        ..Default::default()
    };

    for (idx, result) in records.enumerate() {
        let record = result.with_context(|| format!("failed to read CSV row {}", idx + 2))?;
        ingested.rows_read += 1;
        match parse_row(&record, &ingested.schema) {
            Some(row) => ingested.store.insert(row),
            None => {
                ingested.rows_skipped += 1;
                log::debug!("Skipping row {}: invalid line range", idx + 2);
            }
        }
    }

    Ok(ingested)
}

/// Parse one data row; `None` marks a row with an unusable line range
fn parse_row(record: &csv::StringRecord, schema: &Schema) -> Option<MetricRow> {
    if record.len() < LEADING_COLUMNS.len() {
        return None;
    }

    let line_start = record[LINE_START].trim().parse::<i64>().ok()?;
    let line_end = record[LINE_END].trim().parse::<i64>().ok()?;
    if line_start < 0 {
        return None;
    }

    let values = (0..schema.len())
        .map(|idx| {
            let cell = record.get(LEADING_COLUMNS.len() + idx).unwrap_or("");
            MetricValue::parse(cell).unwrap_or_else(|| {
                log::debug!(
                    "Non-numeric value '{}' for {} in {}, using 0",
                    cell,
                    schema.criteria()[idx],
                    &record[FILENAME]
                );
                MetricValue::default()
            })
        })
        .collect();

    Some(MetricRow {
        filename: record[FILENAME].to_string(),
        region: record[REGION].to_string(),
        kind: RowKind::parse(&record[KIND]),
        modified: record[MODIFIED].to_string(),
        line_start,
        line_end,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "filename,region,type,modified,line start,line end,std.code.lines.code\n";

    fn ingest(body: &str) -> Ingested {
        read_csv(format!("{}{}", HEADER, body).as_bytes()).unwrap()
    }

    #[test]
    fn test_header_criteria_are_normalized() {
        let ingested = read_csv(
            "file,region,type,modified,line start,line end,std.code.complexity:cyclomatic,std.code.lines:code\n"
                .as_bytes(),
        )
        .unwrap();
        assert_eq!(
            ingested.schema.criteria(),
            &["std.code.complexity.cyclomatic", "std.code.lines.code"]
        );
        assert!(ingested.store.is_empty());
    }

    #[test]
    fn test_short_header_is_fatal() {
        let err = read_csv("filename,region,type\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("malformed header"));
    }

    #[test]
    fn test_empty_input_is_fatal() {
        assert!(read_csv("".as_bytes()).is_err());
    }

    #[test]
    fn test_empty_cells_become_zero() {
        let ingested = ingest("a.c,main,function,N,3,9,\n");
        let row = &ingested.store.get("a.c").unwrap().rows[0];
        assert_eq!(row.values, vec![MetricValue::Int(0)]);
    }

    #[test]
    fn test_rows_are_padded_to_schema_width() {
        let ingested = ingest("a.c,main,function,N,3,9\n");
        let row = &ingested.store.get("a.c").unwrap().rows[0];
        assert_eq!(row.values.len(), 1);
    }

    #[test]
    fn test_non_numeric_cells_become_zero() {
        let ingested = ingest("a.c,main,function,N,3,9,n/a\n");
        let row = &ingested.store.get("a.c").unwrap().rows[0];
        assert_eq!(row.values, vec![MetricValue::Int(0)]);
        assert_eq!(ingested.rows_skipped, 0);
    }

    #[test]
    fn test_extra_cells_are_dropped() {
        let ingested = ingest("a.c,main,function,N,3,9,4,99,1.5\n");
        let row = &ingested.store.get("a.c").unwrap().rows[0];
        assert_eq!(row.values, vec![MetricValue::Int(4)]);
    }

    #[test]
    fn test_negative_line_end_is_kept() {
        let ingested = ingest("a.c,r,function,N,3,-1,4\n");
        assert_eq!(ingested.rows_skipped, 0);
        let row = &ingested.store.get("a.c").unwrap().rows[0];
        assert_eq!((row.line_start, row.line_end), (3, -1));
    }

    #[test]
    fn test_negative_line_start_is_skipped() {
        let ingested = ingest("a.c,r,function,N,-1,4,4\n");
        assert_eq!(ingested.rows_skipped, 1);
        assert!(ingested.store.is_empty());
    }

    #[test]
    fn test_invalid_line_range_is_skipped() {
        let ingested = ingest("a.c,main,function,N,x,9,4\nb.c,main,function,N,1,,4\nc.c,main,function,N,1,2,4\n");
        assert_eq!(ingested.rows_read, 3);
        assert_eq!(ingested.rows_skipped, 2);
        assert_eq!(ingested.store.len(), 1);
        assert!(ingested.store.get("c.c").is_some());
    }

    #[test]
    fn test_bucket_count_matches_distinct_valid_filenames() {
        let ingested = ingest(
            "a.c,f1,function,N,1,2,1\n\
             a.c,f2,function,N,3,4,1\n\
             b.c,f1,function,N,1,2,1\n\
             c.c,f1,function,N,bad,2,1\n",
        );
        assert_eq!(ingested.store.len(), 2);
    }
}
