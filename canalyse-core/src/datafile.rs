//! JavaScript data files
//!
//! Data files are plain script includes defining global arrays that the
//! HTML pages (and external dashboards) read.

use crate::layout::Layout;
use crate::record::RecordStore;
use serde_json::Value;

/// Quote `s` as a JavaScript string literal
pub fn js_string(s: &str) -> String {
    Value::from(s).to_string()
}

/// Render `var combined = [...]` with one entry per stored row
///
/// Entry layout: `[htmlPath, htmlFilename, filename, region, kind,
/// lineStart, lineEnd, ...criteriaValues]`.
pub fn render_combined(store: &RecordStore, layout: &Layout) -> String {
    let mut entries = Vec::with_capacity(store.row_count());

    for bucket in store.buckets() {
        let location = layout.locate(&bucket.filename);
        let display_name = layout.display_name(&bucket.filename);

        for row in &bucket.rows {
            let mut fields = vec![
                js_string(&location.dir_string()),
                js_string(&location.file_name),
                js_string(&display_name),
                js_string(&row.region),
                js_string(row.kind.as_str()),
                row.line_start.to_string(),
                row.line_end.to_string(),
            ];
            fields.extend(row.values.iter().map(|v| v.to_string()));
            entries.push(format!("[{}]", fields.join(", ")));
        }
    }

    if entries.is_empty() {
        "var combined = [];\n".to_string()
    } else {
        format!("var combined = [\n{}\n];\n", entries.join(",\n"))
    }
}
