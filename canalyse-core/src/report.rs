//! Report generation
//!
//! Drives the page and data file writers for the two inputs:
//! - a CSV export: one source page per file plus the combined data file
//! - a view dump: one data file and one chart page per criterion

use crate::config::ResolvedConfig;
use crate::datafile::render_combined;
use crate::html::{
    render_distribution_page, render_source_page, DistributionPage, PageLinks, SourcePage,
};
use crate::ingest::Ingested;
use crate::layout::Layout;
use crate::output::{atomic_write, relative_path};
use crate::record::FileBucket;
use crate::view::ViewDump;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Outcome of [`generate_report`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSummary {
    /// Distinct source files in the export
    pub files: usize,
    /// Source pages written (0 with `gen_datafile_only`)
    pub pages: usize,
    pub datafile: PathBuf,
}

/// Outcome of [`generate_distributions`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewSummary {
    /// Criteria with a data file written
    pub written: Vec<String>,
    /// Configured criteria absent from the dump
    pub missing: Vec<String>,
}

/// Write source pages and the combined data file for an ingested export
///
/// `on_page` is called with the source filename after each page is written.
pub fn generate_report<F>(
    ingested: &Ingested,
    config: &ResolvedConfig,
    mut on_page: F,
) -> Result<ReportSummary>
where
    F: FnMut(&str),
{
    let layout = Layout::new(&config.src_path, &config.module_base, &config.report_dir);

    let mut pages = 0;
    if !config.gen_datafile_only {
        for bucket in ingested.store.buckets() {
            write_source_page(bucket, ingested, &layout, config)?;
            pages += 1;
            on_page(&bucket.filename);
        }
    }

    let datafile = config.data_dir.join(format!("{}.js", config.module_base));
    log::debug!("Generating detailed data file {}", datafile.display());
    atomic_write(&datafile, &render_combined(&ingested.store, &layout))
        .with_context(|| format!("failed to write data file: {}", datafile.display()))?;

    log::info!("{} files processed.", ingested.store.len());

    Ok(ReportSummary {
        files: ingested.store.len(),
        pages,
        datafile,
    })
}

fn write_source_page(
    bucket: &FileBucket,
    ingested: &Ingested,
    layout: &Layout,
    config: &ResolvedConfig,
) -> Result<PathBuf> {
    let location = layout.locate(&bucket.filename);
    let path = location.path();
    log::debug!("Creating HTML file {}", path.display());

    let lines = read_source_lines(Path::new(&bucket.filename))?;

    let highlight = relative_path(&location.dir, &config.highlight_dir)?;
    let links = PageLinks {
        stylesheet: format!("{}/style.css", relative_path(&location.dir, &config.style_dir)?),
        highlight_css: format!("{}/{}", highlight, config.highlight_css),
        highlight_js: format!("{}/highlight.pack.js", highlight),
    };
    let labels = config.report_labels();

    for row in &bucket.rows {
        log::debug!(
            "{}: {} ({} - {})",
            row.kind,
            row.region,
            row.line_start,
            row.line_end
        );
    }

    let html = render_source_page(&SourcePage {
        file_name: &location.file_name,
        rows: &bucket.rows,
        criteria: ingested.schema.criteria(),
        labels: &labels,
        lines: &lines,
        links: &links,
    });

    atomic_write(&path, &html)
        .with_context(|| format!("failed to write HTML file: {}", path.display()))?;
    Ok(path)
}

/// Read a source file; invalid UTF-8 is replaced rather than rejected
fn read_source_lines(path: &Path) -> Result<Vec<String>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read source file: {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes)
        .lines()
        .map(str::to_string)
        .collect())
}

/// Write a data file and (unless `gen_datafile_only`) a chart page per criterion
pub fn generate_distributions(dump: &ViewDump, config: &ResolvedConfig) -> Result<ViewSummary> {
    let mut summary = ViewSummary::default();

    for (criterion, style) in config.view_styles() {
        let Some(distribution) = dump.distribution(&criterion) else {
            log::warn!("No data found for criterion '{}'", criterion);
            summary.missing.push(criterion);
            continue;
        };
        log::debug!(
            "Found data for {} = '{}': avg {}, min {}, max {}, total {}",
            criterion,
            style.label,
            distribution.avg,
            distribution.min,
            distribution.max,
            distribution.total
        );

        let datafile_name = format!("{}.{}.js", config.module_base, criterion);
        let datafile = config.data_dir.join(&datafile_name);
        atomic_write(&datafile, &distribution.to_js())
            .with_context(|| format!("failed to write data file: {}", datafile.display()))?;

        if !config.gen_datafile_only {
            let page_path = config
                .report_dir
                .join(format!("{}.{}.html", config.module_base, criterion));
            let stylesheet = format!(
                "{}/style.css",
                relative_path(&config.report_dir, &config.style_dir)?
            );
            let datafile_src = format!(
                "{}/{}",
                relative_path(&config.report_dir, &config.data_dir)?,
                datafile_name
            );

            let html = render_distribution_page(&DistributionPage {
                criterion: &criterion,
                style: &style,
                distribution: &distribution,
                chart_js: &config.chart_js,
                stylesheet: &stylesheet,
                datafile: &datafile_src,
                width: config.diagram_width,
                height: config.diagram_height,
            });
            atomic_write(&page_path, &html)
                .with_context(|| format!("failed to write HTML file: {}", page_path.display()))?;
        }

        summary.written.push(criterion);
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CriterionLabel, LabelMap};
    use crate::ingest::read_csv;
    use std::fs;

    fn config_in(root: &Path) -> ResolvedConfig {
        let mut config = ResolvedConfig::defaults().unwrap();
        config.src_path = root.join("src").to_string_lossy().into_owned();
        config.module_base = "app".to_string();
        config.data_dir = root.join("data");
        config.report_dir = root.join("html");
        config.style_dir = root.join("style");
        config.highlight_dir = root.join("highlight");
        config
    }

    #[test]
    fn test_generate_report_writes_pages_and_datafile() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src/app/net");
        fs::create_dir_all(&src).unwrap();
        let source = src.join("sock.c");
        fs::write(&source, "int a;\nint f(void) {\n  return 1;\n}\n").unwrap();

        let csv = format!(
            "filename,region,type,modified,line start,line end,std.code.lines.code\n\
             {0},f,function,N,2,4,3\n\
             {0},__global__,global,N,1,5,1\n",
            source.display()
        );
        let ingested = read_csv(csv.as_bytes()).unwrap();
        let config = config_in(dir.path());

        let mut seen = Vec::new();
        let summary = generate_report(&ingested, &config, |f| seen.push(f.to_string())).unwrap();
        assert_eq!(summary.files, 1);
        assert_eq!(summary.pages, 1);
        assert_eq!(seen.len(), 1);

        let page = fs::read_to_string(dir.path().join("html/net/sock.c.html")).unwrap();
        assert!(page.contains("href='../../style/style.css'"));
        assert!(page.contains("src='../../highlight/highlight.pack.js'"));
        assert!(page.contains("lines of code: 3"));
        assert!(page.contains("<span title='3'>  return 1;\n</span>"));

        let js = fs::read_to_string(dir.path().join("data/app.js")).unwrap();
        assert!(js.starts_with("var combined = [\n"));
        assert!(js.contains("\"sock.c.html\", \"/net/sock.c\", \"f\", \"function\", 2, 4, 3]"));
    }

    #[test]
    fn test_gen_datafile_only_skips_pages() {
        let dir = tempfile::tempdir().unwrap();
        let csv = "filename,region,type,modified,line start,line end,x\n\
                   missing.c,f,function,N,1,2,3\n";
        let ingested = read_csv(csv.as_bytes()).unwrap();
        let mut config = config_in(dir.path());
        config.gen_datafile_only = true;

        let summary = generate_report(&ingested, &config, |_| {}).unwrap();
        assert_eq!(summary.pages, 0);
        assert!(summary.datafile.exists());
        assert!(!dir.path().join("html").exists());
    }

    #[test]
    fn test_unreadable_source_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let csv = "filename,region,type,modified,line start,line end,x\n\
                   does/not/exist.c,f,function,N,1,2,3\n";
        let ingested = read_csv(csv.as_bytes()).unwrap();
        let config = config_in(dir.path());

        let err = generate_report(&ingested, &config, |_| {}).unwrap_err();
        assert!(format!("{:#}", err).contains("does/not/exist.c"));
    }

    #[test]
    fn test_generate_distributions() {
        let dir = tempfile::tempdir().unwrap();
        let dump = ViewDump::parse(
            "{'view': [{'data': {'aggregated-data': {'std.code.lines': {'code': \
             {'avg': 4.0, 'min': 1, 'max': 8, 'total': 12, 'distribution-bars': [{'metric': 1, 'count': 2}]}}}}}]}",
        )
        .unwrap();
        let mut config = config_in(dir.path());
        let mut labels = LabelMap::new();
        labels.insert(
            "std.code.lines.code".to_string(),
            CriterionLabel::Plain("lines of code".to_string()),
        );
        labels.insert(
            "std.general.size".to_string(),
            CriterionLabel::Plain("size".to_string()),
        );
        config.criteria_labels = Some(labels);

        let summary = generate_distributions(&dump, &config).unwrap();
        assert_eq!(summary.written, vec!["std.code.lines.code"]);
        assert_eq!(summary.missing, vec!["std.general.size"]);

        let js = fs::read_to_string(dir.path().join("data/app.std.code.lines.code.js")).unwrap();
        assert_eq!(js, "var values = [2];\nvar categories = [1];\n");

        let html =
            fs::read_to_string(dir.path().join("html/app.std.code.lines.code.html")).unwrap();
        assert!(html.contains("<script src='../data/app.std.code.lines.code.js'></script>"));
        assert!(html.contains("href='../style/style.css'"));
        assert!(!dir.path().join("data/app.std.general.size.js").exists());
    }
}
