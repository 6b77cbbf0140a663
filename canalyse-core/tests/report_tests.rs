//! End-to-end report and view generation

use canalyse_core::config::{CriterionLabel, LabelMap};
use canalyse_core::{
    generate_distributions, generate_report, read_csv, read_view_file, ResolvedConfig,
};
use std::fs;
use std::path::{Path, PathBuf};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn config_in(out: &Path) -> ResolvedConfig {
    let mut config = ResolvedConfig::defaults().unwrap();
    config.src_path = fixture_path("source").to_string_lossy().into_owned();
    config.data_dir = out.join("data");
    config.report_dir = out.join("html");
    config.style_dir = out.join("style");
    config.highlight_dir = out.join("highlight");
    config
}

#[test]
fn test_report_for_fixture_source() {
    let out = tempfile::tempdir().unwrap();
    let config = config_in(out.path());
    let source = fixture_path("source/30_Appl/drivers/can.c");

    let csv = format!(
        "filename,region,type,modified,line start,line end,std.code.complexity:cyclomatic,std.code.lines:code\n\
         {0},__global__,global,N,1,18,,2\n\
         {0},can_init,function,N,5,9,1,4\n\
         {0},can_send,function,N,11,17,3,5\n\
         {0},,file,N,1,18,4,11\n",
        source.display()
    );
    let ingested = read_csv(csv.as_bytes()).unwrap();
    let summary = generate_report(&ingested, &config, |_| {}).unwrap();
    assert_eq!(summary.files, 1);
    assert_eq!(summary.pages, 1);

    let page = fs::read_to_string(out.path().join("html/drivers/can.c.html")).unwrap();
    assert!(page.contains("<title>can.c</title>"));
    assert!(page.contains("<option value='can.c.html@11-17'>function: can_send(11 - 17)</option>"));
    assert!(page.contains("<span class='detail_type_region'>file: __global__ (1 - 18)</span>"));
    assert!(page.contains("cyclomatic complexity: 3"));
    assert!(page.contains("lines of code: 13"));
    assert!(page.contains("<span title='12'>{\n</span>"));
    assert!(page.contains("const char *msg"));
    // Last line of a file-scope region is not printed
    assert!(page.contains("<span title='17'>}\n</span>"));
    assert!(!page.contains("<span title='18'>"));
    assert!(page.contains("if (!ready || msg == 0) {"));
    assert!(page.contains("href='../../style/style.css'"));
    assert!(page.contains("href='../../highlight/styles/vs.css'"));

    let js = fs::read_to_string(out.path().join("data/30_Appl.js")).unwrap();
    assert_eq!(js.matches("\"can.c.html\"").count(), 4);
    assert!(js.contains("\"/drivers/can.c\", \"can_init\", \"function\", 5, 9, 1, 4]"));
}

#[test]
fn test_view_for_fixture_dump() {
    let out = tempfile::tempdir().unwrap();
    let mut config = config_in(out.path());
    let mut labels = LabelMap::new();
    for (key, label) in [
        ("std.code.complexity.cyclomatic", "cyclomatic complexity"),
        ("std.code.lines.code", "lines of code"),
        ("std.code.filelines.comments", "lines of comment"),
        ("std.code.member.fields", "fields"),
    ] {
        labels.insert(key.to_string(), CriterionLabel::Plain(label.to_string()));
    }
    config.criteria_labels = Some(labels);

    let dump = read_view_file(&fixture_path("view/30_Appl.py")).unwrap();
    let summary = generate_distributions(&dump, &config).unwrap();
    assert_eq!(summary.written.len(), 3);
    assert_eq!(summary.missing, vec!["std.code.member.fields"]);

    let cyclomatic =
        fs::read_to_string(out.path().join("data/30_Appl.std.code.complexity.cyclomatic.js"))
            .unwrap();
    assert_eq!(
        cyclomatic,
        "var values = [5, 3, 3, 1];\nvar categories = [1, 2, 4, 9];\n"
    );

    let page = fs::read_to_string(
        out.path()
            .join("html/30_Appl.std.code.complexity.cyclomatic.html"),
    )
    .unwrap();
    assert!(page.contains("Minimum : 1<br>"));
    assert!(page.contains("Maximum : 9<br>"));
    assert!(page.contains("Total : 31</p>"));

    let comments = fs::read_to_string(
        out.path()
            .join("html/30_Appl.std.code.filelines.comments.html"),
    )
    .unwrap();
    assert!(comments.contains("Average : 0<br>"));
}

#[test]
fn test_view_datafile_only() {
    let out = tempfile::tempdir().unwrap();
    let mut config = config_in(out.path());
    config.gen_datafile_only = true;

    let dump = read_view_file(&fixture_path("view/30_Appl.py")).unwrap();
    let summary = generate_distributions(&dump, &config).unwrap();

    // Default criteria set: three of them are in the dump
    assert_eq!(summary.written.len(), 3);
    assert_eq!(summary.missing.len(), 27);
    assert!(out.path().join("data/30_Appl.std.code.lines.code.js").exists());
    assert!(!out.path().join("html").exists());
}
