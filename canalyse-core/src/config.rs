//! Configuration file support for canalyse
//!
//! Loads project-specific configuration from JSON files.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.canalyserc.json` in the working directory
//! 3. `canalyse.config.json` in the working directory
//!
//! All fields are optional. CLI flags take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_SRC_PATH: &str = "./../../../SW/Public";
pub const DEFAULT_MODULE_BASE: &str = "30_Appl";
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_REPORT_DIR: &str = "./html";
pub const DEFAULT_HIGHLIGHT_DIR: &str = "./highlight";
pub const DEFAULT_HIGHLIGHT_CSS: &str = "styles/vs.css";
pub const DEFAULT_STYLE_DIR: &str = "./style";
pub const DEFAULT_CHART_JS: &str = "https://cdn.jsdelivr.net/npm/chart.js@2.9.3/dist/Chart.min.js";
pub const DEFAULT_DIAGRAM_WIDTH: u32 = 600;
pub const DEFAULT_DIAGRAM_HEIGHT: u32 = 280;

const DEFAULT_BACKGROUND_COLOR: &str = "orange";
const DEFAULT_BORDER_COLOR: &str = "red";

/// Labels shown on source pages when none are configured
const DEFAULT_REPORT_LABELS: &[(&str, &str)] = &[
    ("std.code.complexity.cyclomatic", "cyclomatic complexity"),
    ("std.code.filelines.comments", "lines of comment"),
    ("std.code.lines.code", "lines of code"),
];

/// Criteria charted by `view` when none are configured
const DEFAULT_VIEW_CRITERIA: &[&str] = &[
    "std.code.complexity.cyclomatic",
    "std.code.complexity.maxindent",
    "std.code.filelines.code",
    "std.code.filelines.preprocessor",
    "std.code.filelines.comments",
    "std.code.filelines.total",
    "std.code.length.total",
    "std.code.lines.code",
    "std.code.lines.preprocessor",
    "std.code.lines.comments",
    "std.code.lines.total",
    "std.code.longlines",
    "std.code.longlines.limit=120",
    "std.code.magic.numbers",
    "std.code.magic.numbers.simplier",
    "std.code.member.fields",
    "std.code.member.globals",
    "std.code.member.classes",
    "std.code.member.structs",
    "std.code.member.interfaces",
    "std.code.member.types",
    "std.code.member.methods",
    "std.code.member.namespaces",
    "std.code.maintindex.simple",
    "std.code.ratio.comments",
    "std.code.todo.comments",
    "std.code.todo.strings",
    "std.suppress",
    "std.general.procerrors",
    "std.general.size",
];

/// Criterion mnemonic -> label
pub type LabelMap = BTreeMap<String, CriterionLabel>;

/// Output verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Errors only
    Silent,
    #[default]
    Standard,
    Verbose,
}

impl Verbosity {
    pub fn level_filter(self) -> log::LevelFilter {
        match self {
            Verbosity::Silent => log::LevelFilter::Error,
            Verbosity::Standard => log::LevelFilter::Info,
            Verbosity::Verbose => log::LevelFilter::Debug,
        }
    }
}

/// Chart styling of one criterion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CriterionStyle {
    pub label: String,
    #[serde(rename = "background-color", default = "default_background_color")]
    pub background_color: String,
    #[serde(rename = "border-color", default = "default_border_color")]
    pub border_color: String,
    /// Column of the criterion inside the combined data file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

fn default_background_color() -> String {
    DEFAULT_BACKGROUND_COLOR.to_string()
}

fn default_border_color() -> String {
    DEFAULT_BORDER_COLOR.to_string()
}

/// A label entry: either a plain label or a full chart style
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CriterionLabel {
    Plain(String),
    Styled(CriterionStyle),
}

impl CriterionLabel {
    pub fn label(&self) -> &str {
        match self {
            CriterionLabel::Plain(label) => label,
            CriterionLabel::Styled(style) => &style.label,
        }
    }

    /// Full style; plain labels get the default colors
    pub fn style(&self) -> CriterionStyle {
        match self {
            CriterionLabel::Plain(label) => CriterionStyle {
                label: label.clone(),
                background_color: default_background_color(),
                border_color: default_border_color(),
                index: None,
            },
            CriterionLabel::Styled(style) => style.clone(),
        }
    }
}

/// canalyse configuration loaded from a JSON config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CanalyseConfig {
    /// Prefix stripped from exported filenames
    #[serde(default)]
    pub src_path: Option<String>,

    /// Name of the source root folder, also the base name of data files
    #[serde(default)]
    pub module_base: Option<String>,

    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    #[serde(default)]
    pub report_dir: Option<PathBuf>,

    /// Installation directory of the syntax highlighter
    #[serde(default)]
    pub highlight_dir: Option<PathBuf>,

    /// Highlighter stylesheet, relative to `highlight_dir`
    #[serde(default)]
    pub highlight_css: Option<String>,

    /// Directory holding the generic `style.css`
    #[serde(default)]
    pub style_dir: Option<PathBuf>,

    #[serde(default)]
    pub criteria_labels: Option<LabelMap>,

    #[serde(default)]
    pub gen_datafile_only: Option<bool>,

    #[serde(default)]
    pub verbosity: Option<Verbosity>,

    /// URL of the chart library script
    #[serde(default)]
    pub chart_js: Option<String>,

    #[serde(default)]
    pub diagram_width: Option<u32>,

    #[serde(default)]
    pub diagram_height: Option<u32>,
}

/// Configuration with every default applied
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub src_path: String,
    pub module_base: String,
    pub data_dir: PathBuf,
    pub report_dir: PathBuf,
    pub highlight_dir: PathBuf,
    pub highlight_css: String,
    pub style_dir: PathBuf,
    /// `None` means each command uses its built-in label set
    pub criteria_labels: Option<LabelMap>,
    pub gen_datafile_only: bool,
    pub verbosity: Verbosity,
    pub chart_js: String,
    pub diagram_width: u32,
    pub diagram_height: u32,
    /// Path the config was loaded from (None if defaults)
    pub config_path: Option<PathBuf>,
}

impl CanalyseConfig {
    /// Validate the configuration for logical errors
    pub fn validate(&self) -> Result<()> {
        if let Some(ref base) = self.module_base {
            if base.trim().is_empty() {
                anyhow::bail!("module_base must not be empty");
            }
        }

        for (name, value) in [
            ("diagram_width", self.diagram_width),
            ("diagram_height", self.diagram_height),
        ] {
            if value == Some(0) {
                anyhow::bail!("{} must be positive (got 0)", name);
            }
        }

        if let Some(ref labels) = self.criteria_labels {
            validate_labels(labels)?;
        }

        Ok(())
    }

    /// Resolve config into the form used by the commands
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.validate()?;

        Ok(ResolvedConfig {
            src_path: self
                .src_path
                .clone()
                .unwrap_or_else(|| DEFAULT_SRC_PATH.to_string()),
            module_base: self
                .module_base
                .clone()
                .unwrap_or_else(|| DEFAULT_MODULE_BASE.to_string()),
            data_dir: self
                .data_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            report_dir: self
                .report_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_DIR)),
            highlight_dir: self
                .highlight_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_HIGHLIGHT_DIR)),
            highlight_css: self
                .highlight_css
                .clone()
                .unwrap_or_else(|| DEFAULT_HIGHLIGHT_CSS.to_string()),
            style_dir: self
                .style_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STYLE_DIR)),
            criteria_labels: self.criteria_labels.clone(),
            gen_datafile_only: self.gen_datafile_only.unwrap_or(false),
            verbosity: self.verbosity.unwrap_or_default(),
            chart_js: self
                .chart_js
                .clone()
                .unwrap_or_else(|| DEFAULT_CHART_JS.to_string()),
            diagram_width: self.diagram_width.unwrap_or(DEFAULT_DIAGRAM_WIDTH),
            diagram_height: self.diagram_height.unwrap_or(DEFAULT_DIAGRAM_HEIGHT),
            config_path: None,
        })
    }
}

impl ResolvedConfig {
    /// Build a ResolvedConfig with all defaults (no config file)
    pub fn defaults() -> Result<Self> {
        CanalyseConfig::default().resolve()
    }

    /// Labels printed next to criterion values on source pages
    pub fn report_labels(&self) -> LabelMap {
        match self.criteria_labels {
            Some(ref labels) => labels.clone(),
            None => DEFAULT_REPORT_LABELS
                .iter()
                .map(|(key, label)| (key.to_string(), CriterionLabel::Plain(label.to_string())))
                .collect(),
        }
    }

    /// Criteria charted by `view`, each with its full style
    pub fn view_styles(&self) -> Vec<(String, CriterionStyle)> {
        match self.criteria_labels {
            Some(ref labels) => labels
                .iter()
                .map(|(key, label)| (key.clone(), label.style()))
                .collect(),
            None => DEFAULT_VIEW_CRITERIA
                .iter()
                .enumerate()
                .map(|(idx, key)| {
                    let style = CriterionStyle {
                        label: key.to_string(),
                        background_color: default_background_color(),
                        border_color: default_border_color(),
                        index: Some(idx),
                    };
                    (key.to_string(), style)
                })
                .collect(),
        }
    }

    /// CSV export read by `report` when no file is given
    pub fn default_csv_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.csv", self.module_base))
    }

    /// View dump read by `view` when no file is given
    pub fn default_view_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.py", self.module_base))
    }
}

fn validate_labels(labels: &LabelMap) -> Result<()> {
    for (criterion, label) in labels {
        if criterion.trim().is_empty() {
            anyhow::bail!("criteria_labels contains an empty criterion name");
        }
        if label.label().trim().is_empty() {
            anyhow::bail!("criteria_labels.{} has an empty label", criterion);
        }
    }
    Ok(())
}

/// Parse a `--criteria-labels` value
///
/// Accepts a Python dict literal (or JSON object) mapping criterion names to
/// either a label string or a style dict.
pub fn parse_criteria_labels(text: &str) -> Result<LabelMap> {
    let value = crate::pyliteral::parse(text)
        .map_err(|e| anyhow::anyhow!("{}", e))
        .context("failed to parse criteria labels")?;
    let labels: LabelMap =
        serde_json::from_value(value).context("criteria labels must map names to labels")?;
    validate_labels(&labels)?;
    Ok(labels)
}

/// Discover and load a config file from the working directory
///
/// Search order:
/// 1. `.canalyserc.json`
/// 2. `canalyse.config.json`
///
/// Returns `None` if no config file is found (use defaults).
pub fn discover_config(project_root: &Path) -> Result<Option<(CanalyseConfig, PathBuf)>> {
    for name in [".canalyserc.json", "canalyse.config.json"] {
        let path = project_root.join(name);
        if path.exists() {
            let config = load_config_file(&path)?;
            return Ok(Some((config, path)));
        }
    }
    Ok(None)
}

/// Load config from an explicit file path
pub fn load_config_file(path: &Path) -> Result<CanalyseConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: CanalyseConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("invalid config in: {}", path.display()))?;

    Ok(config)
}

/// Load and resolve config
///
/// If `config_path` is provided, loads from that file.
/// Otherwise, discovers config in `project_root`.
/// Returns default config if nothing is found.
pub fn load_and_resolve(project_root: &Path, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let (config, source_path) = if let Some(path) = config_path {
        let config = load_config_file(path)?;
        (config, Some(path.to_path_buf()))
    } else {
        match discover_config(project_root)? {
            Some((config, path)) => (config, Some(path)),
            None => (CanalyseConfig::default(), None),
        }
    };

    let mut resolved = config.resolve()?;
    resolved.config_path = source_path;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_config_is_valid() {
        let resolved = ResolvedConfig::defaults().expect("default config should resolve");
        assert_eq!(resolved.src_path, DEFAULT_SRC_PATH);
        assert_eq!(resolved.module_base, "30_Appl");
        assert_eq!(resolved.report_dir, PathBuf::from("./html"));
        assert_eq!(resolved.diagram_width, 600);
        assert_eq!(resolved.diagram_height, 280);
        assert_eq!(resolved.verbosity, Verbosity::Standard);
        assert!(!resolved.gen_datafile_only);
        assert_eq!(
            resolved.default_csv_path(),
            PathBuf::from("./data").join("30_Appl.csv")
        );
    }

    #[test]
    fn test_default_label_sets() {
        let resolved = ResolvedConfig::defaults().unwrap();
        let labels = resolved.report_labels();
        assert_eq!(labels.len(), 3);
        assert_eq!(labels["std.code.lines.code"].label(), "lines of code");

        let styles = resolved.view_styles();
        assert_eq!(styles.len(), 30);
        assert_eq!(styles[0].0, "std.code.complexity.cyclomatic");
        assert_eq!(styles[0].1.label, "std.code.complexity.cyclomatic");
        assert_eq!(styles[0].1.background_color, "orange");
        assert_eq!(styles[29].1.index, Some(29));
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "src_path": "/src",
            "module_base": "app",
            "report_dir": "out/html",
            "criteria_labels": {
                "std.code.lines.code": "loc",
                "std.code.complexity.cyclomatic": {
                    "label": "cyclomatic complexity",
                    "background-color": "lightblue",
                    "border-color": "blue",
                    "index": 6
                }
            },
            "gen_datafile_only": true,
            "verbosity": "verbose",
            "diagram_width": 800
        }"#;
        let config: CanalyseConfig = serde_json::from_str(json).unwrap();
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.src_path, "/src");
        assert_eq!(resolved.report_dir, PathBuf::from("out/html"));
        assert!(resolved.gen_datafile_only);
        assert_eq!(resolved.verbosity, Verbosity::Verbose);
        assert_eq!(resolved.diagram_width, 800);
        assert_eq!(resolved.diagram_height, 280);

        let styles = resolved.view_styles();
        assert_eq!(styles.len(), 2);
        let (_, cyclomatic) = &styles[0];
        assert_eq!(cyclomatic.border_color, "blue");
        assert_eq!(cyclomatic.index, Some(6));
        let (_, loc) = &styles[1];
        assert_eq!(loc.label, "loc");
        assert_eq!(loc.background_color, "orange");
    }

    #[test]
    fn test_reject_unknown_fields() {
        let result: Result<CanalyseConfig, _> = serde_json::from_str(r#"{"unknown_field": true}"#);
        assert!(result.is_err(), "unknown fields should be rejected");
    }

    #[test]
    fn test_reject_zero_diagram_size() {
        let config: CanalyseConfig = serde_json::from_str(r#"{"diagram_height": 0}"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reject_empty_module_base() {
        let config: CanalyseConfig = serde_json::from_str(r#"{"module_base": " "}"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reject_empty_label() {
        let config: CanalyseConfig =
            serde_json::from_str(r#"{"criteria_labels": {"std.code.lines.code": ""}}"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_criteria_labels_from_python_literal() {
        let labels = parse_criteria_labels(
            "{'std.code.lines.code': 'lines', 'std.general.size': {'label': 'size', 'index': 2}}",
        )
        .unwrap();
        assert_eq!(labels["std.code.lines.code"], CriterionLabel::Plain("lines".to_string()));
        let size = labels["std.general.size"].style();
        assert_eq!(size.label, "size");
        assert_eq!(size.border_color, "red");
        assert_eq!(size.index, Some(2));
    }

    #[test]
    fn test_parse_criteria_labels_rejects_garbage() {
        assert!(parse_criteria_labels("{'a': ").is_err());
        assert!(parse_criteria_labels("['a', 'b']").is_err());
        assert!(parse_criteria_labels("{'a': ''}").is_err());
    }

    #[test]
    fn test_discover_canalyserc() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join(".canalyserc.json");
        fs::write(&config_path, r#"{"module_base": "lib"}"#).unwrap();

        let (config, path) = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.module_base.as_deref(), Some("lib"));
        assert_eq!(path, config_path);
    }

    #[test]
    fn test_discover_priority_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".canalyserc.json"), r#"{"diagram_width": 1}"#).unwrap();
        fs::write(
            dir.path().join("canalyse.config.json"),
            r#"{"diagram_width": 2}"#,
        )
        .unwrap();

        let (config, _) = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(
            config.diagram_width,
            Some(1),
            ".canalyserc.json should take priority"
        );
    }

    #[test]
    fn test_no_config_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_config(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_load_and_resolve_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("custom.json");
        fs::write(&config_path, r#"{"data_dir": "metrics"}"#).unwrap();

        let resolved = load_and_resolve(dir.path(), Some(&config_path)).unwrap();
        assert_eq!(resolved.data_dir, PathBuf::from("metrics"));
        assert_eq!(resolved.config_path, Some(config_path));
    }

    #[test]
    fn test_load_invalid_file_names_it() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("broken.json");
        fs::write(&config_path, "{ not json").unwrap();

        let err = load_and_resolve(dir.path(), Some(&config_path)).unwrap_err();
        assert!(format!("{:#}", err).contains("broken.json"));
    }
}
