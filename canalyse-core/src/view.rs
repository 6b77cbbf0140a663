//! View dump model
//!
//! `metrix++ view --format=python` prints one Python literal holding
//! aggregated statistics per criterion. Only the parts needed for
//! distribution charts are modelled; everything else is ignored.

use crate::pyliteral;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct ViewDump {
    pub view: Vec<ViewEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewEntry {
    pub data: ViewData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewData {
    /// group (`std.code.complexity`) -> detail (`cyclomatic`) -> statistics
    #[serde(rename = "aggregated-data")]
    pub aggregated_data: BTreeMap<String, BTreeMap<String, AggregatedDetail>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AggregatedDetail {
    #[serde(default)]
    pub avg: Option<f64>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(rename = "distribution-bars", default)]
    pub distribution_bars: Vec<DistributionBar>,
}

/// One pre-binned histogram bar
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DistributionBar {
    pub metric: Value,
    pub count: u64,
}

/// Chart data of one criterion
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub avg: f64,
    pub min: i64,
    pub max: i64,
    pub total: i64,
    /// Bar heights
    pub values: Vec<u64>,
    /// Bar labels
    pub categories: Vec<Value>,
}

impl Distribution {
    fn from_detail(detail: &AggregatedDetail) -> Self {
        // Truncation toward zero, missing or null reads as 0
        let int = |v: Option<f64>| v.map(|f| f as i64).unwrap_or(0);
        Distribution {
            avg: detail.avg.unwrap_or(0.0),
            min: int(detail.min),
            max: int(detail.max),
            total: int(detail.total),
            values: detail.distribution_bars.iter().map(|b| b.count).collect(),
            categories: detail
                .distribution_bars
                .iter()
                .map(|b| b.metric.clone())
                .collect(),
        }
    }

    /// Data file body: `values` and `categories` arrays
    pub fn to_js(&self) -> String {
        let values: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        let categories: Vec<String> = self.categories.iter().map(|c| c.to_string()).collect();
        format!(
            "var values = [{}];\nvar categories = [{}];\n",
            values.join(", "),
            categories.join(", ")
        )
    }
}

impl ViewDump {
    /// Parse the first line of a view dump
    pub fn parse(text: &str) -> Result<Self> {
        let line = text.lines().next().unwrap_or("");
        let value = pyliteral::parse(line).map_err(|e| anyhow::anyhow!("{}", e))?;
        let dump: ViewDump =
            serde_json::from_value(value).context("unexpected view dump structure")?;
        if dump.view.is_empty() {
            anyhow::bail!("unexpected view dump structure: 'view' list is empty");
        }
        Ok(dump)
    }

    /// Aggregated statistics of the first view entry
    pub fn aggregated(&self) -> &BTreeMap<String, BTreeMap<String, AggregatedDetail>> {
        &self.view[0].data.aggregated_data
    }

    /// Distribution of `criterion`, written as `group.detail`
    pub fn distribution(&self, criterion: &str) -> Option<Distribution> {
        self.aggregated().iter().find_map(|(group, details)| {
            let detail = criterion
                .strip_prefix(group.as_str())?
                .strip_prefix('.')?;
            details.get(detail).map(Distribution::from_detail)
        })
    }

    /// Every `group.detail` name present in the dump
    pub fn criteria(&self) -> Vec<String> {
        self.aggregated()
            .iter()
            .flat_map(|(group, details)| details.keys().map(move |d| format!("{}.{}", group, d)))
            .collect()
    }
}

/// Read a view dump from disk
pub fn read_view_file(path: &Path) -> Result<ViewDump> {
    log::debug!("Parsing view dump {}", path.display());
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open view dump: {}", path.display()))?;
    let mut first_line = String::new();
    std::io::BufReader::new(file)
        .read_line(&mut first_line)
        .with_context(|| format!("failed to read view dump: {}", path.display()))?;
    ViewDump::parse(&first_line)
        .with_context(|| format!("failed to parse view dump: {}", path.display()))
}
