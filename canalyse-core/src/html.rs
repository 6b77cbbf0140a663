//! HTML page generation
//!
//! Two page kinds are produced:
//! - a source page per file: line-numbered listing split into the regions of
//!   the export, each with its metric values and a navigation entry
//! - a distribution page per criterion: bar chart of the pre-binned histogram
//!
//! Pages reference external stylesheets, the syntax highlighter and the chart
//! library by relative path or URL; nothing is inlined.

use crate::config::{CriterionStyle, LabelMap};
use crate::datafile::js_string;
use crate::record::MetricRow;
use crate::view::Distribution;

/// Relative links from a source page to shared assets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLinks {
    pub stylesheet: String,
    pub highlight_css: String,
    pub highlight_js: String,
}

/// Everything needed to render one source page
pub struct SourcePage<'a> {
    /// Page file name, also the prefix of every anchor
    pub file_name: &'a str,
    pub rows: &'a [MetricRow],
    /// Criterion names aligned with [`MetricRow::values`]
    pub criteria: &'a [String],
    pub labels: &'a LabelMap,
    /// Source lines without terminators
    pub lines: &'a [String],
    pub links: &'a PageLinks,
}

/// Render a source page
pub fn render_source_page(page: &SourcePage<'_>) -> String {
    let title = page.file_name.strip_suffix(".html").unwrap_or(page.file_name);

    let options: String = page
        .rows
        .iter()
        .map(|row| {
            format!(
                "<option value='{anchor}'>{kind}: {region}({start} - {end})</option>\n",
                anchor = html_escape(&anchor(page.file_name, row)),
                kind = html_escape(row.kind.as_str()),
                region = html_escape(&row.region),
                start = row.line_start,
                end = row.line_end,
            )
        })
        .collect();

    let sections: String = page
        .rows
        .iter()
        .map(|row| render_section(page, row))
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
    <link rel='stylesheet' type='text/css' href='{stylesheet}'>
    <link rel='stylesheet' type='text/css' href='{highlight_css}'>
    <script src='{highlight_js}'></script>
    <script>hljs.initHighlightingOnLoad();</script>
</head>
<body><span id='{top}'></span>
<span id='details_head'>Browse details of file {title} <select id='NavSection'>
{options}</select></span>
{sections}
<script>var elem = document.getElementById('NavSection');
    elem.addEventListener('change', JumpToSection);
    function JumpToSection() {{
        window.location.href = '#' + document.getElementById('NavSection').value;
    }}</script>
</body>
</html>
"#,
        title = html_escape(title),
        stylesheet = html_escape(&page.links.stylesheet),
        highlight_css = html_escape(&page.links.highlight_css),
        highlight_js = html_escape(&page.links.highlight_js),
        top = html_escape(&top_anchor(page.file_name)),
        options = options,
        sections = sections,
    )
}

fn anchor(file_name: &str, row: &MetricRow) -> String {
    format!("{}@{}-{}", file_name, row.line_start, row.line_end)
}

fn top_anchor(file_name: &str) -> String {
    format!("{}@top", file_name)
}

fn render_section(page: &SourcePage<'_>, row: &MetricRow) -> String {
    let mut out = format!(
        "<span class='detail_wrapper' id='{anchor}'>\n\
         <span class='detail_type_region'>{kind}: {region} ({start} - {end})</span>\n",
        anchor = html_escape(&anchor(page.file_name, row)),
        kind = html_escape(row.kind.as_str()),
        region = html_escape(&row.region),
        start = row.line_start,
        end = row.line_end,
    );

    for (criterion, value) in page.criteria.iter().zip(&row.values) {
        if let Some(label) = page.labels.get(criterion) {
            out.push_str(&format!(
                "<span class='detail_{class}'>{label}: {value}</span>\n",
                class = html_escape(&criterion.replace('.', "_")),
                label = html_escape(label.label()),
                value = value,
            ));
        }
    }

    out.push_str(&format!(
        "<button onClick=\"window.location.href='#{top}'\">top &#x25B4;</button></span>\n",
        top = html_escape(&top_anchor(page.file_name)),
    ));
    out.push_str("    <pre class='sourcecode'><code class='#language-c'>\n");

    let (first, last) = line_span(row, page.lines.len());
    for number in first..=last {
        out.push_str(&format!(
            "<span title='{}'>{}\n</span>",
            number,
            html_escape(&page.lines[number - 1])
        ));
    }

    out.push_str("    </code></pre>\n");
    out
}

/// 1-based inclusive line range to print for `row`; empty when `first > last`
///
/// File-scope regions report one line too many, so their last line is
/// dropped. Ranges reaching past the file are clamped.
fn line_span(row: &MetricRow, line_count: usize) -> (usize, usize) {
    let first = usize::try_from(row.line_start).unwrap_or(0).max(1);
    let mut last = usize::try_from(row.line_end).unwrap_or(0);
    if row.is_global_region() {
        last = last.saturating_sub(1);
    }
    if last > line_count {
        log::warn!(
            "{}: region {} ends at line {} but the file has {} lines",
            row.filename,
            row.region,
            last,
            line_count
        );
        last = line_count;
    }
    if first > last {
        (1, 0)
    } else {
        (first, last)
    }
}

/// Everything needed to render one distribution page
pub struct DistributionPage<'a> {
    pub criterion: &'a str,
    pub style: &'a CriterionStyle,
    pub distribution: &'a Distribution,
    pub chart_js: &'a str,
    /// Stylesheet href relative to the page
    pub stylesheet: &'a str,
    /// Data file src relative to the page
    pub datafile: &'a str,
    pub width: u32,
    pub height: u32,
}

/// Render a distribution page
pub fn render_distribution_page(page: &DistributionPage<'_>) -> String {
    let heading_id = page.style.label.replace(' ', "_");
    let heading = format!("Distribution of {}", page.style.label);

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <script src='{chart_js}'></script>
    <link rel='stylesheet' type='text/css' href='{stylesheet}'>
</head>
<body>
    <h2 id='{heading_id}'>{heading}</h2>
    <p>Average : {avg}<br>
       Minimum : {min}<br>
       Maximum : {max}<br>
       Total : {total}</p>
    <canvas id='{criterion}' width='{width}' height='{height}'></canvas>
    <script src='{datafile}'></script>
    <script>
        var ctx = document.getElementById({criterion_js});
        var myChart = new Chart(ctx, {{
            type: 'bar',
            data: {{
                labels: categories,
                datasets: [{{
                    label: {label_js},
                    backgroundColor: {background_js},
                    borderColor: {border_js},
                    borderWidth: 1,
                    data: values
                }}]
            }}
        }});
        document.addEventListener('DOMContentLoaded', function () {{
            document.getElementById({heading_id_js}).innerText = {heading_js};
        }});
    </script>
</body>
</html>
"#,
        chart_js = html_escape(page.chart_js),
        stylesheet = html_escape(page.stylesheet),
        heading_id = html_escape(&heading_id),
        heading = html_escape(&heading),
        avg = page.distribution.avg,
        min = page.distribution.min,
        max = page.distribution.max,
        total = page.distribution.total,
        criterion = html_escape(page.criterion),
        width = page.width,
        height = page.height,
        datafile = html_escape(page.datafile),
        criterion_js = js_string(page.criterion),
        label_js = js_string(&page.style.label),
        background_js = js_string(&page.style.background_color),
        border_js = js_string(&page.style.border_color),
        heading_id_js = js_string(&heading_id),
        heading_js = js_string(&heading),
    )
}

/// Escape HTML special characters
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
