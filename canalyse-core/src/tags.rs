//! Tag editor for metrix++ CSV exports
//!
//! Maintains a whitespace-separated list of tags in a column named `tag`.
//! Rows are selected by matching their filename (first column) against a
//! shell glob, a literal filename, or every line of a list file (`#path`).
//!
//! Operations are grouped: all adds run first, then all removes, then all
//! changes. Within a group the queue order is kept. The relative order of
//! operations across groups does not follow the command line.

use crate::output::atomic_write;
use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};
use std::path::Path;

/// Name of the managed column
pub const TAG_COLUMN: &str = "tag";

/// Prefix marking a selector as a list file reference
pub const LIST_FILE_PREFIX: char = '#';

/// What to do with the tag cell of a matching row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagAction {
    Add(String),
    Remove(String),
    Change { from: String, to: String },
}

/// A queued operation as given by the user, before selector expansion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRequest {
    pub selector: String,
    pub action: TagAction,
}

impl TagRequest {
    /// Parse `SELECTOR:TAG` for an add operation
    pub fn add(arg: &str) -> Result<Self> {
        let (selector, tag) = split_argument(arg, "SELECTOR:TAG")?;
        validate_tag(tag)?;
        Ok(TagRequest {
            selector,
            action: TagAction::Add(tag.to_string()),
        })
    }

    /// Parse `SELECTOR:TAG` for a remove operation
    pub fn remove(arg: &str) -> Result<Self> {
        let (selector, tag) = split_argument(arg, "SELECTOR:TAG")?;
        validate_tag(tag)?;
        Ok(TagRequest {
            selector,
            action: TagAction::Remove(tag.to_string()),
        })
    }

    /// Parse `SELECTOR:OLD=NEW` for a change operation
    pub fn change(arg: &str) -> Result<Self> {
        let (selector, tags) = split_argument(arg, "SELECTOR:OLD=NEW")?;
        let (from, to) = tags.split_once('=').with_context(|| {
            format!("malformed argument '{}': expected SELECTOR:OLD=NEW", arg)
        })?;
        validate_tag(from)?;
        validate_tag(to)?;
        Ok(TagRequest {
            selector,
            action: TagAction::Change {
                from: from.to_string(),
                to: to.to_string(),
            },
        })
    }
}

fn split_argument<'a>(arg: &'a str, expected: &str) -> Result<(String, &'a str)> {
    let (selector, rest) = arg
        .split_once(':')
        .with_context(|| format!("malformed argument '{}': expected {}", arg, expected))?;
    let selector = selector.trim();
    if selector.is_empty() {
        anyhow::bail!("malformed argument '{}': selector is empty", arg);
    }
    Ok((selector.to_string(), rest))
}

/// Tags are non-empty and alphanumeric only
pub fn validate_tag(tag: &str) -> Result<()> {
    if tag.is_empty() || !tag.chars().all(char::is_alphanumeric) {
        anyhow::bail!(
            "tag may only consist of alphanumeric characters: '{}'",
            tag
        );
    }
    Ok(())
}

/// Operation queue, grouped by action
#[derive(Debug, Clone, Default)]
pub struct TagPlan {
    adds: Vec<TagRequest>,
    removes: Vec<TagRequest>,
    changes: Vec<TagRequest>,
}

impl TagPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: TagRequest) {
        match request.action {
            TagAction::Add(_) => self.adds.push(request),
            TagAction::Remove(_) => self.removes.push(request),
            TagAction::Change { .. } => self.changes.push(request),
        }
    }

    pub fn len(&self) -> usize {
        self.adds.len() + self.removes.len() + self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expand list-file selectors and compile globs, in execution order
    ///
    /// A list file that cannot be read is reported and its group skipped.
    /// An invalid glob aborts the whole plan.
    pub fn operations(&self) -> Result<Vec<TagOperation>> {
        let mut operations = Vec::with_capacity(self.len());
        for request in self
            .adds
            .iter()
            .chain(&self.removes)
            .chain(&self.changes)
        {
            for selector in expand_selector(&request.selector) {
                operations.push(TagOperation {
                    selector: Selector::new(&selector)?,
                    action: request.action.clone(),
                });
            }
        }
        Ok(operations)
    }
}

/// Turn `#listfile` into one selector per non-empty line
fn expand_selector(selector: &str) -> Vec<String> {
    let Some(list_path) = selector.strip_prefix(LIST_FILE_PREFIX) else {
        return vec![selector.to_string()];
    };

    match std::fs::read_to_string(list_path) {
        Ok(content) => content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect(),
        Err(e) => {
            log::warn!(
                "Referenced selector file not accessible: {} ({})",
                list_path,
                e
            );
            Vec::new()
        }
    }
}

/// Filename pattern with `fnmatch` semantics; `*` also matches `/`
#[derive(Debug, Clone)]
pub struct Selector {
    pattern: String,
    matcher: GlobMatcher,
}

impl Selector {
    pub fn new(pattern: &str) -> Result<Self> {
        let glob = GlobBuilder::new(&fnmatch_to_glob(pattern))
            .literal_separator(false)
            .backslash_escape(false)
            .build()
            .with_context(|| format!("invalid selector pattern: {}", pattern))?;
        Ok(Selector {
            pattern: pattern.to_string(),
            matcher: glob.compile_matcher(),
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, filename: &str) -> bool {
        self.matcher.is_match(filename)
    }
}

/// Rewrite an `fnmatch` pattern into globset syntax
///
/// Only `*`, `?` and `[...]` are special. Braces are literal, an unclosed
/// `[` is literal, a class opening with `^` is not negated and runs of `*`
/// carry no recursive meaning.
fn fnmatch_to_glob(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut glob = String::with_capacity(pattern.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                glob.push('*');
                while chars.get(i + 1) == Some(&'*') {
                    i += 1;
                }
            }
            '{' => glob.push_str("[{]"),
            '}' => glob.push_str("[}]"),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    push_class(&mut glob, &chars[i + 1..end]);
                    i = end;
                }
                None => glob.push_str("[[]"),
            },
            c => glob.push(c),
        }
        i += 1;
    }
    glob
}

/// Index of the `]` closing the class opened at `open`
fn class_end(chars: &[char], open: usize) -> Option<usize> {
    let mut j = open + 1;
    if chars.get(j) == Some(&'!') {
        j += 1;
    }
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    chars
        .get(j..)?
        .iter()
        .position(|&c| c == ']')
        .map(|offset| j + offset)
}

fn push_class(glob: &mut String, body: &[char]) {
    let (negated, items) = match body.split_first() {
        Some(('!', rest)) => (true, rest),
        _ => (false, body),
    };

    if negated || items.first() != Some(&'^') {
        glob.push('[');
        if negated {
            glob.push('!');
        }
        glob.extend(items);
        glob.push(']');
        return;
    }

    // A leading `^` is a plain member here; move it off the first position
    let head = if items.get(1) == Some(&'-') && items.len() > 2 {
        3
    } else {
        1
    };
    let (first, rest) = items.split_at(head);
    if rest.is_empty() {
        match first {
            ['^'] => glob.push('^'),
            ['^', '-', last] if *last > '^' => {
                glob.push_str("[_-");
                glob.push(*last);
                glob.push_str("^]");
            }
            _ => {
                glob.push('[');
                glob.extend(first);
                glob.push(']');
            }
        }
        return;
    }
    glob.push('[');
    glob.extend(rest);
    glob.extend(first);
    glob.push(']');
}

/// A single expanded operation ready to run against a [`TagTable`]
#[derive(Debug, Clone)]
pub struct TagOperation {
    pub selector: Selector,
    pub action: TagAction,
}

/// Materialized CSV content, header first
///
/// Blank lines are kept as empty rows and written back unchanged.
#[derive(Debug, Clone)]
pub struct TagTable {
    rows: Vec<Vec<String>>,
    crlf: bool,
}

impl TagTable {
    pub fn read_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("unable to open csv-file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("failed to parse CSV: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let rows = split_records(content)
            .into_iter()
            .enumerate()
            .map(|(idx, line)| {
                parse_record(line).with_context(|| format!("failed to read CSV row {}", idx + 1))
            })
            .collect::<Result<Vec<Vec<String>>>>()?;

        match rows.first() {
            None => anyhow::bail!("CSV input has no header row"),
            Some(header) if header.is_empty() => anyhow::bail!("CSV header row is empty"),
            Some(_) => {}
        }

        Ok(TagTable {
            rows,
            crlf: content.contains("\r\n"),
        })
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    fn tag_index(&self) -> Option<usize> {
        self.rows[0].iter().position(|c| c == TAG_COLUMN)
    }

    /// Locate the tag column, appending it when missing
    ///
    /// Returns the column index and whether the column was just created.
    fn ensure_tag_column(&mut self) -> (usize, bool) {
        if let Some(idx) = self.tag_index() {
            return (idx, false);
        }

        let idx = self.rows[0].len();
        self.rows[0].push(TAG_COLUMN.to_string());
        for row in self.rows.iter_mut().skip(1).filter(|row| !row.is_empty()) {
            if row.len() < idx {
                row.resize(idx, String::new());
            }
            row.push(String::new());
        }
        (idx, true)
    }

    /// Run one operation, returning the number of matching rows
    pub fn apply(&mut self, operation: &TagOperation) -> usize {
        let (idx, needs_append) = self.ensure_tag_column();
        let selector = &operation.selector;

        match &operation.action {
            TagAction::Add(tag) => {
                log::debug!("Adding tag '{}' to selector {}", tag, selector.pattern());
                self.for_each_match(selector, |filename, row| {
                    if row.len() <= idx {
                        row.resize(idx + 1, String::new());
                    }
                    row[idx].push(' ');
                    row[idx].push_str(tag);
                    log::debug!("  + {}", filename);
                })
            }
            // A column created by this very operation has nothing to edit
            TagAction::Remove(_) | TagAction::Change { .. } if needs_append => 0,
            TagAction::Remove(tag) => {
                log::debug!("Removing tag '{}' from selector {}", tag, selector.pattern());
                self.for_each_match(selector, |filename, row| {
                    log::debug!("  - {}", filename);
                    edit_tags(row, idx, |tags| {
                        if let Some(pos) = tags.iter().position(|t| t == tag) {
                            tags.remove(pos);
                        }
                    });
                })
            }
            TagAction::Change { from, to } => {
                log::debug!(
                    "Replacing tag '{}' by '{}' at selector {}",
                    from,
                    to,
                    selector.pattern()
                );
                self.for_each_match(selector, |filename, row| {
                    log::debug!("  @ {}", filename);
                    edit_tags(row, idx, |tags| {
                        if let Some(pos) = tags.iter().position(|t| t == from) {
                            tags[pos] = to.clone();
                        }
                    });
                })
            }
        }
    }

    fn for_each_match<F>(&mut self, selector: &Selector, mut f: F) -> usize
    where
        F: FnMut(&str, &mut Vec<String>),
    {
        let mut matched = 0;
        for row in self.rows.iter_mut().skip(1) {
            let Some(filename) = row.first().cloned() else {
                continue;
            };
            if selector.is_match(&filename) {
                f(&filename, row);
                matched += 1;
            }
        }
        matched
    }

    /// Serialize all rows; the tag column is guaranteed to exist afterwards
    pub fn to_csv_string(&mut self) -> Result<String> {
        self.ensure_tag_column();

        let line_end = if self.crlf { "\r\n" } else { "\n" };
        let mut out = String::new();
        for row in &self.rows {
            if row.is_empty() {
                out.push_str(line_end);
            } else {
                out.push_str(&encode_record(row, self.crlf)?);
            }
        }
        Ok(out)
    }

    /// Write the table to `path`, replacing any existing file atomically
    pub fn write_file(&mut self, path: &Path) -> Result<()> {
        let content = self.to_csv_string()?;
        atomic_write(path, &content)
            .with_context(|| format!("failed to write csv-file: {}", path.display()))
    }
}

/// Split CSV text into records at line ends outside quoted fields
///
/// The terminator (`\n` or `\r\n`) is not part of the returned slices.
fn split_records(content: &str) -> Vec<&str> {
    let mut records = Vec::new();
    let mut start = 0;
    let mut field_start = true;
    let mut in_quotes = false;
    let mut bytes = content.bytes().enumerate().peekable();
    while let Some((idx, byte)) = bytes.next() {
        if in_quotes {
            if byte == b'"' {
                if bytes.peek().map(|&(_, next)| next) == Some(b'"') {
                    bytes.next();
                } else {
                    in_quotes = false;
                }
            }
            continue;
        }
        match byte {
            b'"' if field_start => in_quotes = true,
            b'\n' => {
                records.push(&content[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
        field_start = matches!(byte, b',' | b'\n');
    }
    if start < content.len() {
        records.push(&content[start..]);
    }
    records
        .into_iter()
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

fn encode_record(row: &[String], crlf: bool) -> Result<String> {
    let terminator = if crlf {
        csv::Terminator::CRLF
    } else {
        csv::Terminator::Any(b'\n')
    };
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .terminator(terminator)
        .from_writer(Vec::new());
    writer.write_record(row)?;
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("failed to flush CSV output: {}", e))?;
    Ok(String::from_utf8(bytes)?)
}

/// Parse a single record; a blank line yields an empty row
fn parse_record(line: &str) -> Result<Vec<String>> {
    if line.is_empty() {
        return Ok(Vec::new());
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    let mut record = csv::StringRecord::new();
    reader.read_record(&mut record)?;
    Ok(record.iter().map(str::to_string).collect())
}

/// Split a tag cell on whitespace, edit the list, rejoin with single spaces
fn edit_tags<F>(row: &mut [String], idx: usize, edit: F)
where
    F: FnOnce(&mut Vec<String>),
{
    let Some(cell) = row.get_mut(idx) else {
        return;
    };
    let mut tags: Vec<String> = cell.split_whitespace().map(str::to_string).collect();
    edit(&mut tags);
    *cell = tags.join(" ");
}

/// Apply a whole plan; returns the number of expanded operations run
pub fn apply_plan(table: &mut TagTable, plan: &TagPlan) -> Result<usize> {
    let operations = plan.operations()?;
    for operation in &operations {
        let matched = table.apply(operation);
        log::debug!(
            "Selector {} matched {} row(s)",
            operation.selector.pattern(),
            matched
        );
    }
    Ok(operations.len())
}
