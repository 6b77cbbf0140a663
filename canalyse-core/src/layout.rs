//! Mapping from exported source filenames to report locations

use std::path::{Path, PathBuf};

/// Where the page of one source file lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    /// Directory of the page, below the report directory
    pub dir: PathBuf,
    /// `<source base name>.html`
    pub file_name: String,
}

impl PageLocation {
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    /// Directory as written into data files, `/`-separated
    pub fn dir_string(&self) -> String {
        self.dir.to_string_lossy().replace('\\', "/")
    }
}

/// Path rules shared by pages and data files
#[derive(Debug, Clone)]
pub struct Layout {
    src_path: String,
    module_base: String,
    report_dir: PathBuf,
}

impl Layout {
    pub fn new(src_path: &str, module_base: &str, report_dir: &Path) -> Self {
        Layout {
            src_path: src_path.to_string(),
            module_base: module_base.to_string(),
            report_dir: report_dir.to_path_buf(),
        }
    }

    /// Page location for an exported filename
    ///
    /// `src_path` is removed from the filename, `module_base` from its
    /// directory, and the remainder is placed below the report directory.
    pub fn locate(&self, filename: &str) -> PageLocation {
        let code_path = strip_all(filename, &self.src_path);
        let code_dir = match code_path.rfind(['/', '\\']) {
            Some(idx) => &code_path[..idx],
            None => "",
        };
        let sub_dir = strip_all(code_dir, &self.module_base);

        let dir = sub_dir
            .split(['/', '\\'])
            .filter(|part| !part.is_empty() && *part != ".")
            .fold(self.report_dir.clone(), |dir, part| dir.join(part));

        PageLocation {
            dir,
            file_name: format!("{}.html", base_name(filename)),
        }
    }

    /// Filename as shown in the combined data file: `src_path/module_base` removed
    pub fn display_name(&self, filename: &str) -> String {
        let prefix = format!("{}/{}", self.src_path, self.module_base);
        strip_all(filename, &prefix)
    }
}

/// Remove every occurrence of `needle`
fn strip_all(haystack: &str, needle: &str) -> String {
    if needle.is_empty() {
        haystack.to_string()
    } else {
        haystack.replace(needle, "")
    }
}

fn base_name(filename: &str) -> &str {
    filename.rsplit(['/', '\\']).next().unwrap_or(filename)
}
