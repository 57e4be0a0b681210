//! Failure classification.
//!
//! Turns raw test-runner output into deduplicated [`FailureRecord`]s, each
//! tagged with a [`BugCategory`].
//!
//! # Recognised output
//!
//! ```text
//! app.py:12: IndentationError: unexpected indent
//! E   IndentationError
//! ```
//!
//! The `E` line is an optional detail payload appended to the message of the
//! location line above it.
//!
//! # Example
//!
//! ```rust
//! use remedy::classify::{BugCategory, FailureClassifier};
//! use std::path::Path;
//!
//! let classifier = FailureClassifier::default();
//! let output = "utils.py:5: ModuleNotFoundError: No module named 'requests'";
//! let failures = classifier.parse(output, Path::new("/repo"));
//! assert_eq!(failures[0].category, BugCategory::Import);
//! ```

pub mod rules;

pub use rules::{BugCategory, Classification, ClassificationRule, RuleSet, ASSERT_TAG};

use crate::error::{RemedyError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

/// Error-detail payload lines, e.g. `E   assert 1 == 2`.
static DETAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^E\s+(.+)$").expect("detail pattern is valid"));

/// Directories holding installed dependencies rather than project code.
const DEPENDENCY_DIRS: &[&str] = &["site-packages", "dist-packages", "node_modules", "vendor"];

/// Hidden virtual-environment directories.
const VENV_DIRS: &[&str] = &[".venv", ".tox", ".nox"];

/// One parsed test failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Repo-relative path with `/` separators; empty when unattributable.
    pub file: String,
    /// 1-based line number, 0 when unknown.
    pub line: u32,
    pub message: String,
    pub category: BugCategory,
    /// Rule pattern (or [`ASSERT_TAG`]) that selected the category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<String>,
}

impl FailureRecord {
    /// Whether the failure points at a concrete file.
    #[must_use]
    pub fn is_attributed(&self) -> bool {
        !self.file.is_empty()
    }

    fn key(&self) -> (String, u32, BugCategory) {
        (self.file.clone(), self.line, self.category)
    }
}

/// Parses runner output into failure records using an explicit [`RuleSet`].
#[derive(Debug, Clone)]
pub struct FailureClassifier {
    rules: RuleSet,
    location_re: Regex,
    /// Additional absolute roots the repository is visible under, such as the
    /// sandbox mount point.
    alias_roots: Vec<PathBuf>,
}

impl FailureClassifier {
    /// Build a classifier recognising `file.<ext>:line: message` lines for the
    /// given extensions.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `extensions` is empty.
    pub fn new(rules: RuleSet, extensions: &[String]) -> Result<Self> {
        if extensions.is_empty() {
            return Err(RemedyError::invalid_config(
                "classifier.file_extensions",
                "at least one extension is required",
            ));
        }
        let alternation = extensions
            .iter()
            .map(|ext| regex::escape(ext.trim_start_matches('.')))
            .collect::<Vec<_>>()
            .join("|");
        let pattern =
            format!(r"^(?P<file>[^\s:][^:]*\.(?:{alternation})):(?P<line>\d+):\s*(?P<message>.+)$");
        let location_re = Regex::new(&pattern)
            .map_err(|e| RemedyError::config(format!("invalid location pattern: {e}")))?;

        Ok(Self {
            rules,
            location_re,
            alias_roots: Vec::new(),
        })
    }

    /// Also accept absolute paths under `root` as repository paths.
    #[must_use]
    pub fn with_alias_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.alias_roots.push(root.into());
        self
    }

    #[must_use]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Parse raw output into an ordered, deduplicated failure list.
    ///
    /// Paths outside `repo_root`, in dependency directories or in virtual
    /// environments are dropped. When nothing structured is found, at most
    /// one unattributed record is produced from the first line that looks
    /// like an error.
    #[must_use]
    pub fn parse(&self, output: &str, repo_root: &Path) -> Vec<FailureRecord> {
        let lines: Vec<&str> = output.lines().collect();
        let mut failures = Vec::new();

        for (idx, raw_line) in lines.iter().enumerate() {
            let Some(caps) = self.location_re.captures(raw_line.trim()) else {
                continue;
            };
            let Ok(line) = caps["line"].parse::<u32>() else {
                continue;
            };

            let mut message = caps["message"].trim().to_string();
            if let Some(detail) = lines
                .get(idx + 1)
                .and_then(|next| DETAIL_RE.captures(next.trim()))
            {
                message = format!("{message} | {}", detail[1].trim());
            }

            let Some(file) = self.normalize_path(&caps["file"], repo_root) else {
                debug!("Ignoring failure outside the repository: {}", &caps["file"]);
                continue;
            };

            let classification = self.rules.classify(&message);
            failures.push(FailureRecord {
                file,
                line,
                message,
                category: classification.category,
                matched_rule: classification.matched_rule,
            });
        }

        if !failures.is_empty() {
            return dedupe(failures);
        }

        self.best_effort(&lines).into_iter().collect()
    }

    fn best_effort(&self, lines: &[&str]) -> Option<FailureRecord> {
        let line = lines.iter().map(|l| l.trim()).find(|l| {
            l.contains("Error") || l.contains("FAILED") || l.to_lowercase().contains("assert")
        })?;

        let classification = self.rules.classify(line);
        Some(FailureRecord {
            file: String::new(),
            line: 0,
            message: line.to_string(),
            category: classification.category,
            matched_rule: classification.matched_rule,
        })
    }

    fn normalize_path(&self, raw: &str, repo_root: &Path) -> Option<String> {
        let path = Path::new(raw);
        let relative = if path.is_absolute() {
            std::iter::once(repo_root)
                .chain(self.alias_roots.iter().map(PathBuf::as_path))
                .find_map(|root| path.strip_prefix(root).ok())?
        } else {
            path
        };

        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::CurDir => {}
                Component::Normal(name) => {
                    let name = name.to_str()?;
                    if DEPENDENCY_DIRS.contains(&name) || VENV_DIRS.contains(&name) {
                        return None;
                    }
                    parts.push(name);
                }
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }
}

impl Default for FailureClassifier {
    fn default() -> Self {
        Self::new(RuleSet::default(), &["py".to_string()])
            .expect("default extension list is non-empty")
    }
}

/// Keep the first record for each `(file, line, category)`.
fn dedupe(failures: Vec<FailureRecord>) -> Vec<FailureRecord> {
    let mut seen = HashSet::new();
    failures
        .into_iter()
        .filter(|failure| seen.insert(failure.key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> PathBuf {
        PathBuf::from("/tmp/ws/repo")
    }

    fn parse(output: &str) -> Vec<FailureRecord> {
        FailureClassifier::default().parse(output, &root())
    }

    #[test]
    fn test_indentation_with_detail_line() {
        let output = "app.py:12: IndentationError: unexpected indent\nE   IndentationError\n";
        let failures = parse(output);

        assert_eq!(failures.len(), 1);
        let f = &failures[0];
        assert_eq!(f.file, "app.py");
        assert_eq!(f.line, 12);
        assert_eq!(f.category, BugCategory::Indentation);
        assert_eq!(f.message, "IndentationError: unexpected indent | IndentationError");
    }

    #[test]
    fn test_module_not_found_is_import() {
        let failures = parse("utils.py:5: ModuleNotFoundError: No module named 'requests'");
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].file, "utils.py");
        assert_eq!(failures[0].line, 5);
        assert_eq!(failures[0].category, BugCategory::Import);
    }

    #[test]
    fn test_detail_only_attaches_from_next_line() {
        let output = "\
src/calc.py:3: in add
    return a + b
E   TypeError: unsupported operand type(s) for +: 'int' and 'str'";
        let failures = parse(output);
        assert_eq!(failures.len(), 1);
        // Detail is two lines below, so the message is only "in add".
        assert_eq!(failures[0].message, "in add");
        assert_eq!(failures[0].category, BugCategory::Logic);
    }

    #[test]
    fn test_assertion_detail_tags_logic() {
        let output = "tests/test_math.py:8: AssertionError\nE   assert 3 == 4";
        let failures = parse(output);
        assert_eq!(failures[0].category, BugCategory::Logic);
        assert_eq!(failures[0].matched_rule.as_deref(), Some(ASSERT_TAG));
    }

    #[test]
    fn test_rejects_paths_outside_repository() {
        let output = "\
/usr/lib/python3.11/site-packages/_pytest/python.py:617: in _importtestmodule
/other/place/mod.py:1: TypeError: boom
../escape.py:4: TypeError: boom
.venv/lib/python3.11/thing.py:9: TypeError: boom
lib/site-packages/pkg/mod.py:2: TypeError: boom
app.py:7: TypeError: real";
        let failures = parse(output);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].file, "app.py");
        assert_eq!(failures[0].line, 7);
    }

    #[test]
    fn test_absolute_path_inside_repository_is_relativised() {
        let output = "/tmp/ws/repo/pkg/mod.py:3: TypeError: boom";
        let failures = parse(output);
        assert_eq!(failures[0].file, "pkg/mod.py");
    }

    #[test]
    fn test_alias_root_is_relativised() {
        let classifier = FailureClassifier::default().with_alias_root("/workspace");
        let failures = classifier.parse("/workspace/pkg/mod.py:3: TypeError: boom", &root());
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].file, "pkg/mod.py");
    }

    #[test]
    fn test_leading_dot_slash_is_stripped() {
        let failures = parse("./app.py:2: unused import os");
        assert_eq!(failures[0].file, "app.py");
        assert_eq!(failures[0].category, BugCategory::Linting);
    }

    #[test]
    fn test_dedupes_by_file_line_category_keeping_first() {
        let output = "\
a.py:1: TypeError: first
b.py:2: TypeError: other
a.py:1: TypeError: second
a.py:1: IndentationError: different category";
        let failures = parse(output);
        assert_eq!(failures.len(), 3);
        assert_eq!(failures[0].message, "TypeError: first");
        assert_eq!(failures[1].file, "b.py");
        assert_eq!(failures[2].category, BugCategory::Indentation);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let output = "a.py:1: TypeError: x\nE   detail\nb.py:9: missing colon\na.py:1: TypeError: y";
        let classifier = FailureClassifier::default();
        assert_eq!(classifier.parse(output, &root()), classifier.parse(output, &root()));
    }

    #[test]
    fn test_fallback_emits_single_untethered_record() {
        let output = "collecting ...\nERROR: could not import conftest\nFAILED tests/test_x.py::test_a\n";
        let failures = parse(output);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].file, "");
        assert_eq!(failures[0].line, 0);
        assert!(!failures[0].is_attributed());
        assert_eq!(failures[0].message, "FAILED tests/test_x.py::test_a");
    }

    #[test]
    fn test_fallback_not_used_when_structured_match_exists() {
        let output = "FAILED tests/test_x.py::test_a\napp.py:3: missing colon";
        let failures = parse(output);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].category, BugCategory::Syntax);
    }

    #[test]
    fn test_no_error_keywords_yields_nothing() {
        assert!(parse("Sandbox runtime unavailable: docker not found on PATH").is_empty());
        assert!(parse("").is_empty());
    }

    #[test]
    fn test_other_extensions_ignored_by_default() {
        let failures = parse("main.go:3: TypeError: nope");
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].file, "", "only the fallback should fire");
    }

    #[test]
    fn test_configured_extensions() {
        let classifier =
            FailureClassifier::new(RuleSet::default(), &[".py".to_string(), "pyi".to_string()])
                .unwrap();
        let failures = classifier.parse("stubs/api.pyi:4: TypeError: bad stub", &root());
        assert_eq!(failures[0].file, "stubs/api.pyi");
    }

    #[test]
    fn test_empty_extension_list_rejected() {
        assert!(FailureClassifier::new(RuleSet::default(), &[]).is_err());
    }
}
