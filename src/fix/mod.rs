//! Deterministic, category-specific fixes.
//!
//! Each [`BugCategory`] maps to one narrow source edit. LOGIC failures are
//! never touched.
//!
//! | Category      | Edit                                                   |
//! |---------------|--------------------------------------------------------|
//! | `LINTING`     | delete the reported line                               |
//! | `SYNTAX`      | ensure the reported line ends with `:`                 |
//! | `INDENTATION` | expand tabs in leading whitespace across the file      |
//! | `IMPORT`      | insert `import <module>` at line 1                     |
//! | `TYPE_ERROR`  | wrap the right operand of the nearest `return a + b`   |
//! | `LOGIC`       | none                                                   |

pub mod edit;

use crate::classify::{BugCategory, FailureRecord};
use crate::error::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Module name in `No module named 'pkg.sub'` style messages.
static MISSING_MODULE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"No module named ['"]([A-Za-z0-9_.]+)['"]"#).expect("module pattern is valid")
});

/// Result of a fix attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixStatus {
    Fixed,
    Failed,
}

impl fmt::Display for FixStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => f.write_str("Fixed"),
            Self::Failed => f.write_str("Failed"),
        }
    }
}

/// Outcome of one fix attempt for one failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixOutcome {
    pub file: String,
    #[serde(rename = "bug_type")]
    pub category: BugCategory,
    #[serde(rename = "line_number")]
    pub line: u32,
    pub commit_message: String,
    pub status: FixStatus,
}

impl FixOutcome {
    fn new(failure: &FailureRecord, status: FixStatus) -> Self {
        Self {
            file: failure.file.clone(),
            category: failure.category,
            line: failure.line,
            commit_message: commit_message(failure.category, &failure.file, failure.line),
            status,
        }
    }

    #[must_use]
    pub fn is_fixed(&self) -> bool {
        self.status == FixStatus::Fixed
    }

    /// The same outcome marked as failed.
    #[must_use]
    pub fn demoted(self) -> Self {
        Self {
            status: FixStatus::Failed,
            ..self
        }
    }
}

/// `Fix {CATEGORY} in {file}:{line}`.
#[must_use]
pub fn commit_message(category: BugCategory, file: &str, line: u32) -> String {
    format!("Fix {category} in {file}:{line}")
}

/// Applies the fix strategy for a failure's category.
#[derive(Debug, Clone)]
pub struct CategoryFixer {
    indent_width: usize,
}

impl Default for CategoryFixer {
    fn default() -> Self {
        Self { indent_width: 4 }
    }
}

impl CategoryFixer {
    #[must_use]
    pub fn new(indent_width: usize) -> Self {
        Self { indent_width }
    }

    /// Attempt a fix inside `repo_path`. Never creates files; any I/O problem
    /// yields a failed outcome.
    pub fn apply_fix(&self, repo_path: &Path, failure: &FailureRecord) -> FixOutcome {
        if !failure.category.is_auto_fixable() {
            debug!("Skipping {} failure in {}", failure.category, failure.file);
            return FixOutcome::new(failure, FixStatus::Failed);
        }
        if !failure.is_attributed() {
            return FixOutcome::new(failure, FixStatus::Failed);
        }

        let target = repo_path.join(&failure.file);
        match std::fs::metadata(&target) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => {}
            _ => {
                debug!("Fix target missing or empty: {}", target.display());
                return FixOutcome::new(failure, FixStatus::Failed);
            }
        }

        let status = match self.dispatch(&target, failure) {
            Ok(true) => FixStatus::Fixed,
            Ok(false) => FixStatus::Failed,
            Err(e) => {
                warn!("Fix for {}:{} failed: {}", failure.file, failure.line, e);
                FixStatus::Failed
            }
        };
        FixOutcome::new(failure, status)
    }

    fn dispatch(&self, target: &Path, failure: &FailureRecord) -> Result<bool> {
        match failure.category {
            BugCategory::Linting => edit::remove_line(target, failure.line),
            BugCategory::Syntax => edit::update_line(target, failure.line, ensure_colon),
            BugCategory::Indentation => edit::normalize_indentation(target, self.indent_width),
            BugCategory::Import => add_missing_import(target, &failure.message),
            BugCategory::TypeError => coerce_addition_operand(target, failure.line),
            BugCategory::Logic => Ok(false),
        }
    }
}

fn ensure_colon(body: &str) -> String {
    let trimmed = body.trim_end();
    if trimmed.ends_with(':') {
        body.to_string()
    } else {
        format!("{trimmed}:")
    }
}

/// Top-level package named in a missing-module message.
#[must_use]
pub fn missing_module(message: &str) -> Option<&str> {
    let caps = MISSING_MODULE_RE.captures(message)?;
    let full = caps.get(1)?.as_str();
    full.split('.').next().filter(|m| !m.is_empty())
}

fn add_missing_import(target: &Path, message: &str) -> Result<bool> {
    let Some(module) = missing_module(message) else {
        return Ok(false);
    };
    edit::insert_line(target, 1, &format!("import {module}"))
}

/// The reported line is usually the function signature, so scan downward for
/// the nearest `return ... + ...` and wrap its right operand in `int(...)`.
/// An already-wrapped operand means the fix cannot help again.
fn coerce_addition_operand(target: &Path, line: u32) -> Result<bool> {
    let mut lines = edit::read_lines(target)?;
    let start = usize::try_from(line).unwrap_or(0).saturating_sub(1);

    let candidate = lines
        .iter()
        .enumerate()
        .skip(start)
        .find_map(|(index, line)| {
            let (body, terminator) = edit::split_terminator(line);
            if !body.contains("return") {
                return None;
            }
            let (left, right) = body.split_once('+')?;
            Some((index, left.trim_end(), right.trim(), terminator))
        });

    let Some((index, left, right, terminator)) = candidate else {
        return Ok(false);
    };
    if right.is_empty() || (right.starts_with("int(") && right.ends_with(')')) {
        debug!("Addition at line {} needs no coercion", index + 1);
        return Ok(false);
    }

    let rewritten = format!("{left} + int({right}){terminator}");
    lines[index] = rewritten;
    edit::write_lines(target, &lines)?;
    Ok(true)
}
