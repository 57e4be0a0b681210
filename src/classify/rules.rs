//! Bug categories and the ordered rules that assign them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag attached to LOGIC failures that look like assertion failures.
pub const ASSERT_TAG: &str = "assert";

/// Closed set of failure categories. Each one selects a fix strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BugCategory {
    Linting,
    Syntax,
    Indentation,
    Import,
    TypeError,
    /// Catch-all, including assertion failures. Never auto-fixed.
    Logic,
}

impl BugCategory {
    /// Every category, in declaration order.
    pub const ALL: [BugCategory; 6] = [
        BugCategory::Linting,
        BugCategory::Syntax,
        BugCategory::Indentation,
        BugCategory::Import,
        BugCategory::TypeError,
        BugCategory::Logic,
    ];

    /// Upper-case wire name, e.g. `TYPE_ERROR`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linting => "LINTING",
            Self::Syntax => "SYNTAX",
            Self::Indentation => "INDENTATION",
            Self::Import => "IMPORT",
            Self::TypeError => "TYPE_ERROR",
            Self::Logic => "LOGIC",
        }
    }

    /// Whether a deterministic fix strategy exists for this category.
    #[must_use]
    pub fn is_auto_fixable(&self) -> bool {
        !matches!(self, Self::Logic)
    }
}

impl fmt::Display for BugCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `(pattern, category)` pair. Patterns are matched case-insensitively
/// as substrings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRule {
    pattern: String,
    category: BugCategory,
}

impl ClassificationRule {
    #[must_use]
    pub fn new(pattern: impl Into<String>, category: BugCategory) -> Self {
        Self {
            pattern: pattern.into().to_lowercase(),
            category,
        }
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[must_use]
    pub fn category(&self) -> BugCategory {
        self.category
    }
}

/// Category chosen for a message and the rule that chose it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: BugCategory,
    pub matched_rule: Option<String>,
}

/// Ordered rule list; the first matching rule wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<ClassificationRule>,
}

impl RuleSet {
    #[must_use]
    pub fn new(rules: Vec<ClassificationRule>) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Classify a failure message.
    ///
    /// Falls back to [`BugCategory::Logic`], tagged with [`ASSERT_TAG`] when
    /// the message mentions an assertion.
    #[must_use]
    pub fn classify(&self, message: &str) -> Classification {
        let lowered = message.to_lowercase();

        if let Some(rule) = self.rules.iter().find(|r| lowered.contains(r.pattern())) {
            return Classification {
                category: rule.category(),
                matched_rule: Some(rule.pattern().to_string()),
            };
        }

        Classification {
            category: BugCategory::Logic,
            matched_rule: lowered.contains(ASSERT_TAG).then(|| ASSERT_TAG.to_string()),
        }
    }
}

impl Default for RuleSet {
    /// Rules for pytest / flake8 style output, most specific first.
    fn default() -> Self {
        Self::new(vec![
            ClassificationRule::new("unused import", BugCategory::Linting),
            ClassificationRule::new("missing colon", BugCategory::Syntax),
            ClassificationRule::new("IndentationError", BugCategory::Indentation),
            ClassificationRule::new("indentation error", BugCategory::Indentation),
            ClassificationRule::new("ModuleNotFoundError", BugCategory::Import),
            ClassificationRule::new("module not found", BugCategory::Import),
            ClassificationRule::new("no module named", BugCategory::Import),
            ClassificationRule::new("TypeError", BugCategory::TypeError),
            ClassificationRule::new("type error", BugCategory::TypeError),
        ])
    }
}
