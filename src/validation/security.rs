//! Heuristic scanner for injection markers in free-form text.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Special-character share above which text is flagged.
const SPECIAL_CHAR_DENSITY_THRESHOLD: f64 = 0.3;
/// Inputs shorter than this are not checked for density.
const MIN_DENSITY_SAMPLE: usize = 20;

/// Category of a flagged pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityIssueKind {
    /// Script tags, `javascript:` URLs, inline event handlers.
    ScriptInjection,
    /// SQL keywords in injection shapes or SQL comment markers.
    SqlInjection,
    /// Unusually high proportion of special characters.
    SpecialCharacterDensity,
}

impl std::fmt::Display for SecurityIssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityIssueKind::ScriptInjection => write!(f, "script_injection"),
            SecurityIssueKind::SqlInjection => write!(f, "sql_injection"),
            SecurityIssueKind::SpecialCharacterDensity => write!(f, "special_character_density"),
        }
    }
}

/// A single finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityIssue {
    /// Finding category.
    pub kind: SecurityIssueKind,
    /// What matched.
    pub detail: String,
}

/// Result of scanning one input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityReport {
    /// All findings, in detection order.
    pub issues: Vec<SecurityIssue>,
}

impl SecurityReport {
    /// Whether nothing was flagged.
    pub fn is_safe(&self) -> bool {
        self.issues.is_empty()
    }

    /// Comma-separated finding kinds, for log fields.
    pub fn summary(&self) -> String {
        self.issues
            .iter()
            .map(|i| i.kind.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

static SCRIPT_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)<\s*script\b", "script tag"),
        (r"(?i)javascript\s*:", "javascript: url"),
        (r"(?i)\bon(?:load|error|click|mouseover|focus)\s*=", "inline event handler"),
        (r"(?i)<\s*iframe\b", "iframe tag"),
        (r"(?i)\beval\s*\(", "eval call"),
    ]
    .into_iter()
    .map(|(p, d)| (Regex::new(p).expect("valid regex"), d))
    .collect()
});

static SQL_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)\bunion\s+(?:all\s+)?select\b", "union select"),
        (r"(?i)\bdrop\s+(?:table|database)\b", "drop statement"),
        (r"(?i)\binsert\s+into\b", "insert statement"),
        (r"(?i)\bdelete\s+from\b", "delete statement"),
        (r"(?i)\bupdate\s+\w+\s+set\b", "update statement"),
        (r#"(?i)['"]\s*or\s+['"]?\d+['"]?\s*=\s*['"]?\d+"#, "tautology"),
        (r";\s*--", "statement terminator comment"),
        (r"/\*.*?\*/", "block comment"),
    ]
    .into_iter()
    .map(|(p, d)| (Regex::new(p).expect("valid regex"), d))
    .collect()
});

/// Scan text for script-injection markers, SQL-injection shapes and
/// excessive special-character density.
pub fn scan_for_security_issues(input: &str) -> SecurityReport {
    let mut report = SecurityReport::default();

    for (re, detail) in SCRIPT_PATTERNS.iter() {
        if re.is_match(input) {
            report.issues.push(SecurityIssue {
                kind: SecurityIssueKind::ScriptInjection,
                detail: detail.to_string(),
            });
        }
    }

    for (re, detail) in SQL_PATTERNS.iter() {
        if re.is_match(input) {
            report.issues.push(SecurityIssue {
                kind: SecurityIssueKind::SqlInjection,
                detail: detail.to_string(),
            });
        }
    }

    let visible: Vec<char> = input.chars().filter(|c| !c.is_whitespace()).collect();
    if visible.len() >= MIN_DENSITY_SAMPLE {
        let special = visible
            .iter()
            .filter(|c| !c.is_alphanumeric() && !matches!(c, '.' | ',' | '?' | '!' | '\'' | '-'))
            .count();
        let density = special as f64 / visible.len() as f64;
        if density > SPECIAL_CHAR_DENSITY_THRESHOLD {
            report.issues.push(SecurityIssue {
                kind: SecurityIssueKind::SpecialCharacterDensity,
                detail: format!("{:.0}% special characters", density * 100.0),
            });
        }
    }

    report
}
