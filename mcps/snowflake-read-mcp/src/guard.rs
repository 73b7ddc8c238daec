//! Read-only policy guard
//!
//! Decides whether a SQL statement or a table identifier may be sent to the
//! warehouse. This is a keyword denylist, not a SQL parser: comments, keyword
//! obfuscation and stacked statements can slip through. Treat it as a
//! best-effort filter in front of a read-only Snowflake role, never as a
//! replacement for one.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Keywords that make a statement mutating, DDL, or transactional.
pub const FORBIDDEN_SQL_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "TRUNCATE", "ALTER", "CREATE", "GRANT", "REVOKE",
    "COMMIT", "ROLLBACK",
];

/// Keywords that may not appear inside a table identifier.
pub const FORBIDDEN_IDENTIFIER_KEYWORDS: &[&str] =
    &["SELECT", "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER"];

static SQL_KEYWORD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&keyword_pattern(FORBIDDEN_SQL_KEYWORDS)).expect("Invalid SQL keyword regex")
});

static IDENTIFIER_KEYWORD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&keyword_pattern(FORBIDDEN_IDENTIFIER_KEYWORDS))
        .expect("Invalid identifier keyword regex")
});

static IDENTIFIER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.]+$").expect("Invalid identifier regex"));

fn keyword_pattern(keywords: &[&str]) -> String {
    format!(r"(?i)\b(?:{})\b", keywords.join("|"))
}

/// Why the guard refused an input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyRejection {
    /// Empty or whitespace-only SQL
    #[error("query is empty")]
    EmptyQuery,

    /// SQL contains a mutating or DDL keyword
    #[error("query contains forbidden keyword {keyword} and is not read-only")]
    ForbiddenKeyword { keyword: String },

    /// Empty table identifier
    #[error("table name is empty")]
    EmptyIdentifier,

    /// Identifier uses characters outside `[A-Za-z0-9_.]`
    #[error("invalid table name '{name}': only letters, digits, '_' and '.' are allowed")]
    InvalidCharacters { name: String },

    /// Identifier contains a SQL keyword
    #[error("invalid table name '{name}': contains keyword {keyword}")]
    KeywordInIdentifier { name: String, keyword: String },
}

/// Check that `sql` contains none of [`FORBIDDEN_SQL_KEYWORDS`] as a whole word.
pub fn check_read_only(sql: &str) -> Result<(), PolicyRejection> {
    if sql.trim().is_empty() {
        return Err(PolicyRejection::EmptyQuery);
    }

    match SQL_KEYWORD_REGEX.find(sql) {
        Some(m) => Err(PolicyRejection::ForbiddenKeyword {
            keyword: m.as_str().to_uppercase(),
        }),
        None => Ok(()),
    }
}

/// Check that `name` is a plain, optionally dotted (`db.schema.table`) identifier.
pub fn check_identifier(name: &str) -> Result<(), PolicyRejection> {
    if name.is_empty() {
        return Err(PolicyRejection::EmptyIdentifier);
    }

    if !IDENTIFIER_REGEX.is_match(name) {
        return Err(PolicyRejection::InvalidCharacters {
            name: name.to_string(),
        });
    }

    // '_' is a word character, so `my_select_log` passes while `db.drop.t` does not.
    if let Some(m) = IDENTIFIER_KEYWORD_REGEX.find(name) {
        return Err(PolicyRejection::KeywordInIdentifier {
            name: name.to_string(),
            keyword: m.as_str().to_uppercase(),
        });
    }

    Ok(())
}

/// Returns true when `sql` passes [`check_read_only`].
pub fn is_read_only(sql: &str) -> bool {
    check_read_only(sql).is_ok()
}

/// Returns true when `name` passes [`check_identifier`].
pub fn is_valid_identifier(name: &str) -> bool {
    check_identifier(name).is_ok()
}
