//! Centralized validation and quoting for every structural SQL fragment.
//!
//! # Security
//!
//! Table names, column names and type keywords cannot be bound as statement
//! parameters: a driver binds values, not identifiers or type syntax. Every
//! fragment that is interpolated into DDL or DML text therefore passes through
//! this module first:
//!
//! 1. Identifiers are checked for emptiness, null bytes and length, then
//!    bracket-quoted with `]` doubled.
//! 2. Type fragments are checked against an allow-list grammar
//!    (`base_name` or `base_name(n[,n])` / `base_name(max)`).
//! 3. String literals are single-quoted with `'` doubled.
//!
//! Catalog-sourced values pass these checks by construction. Values read back
//! from a snapshot file are untrusted and are rejected here if they do not.

use crate::error::{CopyError, Result};

/// Maximum identifier length accepted by SQL Server (`sysname`).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Maximum length of a type fragment such as `numeric(38,10)`.
const MAX_TYPE_FRAGMENT_LENGTH: usize = 64;

/// Validate an identifier for security issues.
///
/// Rejects empty identifiers, identifiers containing null bytes and
/// identifiers longer than [`MAX_IDENTIFIER_LENGTH`] characters.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CopyError::Config("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(CopyError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    let chars = name.chars().count();
    if chars > MAX_IDENTIFIER_LENGTH {
        return Err(CopyError::Config(format!(
            "SECURITY: Identifier exceeds maximum length of {} characters (got {}): {:?}",
            MAX_IDENTIFIER_LENGTH, chars, name
        )));
    }

    Ok(())
}

/// Quote a SQL Server identifier using brackets.
///
/// ```ignore
/// assert_eq!(quote_mssql("users")?, "[users]");
/// assert_eq!(quote_mssql("table]name")?, "[table]]name]");
/// ```
pub fn quote_mssql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("[{}]", name.replace(']', "]]")))
}

/// Qualify a SQL Server table name with schema.
pub fn qualify_mssql(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_mssql(schema)?, quote_mssql(table)?))
}

/// Type names containing spaces that SQL Server accepts in a column definition.
const MULTI_WORD_TYPES: &[&str] = &[
    "double precision",
    "char varying",
    "character varying",
    "national char",
    "national character",
    "national char varying",
    "national character varying",
    "national text",
];

/// Validate a column type fragment before it is interpolated into DDL.
///
/// Accepted grammar: a base name made of ASCII letters, digits and `_`, or one
/// of the multi-word ANSI synonyms SQL Server accepts (`double precision`),
/// optionally followed by a parenthesized, comma-separated list of unsigned
/// integers or the keyword `max`.
pub fn validate_type_fragment(fragment: &str) -> Result<()> {
    let reject = |reason: &str| {
        Err(CopyError::Config(format!(
            "SECURITY: Type fragment {:?} rejected: {}",
            fragment, reason
        )))
    };

    if fragment.is_empty() {
        return reject("empty");
    }
    if fragment.len() > MAX_TYPE_FRAGMENT_LENGTH {
        return reject("too long");
    }

    let (base, params) = match fragment.find('(') {
        Some(open) => {
            if !fragment.ends_with(')') {
                return reject("unterminated parameter list");
            }
            (&fragment[..open], Some(&fragment[open + 1..fragment.len() - 1]))
        }
        None => (fragment, None),
    };

    if base.is_empty() {
        return reject("malformed base type");
    }
    if base.contains(' ')
        && !MULTI_WORD_TYPES
            .iter()
            .any(|t| t.eq_ignore_ascii_case(base))
    {
        return reject("base type may not carry column modifiers");
    }
    if !base
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ')
    {
        return reject("base type contains disallowed characters");
    }
    if !base.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return reject("base type must start with a letter");
    }

    if let Some(params) = params {
        if params.is_empty() {
            return reject("empty parameter list");
        }
        for param in params.split(',') {
            let param = param.trim();
            let numeric = !param.is_empty() && param.chars().all(|c| c.is_ascii_digit());
            if !numeric && !param.eq_ignore_ascii_case("max") {
                return reject("parameters must be integers or max");
            }
        }
    }

    Ok(())
}

/// Render a single-quoted string literal with embedded quotes doubled.
///
/// `unicode` prefixes the literal with `N` for `nchar`/`nvarchar`/`ntext`
/// destinations.
pub fn quote_literal(value: &str, unicode: bool) -> String {
    let escaped = value.replace('\'', "''");
    if unicode {
        format!("N'{}'", escaped)
    } else {
        format!("'{}'", escaped)
    }
}
