//! Table and column identifier handling.
//!
//! Identifiers reach SQL Server only as bound parameters of the extended
//! property procedures, but they still have to be valid `sysname` values:
//! `sp_addextendedproperty` fails late and with an unhelpful message when a
//! name is empty or too long, so names are checked up front.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, SyncError};

/// Maximum identifier length for SQL Server (`sysname` is `nvarchar(128)`).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Matches `[schema].[table]` and `[table]`, capturing the table part.
static BRACKETED_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\[\w+\]\.)?\[(?<table>.*)\]").expect("bracketed table pattern is valid")
});

/// Validate an identifier before it is used as a level name.
///
/// Rejects:
/// - Empty identifiers
/// - Identifiers containing null bytes
/// - Identifiers exceeding 128 characters
///
/// # Errors
///
/// Returns `SyncError::Config` for invalid identifiers with a descriptive message.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SyncError::Config("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(SyncError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    let length = name.chars().count();
    if length > MAX_IDENTIFIER_LENGTH {
        return Err(SyncError::Config(format!(
            "Identifier exceeds maximum length of {} characters (got {}): {:?}",
            MAX_IDENTIFIER_LENGTH, length, name
        )));
    }

    Ok(())
}

/// Quote a SQL Server identifier using brackets.
///
/// Escapes closing brackets by doubling them and wraps in brackets.
pub fn quote_mssql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("[{}]", name.replace(']', "]]")))
}

/// Qualify a SQL Server table name with schema, for display in logs and reports.
pub fn qualify_mssql(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_mssql(schema)?, quote_mssql(table)?))
}

/// Reduce a table-name override to the bare table identifier.
///
/// `"[dbo].[Orders]"` and `"[Orders]"` become `"Orders"`; anything without
/// brackets is returned verbatim.
pub fn unwrap_table_name(name: &str) -> &str {
    BRACKETED_TABLE
        .captures(name)
        .and_then(|caps| caps.name("table"))
        .map(|m| m.as_str())
        .unwrap_or(name)
}
