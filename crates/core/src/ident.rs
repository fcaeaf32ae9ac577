//! Identifier and literal quoting for PostgreSQL statements.
//!
//! DDL cannot bind identifiers as parameters, so table and schema names are
//! validated and quoted here before being spliced into statement text. Values
//! travel as bound parameters wherever the statement allows it.

use crate::error::{HistoryError, HistoryResult};

/// PostgreSQL truncates identifiers longer than `NAMEDATALEN - 1` bytes.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Check that `name` can be used as an identifier without truncation.
pub fn validate_ident(name: &str) -> HistoryResult<()> {
    if name.is_empty() {
        return Err(HistoryError::invalid_identifier(name, "identifier is empty"));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(HistoryError::invalid_identifier(
            name,
            "identifier exceeds 63 bytes",
        ));
    }
    if name.contains('\0') {
        return Err(HistoryError::invalid_identifier(
            name,
            "identifier contains a NUL byte",
        ));
    }
    Ok(())
}

/// Quote `name` as a PostgreSQL identifier.
pub fn quote_ident(name: &str) -> HistoryResult<String> {
    validate_ident(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote `value` as a PostgreSQL string literal.
///
/// Backslashes switch to the escape-string form so the result is correct
/// regardless of `standard_conforming_strings`.
pub fn quote_literal(value: &str) -> HistoryResult<String> {
    if value.contains('\0') {
        return Err(HistoryError::invalid_identifier(
            value,
            "literal contains a NUL byte",
        ));
    }
    let escaped = value.replace('\'', "''");
    if escaped.contains('\\') {
        Ok(format!("E'{}'", escaped.replace('\\', "\\\\")))
    } else {
        Ok(format!("'{escaped}'"))
    }
}

/// Quote a schema-qualified relation name.
pub fn qualified_name(schema: &str, name: &str) -> HistoryResult<String> {
    Ok(format!("{}.{}", quote_ident(schema)?, quote_ident(name)?))
}
