//! SQL identifier checks for set, table and column names.

use crate::error::MappingError;
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Returns whether `name` can be interpolated into SQL as an identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name)
}

pub(crate) fn ensure_identifier(name: &str) -> Result<(), MappingError> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(MappingError::InvalidIdentifier(name.to_string()))
    }
}
