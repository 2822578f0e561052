//! Error detection and classification utilities.
//!
//! Transports report "query matched nothing" in driver-specific ways. This
//! module recognizes those reports so single-row reads can return `None`
//! instead of failing.

use crate::error::DbError;

/// Check if an error represents a "no rows found" condition.
///
/// Only specific "no rows" patterns match, so legitimate failures such as
/// "table not found", "column not found" or "constraint not found" are never
/// swallowed.
///
/// # Arguments
///
/// * `error` - The error to check
///
/// # Returns
///
/// Returns `true` if the error indicates no rows were found, `false` otherwise.
pub(crate) fn is_no_rows_error(error: &DbError) -> bool {
    match error {
        DbError::NoRows => true,
        DbError::Transport(msg) => is_no_rows_message(msg),
        _ => false,
    }
}

fn is_no_rows_message(msg: &str) -> bool {
    let error_msg = msg.to_lowercase();
    error_msg.contains("no rows")
        || error_msg.contains("no row")
        || error_msg.contains("row not found")
        || error_msg.contains("expected one row")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_rows_patterns() {
        assert!(is_no_rows_error(&DbError::NoRows));
        assert!(is_no_rows_error(&DbError::Transport(
            "query returned no rows".to_string()
        )));
        assert!(is_no_rows_error(&DbError::Transport(
            "Row not found".to_string()
        )));
    }

    #[test]
    fn test_not_found_errors_are_not_no_rows() {
        assert!(!is_no_rows_error(&DbError::Transport(
            "table not found".to_string()
        )));
        assert!(!is_no_rows_error(&DbError::Transport(
            "column \"x\" not found".to_string()
        )));
        assert!(!is_no_rows_error(&DbError::Param("no rows".to_string())));
    }
}
