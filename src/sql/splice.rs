//! Splicing an extra condition into a trailing SQL clause
//!
//! The engine never parses full SQL. It only needs to AND one more predicate
//! into the WHERE part of a caller-supplied trailing clause such as
//! `WHERE a = ? OR b = ? ORDER BY id`. [`LexicalSplicer`] does that with a
//! top-level scan that respects quotes and parentheses.

use crate::error::SpliceError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Combines an extra condition with the WHERE part of a trailing clause
pub trait ClauseSplicer: Send + Sync {
    /// Return `post_sql` rewritten so its WHERE part is ANDed with `condition`
    ///
    /// # Arguments
    ///
    /// * `post_sql` - A trailing clause: `WHERE ..`, a bare predicate, or a
    ///   clause starting with `GROUP BY` / `ORDER BY` / `LIMIT` etc.
    /// * `condition` - The predicate to add
    ///
    /// # Errors
    ///
    /// Returns `SpliceError` if the clause cannot be split safely.
    fn splice_and(&self, post_sql: &str, condition: &str) -> Result<String, SpliceError>;
}

/// Keyword-and-bracket based splicer
///
/// # Example
///
/// ```rust
/// use relmap::{ClauseSplicer, LexicalSplicer};
///
/// let sql = LexicalSplicer
///     .splice_and("WHERE a = ? OR b = ? ORDER BY id", "`deleted` = '0'")
///     .unwrap();
/// assert_eq!(sql, "WHERE (a = ? OR b = ?) AND `deleted` = '0' ORDER BY id");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalSplicer;

static WHERE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*where\b").expect("valid regex literal"));

static TAIL_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(group\s+by|order\s+by|having|limit|union|window|for\s+update|lock\s+in)\b")
        .expect("valid regex literal")
});

/// Whether `sql` opens with the WHERE keyword
pub(crate) fn starts_with_where(sql: &str) -> bool {
    WHERE_PREFIX.is_match(sql)
}

/// Byte offset of the first top-level tail keyword, or `sql.len()`
fn tail_start(sql: &str) -> Result<usize, SpliceError> {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;

    for (idx, ch) in sql.char_indices() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            prev = Some(ch);
            continue;
        }
        match ch {
            '\'' | '"' | '`' => quote = Some(ch),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(unbalanced(sql));
                }
            }
            _ => {
                let at_boundary = prev.map_or(true, |p| !(p.is_alphanumeric() || p == '_'));
                if depth == 0 && at_boundary && TAIL_KEYWORD.is_match(&sql[idx..]) {
                    return Ok(idx);
                }
            }
        }
        prev = Some(ch);
    }

    if depth != 0 || quote.is_some() {
        return Err(unbalanced(sql));
    }
    Ok(sql.len())
}

/// `sql` split at its first top-level tail keyword into trimmed predicate
/// and tail, `None` when quotes or brackets do not balance
pub(crate) fn split_tail(sql: &str) -> Option<(&str, &str)> {
    let split = tail_start(sql).ok()?;
    Some((sql[..split].trim(), sql[split..].trim()))
}

/// `sql` with the contents of string literals blanked, so identifier scans
/// only see SQL text. Quoted identifiers are kept.
pub(crate) fn mask_literals(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for ch in sql.chars() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                    out.push(' ');
                } else if ch == '\\' {
                    escaped = true;
                    out.push(' ');
                } else if ch == q {
                    quote = None;
                    out.push(ch);
                } else {
                    out.push(' ');
                }
            }
            None => {
                if ch == '\'' || ch == '"' {
                    quote = Some(ch);
                }
                out.push(ch);
            }
        }
    }
    out
}

fn unbalanced(sql: &str) -> SpliceError {
    SpliceError::Unbalanced {
        fragment: sql.to_string(),
    }
}

impl ClauseSplicer for LexicalSplicer {
    fn splice_and(&self, post_sql: &str, condition: &str) -> Result<String, SpliceError> {
        let trimmed = post_sql.trim();
        if trimmed.is_empty() {
            return Ok(format!("WHERE {condition}"));
        }

        let body = match WHERE_PREFIX.find(trimmed) {
            Some(m) => &trimmed[m.end()..],
            None => trimmed,
        };
        let split = tail_start(body)?;
        let predicate = body[..split].trim();
        let tail = body[split..].trim();

        if predicate.is_empty() {
            if starts_with_where(trimmed) {
                return Err(SpliceError::EmptyCondition {
                    fragment: post_sql.to_string(),
                });
            }
            return Ok(format!("WHERE {condition} {tail}"));
        }

        let mut out = format!("WHERE ({predicate}) AND {condition}");
        if !tail.is_empty() {
            out.push(' ');
            out.push_str(tail);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_with_tail() {
        let out = LexicalSplicer
            .splice_and("where a = 1 group by b order by c limit 5", "d = 2")
            .unwrap();
        assert_eq!(out, "WHERE (a = 1) AND d = 2 group by b order by c limit 5");
    }

    #[test]
    fn test_keywords_inside_parens_and_quotes_are_ignored() {
        let out = LexicalSplicer
            .splice_and(
                "WHERE id IN (SELECT id FROM x ORDER BY id LIMIT 1) AND note = 'order by'",
                "`deleted` = 0",
            )
            .unwrap();
        assert_eq!(
            out,
            "WHERE (id IN (SELECT id FROM x ORDER BY id LIMIT 1) AND note = 'order by') AND `deleted` = 0"
        );
    }

    #[test]
    fn test_identifier_containing_keyword_is_not_a_tail() {
        let out = LexicalSplicer.splice_and("WHERE my_limit = 3", "x = 1").unwrap();
        assert_eq!(out, "WHERE (my_limit = 3) AND x = 1");
    }

    #[test]
    fn test_bare_predicate_and_tail_only() {
        assert_eq!(
            LexicalSplicer.splice_and("status = 2", "x = 1").unwrap(),
            "WHERE (status = 2) AND x = 1"
        );
        assert_eq!(
            LexicalSplicer.splice_and("ORDER BY id DESC", "x = 1").unwrap(),
            "WHERE x = 1 ORDER BY id DESC"
        );
        assert_eq!(LexicalSplicer.splice_and("  ", "x = 1").unwrap(), "WHERE x = 1");
    }

    #[test]
    fn test_split_tail() {
        assert_eq!(
            split_tail("a = 1 OR b = 'limit' ORDER BY id"),
            Some(("a = 1 OR b = 'limit'", "ORDER BY id"))
        );
        assert_eq!(split_tail("a = 1"), Some(("a = 1", "")));
        assert_eq!(split_tail("(a = 1"), None);
    }

    #[test]
    fn test_mask_literals_keeps_identifiers() {
        assert_eq!(mask_literals("`deleted` = 'deleted'"), "`deleted` = '       '");
        assert_eq!(mask_literals(r"a = 'x\' y' AND b"), r"a = '     ' AND b");
        assert_eq!(mask_literals("a = \"q\""), "a = \" \"");
    }

    #[test]
    fn test_malformed_fragments() {
        assert!(matches!(
            LexicalSplicer.splice_and("WHERE (a = 1", "x = 1"),
            Err(SpliceError::Unbalanced { .. })
        ));
        assert!(matches!(
            LexicalSplicer.splice_and("WHERE a = 'oops", "x = 1"),
            Err(SpliceError::Unbalanced { .. })
        ));
        assert!(matches!(
            LexicalSplicer.splice_and("WHERE ORDER BY id", "x = 1"),
            Err(SpliceError::EmptyCondition { .. })
        ));
    }
}
