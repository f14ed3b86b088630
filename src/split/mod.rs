mod scanner;

use scanner::Scanner;

/// Split a multi-statement string into individual statements.
///
/// A `;` ends a statement only outside single- or double-quoted literals and
/// outside parentheses, so `INSERT INTO t VALUES ('a;b')` and `(a; b)` stay
/// whole. Every statement is trimmed and blank ones are dropped:
/// ```rust
/// use sql_batch::split::split_statements;
///
/// let parts = split_statements("CREATE TABLE t (id INT); INSERT INTO t VALUES (';');");
/// assert_eq!(parts, vec!["CREATE TABLE t (id INT)", "INSERT INTO t VALUES (';')"]);
/// ```
#[must_use]
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut scanner = Scanner::new(sql);
    let mut statements = Vec::new();
    let mut start = 0;

    while let Some(end) = scanner.next_boundary() {
        push_trimmed(&mut statements, &sql[start..end]);
        start = end + 1;
    }
    push_trimmed(&mut statements, &sql[start..]);
    statements
}

fn push_trimmed(out: &mut Vec<String>, candidate: &str) {
    let trimmed = candidate.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}
