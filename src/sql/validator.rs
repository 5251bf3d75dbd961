/// Statements that mutate data or schema. Matched as plain substrings of the
/// lower-cased query, so a string literal such as `'delete me'` is rejected too.
pub const FORBIDDEN_KEYWORDS: [&str; 6] = ["drop", "delete", "insert", "update", "truncate", "alter"];

/// Comment markers and tokens commonly used to smuggle a second statement in.
pub const SUSPICIOUS_PATTERNS: [&str; 6] = ["--", "/*", "*/", "union", "exec", "xp_"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid(String),
}

/// Checks that `sql` is a single read-only SELECT. The first failing rule wins.
pub fn validate_query(sql: &str) -> Verdict {
    let lowered = sql.trim().to_lowercase();

    if !lowered.starts_with("select") {
        return Verdict::Invalid("Only SELECT queries are allowed".to_string());
    }

    if let Some(keyword) = FORBIDDEN_KEYWORDS.iter().find(|kw| lowered.contains(*kw)) {
        return Verdict::Invalid(format!(
            "Query contains forbidden keyword: {}",
            keyword.to_uppercase()
        ));
    }

    if let Some(pattern) = SUSPICIOUS_PATTERNS.iter().find(|p| lowered.contains(*p)) {
        return Verdict::Invalid(format!("Query contains suspicious pattern: {}", pattern));
    }

    // A single trailing semicolon is fine; anything after one is a second statement.
    let body = lowered.trim_end().trim_end_matches(';');
    if body.contains(';') {
        return Verdict::Invalid("Query contains suspicious pattern: ;".to_string());
    }

    Verdict::Valid
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(sql: &str) -> String {
        match validate_query(sql) {
            Verdict::Invalid(reason) => reason,
            Verdict::Valid => panic!("expected {:?} to be rejected", sql),
        }
    }

    #[test]
    fn accepts_plain_select() {
        assert_eq!(validate_query("SELECT category, COUNT(*) FROM legalprompt GROUP BY category"), Verdict::Valid);
        assert_eq!(validate_query("  select * from legalprompt;  "), Verdict::Valid);
        assert_eq!(validate_query(r#"SELECT "createdAt" FROM legalprompt WHERE category = 'Contracts';"#), Verdict::Valid);
    }

    #[test]
    fn rejects_anything_not_starting_with_select() {
        for sql in [
            "WITH x AS (SELECT 1) SELECT * FROM x",
            "explain select * from legalprompt",
            "",
            "   ",
            "(SELECT 1)",
            "CREATE TABLE t (id int)",
        ] {
            assert_eq!(reason(sql), "Only SELECT queries are allowed", "sql: {:?}", sql);
        }
    }

    #[test]
    fn non_select_check_runs_first() {
        assert_eq!(reason("DROP TABLE legalprompt"), "Only SELECT queries are allowed");
    }

    #[test]
    fn names_forbidden_keyword() {
        assert_eq!(
            reason("SELECT * FROM legalprompt; DROP TABLE legalprompt"),
            "Query contains forbidden keyword: DROP"
        );
        assert_eq!(
            reason("select * from legalprompt where name = 'x' or 1=1; DeLeTe from legalprompt"),
            "Query contains forbidden keyword: DELETE"
        );
        assert_eq!(reason("SELECT 1 INTO x; INSERT INTO t VALUES (1)"), "Query contains forbidden keyword: INSERT");
        assert_eq!(reason("SELECT * FROM t FOR UPDATE"), "Query contains forbidden keyword: UPDATE");
        assert_eq!(reason("SELECT truncate FROM t"), "Query contains forbidden keyword: TRUNCATE");
        assert_eq!(reason("SELECT 1; ALTER TABLE t ADD c int"), "Query contains forbidden keyword: ALTER");
    }

    #[test]
    fn keyword_inside_literal_is_rejected_too() {
        // Known over-rejection of the denylist approach.
        assert_ne!(validate_query("SELECT * FROM legalprompt WHERE prompt LIKE '%delete%'"), Verdict::Valid);
    }

    #[test]
    fn rejects_comments_and_union() {
        assert_eq!(reason("SELECT * FROM legalprompt -- trailing"), "Query contains suspicious pattern: --");
        assert_eq!(reason("SELECT /* hi */ 1"), "Query contains suspicious pattern: /*");
        assert_eq!(
            reason("SELECT name FROM legalprompt UNION SELECT table_name FROM information_schema.tables"),
            "Query contains suspicious pattern: union"
        );
        assert_eq!(reason("SELECT exec('x')"), "Query contains suspicious pattern: exec");
    }

    #[test]
    fn rejects_stacked_statements() {
        assert_eq!(reason("SELECT 1; SELECT 2"), "Query contains suspicious pattern: ;");
        assert_eq!(validate_query("SELECT 1;"), Verdict::Valid);
    }

}
