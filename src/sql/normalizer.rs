use regex::Regex;
use std::sync::LazyLock;

/// Case-sensitive columns of the `legalprompt` table. Postgres-style engines
/// fold unquoted identifiers to lower case, so these must always be quoted.
pub const QUOTED_IDENTIFIERS: [&str; 2] = ["createdAt", "systemMessage"];

// One pattern per identifier: any run of surrounding double quotes plus a
// case-insensitive, word-bounded match of the name itself.
static IDENTIFIER_PATTERNS: LazyLock<Vec<(Regex, String)>> = LazyLock::new(|| {
    QUOTED_IDENTIFIERS
        .iter()
        .map(|ident| {
            let pattern = format!(r#"(?i)"*\b{}\b"*"#, regex::escape(ident));
            let regex = Regex::new(&pattern).expect("identifier pattern is a valid regex");
            (regex, format!("\"{}\"", ident))
        })
        .collect()
});

/// Rewrites every occurrence of the tracked identifiers to their canonical,
/// double-quoted spelling. Runs of repeated quotes collapse to a single pair.
pub fn normalize_identifiers(sql: &str) -> String {
    IDENTIFIER_PATTERNS
        .iter()
        .fold(sql.to_string(), |acc, (regex, canonical)| {
            regex.replace_all(&acc, canonical.as_str()).into_owned()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_bare_identifiers() {
        let sql = "SELECT name, createdAt FROM legalprompt ORDER BY createdat DESC";
        assert_eq!(
            normalize_identifiers(sql),
            r#"SELECT name, "createdAt" FROM legalprompt ORDER BY "createdAt" DESC"#
        );
    }

    #[test]
    fn fixes_case_of_both_identifiers() {
        let sql = "SELECT SYSTEMMESSAGE, CreatedAt FROM legalprompt";
        assert_eq!(
            normalize_identifiers(sql),
            r#"SELECT "systemMessage", "createdAt" FROM legalprompt"#
        );
    }

    #[test]
    fn leaves_correctly_quoted_identifiers_alone() {
        let sql = r#"SELECT "createdAt" FROM legalprompt WHERE "systemMessage" IS NOT NULL"#;
        assert_eq!(normalize_identifiers(sql), sql);
    }

    #[test]
    fn collapses_repeated_quotes() {
        let sql = r#"SELECT ""createdAt"", """systemMessage""" FROM legalprompt"#;
        assert_eq!(
            normalize_identifiers(sql),
            r#"SELECT "createdAt", "systemMessage" FROM legalprompt"#
        );
    }

    #[test]
    fn ignores_longer_identifiers() {
        let sql = "SELECT createdAtUtc, my_systemMessage FROM legalprompt";
        assert_eq!(normalize_identifiers(sql), sql);
    }

    #[test]
    fn handles_qualified_columns() {
        let sql = "SELECT lp.createdat FROM legalprompt lp";
        assert_eq!(
            normalize_identifiers(sql),
            r#"SELECT lp."createdAt" FROM legalprompt lp"#
        );
    }

    #[test]
    fn is_idempotent() {
        let inputs = [
            "SELECT createdAt FROM legalprompt",
            r#"SELECT ""CREATEDAT"" FROM legalprompt"#,
            r#"SELECT "systemMessage", systemmessage FROM legalprompt"#,
            "SELECT category, COUNT(*) FROM legalprompt GROUP BY category",
            r#"SELECT DATE_TRUNC('month', "createdAt") AS month FROM legalprompt"#,
        ];
        for input in inputs {
            let once = normalize_identifiers(input);
            assert_eq!(normalize_identifiers(&once), once, "input: {}", input);
        }
    }
}
