//! The `legalprompt` table: its DDL, seed rows and row types.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const TABLE_NAME: &str = "legalprompt";

pub const CREATE_SEQUENCE_SQL: &str = "CREATE SEQUENCE IF NOT EXISTS legalprompt_id_seq START 4";

/// DuckDB has no `serial`, so the id default comes from the sequence above.
/// It starts after the three seed ids.
pub const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS legalprompt (
        id INTEGER PRIMARY KEY DEFAULT nextval('legalprompt_id_seq'),
        name VARCHAR(255) NOT NULL,
        prompt TEXT NOT NULL,
        category VARCHAR(255) NOT NULL,
        "createdAt" TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        "systemMessage" TEXT
    )
"#;

/// Inserts the seed rows only into an empty table. The ids are fixed, so a
/// second request seeding concurrently collides on the primary key instead of
/// adding duplicates.
pub const SEED_SQL: &str = r#"
    INSERT INTO legalprompt (id, name, prompt, category, "systemMessage")
    SELECT seed.id, seed.name, seed.prompt, seed.category, seed.system_message
    FROM (VALUES
        (1, 'Contract Review',
         'Review the attached commercial contract and list every clause that shifts liability to our client.',
         'Contracts',
         'You are a meticulous commercial contracts attorney.'),
        (2, 'NDA Drafting',
         'Draft a mutual non-disclosure agreement for two companies exploring a joint venture.',
         'Drafting',
         NULL),
        (3, 'Case Law Research',
         'Summarise the leading appellate decisions on implied warranties in software licensing.',
         'Research',
         'You are a legal research assistant. Cite every authority you rely on.')
    ) AS seed(id, name, prompt, category, system_message)
    WHERE NOT EXISTS (SELECT 1 FROM legalprompt)
"#;

/// Human-readable description of the table handed to the language model.
pub const SCHEMA_DESCRIPTION: &str = r#"legalprompt (
  id SERIAL PRIMARY KEY,
  name VARCHAR(255) NOT NULL,
  prompt TEXT NOT NULL,
  category VARCHAR(255) NOT NULL,
  "createdAt" TIMESTAMP NOT NULL DEFAULT NOW(),
  "systemMessage" TEXT
)"#;

pub const SELECT_COLUMNS: &str =
    r#"id, name, prompt, category, CAST("createdAt" AS VARCHAR), "systemMessage""#;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LegalPrompt {
    pub id: i32,
    pub name: String,
    pub prompt: String,
    pub category: String,
    pub created_at: NaiveDateTime,
    pub system_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLegalPrompt {
    pub name: String,
    pub prompt: String,
    pub category: String,
    #[serde(default)]
    pub system_message: Option<String>,
}

impl NewLegalPrompt {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.name.chars().count() > 255 {
            return Err("name must be at most 255 characters".to_string());
        }
        if self.prompt.trim().is_empty() {
            return Err("prompt must not be empty".to_string());
        }
        if self.category.trim().is_empty() {
            return Err("category must not be empty".to_string());
        }
        if self.category.chars().count() > 255 {
            return Err("category must be at most 255 characters".to_string());
        }
        Ok(())
    }
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f").ok()
}
