use const_format::formatcp;
use sqlx::SqlitePool;
use crate::{Division, Result};

const STUDENTS: &str = formatcp!(r#"
    CREATE TABLE IF NOT EXISTS students (
        member_id INTEGER PRIMARY KEY, -- Discord user ID.
        display_name TEXT UNIQUE, -- Discord tag, e.g. name#1234.
        level INTEGER NOT NULL DEFAULT {} CHECK (level BETWEEN {} AND {}), -- See Division enum.
        secondary_handle TEXT, -- Twitter handle.
        nickname TEXT -- In-game dancer name.
    ) STRICT;
"#, Division::Unknown as u8, Division::JuniorVarsity as u8, Division::Unknown as u8);

const CHALLENGES: &str = r#"
    CREATE TABLE IF NOT EXISTS challenges (
        week INTEGER PRIMARY KEY CHECK (week > 0), -- Week number.
        name TEXT NOT NULL,
        is_open INTEGER NOT NULL DEFAULT 1 -- Whether submissions are accepted.
    ) STRICT;
"#;

const SUBMISSIONS: &str = formatcp!(r#"
    CREATE TABLE IF NOT EXISTS submissions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        member_id INTEGER NOT NULL REFERENCES students (member_id) ON DELETE RESTRICT,
        week INTEGER NOT NULL REFERENCES challenges (week) ON DELETE RESTRICT,
        score INTEGER NOT NULL CHECK (score >= 0),
        pic_url TEXT NOT NULL, -- Link to the picture of the score.
        level INTEGER NOT NULL CHECK (level BETWEEN {} AND {}), -- Division at the time of submission.
        submitted_at INTEGER NOT NULL -- Unix timestamp.
    ) STRICT;
"#, Division::JuniorVarsity as u8, Division::Unknown as u8);

const SUBMISSIONS_INDEX: &str = r#"
    CREATE INDEX IF NOT EXISTS submissions_by_member_week
    ON submissions (member_id, week);
"#;

/// Create all tables if they don’t exist yet.
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    for stmt in [STUDENTS, CHALLENGES, SUBMISSIONS, SUBMISSIONS_INDEX] {
        sqlx::query(stmt).execute(pool).await?;
    }

    Ok(())
}
