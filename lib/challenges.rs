use sqlx::SqliteConnection;
use tracing::info;
use crate::{Challenge, Db, Error, Result};

/// Get the latest challenge using an existing connection, e.g. from
/// inside a transaction.
pub(crate) async fn latest_challenge_in(conn: &mut SqliteConnection) -> Result<Option<Challenge>> {
    sqlx::query_as(r#"
        SELECT week, name, is_open
        FROM challenges
        ORDER BY week DESC
        LIMIT 1;
    "#)
        .fetch_optional(&mut *conn)
        .await
        .map_err(Error::from)
}

async fn start_new_week_in(
    conn: &mut SqliteConnection,
    week: Option<i64>,
    name: &str,
) -> Result<(Challenge, Option<Challenge>)> {
    let previous = latest_challenge_in(conn).await?;
    let week = match week {
        Some(w) => w,
        None => previous.as_ref().map_or(1, |c| c.week + 1),
    };

    if week < 1 { return Err(Error::InvalidWeek(week)); }

    // The primary key decides whether the week already exists.
    let inserted = sqlx::query("INSERT INTO challenges (week, name, is_open) VALUES (?, ?, 1);")
        .bind(week)
        .bind(name)
        .execute(&mut *conn)
        .await;

    match inserted {
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(Error::DuplicateWeek(week));
        }
        r => { r?; }
    }

    let mut closed = previous.filter(|p| p.is_open && p.week < week);
    if let Some(prev) = &mut closed {
        sqlx::query("UPDATE challenges SET is_open = 0 WHERE week = ?;")
            .bind(prev.week)
            .execute(&mut *conn)
            .await?;
        prev.is_open = false;
    }

    Ok((Challenge { week, name: name.to_string(), is_open: true }, closed))
}

impl Db {
    /// Get the number of the latest week, if any week was ever started.
    pub async fn latest_week(&self) -> Result<Option<i64>> {
        sqlx::query_scalar("SELECT MAX(week) FROM challenges;")
            .fetch_one(self.pool())
            .await
            .map_err(Error::from)
    }

    /// Get the latest challenge.
    pub async fn latest_challenge(&self) -> Result<Option<Challenge>> {
        let mut conn = self.pool().acquire().await?;
        latest_challenge_in(&mut conn).await
    }

    /// Get the challenge for a week.
    pub async fn challenge(&self, week: i64) -> Result<Option<Challenge>> {
        sqlx::query_as("SELECT week, name, is_open FROM challenges WHERE week = ?;")
            .bind(week)
            .fetch_optional(self.pool())
            .await
            .map_err(Error::from)
    }

    /// Start a new week. Without an explicit week number, this is the
    /// week after the latest one, or week 1.
    ///
    /// If the new week becomes the latest week, the week that was the
    /// latest before is closed and returned alongside the new week.
    /// Nothing is closed if creating the new week fails.
    pub async fn start_new_week(
        &self,
        week: Option<i64>,
        name: &str,
    ) -> Result<(Challenge, Option<Challenge>)> {
        let mut tx = self.begin_write().await?;
        let res = start_new_week_in(&mut tx, week, name).await;
        let (challenge, closed) = tx.finish(res).await?;

        if let Some(c) = &closed {
            info!(week = c.week, "Closed submissions for previous week");
        }
        info!(week = challenge.week, name, "Started new week");
        Ok((challenge, closed))
    }

    /// Stop accepting submissions for the latest week.
    pub async fn close_submissions(&self) -> Result<Option<Challenge>> {
        self.set_latest_week_open(false).await
    }

    /// Accept submissions for the latest week again.
    pub async fn reopen_submissions(&self) -> Result<Option<Challenge>> {
        self.set_latest_week_open(true).await
    }

    /// Whether the latest week accepts submissions. False if there is
    /// no week at all.
    pub async fn is_latest_week_open(&self) -> Result<bool> {
        let open: Option<bool> = sqlx::query_scalar(r#"
            SELECT is_open
            FROM challenges
            ORDER BY week DESC
            LIMIT 1;
        "#)
            .fetch_optional(self.pool())
            .await?;

        Ok(open.unwrap_or(false))
    }

    async fn set_latest_week_open(&self, open: bool) -> Result<Option<Challenge>> {
        let challenge: Option<Challenge> = sqlx::query_as(r#"
            UPDATE challenges
            SET is_open = ?
            WHERE week = (SELECT MAX(week) FROM challenges)
            RETURNING week, name, is_open;
        "#)
            .bind(open)
            .fetch_optional(self.pool())
            .await?;

        if let Some(c) = &challenge {
            info!(week = c.week, open, "Changed submission state");
        }

        Ok(challenge)
    }
}
