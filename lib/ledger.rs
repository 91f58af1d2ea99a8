use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{debug, info};
use crate::challenges::latest_challenge_in;
use crate::sql_defs::{StandingRow, StudentRow, SubmissionRow};
use crate::{Db, Division, Error, Result, Standing, Student, StudentUpdate, Submission};

impl Student {
    fn new(member_id: u64) -> Self {
        Student {
            member_id,
            display_name: None,
            level: Division::default(),
            secondary_handle: None,
            nickname: None,
        }
    }

    /// Overwrite the fields that are present in `update`.
    fn apply(&mut self, update: StudentUpdate) {
        if let Some(v) = update.display_name { self.display_name = Some(v); }
        if let Some(v) = update.level { self.level = v; }
        if let Some(v) = update.secondary_handle { self.secondary_handle = Some(v); }
        if let Some(v) = update.nickname { self.nickname = Some(v); }
    }
}

async fn student_in(conn: &mut SqliteConnection, member_id: u64) -> Result<Option<Student>> {
    let row: Option<StudentRow> = sqlx::query_as(r#"
        SELECT member_id, display_name, level, secondary_handle, nickname
        FROM students
        WHERE member_id = ?;
    "#)
        .bind(member_id as i64)
        .fetch_optional(&mut *conn)
        .await?;

    row.map(Student::try_from).transpose()
}

async fn write_student_in(conn: &mut SqliteConnection, s: &Student) -> Result<()> {
    sqlx::query(r#"
        UPDATE students
        SET display_name = ?, level = ?, secondary_handle = ?, nickname = ?
        WHERE member_id = ?;
    "#)
        .bind(&s.display_name)
        .bind(s.level.raw() as i64)
        .bind(&s.secondary_handle)
        .bind(&s.nickname)
        .bind(s.member_id as i64)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Create or update a student. Only the fields present in `update` are
/// written; everything else keeps its current value.
async fn upsert_student_in(
    conn: &mut SqliteConnection,
    member_id: u64,
    update: StudentUpdate,
) -> Result<Student> {
    // Display names are unique, but Discord names can be given up and
    // taken by someone else. The newest holder wins.
    if let Some(name) = &update.display_name {
        sqlx::query("UPDATE students SET display_name = NULL WHERE display_name = ? AND member_id != ?;")
            .bind(name)
            .bind(member_id as i64)
            .execute(&mut *conn)
            .await?;
    }

    if let Some(mut student) = student_in(conn, member_id).await? {
        student.apply(update);
        write_student_in(conn, &student).await?;
        return Ok(student);
    }

    let mut student = Student::new(member_id);
    student.apply(update);
    sqlx::query(r#"
        INSERT INTO students (member_id, display_name, level, secondary_handle, nickname)
        VALUES (?, ?, ?, ?, ?);
    "#)
        .bind(member_id as i64)
        .bind(&student.display_name)
        .bind(student.level.raw() as i64)
        .bind(&student.secondary_handle)
        .bind(&student.nickname)
        .execute(&mut *conn)
        .await?;

    info!(member_id, "Created student");
    Ok(student)
}

async fn submit_score_in(
    conn: &mut SqliteConnection,
    member_id: u64,
    display_name: &str,
    level: Division,
    score: u32,
    pic_url: &str,
) -> Result<(i64, Option<i64>)> {
    upsert_student_in(conn, member_id, StudentUpdate {
        display_name: Some(display_name.to_string()),
        level: Some(level),
        ..Default::default()
    }).await?;

    let challenge = latest_challenge_in(conn).await?.ok_or(Error::NoActiveChallenge)?;
    if !challenge.is_open { return Err(Error::SubmissionsClosed(challenge.week)); }

    let best: Option<i64> = sqlx::query_scalar(r#"
        SELECT MAX(score)
        FROM submissions
        WHERE member_id = ? AND week = ?;
    "#)
        .bind(member_id as i64)
        .bind(challenge.week)
        .fetch_one(&mut *conn)
        .await?;

    sqlx::query(r#"
        INSERT INTO submissions (
            member_id,
            week,
            score,
            pic_url,
            level,
            submitted_at
        ) VALUES (?, ?, ?, ?, ?, ?);
    "#)
        .bind(member_id as i64)
        .bind(challenge.week)
        .bind(score as i64)
        .bind(pic_url)
        .bind(level.raw() as i64)
        .bind(Utc::now().timestamp())
        .execute(&mut *conn)
        .await?;

    Ok((challenge.week, best.map(|b| score as i64 - b)))
}

impl Db {
    /// Get a student by Discord ID.
    pub async fn student(&self, member_id: u64) -> Result<Option<Student>> {
        let mut conn = self.pool().acquire().await?;
        student_in(&mut conn, member_id).await
    }

    /// Create a student if they don’t exist yet, and set whatever fields
    /// `update` contains.
    pub async fn upsert_student(&self, member_id: u64, update: StudentUpdate) -> Result<Student> {
        let mut tx = self.begin_write().await?;
        let res = upsert_student_in(&mut tx, member_id, update).await;
        tx.finish(res).await
    }

    /// Record a score for the latest week.
    ///
    /// Returns the upscore, that is, how much better (or worse) this score
    /// is than the student’s best score so far this week, or `None` if this
    /// is their first submission this week.
    ///
    /// Fails if there is no week yet or the latest week is closed; in that
    /// case, nothing is written, not even the student’s profile changes.
    pub async fn submit_score(
        &self,
        member_id: u64,
        display_name: &str,
        level: Division,
        score: u32,
        pic_url: &str,
    ) -> Result<Option<i64>> {
        let mut tx = self.begin_write().await?;
        let res = submit_score_in(&mut tx, member_id, display_name, level, score, pic_url).await;
        let (week, upscore) = tx.finish(res).await?;

        debug!(member_id, week, score, ?upscore, "Recorded submission");
        Ok(upscore)
    }

    /// A student’s best score in a week.
    pub async fn personal_best(&self, member_id: u64, week: i64) -> Result<Option<u32>> {
        let best: Option<i64> = sqlx::query_scalar(r#"
            SELECT MAX(score)
            FROM submissions
            WHERE member_id = ? AND week = ?;
        "#)
            .bind(member_id as i64)
            .bind(week)
            .fetch_one(self.pool())
            .await?;

        Ok(best.map(|b| b as u32))
    }

    /// Total number of submissions by a student, across all weeks.
    pub async fn submission_count(&self, member_id: u64) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM submissions WHERE member_id = ?;")
            .bind(member_id as i64)
            .fetch_one(self.pool())
            .await
            .map_err(Error::from)
    }

    /// A student’s most recent submissions, newest first.
    pub async fn recent_submissions(&self, member_id: u64, limit: u32) -> Result<Vec<Submission>> {
        let rows: Vec<SubmissionRow> = sqlx::query_as(r#"
            SELECT id, member_id, week, score, pic_url, level, submitted_at
            FROM submissions
            WHERE member_id = ?
            ORDER BY submitted_at DESC, id DESC
            LIMIT ?;
        "#)
            .bind(member_id as i64)
            .bind(limit as i64)
            .fetch_all(self.pool())
            .await?;

        rows.into_iter().map(Submission::try_from).collect()
    }

    /// Everyone’s best score in a week, best first.
    pub async fn leaderboard(&self, week: i64) -> Result<Vec<Standing>> {
        // SQLite takes bare columns in an aggregate query from the row
        // that holds the MAX(), so `level` is the level of the best score.
        let rows: Vec<StandingRow> = sqlx::query_as(r#"
            SELECT
                sub.member_id AS member_id,
                st.display_name AS display_name,
                st.nickname AS nickname,
                sub.level AS level,
                MAX(sub.score) AS best
            FROM submissions sub
            JOIN students st ON st.member_id = sub.member_id
            WHERE sub.week = ?
            GROUP BY sub.member_id
            ORDER BY best DESC, sub.member_id ASC;
        "#)
            .bind(week)
            .fetch_all(self.pool())
            .await?;

        rows.into_iter().map(Standing::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn db_with_week() -> Db {
        let db = Db::in_memory().await.unwrap();
        db.start_new_week(Some(1), "week1").await.unwrap();
        db
    }

    async fn count(db: &Db, table: &str) -> i64 {
        let sql = format!("SELECT COUNT(*) FROM {};", table);
        let n: i64 = sqlx::query_scalar(&sql)
            .fetch_one(db.pool())
            .await
            .unwrap();
        n
    }

    #[tokio::test]
    async fn first_submission_has_no_upscore() {
        let db = db_with_week().await;
        let up = db.submit_score(42, "alice#0001", Division::Freshman, 123, "url").await.unwrap();
        assert_eq!(up, None);

        let subs = db.recent_submissions(42, 10).await.unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].score, 123);
        assert_eq!(subs[0].pic_url, "url");
        assert_eq!(subs[0].week, 1);
    }

    #[tokio::test]
    async fn upscore_is_relative_to_best_not_last() {
        let db = db_with_week().await;
        db.submit_score(42, "alice#0001", Division::Freshman, 100, "a").await.unwrap();
        db.submit_score(42, "alice#0001", Division::Freshman, 1000, "b").await.unwrap();
        assert_eq!(db.submit_score(42, "alice#0001", Division::Freshman, 900, "c").await.unwrap(), Some(-100));
        assert_eq!(db.submit_score(42, "alice#0001", Division::Freshman, 1000, "d").await.unwrap(), Some(0));
        assert_eq!(db.submit_score(42, "alice#0001", Division::Freshman, 1250, "e").await.unwrap(), Some(250));
    }

    #[tokio::test]
    async fn upscore_ignores_other_students() {
        let db = db_with_week().await;
        db.submit_score(1, "a#1", Division::Varsity, 900, "x").await.unwrap();
        assert_eq!(db.submit_score(2, "b#2", Division::Varsity, 100, "y").await.unwrap(), None);
    }

    #[tokio::test]
    async fn upscore_resets_every_week() {
        let db = db_with_week().await;
        db.submit_score(42, "alice#0001", Division::Freshman, 500, "a").await.unwrap();
        db.start_new_week(None, "week2").await.unwrap();
        assert_eq!(db.submit_score(42, "alice#0001", Division::Freshman, 100, "b").await.unwrap(), None);
        assert_eq!(db.personal_best(42, 1).await.unwrap(), Some(500));
        assert_eq!(db.personal_best(42, 2).await.unwrap(), Some(100));
    }

    #[tokio::test]
    async fn submission_needs_a_week() {
        let db = Db::in_memory().await.unwrap();
        let err = db.submit_score(42, "alice#0001", Division::Freshman, 1, "a").await.unwrap_err();
        assert!(matches!(err, Error::NoActiveChallenge));
        assert_eq!(count(&db, "students").await, 0);
        assert_eq!(count(&db, "submissions").await, 0);
    }

    #[tokio::test]
    async fn closed_week_rejects_submissions_without_side_effects() {
        let db = db_with_week().await;
        db.close_submissions().await.unwrap();

        let err = db.submit_score(42, "alice#0001", Division::Freshman, 1234, "a").await.unwrap_err();
        assert!(matches!(err, Error::SubmissionsClosed(1)));
        assert_eq!(count(&db, "submissions").await, 0);
        assert_eq!(db.student(42).await.unwrap(), None);

        db.reopen_submissions().await.unwrap();
        db.submit_score(42, "alice#0001", Division::Freshman, 1234, "a").await.unwrap();
        assert_eq!(count(&db, "submissions").await, 1);
    }

    #[tokio::test]
    async fn submission_updates_student_and_snapshots_level() {
        let db = db_with_week().await;
        db.upsert_student(7, StudentUpdate {
            display_name: Some("xyz#123".into()),
            level: Some(Division::Varsity),
            nickname: Some("DDR".into()),
            ..Default::default()
        }).await.unwrap();

        db.submit_score(7, "grad#4321", Division::Graduate, 10, "a").await.unwrap();
        db.upsert_student(7, StudentUpdate { level: Some(Division::Freshman), ..Default::default() }).await.unwrap();

        let student = db.student(7).await.unwrap().unwrap();
        assert_eq!(student.display_name.as_deref(), Some("grad#4321"));
        assert_eq!(student.level, Division::Freshman);
        assert_eq!(student.nickname.as_deref(), Some("DDR"));

        let subs = db.recent_submissions(7, 1).await.unwrap();
        assert_eq!(subs[0].level, Division::Graduate);
    }

    #[tokio::test]
    async fn upsert_creates_then_merges() {
        let db = Db::in_memory().await.unwrap();
        let created = db.upsert_student(42, StudentUpdate {
            display_name: Some("alice#0001".into()),
            level: Some(Division::JuniorVarsity),
            secondary_handle: Some("lesscooltwitter".into()),
            nickname: Some("LESSCOOL".into()),
        }).await.unwrap();
        assert_eq!(created.level, Division::JuniorVarsity);

        let merged = db.upsert_student(42, StudentUpdate {
            display_name: Some("alice#0002".into()),
            level: Some(Division::Graduate),
            ..Default::default()
        }).await.unwrap();

        assert_eq!(count(&db, "students").await, 1);
        assert_eq!(merged, db.student(42).await.unwrap().unwrap());
        assert_eq!(merged.display_name.as_deref(), Some("alice#0002"));
        assert_eq!(merged.level, Division::Graduate);
        assert_eq!(merged.secondary_handle.as_deref(), Some("lesscooltwitter"));
        assert_eq!(merged.nickname.as_deref(), Some("LESSCOOL"));
    }

    #[tokio::test]
    async fn new_student_defaults_to_unknown_division() {
        let db = Db::in_memory().await.unwrap();
        let s = db.upsert_student(5, StudentUpdate {
            secondary_handle: Some("my_cool_twitter".into()),
            ..Default::default()
        }).await.unwrap();
        assert_eq!(s.level, Division::Unknown);
        assert_eq!(s.display_name, None);
    }

    #[tokio::test]
    async fn display_name_moves_to_newest_holder() {
        let db = Db::in_memory().await.unwrap();
        db.upsert_student(1, StudentUpdate { display_name: Some("taken".into()), ..Default::default() }).await.unwrap();
        db.upsert_student(2, StudentUpdate { display_name: Some("taken".into()), ..Default::default() }).await.unwrap();
        assert_eq!(db.student(1).await.unwrap().unwrap().display_name, None);
        assert_eq!(db.student(2).await.unwrap().unwrap().display_name.as_deref(), Some("taken"));
    }

    #[tokio::test]
    async fn students_and_weeks_with_submissions_cannot_be_deleted() {
        let db = db_with_week().await;
        db.submit_score(42, "alice#0001", Division::Freshman, 1, "a").await.unwrap();

        let err = sqlx::query("DELETE FROM students WHERE member_id = 42;")
            .execute(db.pool())
            .await
            .unwrap_err();
        assert!(matches!(err, sqlx::Error::Database(_)));

        let err = sqlx::query("DELETE FROM challenges WHERE week = 1;")
            .execute(db.pool())
            .await
            .unwrap_err();
        assert!(matches!(err, sqlx::Error::Database(_)));
    }

    #[tokio::test]
    async fn recent_submissions_newest_first() {
        let db = db_with_week().await;
        for score in [1, 2, 3, 4] {
            db.submit_score(42, "alice#0001", Division::Freshman, score, "a").await.unwrap();
        }

        let scores: Vec<u32> = db.recent_submissions(42, 3).await.unwrap()
            .into_iter()
            .map(|s| s.score)
            .collect();
        assert_eq!(scores, vec![4, 3, 2]);
        assert_eq!(db.submission_count(42).await.unwrap(), 4);
        assert_eq!(db.submission_count(43).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn leaderboard_ranks_best_scores_of_the_week() {
        let db = db_with_week().await;
        db.submit_score(1, "a#1", Division::Freshman, 300, "x").await.unwrap();
        db.submit_score(2, "b#2", Division::Varsity, 200, "x").await.unwrap();
        db.submit_score(1, "a#1", Division::Varsity, 100, "x").await.unwrap();
        db.submit_score(2, "b#2", Division::Graduate, 500, "x").await.unwrap();
        db.submit_score(3, "c#3", Division::JuniorVarsity, 300, "x").await.unwrap();

        let board = db.leaderboard(1).await.unwrap();
        let summary: Vec<(u64, u32, Division)> = board.iter().map(|s| (s.member_id, s.best, s.level)).collect();
        assert_eq!(summary, vec![
            (2, 500, Division::Graduate),
            (1, 300, Division::Freshman),
            (3, 300, Division::JuniorVarsity),
        ]);
        assert_eq!(board[0].display_name.as_deref(), Some("b#2"));
        assert!(db.leaderboard(2).await.unwrap().is_empty());
    }
}
