use thiserror::Error;

/// Errors surfaced by the challenge tracker and the score ledger.
///
/// The messages are meant to be shown to users as-is by the bot.
#[derive(Debug, Error)]
pub enum Error {
    /// A challenge with this week number already exists.
    #[error("Week {0} already exists")]
    DuplicateWeek(i64),

    /// Week numbers start at 1.
    #[error("Week must be a positive number, got {0}")]
    InvalidWeek(i64),

    /// A submission was attempted before any week was started.
    #[error("There is no challenge week yet")]
    NoActiveChallenge,

    /// The latest week is not accepting submissions.
    #[error("Submissions for week {0} are currently closed")]
    SubmissionsClosed(i64),

    /// A division name or stored division value is not recognised.
    #[error("Unknown division '{0}'")]
    InvalidDivision(String),

    /// A stored submission time is outside the range chrono can represent.
    #[error("Invalid submission timestamp {0}")]
    InvalidTimestamp(i64),

    /// Anything the database itself complained about.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
