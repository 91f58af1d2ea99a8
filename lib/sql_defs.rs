use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use crate::Error;

pub const DEFAULT_DB_PATH: &str = "bfabot.db";

/// A student’s competitive tier.
///
/// Stored as its discriminant; a student’s current division lives on
/// the student, and every submission keeps a copy of the division the
/// student was in when it was made.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Division {
    JuniorVarsity = 0,
    Freshman = 1,
    Varsity = 2,
    Graduate = 3,
    #[default]
    Unknown = 4,
}

impl Division {
    pub const ALL: [Division; 5] = [
        Division::JuniorVarsity,
        Division::Freshman,
        Division::Varsity,
        Division::Graduate,
        Division::Unknown,
    ];

    pub fn raw(self) -> u8 {
        self as _
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Division::JuniorVarsity => "Junior Varsity",
            Division::Freshman => "Freshman",
            Division::Varsity => "Varsity",
            Division::Graduate => "Graduate",
            Division::Unknown => "Unknown",
        }
    }

    /// Pick the division named by the first matching role. Roles that
    /// aren’t division names are ignored.
    pub fn from_role_names<'a>(roles: impl IntoIterator<Item = &'a str>) -> Division {
        roles.into_iter()
            .filter_map(|r| r.parse::<Division>().ok())
            .find(|d| *d != Division::Unknown)
            .unwrap_or_default()
    }
}

impl fmt::Display for Division {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Division {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s.chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        match key.as_str() {
            "jv" | "juniorvarsity" => Ok(Division::JuniorVarsity),
            "freshman" => Ok(Division::Freshman),
            "varsity" => Ok(Division::Varsity),
            "graduate" | "grad" => Ok(Division::Graduate),
            "unknown" => Ok(Division::Unknown),
            _ => Err(Error::InvalidDivision(s.to_string())),
        }
    }
}

impl TryFrom<i64> for Division {
    type Error = Error;
    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Division::ALL.into_iter()
            .find(|d| d.raw() as i64 == raw)
            .ok_or_else(|| Error::InvalidDivision(raw.to_string()))
    }
}

/// A weekly challenge. The week number is its identity.
#[derive(Clone, Debug, PartialEq, Eq, FromRow)]
pub struct Challenge {
    pub week: i64,
    pub name: String,
    pub is_open: bool,
}

/// Someone who has submitted a score or filled in their profile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Student {
    /// Discord user ID.
    pub member_id: u64,

    /// Discord tag at the time of the last interaction.
    pub display_name: Option<String>,
    pub level: Division,

    /// Twitter handle.
    pub secondary_handle: Option<String>,

    /// In-game dancer name.
    pub nickname: Option<String>,
}

/// Profile fields to set on a student. `None` leaves a field as is.
#[derive(Clone, Debug, Default)]
pub struct StudentUpdate {
    pub display_name: Option<String>,
    pub level: Option<Division>,
    pub secondary_handle: Option<String>,
    pub nickname: Option<String>,
}

/// One scored attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submission {
    pub id: i64,
    pub member_id: u64,
    pub week: i64,
    pub score: u32,
    pub pic_url: String,
    pub level: Division,
    pub submitted_at: DateTime<Utc>,
}

/// A student’s best score in some week.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Standing {
    pub member_id: u64,
    pub display_name: Option<String>,
    pub nickname: Option<String>,

    /// Division of the submission that holds the best score.
    pub level: Division,
    pub best: u32,
}

#[derive(FromRow)]
pub(crate) struct StudentRow {
    member_id: i64,
    display_name: Option<String>,
    level: i64,
    secondary_handle: Option<String>,
    nickname: Option<String>,
}

impl TryFrom<StudentRow> for Student {
    type Error = Error;
    fn try_from(row: StudentRow) -> Result<Self, Self::Error> {
        Ok(Student {
            member_id: row.member_id as u64,
            display_name: row.display_name,
            level: row.level.try_into()?,
            secondary_handle: row.secondary_handle,
            nickname: row.nickname,
        })
    }
}

#[derive(FromRow)]
pub(crate) struct SubmissionRow {
    id: i64,
    member_id: i64,
    week: i64,
    score: i64,
    pic_url: String,
    level: i64,
    submitted_at: i64,
}

impl TryFrom<SubmissionRow> for Submission {
    type Error = Error;
    fn try_from(row: SubmissionRow) -> Result<Self, Self::Error> {
        Ok(Submission {
            id: row.id,
            member_id: row.member_id as u64,
            week: row.week,
            score: row.score as u32,
            pic_url: row.pic_url,
            level: row.level.try_into()?,
            submitted_at: DateTime::from_timestamp(row.submitted_at, 0)
                .ok_or(Error::InvalidTimestamp(row.submitted_at))?,
        })
    }
}

#[derive(FromRow)]
pub(crate) struct StandingRow {
    member_id: i64,
    display_name: Option<String>,
    nickname: Option<String>,
    level: i64,
    best: i64,
}

impl TryFrom<StandingRow> for Standing {
    type Error = Error;
    fn try_from(row: StandingRow) -> Result<Self, Self::Error> {
        Ok(Standing {
            member_id: row.member_id as u64,
            display_name: row.display_name,
            nickname: row.nickname,
            level: row.level.try_into()?,
            best: row.best as u32,
        })
    }
}
