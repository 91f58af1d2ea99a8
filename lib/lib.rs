//! Score keeping for the weekly challenge: which weeks exist and whether
//! they accept submissions, who submitted what, and how much each new
//! score improves on that student’s best score of the week.

mod challenges;
mod db;
mod error;
mod ledger;
mod schema;
mod sql_defs;

pub use db::Db;
pub use error::{Error, Result};
pub use schema::create_tables;
pub use sql_defs::{Challenge, Division, Standing, Student, StudentUpdate, Submission, DEFAULT_DB_PATH};
