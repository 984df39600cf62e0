//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts per entity.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository writes validate domain records before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to DB transport errors.
//! - Multi-row writes run inside one immediate transaction.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::absence::{AbsenceId, AbsenceValidationError};
use crate::model::membership::RelationshipId;
use crate::model::team::{TeamId, TeamValidationError};
use crate::model::user::UserId;
use chrono::NaiveDate;
use rusqlite::{Connection, ErrorCode};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod absence_repo;
pub mod relationship_repo;
pub mod team_repo;
pub mod user_repo;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub type RepoResult<T> = Result<T, RepoError>;

/// Entity reference carried by `RepoError::NotFound`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRef {
    User(UserId),
    Username(String),
    Team(TeamId),
    TeamName(String),
    Relationship(RelationshipId),
    Membership { user: UserId, team: TeamId },
    Absence(AbsenceId),
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => write!(f, "user {id}"),
            Self::Username(name) => write!(f, "user named `{name}`"),
            Self::Team(id) => write!(f, "team {id}"),
            Self::TeamName(name) => write!(f, "team named `{name}`"),
            Self::Relationship(id) => write!(f, "relationship {id}"),
            Self::Membership { user, team } => {
                write!(f, "relationship of user {user} with team {team}")
            }
            Self::Absence(id) => write!(f, "absence {id}"),
        }
    }
}

/// Generic repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    InvalidTeam(TeamValidationError),
    InvalidAbsence(AbsenceValidationError),
    Db(DbError),
    NotFound(EntityRef),
    /// Write rejected by a uniqueness or state precondition.
    Conflict(String),
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTeam(err) => write!(f, "{err}"),
            Self::InvalidAbsence(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(entity) => write!(f, "{entity} not found"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidTeam(err) => Some(err),
            Self::InvalidAbsence(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TeamValidationError> for RepoError {
    fn from(value: TeamValidationError) -> Self {
        Self::InvalidTeam(value)
    }
}

impl From<AbsenceValidationError> for RepoError {
    fn from(value: AbsenceValidationError) -> Self {
        Self::InvalidAbsence(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Maps SQLite constraint violations to `Conflict`, other errors to `Db`.
pub(crate) fn conflict_or_db(err: rusqlite::Error, message: impl Into<String>) -> RepoError {
    match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => RepoError::Conflict(message.into()),
        _ => err.into(),
    }
}

/// Rejects connections that were not opened through `db::open_*`.
pub(crate) fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn date_to_db(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn parse_date(value: &str, column: &str) -> RepoResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| RepoError::InvalidData(format!("invalid date value `{value}` in {column}")))
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn parse_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}
