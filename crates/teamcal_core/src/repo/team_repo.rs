//! Team repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide create/read/list/delete APIs over `teams`.
//! - Create a team together with its owner relationship atomically.
//!
//! # Invariants
//! - Team names are unique case-insensitively (`COLLATE NOCASE`).
//! - Listing order is case-folded name, then uuid.

use crate::model::membership::{Relationship, Role, Status};
use crate::model::team::{Team, TeamId};
use crate::repo::{
    bool_to_int, conflict_or_db, ensure_connection_ready, parse_bool, parse_uuid, EntityRef,
    RepoError, RepoResult,
};
use rusqlite::{
    params, Connection, ErrorCode, OptionalExtension, Row, Transaction, TransactionBehavior,
};

const TEAM_SELECT_SQL: &str = "SELECT uuid, name, private FROM teams";

/// Repository interface for team persistence.
pub trait TeamRepository {
    /// Inserts `team` and its creator relationship in one transaction.
    ///
    /// `owner` must reference `team` with `Role::Owner` and `Status::Active`.
    /// A name clash is `Conflict`; an unregistered owner is `NotFound(User)`.
    /// Neither leaves a team row behind.
    fn create_team_with_owner(&self, team: &Team, owner: &Relationship) -> RepoResult<()>;
    fn get_team(&self, id: TeamId) -> RepoResult<Option<Team>>;
    /// Case-insensitive name lookup.
    fn find_team_by_name(&self, name: &str) -> RepoResult<Option<Team>>;
    /// All teams ordered by case-folded name.
    fn list_teams(&self) -> RepoResult<Vec<Team>>;
    fn delete_team(&self, id: TeamId) -> RepoResult<()>;
}

/// SQLite-backed team repository.
pub struct SqliteTeamRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTeamRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl TeamRepository for SqliteTeamRepository<'_> {
    fn create_team_with_owner(&self, team: &Team, owner: &Relationship) -> RepoResult<()> {
        team.validate()?;
        if owner.team != team.uuid || owner.role != Role::Owner || owner.status != Status::Active
        {
            return Err(RepoError::InvalidData(
                "team creator must be an active owner of the created team".to_string(),
            ));
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO teams (uuid, name, private) VALUES (?1, ?2, ?3);",
            params![team.uuid.to_string(), team.name, bool_to_int(team.private)],
        )
        .map_err(|err| conflict_or_db(err, format!("team name `{}` is taken", team.name)))?;
        tx.execute(
            "INSERT INTO relationships (uuid, user_uuid, team_uuid, role, status)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                owner.uuid.to_string(),
                owner.user.to_string(),
                owner.team.to_string(),
                owner.role.as_str(),
                owner.status.as_str(),
            ],
        )
        .map_err(|err| match err.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => {
                RepoError::NotFound(EntityRef::User(owner.user))
            }
            _ => err.into(),
        })?;
        tx.commit()?;
        Ok(())
    }

    fn get_team(&self, id: TeamId) -> RepoResult<Option<Team>> {
        let row = self
            .conn
            .query_row(
                &format!("{TEAM_SELECT_SQL} WHERE uuid = ?1;"),
                [id.to_string()],
                read_team_columns,
            )
            .optional()?;
        row.map(parse_team).transpose()
    }

    fn find_team_by_name(&self, name: &str) -> RepoResult<Option<Team>> {
        let row = self
            .conn
            .query_row(
                &format!("{TEAM_SELECT_SQL} WHERE name = ?1 COLLATE NOCASE;"),
                [name.trim()],
                read_team_columns,
            )
            .optional()?;
        row.map(parse_team).transpose()
    }

    fn list_teams(&self) -> RepoResult<Vec<Team>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TEAM_SELECT_SQL} ORDER BY name COLLATE NOCASE ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut teams = Vec::new();
        while let Some(row) = rows.next()? {
            teams.push(parse_team(read_team_columns(row)?)?);
        }
        Ok(teams)
    }

    fn delete_team(&self, id: TeamId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM teams WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::Team(id)));
        }
        Ok(())
    }
}

type TeamColumns = (String, String, i64);

fn read_team_columns(row: &Row<'_>) -> rusqlite::Result<TeamColumns> {
    Ok((row.get("uuid")?, row.get("name")?, row.get("private")?))
}

fn parse_team((uuid, name, private): TeamColumns) -> RepoResult<Team> {
    let team = Team {
        uuid: parse_uuid(&uuid, "teams.uuid")?,
        name,
        private: parse_bool(private, "teams.private")?,
    };
    team.validate()
        .map_err(|err| RepoError::InvalidData(format!("teams.name: {err}")))?;
    Ok(team)
}
