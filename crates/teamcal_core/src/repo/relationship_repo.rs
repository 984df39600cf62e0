//! Relationship repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and filter APIs over `relationships`.
//! - Apply status changes as compare-and-set writes.
//! - Remove relationships and delete orphaned teams in one transaction.
//!
//! # Invariants
//! - At most one relationship exists per `(user, team)` pair.
//! - A team never outlives its last relationship.
//! - List order is case-folded team name, then insertion order.

use crate::model::membership::{Relationship, RelationshipId, Role, Status};
use crate::model::team::TeamId;
use crate::model::user::UserId;
use crate::repo::{
    conflict_or_db, ensure_connection_ready, parse_uuid, EntityRef, RepoError, RepoResult,
};
use log::info;
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};

const RELATIONSHIP_SELECT_SQL: &str = "SELECT
    r.uuid AS uuid,
    r.user_uuid AS user_uuid,
    r.team_uuid AS team_uuid,
    r.role AS role,
    r.status AS status
FROM relationships r
INNER JOIN teams t ON t.uuid = r.team_uuid";

/// Equality filters for listing and counting relationships.
///
/// `None` fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipQuery {
    pub user: Option<UserId>,
    pub team: Option<TeamId>,
    pub status: Option<Status>,
    pub role: Option<Role>,
}

impl RelationshipQuery {
    pub fn for_user(user: UserId) -> Self {
        Self {
            user: Some(user),
            ..Self::default()
        }
    }

    pub fn for_team(team: TeamId) -> Self {
        Self {
            team: Some(team),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }
}

/// Result of removing one relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipRemoval {
    /// The deleted relationship as it was stored.
    pub relationship: Relationship,
    /// Whether the team was deleted because no relationship remained.
    pub team_deleted: bool,
}

/// Repository interface for relationship persistence.
pub trait RelationshipRepository {
    fn create_relationship(&self, relationship: &Relationship) -> RepoResult<RelationshipId>;
    fn get_relationship(&self, id: RelationshipId) -> RepoResult<Option<Relationship>>;
    /// Loads the relationship for one `(user, team)` pair.
    fn find_relationship(&self, user: UserId, team: TeamId) -> RepoResult<Option<Relationship>>;
    fn list_relationships(&self, query: &RelationshipQuery) -> RepoResult<Vec<Relationship>>;
    fn count_relationships(&self, query: &RelationshipQuery) -> RepoResult<u32>;
    /// Sets `to` only when the stored status still equals `from`.
    ///
    /// Returns `Conflict` when the stored status changed in between.
    fn update_status(&self, id: RelationshipId, from: Status, to: Status) -> RepoResult<()>;
    /// Deletes one relationship, then its team if no relationship remains.
    fn remove_relationship(&self, id: RelationshipId) -> RepoResult<RelationshipRemoval>;
}

/// SQLite-backed relationship repository.
pub struct SqliteRelationshipRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRelationshipRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl RelationshipRepository for SqliteRelationshipRepository<'_> {
    fn create_relationship(&self, relationship: &Relationship) -> RepoResult<RelationshipId> {
        self.conn
            .execute(
                "INSERT INTO relationships (uuid, user_uuid, team_uuid, role, status)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    relationship.uuid.to_string(),
                    relationship.user.to_string(),
                    relationship.team.to_string(),
                    relationship.role.as_str(),
                    relationship.status.as_str(),
                ],
            )
            .map_err(|err| {
                conflict_or_db(
                    err,
                    format!(
                        "user {} already has a relationship with team {} or one of them is unknown",
                        relationship.user, relationship.team
                    ),
                )
            })?;
        Ok(relationship.uuid)
    }

    fn get_relationship(&self, id: RelationshipId) -> RepoResult<Option<Relationship>> {
        load_relationship(self.conn, id)
    }

    fn find_relationship(&self, user: UserId, team: TeamId) -> RepoResult<Option<Relationship>> {
        let row = self
            .conn
            .query_row(
                &format!("{RELATIONSHIP_SELECT_SQL} WHERE r.user_uuid = ?1 AND r.team_uuid = ?2;"),
                params![user.to_string(), team.to_string()],
                read_relationship_columns,
            )
            .optional()?;
        row.map(parse_relationship).transpose()
    }

    fn list_relationships(&self, query: &RelationshipQuery) -> RepoResult<Vec<Relationship>> {
        let (filter, bind_values) = build_filter(query);
        let sql = format!(
            "{RELATIONSHIP_SELECT_SQL}{filter} ORDER BY t.name COLLATE NOCASE ASC, r.rowid ASC;"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_relationship(read_relationship_columns(row)?)?);
        }
        Ok(items)
    }

    fn count_relationships(&self, query: &RelationshipQuery) -> RepoResult<u32> {
        let (filter, bind_values) = build_filter(query);
        let sql = format!(
            "SELECT COUNT(*) FROM relationships r INNER JOIN teams t ON t.uuid = r.team_uuid{filter};"
        );
        let count: u32 = self
            .conn
            .query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
        Ok(count)
    }

    fn update_status(&self, id: RelationshipId, from: Status, to: Status) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE relationships
             SET status = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1
               AND status = ?2;",
            params![id.to_string(), from.as_str(), to.as_str()],
        )?;
        if changed == 1 {
            return Ok(());
        }

        match load_relationship(self.conn, id)? {
            None => Err(RepoError::NotFound(EntityRef::Relationship(id))),
            Some(current) => Err(RepoError::Conflict(format!(
                "relationship {id} is `{}`, expected `{}`",
                current.status.as_str(),
                from.as_str()
            ))),
        }
    }

    fn remove_relationship(&self, id: RelationshipId) -> RepoResult<RelationshipRemoval> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let relationship = load_relationship(&tx, id)?
            .ok_or(RepoError::NotFound(EntityRef::Relationship(id)))?;

        tx.execute("DELETE FROM relationships WHERE uuid = ?1;", [id.to_string()])?;
        let team_deleted = delete_team_if_orphaned(&tx, relationship.team)?;
        tx.commit()?;

        if team_deleted {
            info!(
                "event=team_cleanup module=repo status=ok team_id={} reason=no_relationships",
                relationship.team
            );
        }

        Ok(RelationshipRemoval {
            relationship,
            team_deleted,
        })
    }
}

fn delete_team_if_orphaned(conn: &Connection, team: TeamId) -> RepoResult<bool> {
    let remaining: i64 = conn.query_row(
        "SELECT COUNT(*) FROM relationships WHERE team_uuid = ?1;",
        [team.to_string()],
        |row| row.get(0),
    )?;
    if remaining > 0 {
        return Ok(false);
    }
    let changed = conn.execute("DELETE FROM teams WHERE uuid = ?1;", [team.to_string()])?;
    Ok(changed == 1)
}

fn load_relationship(conn: &Connection, id: RelationshipId) -> RepoResult<Option<Relationship>> {
    let row = conn
        .query_row(
            &format!("{RELATIONSHIP_SELECT_SQL} WHERE r.uuid = ?1;"),
            [id.to_string()],
            read_relationship_columns,
        )
        .optional()?;
    row.map(parse_relationship).transpose()
}

fn build_filter(query: &RelationshipQuery) -> (String, Vec<Value>) {
    let mut sql = String::from(" WHERE 1 = 1");
    let mut bind_values = Vec::new();

    if let Some(user) = query.user {
        sql.push_str(" AND r.user_uuid = ?");
        bind_values.push(Value::Text(user.to_string()));
    }
    if let Some(team) = query.team {
        sql.push_str(" AND r.team_uuid = ?");
        bind_values.push(Value::Text(team.to_string()));
    }
    if let Some(status) = query.status {
        sql.push_str(" AND r.status = ?");
        bind_values.push(Value::Text(status.as_str().to_string()));
    }
    if let Some(role) = query.role {
        sql.push_str(" AND r.role = ?");
        bind_values.push(Value::Text(role.as_str().to_string()));
    }

    (sql, bind_values)
}

type RelationshipColumns = (String, String, String, String, String);

fn read_relationship_columns(row: &Row<'_>) -> rusqlite::Result<RelationshipColumns> {
    Ok((
        row.get("uuid")?,
        row.get("user_uuid")?,
        row.get("team_uuid")?,
        row.get("role")?,
        row.get("status")?,
    ))
}

fn parse_relationship(
    (uuid, user, team, role, status): RelationshipColumns,
) -> RepoResult<Relationship> {
    Ok(Relationship {
        uuid: parse_uuid(&uuid, "relationships.uuid")?,
        user: parse_uuid(&user, "relationships.user_uuid")?,
        team: parse_uuid(&team, "relationships.team_uuid")?,
        role: role.parse().map_err(|_| {
            RepoError::InvalidData(format!("invalid role `{role}` in relationships.role"))
        })?,
        status: status.parse().map_err(|_| {
            RepoError::InvalidData(format!("invalid status `{status}` in relationships.status"))
        })?,
    })
}
