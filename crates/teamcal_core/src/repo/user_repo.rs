//! User directory contracts and SQLite implementation.
//!
//! Users are registered by the authentication layer; the core reads them
//! to build invite candidate lists and to resolve whitelist usernames.

use crate::model::user::{User, UserId};
use crate::repo::{conflict_or_db, ensure_connection_ready, parse_uuid, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const USER_SELECT_SQL: &str = "SELECT uuid, username FROM users";

/// Repository interface for user identity lookups.
pub trait UserRepository {
    fn create_user(&self, user: &User) -> RepoResult<UserId>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    /// Case-insensitive username lookup.
    fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    /// All users ordered by case-folded username.
    fn list_users(&self) -> RepoResult<Vec<User>>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &User) -> RepoResult<UserId> {
        self.conn
            .execute(
                "INSERT INTO users (uuid, username) VALUES (?1, ?2);",
                params![user.uuid.to_string(), user.username.trim()],
            )
            .map_err(|err| conflict_or_db(err, "username already registered"))?;
        Ok(user.uuid)
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let row = self
            .conn
            .query_row(
                &format!("{USER_SELECT_SQL} WHERE uuid = ?1;"),
                [id.to_string()],
                read_user_columns,
            )
            .optional()?;
        row.map(parse_user).transpose()
    }

    fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let row = self
            .conn
            .query_row(
                &format!("{USER_SELECT_SQL} WHERE username = ?1 COLLATE NOCASE;"),
                [username.trim()],
                read_user_columns,
            )
            .optional()?;
        row.map(parse_user).transpose()
    }

    fn list_users(&self) -> RepoResult<Vec<User>> {
        let mut stmt = self.conn.prepare(&format!(
            "{USER_SELECT_SQL} ORDER BY username COLLATE NOCASE ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user(read_user_columns(row)?)?);
        }
        Ok(users)
    }
}

fn read_user_columns(row: &Row<'_>) -> rusqlite::Result<(String, String)> {
    Ok((row.get("uuid")?, row.get("username")?))
}

fn parse_user((uuid, username): (String, String)) -> RepoResult<User> {
    Ok(User {
        uuid: parse_uuid(&uuid, "users.uuid")?,
        username,
    })
}
