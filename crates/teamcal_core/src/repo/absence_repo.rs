//! Absence repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD APIs over `absences` and the `absence_editors` whitelist.
//!
//! # Invariants
//! - Write paths call `Absence::validate()` before SQL mutations.
//! - Owner listing is ordered by start date, then insertion order.

use crate::model::absence::{Absence, AbsenceId, AbsenceValidationError};
use crate::model::user::UserId;
use crate::repo::{
    bool_to_int, conflict_or_db, date_to_db, ensure_connection_ready, parse_bool, parse_date,
    parse_uuid, EntityRef, RepoError, RepoResult,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::BTreeSet;

const ABSENCE_SELECT_SQL: &str = "SELECT
    uuid,
    owner_uuid,
    start_date,
    end_date,
    request_accepted
FROM absences";

/// Repository interface for absence persistence.
pub trait AbsenceRepository {
    fn create_absence(&self, absence: &Absence) -> RepoResult<AbsenceId>;
    fn get_absence(&self, id: AbsenceId) -> RepoResult<Option<Absence>>;
    fn list_absences_by_owner(&self, owner: UserId) -> RepoResult<Vec<Absence>>;
    fn update_absence_dates(&self, id: AbsenceId, start: NaiveDate, end: NaiveDate)
        -> RepoResult<()>;
    fn delete_absence(&self, id: AbsenceId) -> RepoResult<()>;
    /// Adds one user to the edit whitelist. Adding twice is a no-op.
    fn add_editor(&self, id: AbsenceId, editor: UserId) -> RepoResult<()>;
}

/// SQLite-backed absence repository.
pub struct SqliteAbsenceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAbsenceRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl AbsenceRepository for SqliteAbsenceRepository<'_> {
    fn create_absence(&self, absence: &Absence) -> RepoResult<AbsenceId> {
        absence.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO absences (uuid, owner_uuid, start_date, end_date, request_accepted)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                absence.uuid.to_string(),
                absence.owner.to_string(),
                date_to_db(absence.start),
                date_to_db(absence.end),
                bool_to_int(absence.request_accepted),
            ],
        )
        .map_err(|err| conflict_or_db(err, "absence owner must be a registered user"))?;
        for editor in &absence.editors {
            insert_editor(&tx, absence.uuid, *editor)?;
        }
        tx.commit()?;

        Ok(absence.uuid)
    }

    fn get_absence(&self, id: AbsenceId) -> RepoResult<Option<Absence>> {
        let row = self
            .conn
            .query_row(
                &format!("{ABSENCE_SELECT_SQL} WHERE uuid = ?1;"),
                [id.to_string()],
                read_absence_columns,
            )
            .optional()?;
        match row {
            Some(columns) => Ok(Some(parse_absence(self.conn, columns)?)),
            None => Ok(None),
        }
    }

    fn list_absences_by_owner(&self, owner: UserId) -> RepoResult<Vec<Absence>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ABSENCE_SELECT_SQL} WHERE owner_uuid = ?1 ORDER BY start_date ASC, rowid ASC;"
        ))?;
        let mut rows = stmt.query([owner.to_string()])?;
        let mut absences = Vec::new();
        while let Some(row) = rows.next()? {
            absences.push(parse_absence(self.conn, read_absence_columns(row)?)?);
        }
        Ok(absences)
    }

    fn update_absence_dates(
        &self,
        id: AbsenceId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepoResult<()> {
        if end < start {
            return Err(AbsenceValidationError::EndBeforeStart { start, end }.into());
        }

        let changed = self.conn.execute(
            "UPDATE absences
             SET start_date = ?2,
                 end_date = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), date_to_db(start), date_to_db(end)],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::Absence(id)));
        }
        Ok(())
    }

    fn delete_absence(&self, id: AbsenceId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM absences WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::Absence(id)));
        }
        Ok(())
    }

    fn add_editor(&self, id: AbsenceId, editor: UserId) -> RepoResult<()> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM absences WHERE uuid = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(RepoError::NotFound(EntityRef::Absence(id)));
        }
        insert_editor(self.conn, id, editor)
    }
}

fn insert_editor(conn: &Connection, id: AbsenceId, editor: UserId) -> RepoResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO absence_editors (absence_uuid, user_uuid) VALUES (?1, ?2);",
        params![id.to_string(), editor.to_string()],
    )
    .map_err(|err| conflict_or_db(err, format!("editor {editor} is not a registered user")))?;
    Ok(())
}

fn load_editors(conn: &Connection, id: &str) -> RepoResult<BTreeSet<UserId>> {
    let mut stmt = conn.prepare("SELECT user_uuid FROM absence_editors WHERE absence_uuid = ?1;")?;
    let mut rows = stmt.query([id])?;
    let mut editors = BTreeSet::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        editors.insert(parse_uuid(&value, "absence_editors.user_uuid")?);
    }
    Ok(editors)
}

type AbsenceColumns = (String, String, String, String, i64);

fn read_absence_columns(row: &Row<'_>) -> rusqlite::Result<AbsenceColumns> {
    Ok((
        row.get("uuid")?,
        row.get("owner_uuid")?,
        row.get("start_date")?,
        row.get("end_date")?,
        row.get("request_accepted")?,
    ))
}

fn parse_absence(
    conn: &Connection,
    (uuid, owner, start, end, accepted): AbsenceColumns,
) -> RepoResult<Absence> {
    let absence = Absence {
        uuid: parse_uuid(&uuid, "absences.uuid")?,
        owner: parse_uuid(&owner, "absences.owner_uuid")?,
        start: parse_date(&start, "absences.start_date")?,
        end: parse_date(&end, "absences.end_date")?,
        request_accepted: parse_bool(accepted, "absences.request_accepted")?,
        editors: load_editors(conn, &uuid)?,
    };
    absence
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("absences row {uuid}: {err}")))?;
    Ok(absence)
}
