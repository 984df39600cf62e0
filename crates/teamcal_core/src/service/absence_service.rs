//! Absence use-case service.
//!
//! # Responsibility
//! - Create, edit, list and delete absences for their owners.
//! - Manage the per-absence edit whitelist.
//!
//! # Invariants
//! - New absences start with `request_accepted = false`.
//! - Only the owner deletes or grants edit access.
//! - Owner and whitelisted editors may change dates.
//! - Stored spans respect `CoreConfig::max_absence_span_days`.

use crate::config::CoreConfig;
use crate::model::absence::{Absence, AbsenceId, AbsenceValidationError};
use crate::model::user::UserId;
use crate::repo::absence_repo::AbsenceRepository;
use crate::repo::user_repo::UserRepository;
use crate::repo::{EntityRef, RepoError};
use chrono::NaiveDate;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from absence use-cases.
#[derive(Debug)]
pub enum AbsenceError {
    Validation(AbsenceValidationError),
    AbsenceNotFound(AbsenceId),
    UserNotFound(UserId),
    UsernameNotFound(String),
    PermissionDenied {
        user: UserId,
        absence: AbsenceId,
        action: &'static str,
    },
    Repo(RepoError),
}

impl Display for AbsenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::AbsenceNotFound(id) => write!(f, "absence not found: {id}"),
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::UsernameNotFound(name) => write!(f, "no user named `{name}`"),
            Self::PermissionDenied {
                user,
                absence,
                action,
            } => write!(f, "user {user} is not allowed to {action} absence {absence}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AbsenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AbsenceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::InvalidAbsence(err) => Self::Validation(err),
            RepoError::NotFound(EntityRef::Absence(id)) => Self::AbsenceNotFound(id),
            RepoError::NotFound(EntityRef::User(id)) => Self::UserNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<AbsenceValidationError> for AbsenceError {
    fn from(value: AbsenceValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Absence service facade over user and absence repositories.
pub struct AbsenceService<U: UserRepository, A: AbsenceRepository> {
    users: U,
    absences: A,
    config: CoreConfig,
}

impl<U: UserRepository, A: AbsenceRepository> AbsenceService<U, A> {
    pub fn new(users: U, absences: A, config: CoreConfig) -> Self {
        Self {
            users,
            absences,
            config,
        }
    }

    /// Records a new, not yet accepted absence for `owner`.
    pub fn add_absence(
        &self,
        owner: UserId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Absence, AbsenceError> {
        if self.users.get_user(owner)?.is_none() {
            return Err(AbsenceError::UserNotFound(owner));
        }
        let absence = Absence::new(owner, start, end);
        absence.validate()?;
        absence.check_span(self.config.max_absence_span_days)?;
        self.absences.create_absence(&absence)?;

        info!(
            "event=absence_create module=absence status=ok absence_id={} user_id={} days={}",
            absence.uuid,
            owner,
            absence.span_days()
        );
        Ok(absence)
    }

    /// Absences owned by `owner`, ordered by start date.
    pub fn list_absences(&self, owner: UserId) -> Result<Vec<Absence>, AbsenceError> {
        Ok(self.absences.list_absences_by_owner(owner)?)
    }

    /// Replaces the date range. Allowed for the owner and whitelisted editors.
    pub fn edit_absence(
        &self,
        caller: UserId,
        id: AbsenceId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Absence, AbsenceError> {
        let mut absence = self.require_absence(id)?;
        if !absence.can_edit(caller) {
            return Err(deny(caller, id, "edit"));
        }
        absence.start = start;
        absence.end = end;
        absence.validate()?;
        absence.check_span(self.config.max_absence_span_days)?;
        self.absences.update_absence_dates(id, start, end)?;

        info!("event=absence_edit module=absence status=ok absence_id={id} user_id={caller}");
        Ok(absence)
    }

    /// Deletes an absence. Only the owner may do this.
    pub fn delete_absence(&self, caller: UserId, id: AbsenceId) -> Result<(), AbsenceError> {
        let absence = self.require_absence(id)?;
        if absence.owner != caller {
            return Err(deny(caller, id, "delete"));
        }
        self.absences.delete_absence(id)?;
        info!("event=absence_delete module=absence status=ok absence_id={id} user_id={caller}");
        Ok(())
    }

    /// Adds the user named `username` to the edit whitelist of `id`.
    pub fn grant_edit_access(
        &self,
        owner: UserId,
        id: AbsenceId,
        username: &str,
    ) -> Result<Absence, AbsenceError> {
        let mut absence = self.require_absence(id)?;
        if absence.owner != owner {
            return Err(deny(owner, id, "share"));
        }
        let editor = self
            .users
            .find_user_by_username(username)?
            .ok_or_else(|| AbsenceError::UsernameNotFound(username.trim().to_string()))?;

        if editor.uuid != owner {
            self.absences.add_editor(id, editor.uuid)?;
            absence.editors.insert(editor.uuid);
        }
        info!(
            "event=absence_share module=absence status=ok absence_id={id} editor_id={}",
            editor.uuid
        );
        Ok(absence)
    }

    fn require_absence(&self, id: AbsenceId) -> Result<Absence, AbsenceError> {
        self.absences
            .get_absence(id)?
            .ok_or(AbsenceError::AbsenceNotFound(id))
    }
}

fn deny(user: UserId, absence: AbsenceId, action: &'static str) -> AbsenceError {
    warn!(
        "event=absence_denied module=absence status=denied absence_id={absence} user_id={user} action={action}"
    );
    AbsenceError::PermissionDenied {
        user,
        absence,
        action,
    }
}
