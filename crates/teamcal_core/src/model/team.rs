//! Team domain model.
//!
//! # Responsibility
//! - Define the team record and its visibility flag.
//! - Normalize and validate team names before persistence.
//!
//! # Invariants
//! - Team names are unique case-insensitively (enforced by storage).
//! - A team with zero relationships must not persist (enforced by the
//!   relationship repository cleanup).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a team.
pub type TeamId = Uuid;

/// Maximum team name length in characters after normalization.
pub const MAX_TEAM_NAME_CHARS: usize = 64;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Team record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub uuid: TeamId,
    pub name: String,
    /// Private teams require owner approval for join requests.
    pub private: bool,
}

/// Validation failures for team input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeamValidationError {
    EmptyName,
    NameTooLong { chars: usize },
}

impl Display for TeamValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "team name must not be blank"),
            Self::NameTooLong { chars } => write!(
                f,
                "team name has {chars} characters, maximum is {MAX_TEAM_NAME_CHARS}"
            ),
        }
    }
}

impl Error for TeamValidationError {}

impl Team {
    /// Creates a team with a generated ID and a normalized name.
    pub fn new(name: &str, private: bool) -> Result<Self, TeamValidationError> {
        Ok(Self {
            uuid: Uuid::new_v4(),
            name: normalize_team_name(name)?,
            private,
        })
    }

    /// Checks persisted/incoming state against team invariants.
    pub fn validate(&self) -> Result<(), TeamValidationError> {
        let chars = self.name.chars().count();
        if self.name.trim().is_empty() {
            return Err(TeamValidationError::EmptyName);
        }
        if chars > MAX_TEAM_NAME_CHARS {
            return Err(TeamValidationError::NameTooLong { chars });
        }
        Ok(())
    }
}

/// Trims the name and collapses inner whitespace runs to one space.
pub fn normalize_team_name(name: &str) -> Result<String, TeamValidationError> {
    let collapsed = WHITESPACE_RE.replace_all(name.trim(), " ").into_owned();
    if collapsed.is_empty() {
        return Err(TeamValidationError::EmptyName);
    }
    let chars = collapsed.chars().count();
    if chars > MAX_TEAM_NAME_CHARS {
        return Err(TeamValidationError::NameTooLong { chars });
    }
    Ok(collapsed)
}

#[cfg(test)]
mod tests {
    use super::{normalize_team_name, Team, TeamValidationError};

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize_team_name("  Core   Eng \t").unwrap(), "Core Eng");
    }

    #[test]
    fn blank_name_is_rejected() {
        assert_eq!(
            Team::new("   ", false).unwrap_err(),
            TeamValidationError::EmptyName
        );
    }

    #[test]
    fn overlong_name_is_rejected() {
        let name = "x".repeat(65);
        assert!(matches!(
            normalize_team_name(&name),
            Err(TeamValidationError::NameTooLong { chars: 65 })
        ));
    }
}
