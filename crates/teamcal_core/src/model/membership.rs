//! Membership domain model.
//!
//! # Responsibility
//! - Define the user/team join record (`Relationship`).
//! - Define `Role` and lifecycle `Status` tags with their storage names.
//! - Own the status transition table.
//!
//! # Invariants
//! - `invited` and `pending` are the only states with outgoing transitions.
//! - `active` and `nonactive` are terminal; only deletion leaves them.
//! - Status is scoped to one relationship, never to a team or user.

use crate::model::team::TeamId;
use crate::model::user::UserId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier of a relationship.
pub type RelationshipId = Uuid;

/// Role a user holds inside one team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Creator of the team; sees settings and reviews join requests.
    Owner,
    /// Regular team member.
    Member,
}

impl Role {
    /// Stable tag used in storage and request input.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "Owner",
            Self::Member => "Member",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownTagError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Owner" => Ok(Self::Owner),
            "Member" => Ok(Self::Member),
            other => Err(UnknownTagError::role(other)),
        }
    }
}

/// Lifecycle state of one relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Someone invited the user; waiting for the user.
    Invited,
    /// The user asked to join; waiting for the owner.
    Pending,
    /// Full member.
    Active,
    /// Rejected or declined.
    Nonactive,
}

impl Status {
    /// Stable slug used in storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Invited => "invited",
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Nonactive => "nonactive",
        }
    }

    /// Returns whether `self -> next` is an allowed lifecycle edge.
    pub fn can_transition_to(self, next: Status) -> bool {
        matches!(
            (self, next),
            (Self::Invited, Self::Active)
                | (Self::Invited, Self::Nonactive)
                | (Self::Pending, Self::Active)
                | (Self::Pending, Self::Nonactive)
        )
    }
}

impl FromStr for Status {
    type Err = UnknownTagError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "invited" => Ok(Self::Invited),
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "nonactive" => Ok(Self::Nonactive),
            other => Err(UnknownTagError::status(other)),
        }
    }
}

/// Owner decision on a pending join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Accept,
    Reject,
}

impl ReviewDecision {
    /// Status the relationship ends in after this decision.
    pub fn target_status(self) -> Status {
        match self {
            Self::Accept => Status::Active,
            Self::Reject => Status::Nonactive,
        }
    }
}

impl FromStr for ReviewDecision {
    type Err = UnknownTagError;

    /// Accepts the response values `accepted` and `nonactive`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "accepted" => Ok(Self::Accept),
            "nonactive" => Ok(Self::Reject),
            other => Err(UnknownTagError::decision(other)),
        }
    }
}

/// Reference-data tag that does not map to a known value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTagError {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownTagError {
    fn role(value: &str) -> Self {
        Self {
            kind: "role",
            value: value.to_string(),
        }
    }

    fn status(value: &str) -> Self {
        Self {
            kind: "status",
            value: value.to_string(),
        }
    }

    fn decision(value: &str) -> Self {
        Self {
            kind: "review decision",
            value: value.to_string(),
        }
    }
}

impl Display for UnknownTagError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown {} `{}`", self.kind, self.value)
    }
}

impl Error for UnknownTagError {}

/// Rejected lifecycle edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: Status,
    pub to: Status,
}

impl Display for InvalidTransition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "relationship cannot move from `{}` to `{}`",
            self.from.as_str(),
            self.to.as_str()
        )
    }
}

impl Error for InvalidTransition {}

/// Join record binding one user, one team, one role and one status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub uuid: RelationshipId,
    pub user: UserId,
    pub team: TeamId,
    pub role: Role,
    pub status: Status,
}

impl Relationship {
    /// Creates a relationship in its initial status.
    pub fn new(user: UserId, team: TeamId, role: Role, status: Status) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            user,
            team,
            role,
            status,
        }
    }

    /// Moves the relationship to `next` when the edge is allowed.
    pub fn transition(&mut self, next: Status) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }

    /// Active owner of its team.
    pub fn is_active_owner(&self) -> bool {
        self.role == Role::Owner && self.is_active()
    }
}
