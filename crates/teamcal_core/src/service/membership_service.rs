//! Team membership use-case service.
//!
//! # Responsibility
//! - Drive relationship lifecycle: create team, join, invite, respond,
//!   review and leave.
//! - Re-verify caller authority on every status-changing call.
//! - Provide dashboard, invite and settings read models.
//!
//! # Invariants
//! - Team creation yields exactly one relationship: creator, Owner, active.
//! - Join requests start `pending`; public teams promote them to `active`
//!   before the single write.
//! - Only an active Owner of the same team reviews pending requests.
//! - Removing the last relationship deletes the team in the same transaction.
//! - A team with other relationships always keeps an active Owner.

use crate::model::membership::{
    InvalidTransition, Relationship, RelationshipId, ReviewDecision, Role, Status,
};
use crate::model::team::{Team, TeamId, TeamValidationError};
use crate::model::user::{User, UserId};
use crate::repo::relationship_repo::{
    RelationshipQuery, RelationshipRemoval, RelationshipRepository,
};
use crate::repo::team_repo::TeamRepository;
use crate::repo::user_repo::UserRepository;
use crate::repo::{EntityRef, RepoError};
use log::{info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from membership use-cases.
#[derive(Debug)]
pub enum MembershipError {
    InvalidTeam(TeamValidationError),
    TeamNameTaken(String),
    UserNotFound(UserId),
    TeamNotFound(TeamId),
    RelationshipNotFound(RelationshipId),
    /// Caller has no relationship with the team.
    MembershipNotFound { user: UserId, team: TeamId },
    /// The pair already has a relationship in `status`.
    AlreadyRelated { team: TeamId, status: Status },
    PermissionDenied { user: UserId, action: &'static str },
    /// Leaving would strand remaining members without an active Owner.
    OwnerRequired { team: TeamId },
    InvalidTransition(InvalidTransition),
    Repo(RepoError),
}

impl Display for MembershipError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTeam(err) => write!(f, "{err}"),
            Self::TeamNameTaken(name) => write!(f, "team name `{name}` is taken"),
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::TeamNotFound(id) => write!(f, "team not found: {id}"),
            Self::RelationshipNotFound(id) => write!(f, "relationship not found: {id}"),
            Self::MembershipNotFound { user, team } => {
                write!(f, "user {user} has no relationship with team {team}")
            }
            Self::AlreadyRelated { team, status } => write!(
                f,
                "user already has a `{}` relationship with team {team}",
                status.as_str()
            ),
            Self::PermissionDenied { user, action } => {
                write!(f, "user {user} is not allowed to {action}")
            }
            Self::OwnerRequired { team } => {
                write!(f, "team {team} would be left without an active owner")
            }
            Self::InvalidTransition(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MembershipError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidTeam(err) => Some(err),
            Self::InvalidTransition(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for MembershipError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::InvalidTeam(err) => Self::InvalidTeam(err),
            RepoError::NotFound(EntityRef::User(id)) => Self::UserNotFound(id),
            RepoError::NotFound(EntityRef::Team(id)) => Self::TeamNotFound(id),
            RepoError::NotFound(EntityRef::Relationship(id)) => Self::RelationshipNotFound(id),
            RepoError::NotFound(EntityRef::Membership { user, team }) => {
                Self::MembershipNotFound { user, team }
            }
            other => Self::Repo(other),
        }
    }
}

impl From<TeamValidationError> for MembershipError {
    fn from(value: TeamValidationError) -> Self {
        Self::InvalidTeam(value)
    }
}

impl From<InvalidTransition> for MembershipError {
    fn from(value: InvalidTransition) -> Self {
        Self::InvalidTransition(value)
    }
}

/// A relationship together with its team, for listing screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamMembership {
    pub team: Team,
    pub relationship: Relationship,
}

/// Teams overview for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamsDashboard {
    /// Active memberships ordered by case-folded team name.
    pub memberships: Vec<TeamMembership>,
    /// Number of invitations waiting for this user.
    pub invite_count: u32,
}

/// Owner-only settings read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamSettings {
    pub team: Team,
    pub pending_requests: Vec<Relationship>,
}

/// Membership service facade over user, team and relationship repositories.
pub struct MembershipService<U, T, R>
where
    U: UserRepository,
    T: TeamRepository,
    R: RelationshipRepository,
{
    users: U,
    teams: T,
    relationships: R,
}

impl<U, T, R> MembershipService<U, T, R>
where
    U: UserRepository,
    T: TeamRepository,
    R: RelationshipRepository,
{
    pub fn new(users: U, teams: T, relationships: R) -> Self {
        Self {
            users,
            teams,
            relationships,
        }
    }

    /// Creates a team and makes `creator` its active Owner.
    ///
    /// Both rows are written in one transaction.
    pub fn create_team(
        &self,
        creator: UserId,
        name: &str,
        private: bool,
    ) -> Result<(Team, Relationship), MembershipError> {
        self.require_user(creator)?;
        let team = Team::new(name, private)?;
        if self.teams.find_team_by_name(&team.name)?.is_some() {
            return Err(MembershipError::TeamNameTaken(team.name));
        }

        let owner = Relationship::new(creator, team.uuid, Role::Owner, Status::Active);
        self.teams
            .create_team_with_owner(&team, &owner)
            .map_err(|err| match err {
                // Only the team row reports `Conflict`; a missing owner is `NotFound`.
                RepoError::Conflict(_) => MembershipError::TeamNameTaken(team.name.clone()),
                other => other.into(),
            })?;

        info!(
            "event=team_create module=membership status=ok team_id={} user_id={} private={}",
            team.uuid, creator, team.private
        );
        Ok((team, owner))
    }

    /// Asks to join `team` with `role`.
    ///
    /// Private teams leave the request `pending` for owner review; public
    /// teams approve it immediately. Requesting `Owner` is denied.
    pub fn request_to_join(
        &self,
        user: UserId,
        team: TeamId,
        role: Role,
    ) -> Result<Relationship, MembershipError> {
        self.require_user(user)?;
        let team = self.require_team(team)?;
        if role == Role::Owner {
            return Err(self.deny(user, "request the Owner role"));
        }
        self.ensure_unrelated(user, team.uuid)?;

        let mut relationship = Relationship::new(user, team.uuid, role, Status::Pending);
        if !team.private {
            relationship.transition(Status::Active)?;
        }
        self.relationships.create_relationship(&relationship)?;

        info!(
            "event=team_join module=membership status=ok team_id={} user_id={} result={}",
            team.uuid,
            user,
            relationship.status.as_str()
        );
        Ok(relationship)
    }

    /// Invites `target` into `team` with `role`.
    ///
    /// The inviter must be an active member; only active Owners may invite
    /// another Owner.
    pub fn invite(
        &self,
        inviter: UserId,
        team: TeamId,
        target: UserId,
        role: Role,
    ) -> Result<Relationship, MembershipError> {
        let team = self.require_team(team)?;
        let inviter_rel = self
            .relationships
            .find_relationship(inviter, team.uuid)?
            .filter(Relationship::is_active)
            .ok_or_else(|| self.deny(inviter, "invite into this team"))?;
        if role == Role::Owner && !inviter_rel.is_active_owner() {
            return Err(self.deny(inviter, "invite an Owner"));
        }
        self.require_user(target)?;
        self.ensure_unrelated(target, team.uuid)?;

        let relationship = Relationship::new(target, team.uuid, role, Status::Invited);
        self.relationships.create_relationship(&relationship)?;

        info!(
            "event=team_invite module=membership status=ok team_id={} inviter_id={} user_id={}",
            team.uuid, inviter, target
        );
        Ok(relationship)
    }

    /// Accepts or declines an invitation addressed to `user`.
    pub fn respond_to_invite(
        &self,
        user: UserId,
        relationship: RelationshipId,
        accept: bool,
    ) -> Result<Relationship, MembershipError> {
        let mut relationship = self.require_relationship(relationship)?;
        if relationship.user != user {
            return Err(self.deny(user, "answer another user's invitation"));
        }
        let target = if accept {
            Status::Active
        } else {
            Status::Nonactive
        };
        if relationship.status != Status::Invited {
            return Err(InvalidTransition {
                from: relationship.status,
                to: target,
            }
            .into());
        }

        self.apply_transition(&mut relationship, target)?;
        Ok(relationship)
    }

    /// Owner decision on a pending join request.
    ///
    /// The caller must hold an active Owner relationship on the same team.
    pub fn review_request(
        &self,
        caller: UserId,
        relationship: RelationshipId,
        decision: ReviewDecision,
    ) -> Result<Relationship, MembershipError> {
        let mut relationship = self.require_relationship(relationship)?;
        let is_owner = self
            .relationships
            .find_relationship(caller, relationship.team)?
            .is_some_and(|rel| rel.is_active_owner());
        if !is_owner {
            return Err(self.deny(caller, "review join requests for this team"));
        }
        let target = decision.target_status();
        if relationship.status != Status::Pending {
            return Err(InvalidTransition {
                from: relationship.status,
                to: target,
            }
            .into());
        }

        self.apply_transition(&mut relationship, target)?;
        Ok(relationship)
    }

    /// Deletes a relationship and deletes its team if it was the last one.
    ///
    /// Users may remove their own relationship; active Owners may remove
    /// any relationship of their team. The last active Owner may only go
    /// when nobody else is related to the team.
    pub fn leave_team(
        &self,
        caller: UserId,
        relationship: RelationshipId,
    ) -> Result<RelationshipRemoval, MembershipError> {
        let relationship = self.require_relationship(relationship)?;
        if relationship.user != caller {
            let is_owner = self
                .relationships
                .find_relationship(caller, relationship.team)?
                .is_some_and(|rel| rel.is_active_owner());
            if !is_owner {
                return Err(self.deny(caller, "remove another member"));
            }
        }

        if relationship.is_active_owner() {
            self.ensure_other_owner(&relationship)?;
        }

        let removal = self.relationships.remove_relationship(relationship.uuid)?;
        info!(
            "event=team_leave module=membership status=ok team_id={} user_id={} team_deleted={}",
            removal.relationship.team, removal.relationship.user, removal.team_deleted
        );
        Ok(removal)
    }

    /// Settings page model, visible to active Owners only.
    pub fn team_settings(
        &self,
        caller: UserId,
        team: TeamId,
    ) -> Result<TeamSettings, MembershipError> {
        let team = self.require_team(team)?;
        let caller_rel = self
            .relationships
            .find_relationship(caller, team.uuid)?
            .ok_or(MembershipError::MembershipNotFound {
                user: caller,
                team: team.uuid,
            })?;
        if !caller_rel.is_active_owner() {
            return Err(self.deny(caller, "open team settings"));
        }

        let pending_query = RelationshipQuery::for_team(team.uuid).with_status(Status::Pending);
        let pending_requests = self.relationships.list_relationships(&pending_query)?;
        Ok(TeamSettings {
            team,
            pending_requests,
        })
    }

    /// Active memberships and pending invitation count for `user`.
    pub fn teams_dashboard(&self, user: UserId) -> Result<TeamsDashboard, MembershipError> {
        let memberships =
            self.memberships(&RelationshipQuery::for_user(user).with_status(Status::Active))?;
        let invite_count = self
            .relationships
            .count_relationships(&RelationshipQuery::for_user(user).with_status(Status::Invited))?;
        Ok(TeamsDashboard {
            memberships,
            invite_count,
        })
    }

    /// Invitations waiting for `user`.
    pub fn list_invites(&self, user: UserId) -> Result<Vec<TeamMembership>, MembershipError> {
        self.memberships(&RelationshipQuery::for_user(user).with_status(Status::Invited))
    }

    /// Teams `user` has no relationship with, in case-folded name order.
    pub fn joinable_teams(&self, user: UserId) -> Result<Vec<Team>, MembershipError> {
        let related: HashSet<TeamId> = self
            .relationships
            .list_relationships(&RelationshipQuery::for_user(user))?
            .into_iter()
            .map(|rel| rel.team)
            .collect();
        Ok(self
            .teams
            .list_teams()?
            .into_iter()
            .filter(|team| !related.contains(&team.uuid))
            .collect())
    }

    fn memberships(
        &self,
        query: &RelationshipQuery,
    ) -> Result<Vec<TeamMembership>, MembershipError> {
        self.relationships
            .list_relationships(query)?
            .into_iter()
            .map(|relationship| {
                let team = self.require_team(relationship.team)?;
                Ok(TeamMembership { team, relationship })
            })
            .collect()
    }

    fn apply_transition(
        &self,
        relationship: &mut Relationship,
        target: Status,
    ) -> Result<(), MembershipError> {
        let from = relationship.status;
        relationship.transition(target)?;
        self.relationships
            .update_status(relationship.uuid, from, target)?;
        info!(
            "event=membership_transition module=membership status=ok relationship_id={} from={} to={}",
            relationship.uuid,
            from.as_str(),
            target.as_str()
        );
        Ok(())
    }

    fn ensure_other_owner(&self, leaving: &Relationship) -> Result<(), MembershipError> {
        let team_query = RelationshipQuery::for_team(leaving.team);
        let owners = self.relationships.count_relationships(
            &team_query
                .clone()
                .with_status(Status::Active)
                .with_role(Role::Owner),
        )?;
        let related = self.relationships.count_relationships(&team_query)?;
        if owners <= 1 && related > 1 {
            warn!(
                "event=team_leave module=membership status=denied team_id={} user_id={} reason=last_owner",
                leaving.team, leaving.user
            );
            return Err(MembershipError::OwnerRequired { team: leaving.team });
        }
        Ok(())
    }

    fn ensure_unrelated(&self, user: UserId, team: TeamId) -> Result<(), MembershipError> {
        match self.relationships.find_relationship(user, team)? {
            Some(existing) => Err(MembershipError::AlreadyRelated {
                team,
                status: existing.status,
            }),
            None => Ok(()),
        }
    }

    fn require_user(&self, id: UserId) -> Result<User, MembershipError> {
        self.users
            .get_user(id)?
            .ok_or(MembershipError::UserNotFound(id))
    }

    fn require_team(&self, id: TeamId) -> Result<Team, MembershipError> {
        self.teams
            .get_team(id)?
            .ok_or(MembershipError::TeamNotFound(id))
    }

    fn require_relationship(&self, id: RelationshipId) -> Result<Relationship, MembershipError> {
        self.relationships
            .get_relationship(id)?
            .ok_or(MembershipError::RelationshipNotFound(id))
    }

    fn deny(&self, user: UserId, action: &'static str) -> MembershipError {
        warn!("event=membership_denied module=membership status=denied user_id={user} action=\"{action}\"");
        MembershipError::PermissionDenied { user, action }
    }
}
