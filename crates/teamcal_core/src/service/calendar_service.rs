//! Calendar view composition for one team or all of a user's teams.
//!
//! # Responsibility
//! - Combine the month grid with aggregated member absences.
//! - Resolve team context (requester relationship, member count, invite
//!   candidates) for team calendars.
//!
//! # Invariants
//! - Team calendars list only `active` members.
//! - The all-teams calendar starts with the requester and adds every other
//!   active member of each related team once, in first-seen order.
//! - The month is always supplied by the caller; nothing is cached.

use crate::calendar::absences::{aggregate_absences, SubjectAbsences};
use crate::calendar::grid::{build_grid, CalendarGrid, CalendarQuery};
use crate::calendar::CalendarError;
use crate::config::CoreConfig;
use crate::model::membership::{Relationship, Status};
use crate::model::team::{Team, TeamId};
use crate::model::user::{User, UserId};
use crate::repo::absence_repo::AbsenceRepository;
use crate::repo::relationship_repo::{RelationshipQuery, RelationshipRepository};
use crate::repo::team_repo::TeamRepository;
use crate::repo::user_repo::UserRepository;
use crate::repo::RepoError;
use log::info;
use serde::Serialize;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Errors from calendar view composition.
#[derive(Debug)]
pub enum CalendarServiceError {
    Calendar(CalendarError),
    TeamNotFound(TeamId),
    UserNotFound(UserId),
    /// Requester has no relationship with the team.
    MembershipNotFound { user: UserId, team: TeamId },
}

impl Display for CalendarServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Calendar(err) => write!(f, "{err}"),
            Self::TeamNotFound(id) => write!(f, "team not found: {id}"),
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::MembershipNotFound { user, team } => {
                write!(f, "user {user} has no relationship with team {team}")
            }
        }
    }
}

impl Error for CalendarServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Calendar(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CalendarError> for CalendarServiceError {
    fn from(value: CalendarError) -> Self {
        Self::Calendar(value)
    }
}

impl From<RepoError> for CalendarServiceError {
    fn from(value: RepoError) -> Self {
        Self::Calendar(CalendarError::Repo(value))
    }
}

/// Team-only part of a calendar view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamContext {
    pub team: Team,
    /// Users with no relationship of any status with the team.
    pub all_users: Vec<User>,
    /// Number of active relationships.
    pub team_count: u32,
    /// The requester's own relationship with the team.
    pub current_user: Relationship,
}

/// Calendar view model handed to the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarView<S> {
    #[serde(flatten)]
    pub grid: CalendarGrid,
    pub absence_dates: Vec<SubjectAbsences<S>>,
    #[serde(flatten)]
    pub team: Option<TeamContext>,
}

/// Team calendar: one row per active relationship.
pub type TeamCalendarView = CalendarView<Relationship>;
/// All-teams calendar: one row per distinct colleague.
pub type AllTeamsCalendarView = CalendarView<User>;

/// Calendar view service over all four repositories.
pub struct CalendarService<U, T, R, A>
where
    U: UserRepository,
    T: TeamRepository,
    R: RelationshipRepository,
    A: AbsenceRepository,
{
    users: U,
    teams: T,
    relationships: R,
    absences: A,
    config: CoreConfig,
}

impl<U, T, R, A> CalendarService<U, T, R, A>
where
    U: UserRepository,
    T: TeamRepository,
    R: RelationshipRepository,
    A: AbsenceRepository,
{
    pub fn new(users: U, teams: T, relationships: R, absences: A, config: CoreConfig) -> Self {
        Self {
            users,
            teams,
            relationships,
            absences,
            config,
        }
    }

    /// Calendar of one team's active members for the requested month.
    ///
    /// Fails with `TeamNotFound` for unknown teams and `MembershipNotFound`
    /// when `requester` has no relationship with the team.
    pub fn team_calendar(
        &self,
        requester: UserId,
        team: TeamId,
        query: &CalendarQuery,
    ) -> Result<TeamCalendarView, CalendarServiceError> {
        let started_at = Instant::now();
        let grid = build_grid(query, self.config.navigation)?;
        let team = self
            .teams
            .get_team(team)?
            .ok_or(CalendarServiceError::TeamNotFound(team))?;
        let current_user = self
            .relationships
            .find_relationship(requester, team.uuid)?
            .ok_or(CalendarServiceError::MembershipNotFound {
                user: requester,
                team: team.uuid,
            })?;

        let active_query = RelationshipQuery::for_team(team.uuid).with_status(Status::Active);
        let members = self.relationships.list_relationships(&active_query)?;
        let absence_dates =
            aggregate_absences(&self.absences, &members, self.config.max_absence_span_days)?;
        let team_count = self.relationships.count_relationships(&active_query)?;

        let related: HashSet<UserId> = self
            .relationships
            .list_relationships(&RelationshipQuery::for_team(team.uuid))?
            .into_iter()
            .map(|rel| rel.user)
            .collect();
        let all_users = self
            .users
            .list_users()?
            .into_iter()
            .filter(|user| !related.contains(&user.uuid))
            .collect();

        info!(
            "event=calendar_team module=calendar status=ok team_id={} user_id={} members={} duration_ms={}",
            team.uuid,
            requester,
            members.len(),
            started_at.elapsed().as_millis()
        );
        Ok(CalendarView {
            grid,
            absence_dates,
            team: Some(TeamContext {
                team,
                all_users,
                team_count,
                current_user,
            }),
        })
    }

    /// Merged calendar of the requester and every colleague across teams.
    pub fn all_teams_calendar(
        &self,
        requester: UserId,
        query: &CalendarQuery,
    ) -> Result<AllTeamsCalendarView, CalendarServiceError> {
        let started_at = Instant::now();
        let grid = build_grid(query, self.config.navigation)?;
        let colleagues = self.colleagues_of(requester)?;
        let absence_dates =
            aggregate_absences(&self.absences, &colleagues, self.config.max_absence_span_days)?;

        info!(
            "event=calendar_all module=calendar status=ok user_id={} subjects={} duration_ms={}",
            requester,
            colleagues.len(),
            started_at.elapsed().as_millis()
        );
        Ok(CalendarView {
            grid,
            absence_dates,
            team: None,
        })
    }

    /// Requester first, then other active members of each related team.
    fn colleagues_of(&self, requester: UserId) -> Result<Vec<User>, CalendarServiceError> {
        let me = self
            .users
            .get_user(requester)?
            .ok_or(CalendarServiceError::UserNotFound(requester))?;
        let mut seen = HashSet::from([me.uuid]);
        let mut colleagues = vec![me];

        for relation in self
            .relationships
            .list_relationships(&RelationshipQuery::for_user(requester))?
        {
            let active_query =
                RelationshipQuery::for_team(relation.team).with_status(Status::Active);
            for member in self.relationships.list_relationships(&active_query)? {
                if !seen.insert(member.user) {
                    continue;
                }
                let user = self
                    .users
                    .get_user(member.user)?
                    .ok_or(CalendarServiceError::UserNotFound(member.user))?;
                colleagues.push(user);
            }
        }

        Ok(colleagues)
    }
}
