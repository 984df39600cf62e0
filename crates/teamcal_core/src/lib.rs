//! Core domain logic for the team absence planner.
//! This crate is the single source of truth for membership and calendar
//! invariants.

pub mod calendar;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use calendar::absences::{aggregate_absences, AbsenceEntry, AbsenceSubject, SubjectAbsences};
pub use calendar::grid::{build_grid, CalendarGrid, CalendarQuery, NavigationPolicy};
pub use calendar::CalendarError;
pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::absence::{Absence, AbsenceId, AbsenceValidationError};
pub use model::membership::{Relationship, RelationshipId, ReviewDecision, Role, Status};
pub use model::team::{Team, TeamId, TeamValidationError};
pub use model::user::{User, UserId};
pub use repo::absence_repo::{AbsenceRepository, SqliteAbsenceRepository};
pub use repo::relationship_repo::{
    RelationshipQuery, RelationshipRemoval, RelationshipRepository, SqliteRelationshipRepository,
};
pub use repo::team_repo::{SqliteTeamRepository, TeamRepository};
pub use repo::user_repo::{SqliteUserRepository, UserRepository};
pub use repo::{EntityRef, RepoError, RepoResult};
pub use service::absence_service::{AbsenceError, AbsenceService};
pub use service::calendar_service::{
    AllTeamsCalendarView, CalendarService, CalendarServiceError, CalendarView, TeamCalendarView,
    TeamContext,
};
pub use service::membership_service::{
    MembershipError, MembershipService, TeamMembership, TeamSettings, TeamsDashboard,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
