//! Domain model for teams, memberships and absences.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Own the membership lifecycle rules (`Status` transitions).
//!
//! # Invariants
//! - Every domain object is identified by a stable UUID.
//! - A `Relationship` status only moves along `Status::can_transition_to`.
//! - An `Absence` never ends before it starts.

pub mod absence;
pub mod membership;
pub mod team;
pub mod user;
