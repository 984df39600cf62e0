//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Enforce caller authority before any membership or absence write.
//! - Keep request/rendering layers decoupled from storage details.

pub mod absence_service;
pub mod calendar_service;
pub mod membership_service;
