//! API handlers for Gardisto.
//!
//! This module organizes the service's route handlers: authentication and
//! session management, administrative account operations, audit trail
//! queries, and the health endpoint.

pub mod audit;
pub mod auth;
pub mod health;
pub mod users;
