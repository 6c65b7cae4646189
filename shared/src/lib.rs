//! Plumbing shared by every crate in the workspace: metric definitions,
//! the HTTP accept loop and the admin (health/readiness) service.

pub mod admin_service;
pub mod http;
pub mod metrics_defs;
