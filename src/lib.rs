//! Student progress reports for teachers: an in-memory report store with
//! template-based generation, a session mirror over an external identity
//! provider, and the navigation guard that gates views on sign-in state.

pub mod auth;
pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod models;
pub mod report;
pub mod router;
pub mod seed;
pub mod store;
pub mod strategy;
pub mod templates;
