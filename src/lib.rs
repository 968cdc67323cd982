//! Lead-capture and admin-aggregation backend for the marketing site.
//!
//! Public form submissions (newsletter, contact, AI assessment, ROI
//! calculator, consultation bookings) are validated, scored where the
//! endpoint derives values, and persisted as leads in the document store;
//! an admin surface aggregates and deletes them.

pub mod api;
pub mod config;
pub mod error;
pub mod notifier;
pub mod rate_limit;
pub mod scoring;
pub mod server;
pub mod store;
pub mod validator;
