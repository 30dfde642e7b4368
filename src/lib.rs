//! Task orchestration for pluggable instrument providers.
//!
//! Enrolment, validation, verification and notification jobs run against a
//! remotely stored per-learner model. Enrolment mutates the model under a
//! lock owned by the storage API; results a provider cannot produce right
//! away are reconciled later through notification callbacks.

pub mod app_state;
pub mod config;
pub mod models;
pub mod provider;
pub mod routes;
pub mod services;
pub mod tasks;
