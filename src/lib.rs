//! Forensic evidence console
//!
//! Presentation layer for a forensic evidence-acquisition API: keeps job
//! snapshots fresh by polling, gates report download and integrity
//! re-verification on job status, and serves dashboard, evidence detail and
//! settings views over HTTP.

pub mod app_state;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
