//! Student Dropout Risk Service
//!
//! Ingests labeled student records, periodically retrains a binary
//! dropout-risk classifier, and serves predictions over HTTP.

pub mod api;
pub mod commands;
pub mod ingest;
pub mod predictor;
pub mod scheduler;
pub mod trainer;
