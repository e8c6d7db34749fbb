//! Meteo Sync - polling and reconciliation client for the weather station dashboard
//!
//! This library exposes the core modules for testing and reuse.

pub mod common;
pub mod config;
pub mod directory;
pub mod error;
pub mod routes;
pub mod series;
pub mod station;
pub mod sync;
pub mod view;
