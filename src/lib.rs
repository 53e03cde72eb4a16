//! Editer server library
//!
//! HTTP plumbing, settings and SQLite storage around `editer-core`.

pub mod api;
pub mod config;
pub mod db;

pub use config::{Config, ConfigError};
