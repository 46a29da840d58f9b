//! # GBP Sync Library
//!
//! Core functionality for the Google Business Profile sync service: the
//! provider adapter, payload normalization, transactional commit, progress
//! broadcasting, dashboard caching, and the orchestrator and queue executor
//! that tie them together.

pub mod cache;
pub mod committer;
pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod models;
pub mod normalization;
pub mod orchestrator;
pub mod progress;
pub mod provider;
pub mod repositories;
pub mod retry;
pub mod server;
pub mod telemetry;
pub use migration;
