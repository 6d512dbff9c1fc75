//! Atrium Engine Library
//!
//! This library provides the core functionality of the Atrium host.
//! It is used by both the main binary and integration tests.

/// Application assembly module
pub mod app;

/// CLI interface module
pub mod cli;

/// Configuration management module
pub mod config;

/// Dev console administrative endpoints
pub mod devconsole;

/// Asset and funcmap injection pipeline
pub mod injector;

/// Route recording and enable-gated dispatch
pub mod recorder;

/// Plugin registry module
pub mod registry;

/// Grant-checked site facade
pub mod secure;

/// Site document storage module
pub mod storage;

/// Telemetry and Observability
pub mod telemetry;

/// Plugin name and version validation
pub mod validate;
