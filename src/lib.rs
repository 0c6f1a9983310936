//! # Reportflow
//!
//! Imports unit-test reports and source-analysis results into a measurement
//! store.
//!
//! - [`report`] locates report files and decodes them,
//! - [`transform`] converts vendor test formats into the canonical xUnit form
//!   using declarative rule sets,
//! - [`xunit`] parses canonical reports and aggregates test statistics,
//! - [`bridge`] turns statistics, metrics and issues into [`sink`] calls,
//! - [`compilation`] extracts compiler settings from compilation databases and
//!   build logs.
//!
//! Whether a failing report or sink call aborts the run is decided by a single
//! [`recovery::RecoveryPolicy`].

pub mod analysis;
pub mod bridge;
pub mod cli;
pub mod compilation;
pub mod config;
pub mod error;
pub mod issues;
pub mod metrics;
pub mod recovery;
pub mod report;
pub mod shared;
pub mod sink;
pub mod transform;
pub mod xunit;

pub use config::ReportflowConfig;
pub use error::{ReportError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
