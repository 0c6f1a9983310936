//! Helpers shared across the ingestion pipeline

pub mod glob;
