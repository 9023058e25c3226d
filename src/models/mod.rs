// src/models/mod.rs

//! Domain models for the change detector.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod batch;
mod config;
mod product;
mod state;
mod stats;

// Re-export all public types
pub use batch::{BatchRecord, BatchResult, PublishRecord, UnpublishRecord};
pub use config::{
    AdminConfig, CatalogConfig, Config, LoggingConfig, PollerConfig, RendererConfig, SiteConfig,
    StorageBackend, StorageConfig, parse_locales,
};
pub use product::{Candidate, CatalogItem, ProductRef};
pub use state::{LocaleState, SkuState, is_storable_sku, state_key};
pub use stats::{
    Aggregate, RunCounters, RunResult, RunState, Timings, aggregate, aggregate_measures,
};
