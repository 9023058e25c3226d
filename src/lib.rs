//! Product catalog change detector.
//!
//! Detects changes in a product catalog and reconciles rendered product
//! pages with it through a content admin API, keeping per-locale state so
//! every run is incremental and safe to interrupt.

pub mod config;
pub mod error;
#[cfg(feature = "lambda")]
pub mod lambda;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
