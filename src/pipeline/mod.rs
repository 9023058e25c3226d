//! Reconciliation pipeline.
//!
//! - `classify`: split the catalog snapshot into render, delete and ignored sets
//! - `publish`: render changed pages and drive preview/publish batches
//! - `unpublish`: drive unpublish/delete batches for removed products
//! - `poller`: reconcile every locale and aggregate statistics
//! - `run`: the locked entry point used by the CLI and the lambda

pub mod classify;
pub mod poller;
pub mod publish;
pub mod run;
pub mod unpublish;

use crate::models::{PollerConfig, state_key};
use crate::services::Services;
use crate::storage::StateStore;

pub use classify::{ChangeClassifier, Classification, should_render};
pub use poller::Poller;
pub use run::{reset_locales, run};

/// What the per-locale stages share.
pub struct LocaleContext<'a> {
    pub locale: Option<&'a str>,
    pub services: &'a Services,
    pub states: &'a StateStore,
    pub settings: &'a PollerConfig,
}

impl LocaleContext<'_> {
    /// Locale name for logs.
    pub fn locale_name(&self) -> &str {
        state_key(self.locale)
    }
}
