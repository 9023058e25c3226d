//! One reconciliation pass over every configured locale.

use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::models::{
    Config, LocaleState, RunCounters, RunResult, RunState, Timings, aggregate, aggregate_measures,
};
use crate::pipeline::publish::publish_changed;
use crate::pipeline::unpublish::unpublish_deleted;
use crate::pipeline::{ChangeClassifier, LocaleContext};
use crate::services::Services;
use crate::storage::StateStore;

/// Counters and phase timings of one locale.
#[derive(Debug, Default)]
struct LocaleReport {
    counters: RunCounters,
    timings: Timings,
}

/// Reconciles catalog changes with published pages.
pub struct Poller {
    config: Config,
    services: Services,
    states: StateStore,
    render_permits: Semaphore,
}

impl Poller {
    pub fn new(config: Config, services: Services) -> Self {
        let states = StateStore::new(services.storage.clone(), config.poller.state_prefix.clone());
        let render_permits = Semaphore::new(config.poller.render_concurrency.max(1));
        Self {
            config,
            services,
            states,
            render_permits,
        }
    }

    pub fn states(&self) -> &StateStore {
        &self.states
    }

    /// Run one pass.
    ///
    /// Only configuration errors are returned; failures inside a locale are
    /// logged and reflected in the counters.
    pub async fn poll(&self) -> Result<RunResult> {
        self.config.check_params()?;
        self.config.validate()?;

        let run_timings = Timings::new();
        let locales = self.config.run_locales();
        log::info!(
            "Starting poll from {} for locales {:?}",
            self.config.site.store_url,
            locales
        );

        let admin = &self.services.admin;
        let mut status = RunCounters::default();
        let mut measures = Vec::with_capacity(locales.len());

        match admin.start_processing().await {
            Ok(()) => {
                let reports =
                    join_all(locales.iter().map(|locale| self.poll_locale(locale.as_deref()))).await;
                for report in reports {
                    status += report.counters;
                    measures.push(report.timings.into_measures());
                }
            }
            Err(e) => log::error!("Failed to start admin processing: {}", e),
        }

        // Drain the gateway even when a locale failed.
        if let Err(e) = admin.stop_processing().await {
            log::error!("Failed to stop admin processing: {}", e);
        }

        let mut timings = aggregate_measures(measures);
        timings.insert(
            "previewDuration".to_string(),
            aggregate(&admin.preview_durations()),
        );

        let elapsed = run_timings.elapsed_ms();
        log::info!(
            "Finished polling, elapsed: {}ms, published: {}, unpublished: {}, ignored: {}, failed: {}",
            elapsed,
            status.published,
            status.unpublished,
            status.ignored,
            status.failed
        );

        Ok(RunResult {
            state: RunState::Completed,
            elapsed,
            status,
            timings,
        })
    }

    async fn poll_locale(&self, locale: Option<&str>) -> LocaleReport {
        let ctx = LocaleContext {
            locale,
            services: &self.services,
            states: &self.states,
            settings: &self.config.poller,
        };
        log::info!("Polling for locale {}", ctx.locale_name());

        let mut report = LocaleReport::default();
        let mut state = self.states.load(locale).await;

        if let Err(e) = self.reconcile(&ctx, &mut state, &mut report).await {
            log::error!("Polling for locale {} aborted: {}", ctx.locale_name(), e);
        }

        if let Err(e) = self.states.save(&state).await {
            log::error!(
                "Failed to save state for locale {}: {}",
                ctx.locale_name(),
                e
            );
        }
        report
    }

    async fn reconcile(
        &self,
        ctx: &LocaleContext<'_>,
        state: &mut LocaleState,
        report: &mut LocaleReport,
    ) -> Result<()> {
        let classifier = ChangeClassifier::new(&self.config.site.product_page_url_format, ctx.locale);

        let products = self.services.catalog.fetch_all_skus(ctx.locale).await?;
        let discovered = classifier.discover(state, &products);
        log::debug!(
            "Discovered {} new products for locale {}",
            discovered,
            ctx.locale_name()
        );
        report.timings.sample("get-discovered-products");

        let known: Vec<String> = state.skus.keys().cloned().collect();
        let items = self
            .services
            .catalog
            .fetch_last_modified(ctx.locale, &known)
            .await?;
        let classification = classifier.classify(state, &items);
        drop(items);
        report.counters.ignored += classification.ignored;
        log::info!(
            "Locale {}: {} to render, {} to delete, {} ignored",
            ctx.locale_name(),
            classification.render.len(),
            classification.deleted.len(),
            classification.ignored
        );
        report.timings.sample("get-changed-products");

        report.counters +=
            publish_changed(ctx, state, classification.render, &self.render_permits).await;
        report.timings.sample("published-products");

        if classification.deleted.is_empty() {
            report.timings.sample_value("unpublished-products", 0.0);
        } else {
            report.counters += unpublish_deleted(ctx, state, classification.deleted).await;
            report.timings.sample("unpublished-products");
        }

        Ok(())
    }
}
