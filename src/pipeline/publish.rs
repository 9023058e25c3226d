//! Render, write and publish changed product pages.
//!
//! Candidates are split into batches up front. Every batch renders its pages
//! under the run-wide render permits and submits the changed ones as soon as
//! its own renders are done, so early batches reach the admin API while later
//! ones are still rendering. Each finished batch is applied to the locale
//! state and the state is saved before the next one is looked at.

use std::collections::HashMap;

use chrono::Utc;
use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::models::{BatchResult, Candidate, LocaleState, PublishRecord, RunCounters, SkuState};
use crate::pipeline::LocaleContext;
use crate::storage::artifact_key;
use crate::utils::content_hash;

/// What happened to one render candidate.
#[derive(Debug)]
enum Rendered {
    /// Content differs from what was last published and the artifact is written
    Changed(Candidate),
    /// Same hash as before, or the artifact could not be written
    Unchanged,
    Failed,
}

async fn render_candidate(
    ctx: &LocaleContext<'_>,
    permits: &Semaphore,
    mut candidate: Candidate,
) -> Rendered {
    let Ok(_permit) = permits.acquire().await else {
        return Rendered::Failed;
    };

    let url_key = candidate.url_key.as_deref().unwrap_or_default();
    let html = match ctx
        .services
        .renderer
        .render(ctx.locale, &candidate.sku, url_key)
        .await
    {
        Ok(html) => html,
        Err(e) => {
            log::error!("Error generating product HTML for SKU {}: {}", candidate.sku, e);
            return Rendered::Failed;
        }
    };

    candidate.rendered_at = Some(Utc::now());
    candidate.new_hash = Some(content_hash(&html));

    if candidate.content_changed() {
        let key = artifact_key(&ctx.settings.artifact_prefix, &candidate.path);
        match ctx.services.storage.write(&key, html.as_bytes()).await {
            Ok(()) => log::debug!("Saved HTML for product {} to {}", candidate.sku, key),
            Err(e) => {
                log::error!("Error saving HTML for product {}: {}", candidate.sku, e);
                candidate.new_hash = None;
            }
        }
    }

    if candidate.content_changed() {
        Rendered::Changed(candidate)
    } else {
        Rendered::Unchanged
    }
}

/// Apply one batch result to the state.
///
/// A gateway error fails the whole batch; records the gateway did not
/// report on count as failed.
fn apply_batch(
    state: &mut LocaleState,
    batch: &[Candidate],
    result: Result<BatchResult>,
) -> RunCounters {
    let mut counters = RunCounters::default();
    let result = match result {
        Ok(result) => result,
        Err(e) => {
            log::error!("Publish batch of {} products failed: {}", batch.len(), e);
            counters.failed = batch.len();
            return counters;
        }
    };

    let records: HashMap<&str, _> = result
        .records
        .iter()
        .map(|r| (r.sku.as_str(), r))
        .collect();

    for candidate in batch {
        match records.get(candidate.sku.as_str()) {
            Some(record) if record.is_published() => {
                let at = record
                    .rendered_at
                    .or(candidate.rendered_at)
                    .or(record.previewed_at)
                    .unwrap_or_else(Utc::now);
                let hash = candidate.new_hash.clone().unwrap_or_default();
                state.skus.insert(candidate.sku.clone(), SkuState::published(at, hash));
                counters.published += 1;
            }
            _ => counters.failed += 1,
        }
    }
    counters
}

/// Render counters of one batch and the publish result of its changed pages.
struct BatchOutcome {
    counters: RunCounters,
    submitted: Option<(Vec<Candidate>, Result<BatchResult>)>,
}

async fn render_and_publish(
    ctx: &LocaleContext<'_>,
    permits: &Semaphore,
    batch_number: usize,
    batch: Vec<Candidate>,
) -> BatchOutcome {
    let rendered = join_all(
        batch
            .into_iter()
            .map(|candidate| render_candidate(ctx, permits, candidate)),
    )
    .await;

    let mut counters = RunCounters::default();
    let mut changed = Vec::new();
    for outcome in rendered {
        match outcome {
            Rendered::Changed(candidate) => changed.push(candidate),
            Rendered::Unchanged => counters.ignored += 1,
            Rendered::Failed => counters.failed += 1,
        }
    }

    if changed.is_empty() {
        log::debug!(
            "Batch {} of locale {} has no content changes",
            batch_number,
            ctx.locale_name()
        );
        return BatchOutcome {
            counters,
            submitted: None,
        };
    }

    let records: Vec<PublishRecord> = changed
        .iter()
        .map(|c| PublishRecord {
            sku: c.sku.clone(),
            path: c.path.clone(),
            rendered_at: c.rendered_at,
        })
        .collect();
    let result = ctx
        .services
        .admin
        .preview_and_publish(&records, ctx.locale, batch_number)
        .await;

    BatchOutcome {
        counters,
        submitted: Some((changed, result)),
    }
}

/// Render candidates and publish the ones whose content changed.
pub async fn publish_changed(
    ctx: &LocaleContext<'_>,
    state: &mut LocaleState,
    candidates: Vec<Candidate>,
    render_permits: &Semaphore,
) -> RunCounters {
    let mut counters = RunCounters::default();
    if candidates.is_empty() {
        return counters;
    }

    let batches: Vec<Vec<Candidate>> = candidates
        .chunks(ctx.settings.batch_size.max(1))
        .map(<[Candidate]>::to_vec)
        .collect();
    log::info!(
        "Rendering {} products in {} batches for locale {}",
        candidates.len(),
        batches.len(),
        ctx.locale_name()
    );

    let mut pending: FuturesUnordered<_> = batches
        .into_iter()
        .enumerate()
        .map(|(index, batch)| render_and_publish(ctx, render_permits, index + 1, batch))
        .collect();

    while let Some(outcome) = pending.next().await {
        counters += outcome.counters;
        let Some((batch, result)) = outcome.submitted else {
            continue;
        };
        counters += apply_batch(state, &batch, result);
        if let Err(e) = ctx.states.save(state).await {
            log::error!(
                "Failed to save state for locale {}: {}",
                ctx.locale_name(),
                e
            );
        }
    }

    counters
}
