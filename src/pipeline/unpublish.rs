//! Unpublish products that left the catalog.

use std::collections::HashMap;

use futures::stream::{FuturesUnordered, StreamExt};

use crate::error::Result;
use crate::models::{BatchResult, LocaleState, RunCounters, UnpublishRecord};
use crate::pipeline::LocaleContext;
use crate::storage::artifact_key;

/// Apply one unpublish batch result to the state, removing artifacts of
/// unpublished pages.
async fn apply_batch(
    ctx: &LocaleContext<'_>,
    state: &mut LocaleState,
    batch: &[UnpublishRecord],
    result: Result<BatchResult>,
) -> RunCounters {
    let mut counters = RunCounters::default();
    let result = match result {
        Ok(result) => result,
        Err(e) => {
            log::error!("Unpublish batch of {} products failed: {}", batch.len(), e);
            counters.failed = batch.len();
            return counters;
        }
    };

    let records: HashMap<&str, _> = result
        .records
        .iter()
        .map(|r| (r.sku.as_str(), r))
        .collect();

    for input in batch {
        match records.get(input.sku.as_str()) {
            Some(record) if record.is_unpublished() => {
                let key = artifact_key(&ctx.settings.artifact_prefix, &input.path);
                match ctx.services.storage.delete(&key).await {
                    Ok(()) => log::debug!("Deleted HTML file for product {} from {}", input.sku, key),
                    Err(e) => log::error!("Error deleting HTML file for product {}: {}", input.sku, e),
                }
                state.skus.remove(&input.sku);
                counters.unpublished += 1;
            }
            _ => counters.failed += 1,
        }
    }
    counters
}

/// Unpublish delete candidates whose published path is known.
///
/// Candidates missing from the published index that were never rendered
/// are dropped from the state. Rendered ones stay for a later run.
pub async fn unpublish_deleted(
    ctx: &LocaleContext<'_>,
    state: &mut LocaleState,
    deleted: Vec<String>,
) -> RunCounters {
    let mut counters = RunCounters::default();
    if deleted.is_empty() {
        return counters;
    }

    let index = match ctx.services.index.published_paths(ctx.locale).await {
        Ok(index) => index,
        Err(e) => {
            log::error!(
                "Error processing deleted products for locale {}: {}",
                ctx.locale_name(),
                e
            );
            return counters;
        }
    };

    let mut records = Vec::new();
    let mut unresolved = 0;
    for sku in deleted {
        match index.lookup_published_path(&sku) {
            Some(path) => records.push(UnpublishRecord {
                path: path.to_string(),
                sku,
            }),
            None => {
                let never_rendered = state
                    .skus
                    .get(&sku)
                    .is_some_and(|entry| entry.content_hash.is_none());
                if never_rendered {
                    state.skus.remove(&sku);
                } else {
                    unresolved += 1;
                }
            }
        }
    }

    if unresolved > 0 {
        log::warn!(
            "{} deleted products of locale {} have no published path, keeping them",
            unresolved,
            ctx.locale_name()
        );
    }
    if records.is_empty() {
        return counters;
    }

    let batches: Vec<Vec<UnpublishRecord>> = records
        .chunks(ctx.settings.batch_size.max(1))
        .map(<[UnpublishRecord]>::to_vec)
        .collect();
    log::info!(
        "Unpublishing {} products in {} batches for locale {}",
        records.len(),
        batches.len(),
        ctx.locale_name()
    );

    let mut pending: FuturesUnordered<_> = batches
        .into_iter()
        .enumerate()
        .map(|(index, batch)| async move {
            let result = ctx
                .services
                .admin
                .unpublish_and_delete(&batch, ctx.locale, index + 1)
                .await;
            (batch, result)
        })
        .collect();

    while let Some((batch, result)) = pending.next().await {
        counters += apply_batch(ctx, state, &batch, result).await;
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
