//! Sequential ISBN fallback chain.

use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::time::Instant;

use super::ChainSettings;
use crate::models::{AdapterOutcome, BookRecord, IsbnResolution, SourceAttempt};
use crate::sources::{Source, SourceError};

/// Consult `sources` in order and stop at the first match.
///
/// A source is only called after the previous one has finished; failures,
/// timeouts and panics all count as "no match" and move on to the next one.
pub(super) async fn run(
    sources: &[Arc<dyn Source>],
    isbn: &str,
    settings: &ChainSettings,
) -> IsbnResolution {
    let mut attempts = Vec::with_capacity(sources.len());

    for source in sources {
        let started = Instant::now();
        let result = lookup(source.as_ref(), isbn, settings).await;
        let outcome = AdapterOutcome::of_record(&result);
        let elapsed = started.elapsed();

        match &outcome {
            AdapterOutcome::Matched => tracing::info!(
                source = source.id(),
                isbn,
                elapsed_ms = elapsed.as_millis() as u64,
                "isbn resolved"
            ),
            AdapterOutcome::NoMatch => {
                tracing::debug!(source = source.id(), isbn, "no match, trying next source")
            }
            AdapterOutcome::FetchFailed(reason) | AdapterOutcome::ParseFailed(reason) => {
                tracing::warn!(source = source.id(), isbn, reason = %reason, "source failed, trying next")
            }
        }

        attempts.push(SourceAttempt {
            source: source.kind(),
            outcome: outcome.clone(),
            elapsed,
        });

        if let (AdapterOutcome::Matched, Ok(record)) = (outcome, result) {
            return IsbnResolution {
                isbn: isbn.to_string(),
                record: Some(record),
                attempts,
            };
        }
    }

    tracing::info!(isbn, tried = attempts.len(), "isbn not found in any source");
    IsbnResolution {
        isbn: isbn.to_string(),
        record: None,
        attempts,
    }
}

/// One bounded adapter call; a panic becomes a parse failure
async fn lookup(
    source: &dyn Source,
    isbn: &str,
    settings: &ChainSettings,
) -> Result<BookRecord, SourceError> {
    let call = AssertUnwindSafe(source.resolve_by_isbn(isbn)).catch_unwind();
    match tokio::time::timeout(settings.step_timeout, call).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(SourceError::Parse("adapter panicked".into())),
        Err(_) => Err(SourceError::Fetch(crate::utils::FetchError::Timeout)),
    }
}
