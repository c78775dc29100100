//! Bounded concurrent keyword fan-out.

use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

use super::{FanoutSettings, ResolverError};
use crate::models::{AdapterOutcome, BookRecord, KeywordSearch, SourceAttempt, SourceKind};
use crate::sources::{Source, SourceError};

const TIMED_OUT: &str = "timed out";

/// What one worker reports back
struct TaskReport {
    source: SourceKind,
    outcome: AdapterOutcome,
    records: Vec<BookRecord>,
    elapsed: Duration,
}

pub(super) fn validate(settings: &FanoutSettings) -> Result<(), ResolverError> {
    if settings.max_workers == 0 {
        return Err(ResolverError::PoolUnavailable(
            "max_workers must be at least 1".into(),
        ));
    }
    if settings.max_workers > Semaphore::MAX_PERMITS {
        return Err(ResolverError::PoolUnavailable(format!(
            "max_workers must be at most {}",
            Semaphore::MAX_PERMITS
        )));
    }
    Ok(())
}

/// Query every source concurrently and gather whatever arrives in time.
///
/// At most `max_workers` adapters run at once. Each adapter gets
/// `task_timeout` from the moment it starts; the whole call returns by
/// `overall_ceiling`, abandoning and cancelling whatever is still running.
/// Records are concatenated in completion order.
pub(super) async fn run(
    sources: Vec<Arc<dyn Source>>,
    keyword: &str,
    settings: &FanoutSettings,
) -> Result<KeywordSearch, ResolverError> {
    validate(settings)?;

    let started = Instant::now();
    let deadline = started + settings.overall_ceiling;
    let workers = Arc::new(Semaphore::new(settings.max_workers));
    let mut pending: Vec<SourceKind> = sources.iter().map(|s| s.kind()).collect();
    let mut tasks = JoinSet::new();

    for source in sources {
        let workers = Arc::clone(&workers);
        let keyword = keyword.to_string();
        let limit = settings.per_source_limit;
        let task_timeout = settings.task_timeout;

        tasks.spawn(async move {
            let source_kind = source.kind();
            let Ok(_permit) = workers.acquire_owned().await else {
                return TaskReport {
                    source: source_kind,
                    outcome: AdapterOutcome::FetchFailed("worker pool closed".into()),
                    records: Vec::new(),
                    elapsed: Duration::ZERO,
                };
            };

            let task_started = Instant::now();
            let call = AssertUnwindSafe(source.search_by_keyword(&keyword, limit)).catch_unwind();
            let (outcome, records) = match tokio::time::timeout(task_timeout, call).await {
                Ok(Ok(result)) => {
                    let outcome = AdapterOutcome::of_list(&result);
                    (outcome, result.unwrap_or_default())
                }
                Ok(Err(_)) => (
                    AdapterOutcome::of_error(&SourceError::Parse("adapter panicked".into())),
                    Vec::new(),
                ),
                Err(_) => (AdapterOutcome::FetchFailed(TIMED_OUT.into()), Vec::new()),
            };

            TaskReport {
                source: source_kind,
                outcome,
                records,
                elapsed: task_started.elapsed(),
            }
        });
    }

    let mut records = Vec::new();
    let mut attempts = Vec::new();

    loop {
        match tokio::time::timeout_at(deadline, tasks.join_next()).await {
            Ok(Some(Ok(report))) => {
                if let Some(pos) = pending.iter().position(|k| *k == report.source) {
                    pending.remove(pos);
                }
                match &report.outcome {
                    AdapterOutcome::FetchFailed(reason) | AdapterOutcome::ParseFailed(reason) => {
                        tracing::warn!(source = report.source.id(), keyword, reason = %reason, "keyword source failed")
                    }
                    _ => tracing::debug!(
                        source = report.source.id(),
                        count = report.records.len(),
                        elapsed_ms = report.elapsed.as_millis() as u64,
                        "keyword source finished"
                    ),
                }
                records.extend(report.records.into_iter().filter(|r| r.found));
                attempts.push(SourceAttempt {
                    source: report.source,
                    outcome: report.outcome,
                    elapsed: report.elapsed,
                });
            }
            Ok(Some(Err(e))) => tracing::warn!(error = %e, "keyword worker did not finish"),
            Ok(None) => break,
            Err(_) => {
                tracing::warn!(
                    keyword,
                    abandoned = pending.len(),
                    "overall ceiling reached, returning partial results"
                );
                tasks.abort_all();
                break;
            }
        }
    }

    for source in pending {
        attempts.push(SourceAttempt {
            source,
            outcome: AdapterOutcome::FetchFailed(TIMED_OUT.into()),
            elapsed: started.elapsed(),
        });
    }

    tracing::info!(
        keyword,
        candidates = records.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "keyword search finished"
    );

    Ok(KeywordSearch {
        keyword: keyword.to_string(),
        records,
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{MockReply, MockSource};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn settings(max_workers: usize, task_ms: u64, ceiling_ms: u64) -> FanoutSettings {
        FanoutSettings {
            max_workers,
            task_timeout: Duration::from_millis(task_ms),
            overall_ceiling: Duration::from_millis(ceiling_ms),
            per_source_limit: 5,
        }
    }

    fn titles(records: &[BookRecord]) -> Vec<&str> {
        records.iter().map(|r| r.title.as_str()).collect()
    }

    #[tokio::test]
    async fn test_partial_results_when_sources_time_out() {
        let sources: Vec<Arc<dyn Source>> = vec![
            Arc::new(MockSource::new("a").with_titles(["A1", "A2"])),
            Arc::new(MockSource::new("slow1").with_titles(["S1"]).with_delay(Duration::from_secs(30))),
            Arc::new(MockSource::new("b").with_titles(["B1"])),
            Arc::new(MockSource::new("slow2").with_titles(["S2"]).with_delay(Duration::from_secs(30))),
            Arc::new(MockSource::new("c").with_titles(["C1"])),
        ];

        let started = Instant::now();
        let search = run(sources, "kw", &settings(5, 200, 1000)).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        let mut got = titles(&search.records);
        got.sort();
        assert_eq!(got, vec!["A1", "A2", "B1", "C1"]);

        let timed_out = search
            .attempts
            .iter()
            .filter(|a| a.outcome == AdapterOutcome::FetchFailed(TIMED_OUT.into()))
            .count();
        assert_eq!(timed_out, 2);
        assert_eq!(search.attempts.len(), 5);
    }

    #[tokio::test]
    async fn test_completion_order() {
        let sources: Vec<Arc<dyn Source>> = vec![
            Arc::new(MockSource::new("late").with_titles(["Late"]).with_delay(Duration::from_millis(150))),
            Arc::new(MockSource::new("early").with_titles(["Early"]).with_delay(Duration::from_millis(10))),
        ];

        let search = run(sources, "kw", &settings(2, 1000, 2000)).await.unwrap();

        assert_eq!(titles(&search.records), vec!["Early", "Late"]);
        assert_eq!(search.attempts[0].source, SourceKind::Other("early".into()));
    }

    #[tokio::test]
    async fn test_duplicates_are_kept() {
        let sources: Vec<Arc<dyn Source>> = vec![
            Arc::new(MockSource::new("a").with_titles(["Same Book"])),
            Arc::new(MockSource::new("b").with_titles(["Same Book"])),
        ];

        let search = run(sources, "kw", &settings(2, 1000, 2000)).await.unwrap();
        assert_eq!(search.records.len(), 2);
    }

    #[tokio::test]
    async fn test_failures_contribute_nothing() {
        let sources: Vec<Arc<dyn Source>> = vec![
            Arc::new(MockSource::new("fetch").with_reply(MockReply::FetchFailure)),
            Arc::new(MockSource::new("parse").with_reply(MockReply::ParseFailure)),
            Arc::new(MockSource::new("panic").with_reply(MockReply::Panic)),
            Arc::new(MockSource::new("ok").with_titles(["Only"])),
        ];

        let search = run(sources, "kw", &settings(4, 1000, 2000)).await.unwrap();

        assert_eq!(titles(&search.records), vec!["Only"]);
        assert_eq!(search.attempts.len(), 4);
        assert_eq!(
            search.attempts.iter().filter(|a| a.outcome.is_match()).count(),
            1
        );
    }

    /// Tracks how many adapters are inside a call at the same time
    #[derive(Debug, Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[derive(Debug)]
    struct GaugedSource {
        id: String,
        gauge: Arc<Gauge>,
    }

    #[async_trait::async_trait]
    impl Source for GaugedSource {
        fn kind(&self) -> SourceKind {
            SourceKind::Other(self.id.clone())
        }

        fn id(&self) -> &str {
            &self.id
        }

        fn name(&self) -> &str {
            "Gauged"
        }

        fn capabilities(&self) -> crate::sources::SourceCapabilities {
            crate::sources::SourceCapabilities::KEYWORD_SEARCH
        }

        async fn search_by_keyword(
            &self,
            _keyword: &str,
            _limit: usize,
        ) -> Result<Vec<BookRecord>, SourceError> {
            let now = self.gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.gauge.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.gauge.current.fetch_sub(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_worker_limit_is_respected() {
        let gauge = Arc::new(Gauge::default());
        let sources: Vec<Arc<dyn Source>> = (0..6)
            .map(|i| {
                Arc::new(GaugedSource {
                    id: format!("g{}", i),
                    gauge: Arc::clone(&gauge),
                }) as Arc<dyn Source>
            })
            .collect();

        let search = run(sources, "kw", &settings(2, 1000, 5000)).await.unwrap();

        assert_eq!(search.attempts.len(), 6);
        assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
        assert!(gauge.peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_ceiling_cancels_running_sources() {
        let slow = Arc::new(MockSource::new("slow").with_delay(Duration::from_secs(30)));
        let sources: Vec<Arc<dyn Source>> = vec![slow.clone()];

        let started = Instant::now();
        let search = run(sources, "kw", &settings(1, 10_000, 100)).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(search.records.is_empty());
        assert_eq!(
            search.attempts[0].outcome,
            AdapterOutcome::FetchFailed(TIMED_OUT.into())
        );
        // The aborted task has been dropped, releasing its handle on the source
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(Arc::strong_count(&slow), 1);
    }
}
