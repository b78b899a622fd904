//! Batch lookup driver.
//!
//! Rows are processed in batches; inside a batch a bounded pool of tasks
//! (Semaphore + JoinSet + mpsc) runs one row each. Every result carries its
//! input index and lands in a pre-sized slot, so output order always matches
//! input order regardless of completion order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::cancel::CancelFlag;
use crate::config::LookupConfig;
use crate::error::{ConfigError, RegistryError};
use crate::matcher::{MatchSelector, RowStatus, VariantOutcome};
use crate::model::{CompanyQuery, LookupResult};
use crate::normalize::NameNormalizer;
use crate::registry::{CandidateSearch, RegistryClient};
use crate::summary::{RunSummary, SummaryAccumulator};

const CANCELLED_NOTE: &str = "cancelled before lookup";

/// Reported after every finished row.
#[derive(Debug)]
pub struct RowProgress<'a> {
    /// Position of the row in the input.
    pub index: usize,
    pub completed: usize,
    pub total: usize,
    pub result: &'a LookupResult,
}

/// Reported after every finished batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchProgress {
    /// 1-based.
    pub batch: usize,
    pub batches: usize,
    pub completed: usize,
    pub total: usize,
    pub succeeded: usize,
    pub elapsed: Duration,
}

/// Receives progress while a run is in flight. Both hooks default to no-ops.
pub trait ProgressSink {
    fn on_row(&mut self, _progress: &RowProgress<'_>) {}
    fn on_batch(&mut self, _progress: &BatchProgress) {}
}

impl ProgressSink for () {}

struct RowMessage {
    index: usize,
    result: LookupResult,
}

/// Runs lookups for a list of company names against a [`CandidateSearch`].
pub struct LookupCoordinator<C> {
    client: Arc<C>,
    selector: Arc<MatchSelector>,
    normalizer: NameNormalizer,
    workers: usize,
    batch_size: usize,
    cancel: CancelFlag,
}

impl LookupCoordinator<RegistryClient> {
    /// Coordinator backed by the live registry client described by `config`.
    pub fn from_config(config: &LookupConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let client = RegistryClient::from_config(config)?;
        Self::new(config, client)
    }
}

impl<C: CandidateSearch + 'static> LookupCoordinator<C> {
    /// Validates `config` and wires up the pipeline. Nothing is sent yet.
    pub fn new(config: &LookupConfig, client: C) -> Result<Self, ConfigError> {
        config.validate()?;
        let normalizer = config.normalizer()?;
        Ok(Self {
            client: Arc::new(client),
            selector: Arc::new(MatchSelector::new(normalizer.clone())),
            normalizer,
            workers: config.workers,
            batch_size: config.batch_size,
            cancel: CancelFlag::new(),
        })
    }

    /// Handle for stopping the run from elsewhere (a Ctrl-C handler, say).
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn normalize(&self, names: &[String]) -> Vec<CompanyQuery> {
        names.iter().map(|n| self.normalizer.normalize(n)).collect()
    }

    /// Normalizes `names` and runs them.
    pub async fn run_names(&self, names: &[String]) -> (Vec<LookupResult>, RunSummary) {
        self.run(self.normalize(names)).await
    }

    pub async fn run(&self, queries: Vec<CompanyQuery>) -> (Vec<LookupResult>, RunSummary) {
        self.run_with_progress(queries, &mut ()).await
    }

    /// Looks up every query; the output has one result per query, in input order.
    pub async fn run_with_progress<P: ProgressSink + ?Sized>(
        &self,
        queries: Vec<CompanyQuery>,
        progress: &mut P,
    ) -> (Vec<LookupResult>, RunSummary) {
        let total = queries.len();
        let batches = total.div_ceil(self.batch_size);
        let requests_before = self.client.request_stats();
        let accumulator = Arc::new(SummaryAccumulator::start());
        let started = Instant::now();

        let mut slots: Vec<Option<LookupResult>> = vec![None; total];
        let mut completed = 0usize;
        let mut succeeded = 0usize;

        tracing::info!(
            "Looking up {} names in {} batch(es) with {} workers",
            total,
            batches,
            self.workers
        );

        let mut rows = queries.into_iter().enumerate().peekable();
        let mut batch = 0usize;
        while rows.peek().is_some() {
            batch += 1;
            let chunk: Vec<(usize, CompanyQuery)> = rows.by_ref().take(self.batch_size).collect();

            if self.cancel.is_cancelled() {
                for (index, query) in chunk {
                    let result = LookupResult::unmatched(&query.clean_name, CANCELLED_NOTE);
                    accumulator.record(RowStatus::Cancelled, 0);
                    completed += 1;
                    progress.on_row(&RowProgress {
                        index,
                        completed,
                        total,
                        result: &result,
                    });
                    slots[index] = Some(result);
                }
                continue;
            }

            let batch_succeeded = self
                .run_batch(chunk, &accumulator, &mut slots, &mut completed, total, progress)
                .await;
            succeeded += batch_succeeded;

            tracing::info!(
                "Batch {}/{}: {} rows done, {} matched so far",
                batch,
                batches,
                completed,
                succeeded
            );
            progress.on_batch(&BatchProgress {
                batch,
                batches,
                completed,
                total,
                succeeded,
                elapsed: started.elapsed(),
            });
        }

        let results: Vec<LookupResult> = slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| LookupResult::unmatched("", "worker failed: no result")))
            .collect();

        let requests = self.client.request_stats().since(&requests_before);
        let summary = accumulator.finish(requests);
        tracing::info!(
            "Done: {}/{} matched ({:.1}%), {} requests ({} failed), {} retries in {:.1}s",
            summary.succeeded,
            summary.attempted,
            summary.success_rate(),
            summary.requests_made,
            summary.failed_requests,
            summary.retries,
            summary.duration.as_secs_f64()
        );
        (results, summary)
    }

    /// Runs one batch to completion and returns how many rows matched.
    async fn run_batch<P: ProgressSink + ?Sized>(
        &self,
        chunk: Vec<(usize, CompanyQuery)>,
        accumulator: &Arc<SummaryAccumulator>,
        slots: &mut [Option<LookupResult>],
        completed: &mut usize,
        total: usize,
        progress: &mut P,
    ) -> usize {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let (tx, mut rx) = mpsc::channel::<RowMessage>(self.workers * 2);
        let mut join_set = JoinSet::new();
        let mut task_rows = HashMap::new();
        let mut clean_names = HashMap::new();

        for (index, query) in chunk {
            clean_names.insert(index, query.clean_name.clone());
            let sem = Arc::clone(&semaphore);
            let sender = tx.clone();
            let client = Arc::clone(&self.client);
            let selector = Arc::clone(&self.selector);
            let accumulator = Arc::clone(accumulator);
            let cancel = self.cancel.clone();

            let handle = join_set.spawn(async move {
                let _permit = match sem.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                let (result, status, retries) = if cancel.is_cancelled() {
                    (
                        LookupResult::unmatched(&query.clean_name, CANCELLED_NOTE),
                        RowStatus::Cancelled,
                        0,
                    )
                } else {
                    lookup_row(client.as_ref(), &selector, &cancel, &query).await
                };
                accumulator.record(status, retries);
                let _ = sender.send(RowMessage { index, result }).await;
            });
            task_rows.insert(handle.id(), index);
        }
        drop(tx);

        let mut matched = 0usize;
        while let Some(msg) = rx.recv().await {
            *completed += 1;
            if msg.result.is_match() {
                matched += 1;
            }
            progress.on_row(&RowProgress {
                index: msg.index,
                completed: *completed,
                total,
                result: &msg.result,
            });
            slots[msg.index] = Some(msg.result);
        }

        while let Some(joined) = join_set.join_next().await {
            let Err(err) = joined else { continue };
            let Some(&index) = task_rows.get(&err.id()) else { continue };
            if slots[index].is_some() {
                continue;
            }
            tracing::error!("Worker for row {} failed: {}", index + 1, err);
            let clean_name = clean_names.remove(&index).unwrap_or_default();
            let result = LookupResult::unmatched(&clean_name, format!("worker failed: {}", err));
            accumulator.record(RowStatus::FailedPermanently, 0);
            *completed += 1;
            progress.on_row(&RowProgress {
                index,
                completed: *completed,
                total,
                result: &result,
            });
            slots[index] = Some(result);
        }

        matched
    }
}

/// Tries the query's variants in order until one returns candidates.
async fn lookup_row<C: CandidateSearch>(
    client: &C,
    selector: &MatchSelector,
    cancel: &CancelFlag,
    query: &CompanyQuery,
) -> (LookupResult, RowStatus, u32) {
    let mut outcomes: Vec<VariantOutcome> = Vec::with_capacity(query.variants.len());
    for variant in query.variants.iter().filter(|v| !v.trim().is_empty()) {
        let result = client.search(variant, cancel).await;
        let stop = match &result {
            Ok(outcome) => !outcome.candidates.is_empty(),
            Err(RegistryError::Cancelled { .. }) => true,
            Err(_) => false,
        };
        outcomes.push(VariantOutcome {
            variant: variant.clone(),
            result,
        });
        if stop {
            break;
        }
    }

    let result = selector.select(query, &outcomes);
    let status = RowStatus::classify(&result, &outcomes);
    let retries = outcomes.iter().map(VariantOutcome::retries).sum();
    if !result.is_match() {
        tracing::debug!("No identifier for '{}': {}", query.raw_name, result.notes);
    }
    (result, status, retries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ApiCandidate, MatchStrategy};
    use crate::rate_limiter::RequestStats;
    use crate::registry::SearchOutcome;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Answers from a fixed table keyed by query string; unknown queries return nothing.
    #[derive(Default)]
    struct FakeRegistry {
        answers: HashMap<String, Result<Vec<ApiCandidate>, RegistryError>>,
        seen: Mutex<Vec<String>>,
        calls: AtomicU64,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Duration,
        cancel_after: Option<(u64, CancelFlag)>,
    }

    impl FakeRegistry {
        fn with(mut self, query: &str, candidates: Vec<ApiCandidate>) -> Self {
            self.answers.insert(query.to_string(), Ok(candidates));
            self
        }

        fn failing(mut self, query: &str, err: RegistryError) -> Self {
            self.answers.insert(query.to_string(), Err(err));
            self
        }
    }

    impl CandidateSearch for FakeRegistry {
        async fn search(&self, query: &str, cancel: &CancelFlag) -> Result<SearchOutcome, RegistryError> {
            if cancel.is_cancelled() {
                return Err(RegistryError::Cancelled { attempts: 0 });
            }
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.seen.lock().unwrap().push(query.to_string());
            let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

            // Later rows finish first, to shake out ordering bugs.
            let jitter = Duration::from_millis(50u64.saturating_sub(calls * 3));
            tokio::time::sleep(self.delay + jitter).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if let Some((limit, flag)) = &self.cancel_after {
                if calls >= *limit {
                    flag.cancel();
                }
            }

            match self.answers.get(query) {
                Some(Ok(candidates)) => Ok(SearchOutcome {
                    candidates: candidates.clone(),
                    retries: 0,
                }),
                Some(Err(err)) => Err(err.clone()),
                None => Ok(SearchOutcome::default()),
            }
        }

        fn request_stats(&self) -> RequestStats {
            RequestStats {
                requests_made: self.calls.load(Ordering::SeqCst),
                ..Default::default()
            }
        }
    }

    fn candidate(identifier: &str, name: &str) -> ApiCandidate {
        ApiCandidate {
            identifier: identifier.to_string(),
            full_name: name.to_string(),
            is_active: true,
            terminated_on: None,
        }
    }

    fn config(workers: usize, batch_size: usize) -> LookupConfig {
        LookupConfig {
            workers,
            batch_size,
            ..Default::default()
        }
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn results_follow_input_order() {
        tokio::time::pause();
        let fake = FakeRegistry::default()
            .with("Slovnaft", vec![candidate("31322832", "SLOVNAFT, a.s.")])
            .with("Slovak Telekom", vec![candidate("35763469", "Slovak Telekom, a.s.")]);
        let coordinator = LookupCoordinator::new(&config(3, 2), fake).unwrap();

        let input = names(&[
            "Slovnaft, a.s.",
            "Neexistujúca Firma XYZ 12345",
            "Slovak Telekom, a.s.",
            "",
            "Slovnaft a. s.",
        ]);
        let (results, summary) = coordinator.run_names(&input).await;

        assert_eq!(results.len(), input.len());
        assert_eq!(results[0].identifier.as_deref(), Some("31322832"));
        assert_eq!(results[1].match_strategy, MatchStrategy::None);
        assert_eq!(results[1].clean_name, "Neexistujúca Firma XYZ 12345");
        assert_eq!(results[2].identifier.as_deref(), Some("35763469"));
        assert_eq!(results[3].notes, "empty company name");
        assert_eq!(results[4].identifier.as_deref(), Some("31322832"));

        assert_eq!(summary.attempted, 5);
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.not_found, 2);
        // 1 + 2 (two variants for the missing name) + 1 + 0 + 1
        assert_eq!(summary.requests_made, 5);
    }

    #[tokio::test]
    async fn stops_after_first_variant_with_candidates() {
        tokio::time::pause();
        let fake = FakeRegistry::default()
            .with("Zilinska teplarenska", vec![candidate("36403008", "Žilinská teplárenská, a.s.")]);
        let coordinator = LookupCoordinator::new(&config(1, 10), fake).unwrap();

        let (results, _) = coordinator
            .run_names(&names(&["Žilinská teplárenská, a.s."]))
            .await;
        assert_eq!(results[0].used_variant, "Zilinska teplarenska");
        assert_eq!(results[0].match_strategy, MatchStrategy::Exact);

        let seen = coordinator.client.seen.lock().unwrap().clone();
        assert_eq!(seen, vec!["Žilinská teplárenská", "Zilinska teplarenska"]);
    }

    #[tokio::test]
    async fn worker_pool_is_bounded() {
        tokio::time::pause();
        let fake = FakeRegistry {
            delay: Duration::from_millis(100),
            ..Default::default()
        };
        let coordinator = LookupCoordinator::new(&config(3, 100), fake).unwrap();
        let input: Vec<String> = (0..20).map(|i| format!("Firma {i}")).collect();

        let (results, _) = coordinator.run_names(&input).await;
        assert_eq!(results.len(), 20);
        let max = coordinator.client.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 3, "{max} concurrent searches");
        assert!(max >= 2);
    }

    #[tokio::test]
    async fn failures_are_counted_by_kind() {
        tokio::time::pause();
        let fake = FakeRegistry::default()
            .failing(
                "Timeout",
                RegistryError::Exhausted {
                    attempts: 3,
                    last: "request timed out".into(),
                },
            )
            .failing(
                "Rejected",
                RegistryError::Permanent {
                    attempts: 1,
                    message: "HTTP 400".into(),
                },
            );
        let coordinator = LookupCoordinator::new(&config(2, 10), fake).unwrap();

        let (results, summary) = coordinator.run_names(&names(&["Timeout", "Rejected"])).await;
        assert!(results.iter().all(|r| !r.is_match()));
        assert!(results[0].notes.contains("gave up after 3 attempts"));
        assert!(results[1].notes.contains("HTTP 400"));
        assert_eq!(summary.failed_after_retry, 1);
        assert_eq!(summary.failed_permanently, 1);
        assert_eq!(summary.retries, 2);
    }

    #[tokio::test]
    async fn cancellation_marks_remaining_rows() {
        tokio::time::pause();
        let cfg = config(1, 2);
        let flag_holder = FakeRegistry::default();
        let mut coordinator = LookupCoordinator::new(&cfg, flag_holder).unwrap();
        let flag = coordinator.cancel_flag();
        coordinator.client = Arc::new(FakeRegistry {
            cancel_after: Some((1, flag)),
            ..Default::default()
        }
        .with("A", vec![candidate("31322832", "A")]));

        let input = names(&["A", "B", "C", "D", "E"]);
        let (results, summary) = coordinator.run_names(&input).await;

        assert_eq!(results.len(), 5);
        assert!(results[0].is_match());
        for r in &results[1..] {
            assert!(!r.is_match());
            assert_eq!(r.notes, CANCELLED_NOTE);
        }
        assert_eq!(summary.cancelled, 4);
        assert_eq!(summary.requests_made, 1);
    }

    #[tokio::test]
    async fn progress_sees_every_row_and_batch() {
        #[derive(Default)]
        struct Recorder {
            rows: Vec<usize>,
            batches: Vec<BatchProgress>,
        }
        impl ProgressSink for Recorder {
            fn on_row(&mut self, progress: &RowProgress<'_>) {
                self.rows.push(progress.index);
            }
            fn on_batch(&mut self, progress: &BatchProgress) {
                self.batches.push(progress.clone());
            }
        }

        tokio::time::pause();
        let coordinator = LookupCoordinator::new(&config(2, 2), FakeRegistry::default()).unwrap();
        let queries = coordinator.normalize(&names(&["A", "B", "C", "D", "E"]));
        let mut recorder = Recorder::default();
        let (results, _) = coordinator.run_with_progress(queries, &mut recorder).await;

        assert_eq!(results.len(), 5);
        let mut rows = recorder.rows.clone();
        rows.sort();
        assert_eq!(rows, vec![0, 1, 2, 3, 4]);
        assert_eq!(recorder.batches.len(), 3);
        assert_eq!(recorder.batches[2].completed, 5);
        assert_eq!(recorder.batches[2].batches, 3);
    }

    #[tokio::test]
    async fn empty_input() {
        let coordinator = LookupCoordinator::new(&config(2, 2), FakeRegistry::default()).unwrap();
        let (results, summary) = coordinator.run(Vec::new()).await;
        assert!(results.is_empty());
        assert_eq!(summary.attempted, 0);
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let result = LookupCoordinator::new(&config(0, 10), FakeRegistry::default());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
