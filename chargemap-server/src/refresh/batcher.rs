//! Rate-limited batching of upstream calls.
//!
//! The upstream tolerates small request bodies at a modest pace and
//! answers 403 when pushed harder. The batcher encodes the pacing in one
//! place: fixed-size batches, a cooperative delay between them, and
//! doubling (capped) backoff when a batch is throttled. Errors are
//! batch-local — a batch that exhausts its retries is reported failed and
//! the run moves on, so one bad batch never stalls the rest beyond its own
//! backoff window.
//!
//! The numbers here are empirical. Nothing upstream documents a limit;
//! the defaults approximate what has been observed to pass (roughly three
//! requests per ten seconds), and every knob is configuration.

use std::future::Future;
use std::time::Duration;

use futures::Stream;
use tracing::warn;

use crate::dcs::DcsError;

/// Pacing and retry configuration.
#[derive(Debug, Clone)]
pub struct BatcherConfig {
    /// Items per upstream call.
    pub batch_size: usize,
    /// Cooperative sleep between consecutive batches.
    pub inter_batch_delay: Duration,
    /// Retries of a throttled batch before it is reported failed.
    pub max_retries: u32,
    /// First backoff delay; doubles per retry.
    pub initial_backoff: Duration,
    /// Backoff ceiling.
    pub max_backoff: Duration,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            inter_batch_delay: Duration::from_secs(3),
            max_retries: 3,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl BatcherConfig {
    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n.max(1);
        self
    }

    pub fn with_inter_batch_delay(mut self, delay: Duration) -> Self {
        self.inter_batch_delay = delay;
        self
    }

    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }
}

/// Result of one batch: the items that were in it, and what the fetch
/// produced for them.
#[derive(Debug)]
pub struct BatchOutcome<T, R> {
    /// Position of the batch in the run, starting at 0.
    pub index: usize,
    /// The items this batch carried, in input order.
    pub items: Vec<T>,
    /// Fetch result after retries. `Err` means every item of this batch
    /// failed; other batches are unaffected.
    pub result: Result<R, DcsError>,
}

struct RunState<T, F> {
    batches: std::vec::IntoIter<(usize, Vec<T>)>,
    fetch: F,
    config: BatcherConfig,
    started: bool,
}

/// Run `fetch` over `items` in paced, fixed-size batches.
///
/// Produces one [`BatchOutcome`] per batch, lazily: the next batch is not
/// fetched (nor its delay awaited) until the previous outcome has been
/// consumed. For `n` items and batch size `b` the stream is finite with
/// `ceil(n / b)` outcomes; each call builds an independent run.
pub fn run<T, R, F, Fut>(
    items: Vec<T>,
    config: BatcherConfig,
    fetch: F,
) -> impl Stream<Item = BatchOutcome<T, R>>
where
    T: Clone,
    F: Fn(Vec<T>) -> Fut,
    Fut: Future<Output = Result<R, DcsError>>,
{
    let batch_size = config.batch_size.max(1);
    let batches: Vec<(usize, Vec<T>)> = items
        .chunks(batch_size)
        .map(<[T]>::to_vec)
        .enumerate()
        .collect();

    let state = RunState {
        batches: batches.into_iter(),
        fetch,
        config,
        started: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        let (index, items) = state.batches.next()?;

        if state.started {
            tokio::time::sleep(state.config.inter_batch_delay).await;
        }
        state.started = true;

        let mut backoff = state.config.initial_backoff;
        let mut retries = 0;
        let result = loop {
            match (state.fetch)(items.clone()).await {
                Ok(response) => break Ok(response),
                Err(err) if err.is_throttle() && retries < state.config.max_retries => {
                    retries += 1;
                    warn!(
                        batch = index,
                        retry = retries,
                        backoff_secs = backoff.as_secs_f64(),
                        "throttled, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(state.config.max_backoff);
                }
                Err(err) => break Err(err),
            }
        };

        Some((
            BatchOutcome {
                index,
                items,
                result,
            },
            state,
        ))
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use futures::StreamExt;

    use super::*;

    /// Fetch function that records each call's batch and answers calls in
    /// `throttled_calls` (0-based, counting every attempt) with a
    /// throttling error.
    fn recording_fetch(
        calls: Arc<Mutex<Vec<Vec<u32>>>>,
        throttled_calls: Vec<usize>,
    ) -> impl Fn(Vec<u32>) -> futures::future::BoxFuture<'static, Result<usize, DcsError>> {
        move |batch: Vec<u32>| {
            let calls = calls.clone();
            let throttled_calls = throttled_calls.clone();
            Box::pin(async move {
                let call_no = {
                    let mut calls = calls.lock().unwrap();
                    calls.push(batch.clone());
                    calls.len() - 1
                };
                if throttled_calls.contains(&call_no) {
                    Err(DcsError::Throttled { status: 403 })
                } else {
                    Ok(batch.len())
                }
            })
        }
    }

    fn quick_config() -> BatcherConfig {
        BatcherConfig::default()
            .with_batch_size(5)
            .with_inter_batch_delay(Duration::from_millis(0))
            .with_backoff(Duration::from_millis(0), Duration::from_millis(0))
    }

    #[tokio::test]
    async fn partitions_into_ceil_n_over_b_batches() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let fetch = recording_fetch(calls.clone(), vec![]);

        let outcomes: Vec<_> = run((0..12).collect(), quick_config(), fetch).collect().await;

        assert_eq!(outcomes.len(), 3);
        let sizes: Vec<usize> = calls.lock().unwrap().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![5, 5, 2]);

        // No item skipped or duplicated, input order preserved.
        let seen: Vec<u32> = calls.lock().unwrap().iter().flatten().copied().collect();
        assert_eq!(seen, (0..12).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn empty_input_produces_no_batches() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let fetch = recording_fetch(calls.clone(), vec![]);

        let outcomes: Vec<_> = run(Vec::new(), quick_config(), fetch).collect().await;

        assert!(outcomes.is_empty());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn exact_multiple_has_full_batches_only() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let fetch = recording_fetch(calls.clone(), vec![]);

        let outcomes: Vec<_> = run((0..10).collect(), quick_config(), fetch).collect().await;

        assert_eq!(outcomes.len(), 2);
        let sizes: Vec<usize> = calls.lock().unwrap().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![5, 5]);
    }

    #[tokio::test]
    async fn throttled_batch_is_retried_not_skipped() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        // Calls: 0 = batch0 ok, 1 = batch1 throttled, 2 = batch1 retry
        // throttled, 3 = batch1 retry ok, 4 = batch2 ok.
        let fetch = recording_fetch(calls.clone(), vec![1, 2]);

        let outcomes: Vec<_> = run((0..12).collect(), quick_config(), fetch).collect().await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| o.result.is_ok()));

        let recorded = calls.lock().unwrap().clone();
        assert_eq!(recorded.len(), 5);
        // The same batch was retried...
        assert_eq!(recorded[1], recorded[2]);
        assert_eq!(recorded[2], recorded[3]);
        // ...and the following batch was neither skipped nor duplicated.
        assert_eq!(recorded[4], vec![10, 11]);
    }

    #[tokio::test]
    async fn exhausted_retries_fail_the_batch_and_continue() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        // Batch 1 is throttled on its first attempt and all 2 retries.
        let fetch = recording_fetch(calls.clone(), vec![1, 2, 3]);
        let config = quick_config().with_max_retries(2);

        let outcomes: Vec<_> = run((0..12).collect(), config, fetch).collect().await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(outcomes[1].result, Err(DcsError::Throttled { .. })));
        assert!(outcomes[2].result.is_ok());

        // The failed batch still reports which items it carried.
        assert_eq!(outcomes[1].items, vec![5, 6, 7, 8, 9]);
    }

    #[tokio::test]
    async fn non_throttle_errors_are_not_retried() {
        let calls_count = Arc::new(Mutex::new(0u32));
        let count = calls_count.clone();
        let fetch = move |_batch: Vec<u32>| {
            let count = count.clone();
            async move {
                *count.lock().unwrap() += 1;
                Err::<usize, _>(DcsError::Api {
                    status: 500,
                    message: "boom".into(),
                })
            }
        };

        let outcomes: Vec<_> = run((0..5).collect(), quick_config(), fetch).collect().await;

        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0].result, Err(DcsError::Api { .. })));
        assert_eq!(*calls_count.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_and_backoff_delays_add_up() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        // Batch 1 throttled twice: backoff 2 s then 4 s. Inter-batch delay
        // 3 s before batches 1 and 2.
        let fetch = recording_fetch(calls.clone(), vec![1, 2]);
        let config = BatcherConfig::default()
            .with_batch_size(5)
            .with_inter_batch_delay(Duration::from_secs(3))
            .with_backoff(Duration::from_secs(2), Duration::from_secs(60));

        let started = tokio::time::Instant::now();
        let outcomes: Vec<_> = run((0..12).collect(), config, fetch).collect().await;
        let elapsed = started.elapsed();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(elapsed, Duration::from_secs(3 + 2 + 4 + 3));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_is_capped() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        // Four retries with cap 4 s: 2, 4, 4, 4.
        let fetch = recording_fetch(calls.clone(), vec![0, 1, 2, 3]);
        let config = BatcherConfig::default()
            .with_batch_size(5)
            .with_inter_batch_delay(Duration::ZERO)
            .with_max_retries(4)
            .with_backoff(Duration::from_secs(2), Duration::from_secs(4));

        let started = tokio::time::Instant::now();
        let outcomes: Vec<_> = run((0..3).collect(), config, fetch).collect().await;

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].result.is_ok());
        assert_eq!(started.elapsed(), Duration::from_secs(2 + 4 + 4 + 4));
    }

    #[tokio::test]
    async fn stream_is_lazy() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let fetch = recording_fetch(calls.clone(), vec![]);

        let mut stream = std::pin::pin!(run((0..12).collect(), quick_config(), fetch));

        // Nothing is fetched until the stream is polled.
        assert!(calls.lock().unwrap().is_empty());

        stream.next().await.unwrap();
        assert_eq!(calls.lock().unwrap().len(), 1);

        // Dropping the stream abandons the remaining batches.
        drop(stream);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }
}
