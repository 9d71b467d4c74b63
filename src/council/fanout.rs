//! Isolate-and-collect fan-out.
//!
//! Epistemic foundation:
//! - K_i: One settled slot per input item, in input order
//! - B_i: Each item may fail or panic → recorded in its own slot, never propagated
//! - I^R: Concurrency bound is configurable
//!
//! Tasks live in a `JoinSet`, so dropping the returned future aborts
//! everything still in flight.

use crate::models::{CouncilError, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

/// Outcome of one fanned-out item.
#[derive(Debug)]
pub struct Settled<O> {
    pub result: Result<O>,
    /// Time from acquiring a concurrency permit to completion
    pub elapsed: Duration,
}

/// Run `op` over every item concurrently, at most `limit` at a time.
///
/// Returns once every item has settled (fan-in barrier). Slot `i` of the
/// output always belongs to `items[i]`, whatever order tasks finished in.
pub async fn isolate_and_collect<T, O, F, Fut>(
    items: Vec<T>,
    limit: usize,
    op: F,
) -> Vec<Settled<O>>
where
    T: Send + 'static,
    O: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<O>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let mut join_set = JoinSet::new();
    let total = items.len();

    for (index, item) in items.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let fut = op(item);
        join_set.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    let err = CouncilError::Internal("Semaphore closed".to_string());
                    let settled = Settled {
                        result: Err(err),
                        elapsed: Duration::ZERO,
                    };
                    return (index, settled);
                }
            };
            let start = Instant::now();
            let result = fut.await;
            let elapsed = start.elapsed();
            (index, Settled { result, elapsed })
        });
    }

    let mut slots: Vec<Option<Settled<O>>> =
        std::iter::repeat_with(|| None).take(total).collect();

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((index, settled)) => slots[index] = Some(settled),
            Err(e) => {
                // Slot stays empty and is filled below
                warn!(error = %e, "Fan-out task panicked");
            }
        }
    }

    slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| Settled {
                result: Err(CouncilError::Internal("task panicked".to_string())),
                elapsed: Duration::ZERO,
            })
        })
        .collect()
}
