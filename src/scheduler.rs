use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

pub const DEFAULT_MAX_CONCURRENCY: usize = 2;
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(100);

/// Paces requests to one device: at most `max_concurrency` in flight, FIFO
/// dispatch, and a `min_delay` pause after every completion before the freed
/// slot is handed to the next waiter.
///
/// Nothing is retried here. A failed unit of work is returned to its caller
/// and the queue moves on after the same pause as a success.
#[derive(Debug)]
pub struct RequestScheduler {
    slots: Arc<Semaphore>,
    max_concurrency: usize,
    min_delay: Duration,
    in_flight: Arc<AtomicUsize>,
}

impl Default for RequestScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY, DEFAULT_MIN_DELAY)
    }
}

impl RequestScheduler {
    pub fn new(max_concurrency: usize, min_delay: Duration) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            slots: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            min_delay,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait for a slot (tokio's semaphore queues waiters in FIFO order), run
    /// `work`, and return its output as soon as it completes. The slot is
    /// held for `min_delay` after the unit finishes, fails or is dropped by
    /// its caller mid-flight.
    pub async fn enqueue<F, T>(&self, work: F) -> T
    where
        F: Future<Output = T>,
    {
        // The semaphore is never closed, so acquisition only fails if that
        // changes; run unthrottled rather than drop the request.
        let _slot = PacedSlot {
            permit: self.slots.clone().acquire_owned().await.ok(),
            delay: self.min_delay,
        };

        let _guard = InFlight::enter(&self.in_flight);
        trace!(in_flight = self.in_flight(), "dispatching request");
        work.await
    }
}

/// Hands its permit back `delay` after being dropped.
struct PacedSlot {
    permit: Option<OwnedSemaphorePermit>,
    delay: Duration,
}

impl Drop for PacedSlot {
    fn drop(&mut self) {
        let Some(permit) = self.permit.take() else {
            return;
        };
        // Outside a runtime there is nothing left to pace.
        if let Ok(handle) = Handle::try_current() {
            let delay = self.delay;
            handle.spawn(async move {
                tokio::time::sleep(delay).await;
                drop(permit);
            });
        }
    }
}

struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
