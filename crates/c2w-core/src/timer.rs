//! A small one-shot delayed-callback timer built on tokio.
//!
//! The spec describes an abstract timer contract (`schedule`/`cancel`), but
//! there is only ever one implementation in this codebase and no test
//! double needs to stand in for it — `tokio::time::pause`/`advance` already
//! give deterministic control over it in tests — so this is a concrete
//! type, not a trait.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// The retransmit interval named by the spec.
pub const RETRANSMIT_INTERVAL: Duration = Duration::from_secs(1);

/// Handle to a scheduled one-shot callback. Dropping the handle does not
/// cancel the timer; call `cancel` explicitly.
pub struct TimerHandle {
    join: JoinHandle<()>,
}

impl TimerHandle {
    /// Cancels the timer. Idempotent: cancelling an already-fired or
    /// already-cancelled timer is a no-op, matching the spec's requirement
    /// that cancellation tolerate the "timer fired for an evicted peer"
    /// race.
    pub fn cancel(self) {
        self.join.abort();
    }
}

/// Schedules `callback` to run after `delay` on the current tokio runtime.
///
/// The callback runs as a detached task; if it needs to touch shared state
/// it should look that state up fresh (e.g. by peer address) rather than
/// capturing a reference, so that a race with eviction resolves by simply
/// finding nothing to act on.
pub fn schedule<F>(delay: Duration, callback: F) -> TimerHandle
where
    F: Future<Output = ()> + Send + 'static,
{
    let join = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        callback.await;
    });
    TimerHandle { join }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        let _handle = schedule(Duration::from_secs(1), async move {
            fired_clone.store(true, Ordering::SeqCst);
        });

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(!fired.load(Ordering::SeqCst));

        tokio::time::advance(Duration::from_millis(2)).await;
        tokio::task::yield_now().await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_fire_is_a_no_op() {
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        let handle = schedule(Duration::from_secs(1), async move {
            fired_clone.store(true, Ordering::SeqCst);
        });
        handle.cancel();

        tokio::time::advance(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert!(!fired.load(Ordering::SeqCst));
    }
}
