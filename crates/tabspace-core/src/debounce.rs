//! Per-window event coalescing.
//!
//! Tab mutations arrive in bursts (restoring a session opens every tab at
//! once). [`DebounceQueue`] collapses them: each enqueue for a window
//! cancels that window's pending timer and starts a fresh one, so exactly
//! one reconciliation pass fires after the burst goes quiet. The pass
//! re-reads live window state at fire time; nothing from enqueue time is
//! trusted.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use tabspace_types::WindowId;

struct PendingEvent {
    cancel: CancellationToken,
    generation: u64,
}

/// Coalescing timer map: one pending timer per window, plus a global
/// monotonic generation counter disambiguating timer firings in logs.
pub struct DebounceQueue {
    interval: Duration,
    pending: Arc<Mutex<HashMap<WindowId, PendingEvent>>>,
    generation: AtomicU64,
}

impl DebounceQueue {
    /// Create a queue with the given quiet period.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            pending: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    /// The configured quiet period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of windows with a timer currently pending.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Schedule `fire` for this window after the quiet period, superseding
    /// any timer already pending for it. Superseded timers never fire.
    ///
    /// The generation passed to `fire` is ordering metadata for
    /// diagnostics; every fire that survives cancellation is processed.
    pub fn enqueue<F, Fut>(&self, window_id: WindowId, fire: F)
    where
        F: FnOnce(WindowId, u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        let interval = self.interval;

        let superseded = {
            let mut pending = self.pending.lock().unwrap();
            pending.insert(
                window_id,
                PendingEvent {
                    cancel: cancel.clone(),
                    generation,
                },
            )
        };
        if let Some(previous) = superseded {
            trace!(
                window = %window_id,
                superseded = previous.generation,
                "superseding pending timer"
            );
            previous.cancel.cancel();
        }

        let pending = Arc::clone(&self.pending);
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(interval) => {
                    // Drop our entry first so pending_count reflects only
                    // live timers; a newer enqueue may have replaced it.
                    {
                        let mut pending = pending.lock().unwrap();
                        if pending.get(&window_id).is_some_and(|e| e.generation == generation) {
                            pending.remove(&window_id);
                        }
                    }
                    debug!(window = %window_id, generation, "debounce timer fired");
                    fire(window_id, generation).await;
                }
            }
        });
    }

    /// Cancel any pending timer for this window without rescheduling.
    /// Returns `true` if a timer was pending.
    pub fn cancel(&self, window_id: WindowId) -> bool {
        let removed = self.pending.lock().unwrap().remove(&window_id);
        match removed {
            Some(entry) => {
                debug!(window = %window_id, generation = entry.generation, "cancelled pending timer");
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    fn counting_fire(
        counter: &Arc<AtomicUsize>,
    ) -> impl FnOnce(WindowId, u64) -> std::future::Ready<()> + Send + 'static {
        let counter = Arc::clone(counter);
        move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test]
    async fn burst_fires_exactly_once() {
        let queue = DebounceQueue::new(Duration::from_millis(20));
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            queue.enqueue(WindowId(1), counting_fire(&fired));
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn spaced_events_fire_separately() {
        let queue = DebounceQueue::new(Duration::from_millis(10));
        let fired = Arc::new(AtomicUsize::new(0));

        queue.enqueue(WindowId(1), counting_fire(&fired));
        tokio::time::sleep(Duration::from_millis(50)).await;
        queue.enqueue(WindowId(1), counting_fire(&fired));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn windows_debounce_independently() {
        let queue = DebounceQueue::new(Duration::from_millis(10));
        let fired = Arc::new(AtomicUsize::new(0));

        queue.enqueue(WindowId(1), counting_fire(&fired));
        queue.enqueue(WindowId(2), counting_fire(&fired));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancel_prevents_firing() {
        let queue = DebounceQueue::new(Duration::from_millis(10));
        let fired = Arc::new(AtomicUsize::new(0));

        queue.enqueue(WindowId(1), counting_fire(&fired));
        assert!(queue.cancel(WindowId(1)));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!queue.cancel(WindowId(1)));
    }

    #[tokio::test]
    async fn pending_count_tracks_live_timers() {
        let queue = DebounceQueue::new(Duration::from_millis(10));
        let fired = Arc::new(AtomicUsize::new(0));

        queue.enqueue(WindowId(1), counting_fire(&fired));
        assert_eq!(queue.pending_count(), 1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(queue.pending_count(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn generations_increase_monotonically() {
        let queue = DebounceQueue::new(Duration::from_millis(5));
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let seen = Arc::clone(&seen);
            queue.enqueue(WindowId(i + 1), move |_, generation| {
                seen.lock().unwrap().push(generation);
                std::future::ready(())
            });
        }

        tokio::time::sleep(Duration::from_millis(40)).await;
        let mut generations = seen.lock().unwrap().clone();
        generations.sort_unstable();
        assert_eq!(generations, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn fire_observes_state_at_fire_time() {
        let queue = DebounceQueue::new(Duration::from_millis(15));
        let state = Arc::new(AtomicUsize::new(0));
        let observed = Arc::new(AtomicUsize::new(usize::MAX));

        {
            let state = Arc::clone(&state);
            let observed = Arc::clone(&observed);
            queue.enqueue(WindowId(1), move |_, _| {
                observed.store(state.load(Ordering::SeqCst), Ordering::SeqCst);
                std::future::ready(())
            });
        }

        // Mutate after enqueue but before the timer fires.
        state.store(7, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(observed.load(Ordering::SeqCst), 7);
    }
}
