//! Pause / resume / stop coordination
//!
//! One cooperative task executes the workflow; control calls arrive from
//! other tasks. Pause is a watch-channel gate the run task awaits at every
//! suspension point, so a resume issued before the task actually suspends is
//! still observed (no missed wake-ups). Stop cancels a per-run token; every
//! suspension point re-checks it, including immediately after waking from a
//! pause.

use crate::errors::EngineError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

pub(crate) struct Controls {
    running: AtomicBool,
    paused: watch::Sender<bool>,
    cancel: Mutex<CancellationToken>,
}

impl Controls {
    pub(crate) fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            running: AtomicBool::new(false),
            paused,
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Claim the engine for a run. Fails when a run is already in flight.
    pub(crate) fn begin(&self) -> Result<(), EngineError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(EngineError::AlreadyRunning);
        }
        self.paused.send_replace(false);
        *self.cancel.lock() = CancellationToken::new();
        Ok(())
    }

    /// Release the engine after a run, clearing pause state.
    pub(crate) fn end(&self) {
        self.paused.send_replace(false);
        self.running.store(false, Ordering::SeqCst);
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.is_running() && *self.paused.borrow()
    }

    /// Close the pause gate. No-op unless running and not already paused.
    pub(crate) fn pause(&self) -> bool {
        if !self.is_running() || *self.paused.borrow() {
            return false;
        }
        self.paused.send_replace(true);
        true
    }

    /// Open the pause gate, releasing every waiter. No-op unless paused.
    pub(crate) fn resume(&self) -> bool {
        if !self.is_running() || !*self.paused.borrow() {
            return false;
        }
        self.paused.send_replace(false);
        true
    }

    /// Request cancellation of the current run. Takes effect at the next
    /// suspension point; a paused run is woken and unwinds immediately.
    pub(crate) fn stop(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.cancel.lock().cancel();
        true
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.lock().clone()
    }

    /// Suspension point: honors a pending stop, then blocks while paused.
    ///
    /// A stop issued while the task is parked here must win over the resume,
    /// so the token is re-checked after the gate opens.
    pub(crate) async fn checkpoint(&self) -> Result<(), EngineError> {
        let cancel = self.cancel_token();
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if *self.paused.borrow() {
            let mut gate = self.paused.subscribe();
            tokio::select! {
                result = gate.wait_for(|paused| !*paused) => {
                    result.map_err(|_| EngineError::Cancelled)?;
                }
                _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            }
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
        }
        Ok(())
    }

    /// Sleep in slices, re-checking the pause gate and stop flag between
    /// slices so a pause during a long wait is honored mid-wait.
    pub(crate) async fn sleep_pausable(&self, ms: u64, slice_ms: u64) -> Result<(), EngineError> {
        let slice = slice_ms.max(1);
        let mut remaining = ms;
        while remaining > 0 {
            self.checkpoint().await?;
            let chunk = remaining.min(slice);
            sleep(Duration::from_millis(chunk)).await;
            remaining -= chunk;
        }
        self.checkpoint().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn checkpoint_is_immediate_when_idle() {
        let controls = Controls::new();
        controls.begin().unwrap();
        tokio_test::block_on(controls.checkpoint()).unwrap();
    }

    #[tokio::test]
    async fn resume_before_suspension_is_not_lost() {
        let controls = Controls::new();
        controls.begin().unwrap();
        assert!(controls.pause());
        assert!(controls.resume());
        // The gate was opened before anyone awaited it; checkpoint must not hang.
        controls.checkpoint().await.unwrap();
    }

    #[tokio::test]
    async fn paused_checkpoint_waits_for_resume() {
        let controls = Arc::new(Controls::new());
        controls.begin().unwrap();
        controls.pause();

        let waiter = {
            let controls = controls.clone();
            tokio::spawn(async move { controls.checkpoint().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        controls.resume();
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn stop_wakes_a_paused_checkpoint() {
        let controls = Arc::new(Controls::new());
        controls.begin().unwrap();
        controls.pause();

        let waiter = {
            let controls = controls.clone();
            tokio::spawn(async move { controls.checkpoint().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        controls.stop();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }

    #[tokio::test]
    async fn stop_wins_over_a_simultaneous_resume() {
        let controls = Arc::new(Controls::new());
        controls.begin().unwrap();
        controls.pause();
        controls.stop();
        controls.resume();
        let result = controls.checkpoint().await;
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }

    #[tokio::test]
    async fn pausable_sleep_covers_the_full_duration() {
        let controls = Controls::new();
        controls.begin().unwrap();
        let start = Instant::now();
        controls.sleep_pausable(120, 30).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(120));
    }

    #[tokio::test]
    async fn second_begin_is_rejected_until_end() {
        let controls = Controls::new();
        controls.begin().unwrap();
        assert!(matches!(
            controls.begin(),
            Err(EngineError::AlreadyRunning)
        ));
        controls.end();
        controls.begin().unwrap();
    }

    #[test]
    fn control_calls_are_noops_when_not_running() {
        let controls = Controls::new();
        assert!(!controls.pause());
        assert!(!controls.resume());
        assert!(!controls.stop());
        assert!(!controls.is_paused());
    }
}
