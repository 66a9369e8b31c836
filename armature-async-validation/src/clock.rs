//! Injectable scheduling for strategies.
//!
//! Strategies never call ambient timer functions. They schedule through a
//! [`Clock`], so tests can swap in a [`ManualClock`] and drive time by hand.
//!
//! ## Example
//!
//! ```rust
//! use armature_async_validation::{Clock, ManualClock};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::time::Duration;
//!
//! let clock = ManualClock::new();
//! let fired = Arc::new(AtomicBool::new(false));
//! let flag = fired.clone();
//!
//! let _timer = clock.after(
//!     Duration::from_millis(50),
//!     Box::new(move || flag.store(true, Ordering::SeqCst)),
//! );
//!
//! clock.advance(Duration::from_millis(49));
//! assert!(!fired.load(Ordering::SeqCst));
//! clock.advance(Duration::from_millis(1));
//! assert!(fired.load(Ordering::SeqCst));
//! ```

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Callback run when a timer fires.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Scheduling capability used by every time-based strategy.
pub trait Clock: Send + Sync + 'static {
    /// Current time as seen by this clock.
    fn now(&self) -> Instant;

    /// Run `callback` once `delay` has elapsed, unless the handle is cancelled first.
    fn after(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;

    /// Future that completes after `delay`. Dropping it cancels the timer.
    fn sleep(&self, delay: Duration) -> Sleep {
        let (tx, rx) = oneshot::channel();
        let timer = self.after(
            delay,
            Box::new(move || {
                let _ = tx.send(());
            }),
        );
        Sleep {
            fired: rx,
            timer: Some(timer),
        }
    }
}

/// Handle to a scheduled callback.
///
/// Cancelling after the callback ran is a no-op.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl TimerHandle {
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Remove the scheduled callback.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

/// Future returned by [`Clock::sleep`].
#[derive(Debug)]
pub struct Sleep {
    fired: oneshot::Receiver<()>,
    timer: Option<TimerHandle>,
}

impl Future for Sleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        match Pin::new(&mut self.fired).poll(cx) {
            Poll::Ready(_) => {
                self.timer = None;
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

/// Clock backed by the Tokio timer.
///
/// Timers are spawned tasks, so `after` must be called from within a Tokio
/// runtime. Honours `tokio::time::pause` in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl TokioClock {
    pub fn new() -> Self {
        Self
    }

    pub fn shared() -> Arc<dyn Clock> {
        Arc::new(Self)
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn after(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
        TimerHandle::new(move || task.abort())
    }
}

type TimerKey = (Duration, u64);

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_id: u64,
    timers: BTreeMap<TimerKey, TimerCallback>,
}

/// Virtual clock for deterministic tests.
///
/// Time only moves when [`ManualClock::advance`] is called. Timers with the
/// same deadline fire in registration order.
#[derive(Clone)]
pub struct ManualClock {
    origin: Instant,
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            state: Arc::new(Mutex::new(ManualState::default())),
        }
    }

    /// Virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        self.state.lock().now
    }

    /// Number of timers scheduled and not yet fired or cancelled.
    pub fn pending_timers(&self) -> usize {
        self.state.lock().timers.len()
    }

    /// Move time forward by `by`, firing every timer that falls due.
    pub fn advance(&self, by: Duration) {
        let target = self.state.lock().now + by;

        loop {
            let due = {
                let mut state = self.state.lock();
                match state.timers.keys().next().copied() {
                    Some(key) if key.0 <= target => {
                        state.now = state.now.max(key.0);
                        state.timers.remove(&key)
                    }
                    _ => None,
                }
            };

            // Run outside the lock; callbacks may schedule more timers.
            match due {
                Some(callback) => callback(),
                None => break,
            }
        }

        self.state.lock().now = target;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ManualClock")
            .field("elapsed", &state.now)
            .field("pending_timers", &state.timers.len())
            .finish()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn after(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let key = {
            let mut state = self.state.lock();
            let key = (state.now + delay, state.next_id);
            state.next_id += 1;
            state.timers.insert(key, callback);
            key
        };

        let state: Weak<Mutex<ManualState>> = Arc::downgrade(&self.state);
        TimerHandle::new(move || {
            if let Some(state) = state.upgrade() {
                state.lock().timers.remove(&key);
            }
        })
    }
}
