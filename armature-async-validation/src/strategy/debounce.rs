//! Debounce strategy.
//!
//! Calls arriving within `duration` of each other share one window. Every
//! new call restarts the window's timer and replaces the recorded value.
//! When the timer finally fires, the inner operation runs once with the
//! latest value, and every caller registered in the window receives that
//! same result in registration order.
//!
//! ## Example
//!
//! ```rust,ignore
//! use armature_async_validation::AsyncValidator;
//! use std::time::Duration;
//!
//! // Only hit the remote service once typing pauses for 300ms.
//! let validator = AsyncValidator::from_async(check_username)
//!     .debounce(Duration::from_millis(300));
//! ```

use super::{Execution, ExecutionFn, Invocation, duration_ms};
use crate::clock::{Clock, TimerHandle};
use crate::error::AsyncFailure;
use futures_util::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Debounce configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebounceConfig {
    /// Quiet period required before the inner operation runs.
    #[serde(rename = "duration_ms", with = "duration_ms")]
    pub duration: Duration,
}

impl DebounceConfig {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

type Waiter<T> = oneshot::Sender<Execution<T>>;

/// A debounce window.
///
/// Open while calls can still join it. Once its deadline passes it is moved
/// to the due list and closed to new calls; the first registrant polled
/// after that drives it.
struct DebounceWindow<T> {
    id: u64,
    /// Bumped by every registration so a superseded timer recognises itself.
    generation: u64,
    timer: Option<TimerHandle>,
    latest: Option<(T, Invocation)>,
    waiters: Vec<Waiter<T>>,
    /// Registrants whose futures are still alive.
    live: usize,
    fired: watch::Sender<bool>,
}

struct DebounceState<T> {
    last_window_id: u64,
    open: Option<DebounceWindow<T>>,
    due: Vec<DebounceWindow<T>>,
}

impl<T> DebounceState<T> {
    fn open_window(&mut self) -> &mut DebounceWindow<T> {
        let next_id = self.last_window_id + 1;
        let window = self.open.get_or_insert_with(|| DebounceWindow {
            id: next_id,
            generation: 0,
            timer: None,
            latest: None,
            waiters: Vec::new(),
            live: 0,
            fired: watch::channel(false).0,
        });
        if window.id == next_id {
            self.last_window_id = next_id;
        }
        window
    }

    /// Close the open window if `generation` is still its latest timer.
    fn fire(&mut self, id: u64, generation: u64) {
        let Some(mut window) = self
            .open
            .take_if(|window| window.id == id && window.generation == generation)
        else {
            return;
        };
        window.timer = None;
        window.fired.send_replace(true);
        debug!(window_id = id, waiters = window.waiters.len(), "Debounce window due");
        self.due.push(window);
    }

    fn window_mut(&mut self, id: u64) -> Option<&mut DebounceWindow<T>> {
        match &mut self.open {
            Some(window) if window.id == id => Some(window),
            _ => self.due.iter_mut().find(|window| window.id == id),
        }
    }

    fn take_due(&mut self, id: u64) -> Option<DebounceWindow<T>> {
        let index = self.due.iter().position(|window| window.id == id)?;
        Some(self.due.remove(index))
    }

    fn take_window(&mut self, id: u64) -> Option<DebounceWindow<T>> {
        self.open
            .take_if(|window| window.id == id)
            .or_else(|| self.take_due(id))
    }
}

/// Coalesce calls to `inner` that arrive less than `config.duration` apart.
pub fn debounce<T>(
    inner: ExecutionFn<T>,
    config: DebounceConfig,
    clock: Arc<dyn Clock>,
) -> ExecutionFn<T>
where
    T: Clone + Send + 'static,
{
    let state = Arc::new(Mutex::new(DebounceState {
        last_window_id: 0,
        open: None,
        due: Vec::new(),
    }));

    Arc::new(move |value: T, invocation: Invocation| {
        let (waiter, mut result_rx) = oneshot::channel();
        let token = invocation.token.clone();
        let operation_id = invocation.operation_id;

        let (window_id, coalesced, mut fired) = {
            let mut guard = state.lock();
            let window = guard.open_window();
            window.generation += 1;
            let timer = arm(
                &state,
                clock.as_ref(),
                config.duration,
                window.id,
                window.generation,
            );
            if let Some(previous) = window.timer.replace(timer) {
                previous.cancel();
            }
            window.latest = Some((value, invocation));
            window.waiters.push(waiter);
            window.live += 1;
            (window.id, window.waiters.len(), window.fired.subscribe())
        };
        debug!(operation_id, window_id, coalesced, "Debounce timer restarted");

        let inner = inner.clone();
        let registration = Registration {
            state: state.clone(),
            window_id,
            token: token.clone(),
        };

        async move {
            let state = &registration.state;
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    cancel_window(state, window_id);
                    return Ok(AsyncFailure::Cancelled.into_result());
                }
                received = &mut result_rx => return settle(received),
                // Disabled if the window is torn down before its deadline.
                true = fired.wait_for(|due| *due).map(|due| due.is_ok()) => {}
            }

            // The deadline passed. Whoever gets here first drives the window.
            let window = state.lock().take_due(window_id);
            let Some(DebounceWindow { latest, waiters, .. }) = window else {
                return settle(result_rx.await);
            };

            let result = match latest {
                Some((value, invocation)) => {
                    debug!(
                        operation_id,
                        window_id,
                        coalesced = waiters.len(),
                        "Debounce window settled, executing latest call"
                    );
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => Ok(AsyncFailure::Cancelled.into_result()),
                        result = inner(value, invocation) => result,
                    }
                }
                None => Ok(AsyncFailure::Cancelled.into_result()),
            };

            for waiter in waiters {
                let _ = waiter.send(result.clone());
            }

            settle(result_rx.await)
        }
        .boxed()
    })
}

/// Schedule the deadline of registration `generation` in window `id`.
fn arm<T: Send + 'static>(
    state: &Arc<Mutex<DebounceState<T>>>,
    clock: &dyn Clock,
    delay: Duration,
    id: u64,
    generation: u64,
) -> TimerHandle {
    let state: Weak<Mutex<DebounceState<T>>> = Arc::downgrade(state);
    clock.after(
        delay,
        Box::new(move || {
            if let Some(state) = state.upgrade() {
                state.lock().fire(id, generation);
            }
        }),
    )
}

/// A caller's stake in a window.
///
/// A cancelled caller takes the whole window down with it. Otherwise the
/// window is only discarded once every registrant is gone, since any of
/// them can drive it.
struct Registration<T> {
    state: Arc<Mutex<DebounceState<T>>>,
    window_id: u64,
    token: CancellationToken,
}

impl<T> Drop for Registration<T> {
    fn drop(&mut self) {
        if self.token.is_cancelled() {
            cancel_window(&self.state, self.window_id);
            return;
        }

        let mut state = self.state.lock();
        let Some(window) = state.window_mut(self.window_id) else {
            return;
        };
        window.live = window.live.saturating_sub(1);
        if window.live > 0 {
            return;
        }
        let window = state.take_window(self.window_id);
        drop(state);

        if let Some(window) = window {
            debug!(window_id = self.window_id, "Debounce window abandoned");
            if let Some(timer) = window.timer {
                timer.cancel();
            }
        }
    }
}

/// Tear down window `id`, resolving everyone registered in it as cancelled.
fn cancel_window<T>(state: &Mutex<DebounceState<T>>, id: u64) {
    let window = state.lock().take_window(id);
    if let Some(window) = window {
        close_window(window);
    }
}

fn close_window<T>(window: DebounceWindow<T>) {
    let id = window.id;

    if let Some(timer) = window.timer {
        timer.cancel();
    }
    debug!(
        window_id = id,
        waiters = window.waiters.len(),
        "Debounce window cancelled"
    );
    for waiter in window.waiters {
        let _ = waiter.send(Ok(AsyncFailure::Cancelled.into_result()));
    }
}

/// A dropped sender means the driving caller went away mid-flight.
fn settle<T>(received: Result<Execution<T>, oneshot::error::RecvError>) -> Execution<T> {
    received.unwrap_or_else(|_| Ok(AsyncFailure::Cancelled.into_result()))
}
