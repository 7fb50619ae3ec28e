//! Cancellable, re-armable flush timer.
//!
//! A [`Debouncer`] owns one timer slot. Arming it schedules a flush after a
//! quiet period; arming again before the period ends aborts the sleeping
//! task and starts over, so a burst of mutations produces a single flush.
//!
//! Once the quiet period elapses the task leaves the slot before doing any
//! I/O. Re-arming therefore never aborts a request that is already on the
//! wire: it only replaces a timer that is still sleeping.
//!
//! ```text
//!   arm            arm             (delay elapses)          (flush done)
//! Idle ──► Armed ──────► Armed ─────────────────► Flushing ─────────► Idle
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::sync::lock;

/// Observable state of a flush channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlushState {
    /// Nothing scheduled or running.
    Idle,
    /// A timer is sleeping; more mutations reset it.
    Armed,
    /// At least one flush is in flight and no timer is armed.
    Flushing,
}

#[derive(Debug, Default)]
struct TimerSlot {
    timer: Option<JoinHandle<()>>,
    generation: u64,
    in_flight: usize,
}

impl TimerSlot {
    const fn state(&self) -> FlushState {
        if self.timer.is_some() {
            FlushState::Armed
        } else if self.in_flight > 0 {
            FlushState::Flushing
        } else {
            FlushState::Idle
        }
    }
}

/// Timer slot for one pending-change channel.
#[derive(Debug)]
pub struct Debouncer {
    name: &'static str,
    delay: Duration,
    slot: Mutex<TimerSlot>,
    state: watch::Sender<FlushState>,
}

impl Debouncer {
    /// Create an idle debouncer with the given quiet period.
    #[must_use]
    pub fn new(name: &'static str, delay: Duration) -> Arc<Self> {
        let (state, _) = watch::channel(FlushState::Idle);
        Arc::new(Self {
            name,
            delay,
            slot: Mutex::new(TimerSlot::default()),
            state,
        })
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> FlushState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FlushState> {
        self.state.subscribe()
    }

    /// Schedule `fire` to run after the quiet period, replacing any timer
    /// that is still sleeping.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F, Fut>(self: &Arc<Self>, fire: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = lock(&self.slot);
        if let Some(previous) = slot.timer.take() {
            previous.abort();
            trace!(channel = self.name, "Timer reset");
        }
        slot.generation += 1;
        let generation = slot.generation;

        let this = Arc::clone(self);
        slot.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(this.delay).await;
            if !this.begin_scheduled(generation) {
                return;
            }
            let _flight = InFlight(&this);
            fire().await;
        }));
        self.publish(&slot);
    }

    /// Abort a sleeping timer. Returns whether one was armed.
    ///
    /// In-flight flushes are unaffected.
    pub fn cancel(&self) -> bool {
        let mut slot = lock(&self.slot);
        let Some(timer) = slot.timer.take() else {
            return false;
        };
        timer.abort();
        slot.generation += 1;
        self.publish(&slot);
        true
    }

    /// Run `flush` right away on the current task, counted as in flight.
    pub async fn run_now<Fut>(&self, flush: Fut)
    where
        Fut: Future<Output = ()>,
    {
        self.begin_immediate();
        let _flight = InFlight(self);
        flush.await;
    }

    /// Wait until nothing is armed or in flight.
    pub async fn wait_idle(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|state| *state == FlushState::Idle).await;
    }

    /// Called by a timer task when its quiet period ends. Returns `false`
    /// if the timer was superseded in the meantime.
    fn begin_scheduled(&self, generation: u64) -> bool {
        let mut slot = lock(&self.slot);
        if slot.generation != generation {
            return false;
        }
        // Dropping the handle detaches the task; later arms cannot abort it.
        slot.timer = None;
        slot.in_flight += 1;
        trace!(channel = self.name, "Flush started");
        self.publish(&slot);
        true
    }

    fn begin_immediate(&self) {
        let mut slot = lock(&self.slot);
        slot.in_flight += 1;
        self.publish(&slot);
    }

    fn finish(&self) {
        let mut slot = lock(&self.slot);
        slot.in_flight = slot.in_flight.saturating_sub(1);
        trace!(channel = self.name, "Flush finished");
        self.publish(&slot);
    }

    fn publish(&self, slot: &TimerSlot) {
        self.state.send_replace(slot.state());
    }
}

/// Marks a flush as finished when dropped, including on panic or abort.
struct InFlight<'a>(&'a Debouncer);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}
