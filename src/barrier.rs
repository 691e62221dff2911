//! Countdown completion barrier
//!
//! A [`CompletionBarrier`] is sized once to the number of tasks in a batch and
//! released one slot at a time. The waiting thread wakes when the count hits
//! zero, when the barrier is interrupted, or when a timed wait elapses.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::{LatchPoolError, Result};

#[derive(Debug)]
struct BarrierState {
    remaining: usize,
    releases: usize,
    interrupted: Option<String>,
}

/// Shared counting gate that blocks a waiter until N releases have occurred
#[derive(Debug)]
pub struct CompletionBarrier {
    state: Mutex<BarrierState>,
    released: Condvar,
}

impl CompletionBarrier {
    /// Create a barrier expecting `count` releases
    pub fn new(count: usize) -> Self {
        Self {
            state: Mutex::new(BarrierState {
                remaining: count,
                releases: 0,
                interrupted: None,
            }),
            released: Condvar::new(),
        }
    }

    /// Number of releases still outstanding
    pub fn count(&self) -> usize {
        self.state.lock().remaining
    }

    /// Total release calls received, including ones that arrived after the
    /// count already reached zero
    pub fn releases(&self) -> usize {
        self.state.lock().releases
    }

    /// Whether the count has reached zero
    pub fn is_released(&self) -> bool {
        self.count() == 0
    }

    /// Decrement the count by one.
    ///
    /// Returns `false` without touching the count if it was already zero.
    pub fn count_down(&self) -> bool {
        let mut state = self.state.lock();
        state.releases += 1;
        if state.remaining == 0 {
            trace!("count_down on exhausted barrier ignored");
            return false;
        }
        state.remaining -= 1;
        if state.remaining == 0 {
            self.released.notify_all();
        }
        true
    }

    /// Wake every waiter with [`LatchPoolError::Interrupted`].
    ///
    /// Has no effect on a barrier that has already reached zero; the first
    /// reason wins if called more than once.
    pub fn interrupt(&self, reason: impl Into<String>) {
        let mut state = self.state.lock();
        if state.remaining > 0 && state.interrupted.is_none() {
            state.interrupted = Some(reason.into());
            self.released.notify_all();
        }
    }

    /// Block until the count reaches zero
    pub fn wait(&self) -> Result<()> {
        let mut state = self.state.lock();
        loop {
            if state.remaining == 0 {
                return Ok(());
            }
            if let Some(reason) = &state.interrupted {
                return Err(LatchPoolError::Interrupted(reason.clone()));
            }
            self.released.wait(&mut state);
        }
    }

    /// Block until the count reaches zero or `timeout` elapses
    pub fn wait_timeout(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if state.remaining == 0 {
                return Ok(());
            }
            if let Some(reason) = &state.interrupted {
                return Err(LatchPoolError::Interrupted(reason.clone()));
            }
            if self.released.wait_until(&mut state, deadline).timed_out() && state.remaining > 0 {
                return Err(LatchPoolError::TimedOut {
                    waited: timeout,
                    outstanding: state.remaining,
                });
            }
        }
    }
}

/// Responsibility for exactly one release of a [`CompletionBarrier`].
///
/// The slot releases when [`release`](Self::release) is called or when it is
/// dropped, whichever comes first, so every exit path of a task (including
/// unwinding, or the pool discarding the job unrun) counts once.
#[derive(Debug)]
pub struct BarrierSlot {
    barrier: Option<Arc<CompletionBarrier>>,
}

impl BarrierSlot {
    /// Claim one slot of `barrier`
    pub fn new(barrier: Arc<CompletionBarrier>) -> Self {
        Self {
            barrier: Some(barrier),
        }
    }

    /// Release the slot now
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(barrier) = self.barrier.take() {
            barrier.count_down();
        }
    }
}

impl Drop for BarrierSlot {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// Cloneable handle that interrupts the executor's barrier wait from another
/// thread.
///
/// An interrupt raised while no batch is waiting is kept pending and trips the
/// next barrier installed by the executor.
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle {
    inner: Arc<Mutex<InterruptTarget>>,
}

#[derive(Debug, Default)]
struct InterruptTarget {
    barrier: Option<Arc<CompletionBarrier>>,
    pending: Option<String>,
}

impl InterruptHandle {
    /// Interrupt the current (or next) barrier wait
    pub fn interrupt(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let mut target = self.inner.lock();
        match &target.barrier {
            Some(barrier) => barrier.interrupt(reason),
            None => target.pending = Some(reason),
        }
    }

    pub(crate) fn attach(&self, barrier: Arc<CompletionBarrier>) {
        let mut target = self.inner.lock();
        if let Some(reason) = target.pending.take() {
            barrier.interrupt(reason);
        }
        target.barrier = Some(barrier);
    }

    pub(crate) fn detach(&self) {
        self.inner.lock().barrier = None;
    }
}
