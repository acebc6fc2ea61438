//! Readiness gate: one mutex, two readiness flags, two wakeup channels.
//!
//! The gate owns the protected state `S` and caches two booleans derived from
//! it: "a non-blocking read would succeed now" and "a non-blocking write would
//! succeed now". Every transition runs under the single lock, recomputes the
//! flags, and wakes waiters of a direction only when its flag changes.
//!
//! Blocked threads park on a `Condvar`; async tasks park on a `Notify`. Both
//! are fired from the same transition, so a thread and a task waiting on the
//! same stream observe the same wakeups.

use crate::error::{StreamError, StreamResult};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::Notify;

/// State guarded by a [`ReadinessGate`] reports its own readiness.
pub trait Readiness {
    fn is_readable(&self) -> bool;
    fn is_writable(&self) -> bool;

    /// Called under the lock when a non-blocking attempt is refused.
    fn on_would_block(&mut self, _direction: Direction) {}

    /// Called under the lock when a blocking wait is about to park.
    fn on_wait(&mut self, _direction: Direction) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

struct Guarded<S> {
    state: S,
    readable: bool,
    writable: bool,
}

pub struct ReadinessGate<S> {
    inner: Mutex<Guarded<S>>,
    readable_cv: Condvar,
    writable_cv: Condvar,
    readable_notify: Notify,
    writable_notify: Notify,
}

impl<S: Readiness> ReadinessGate<S> {
    pub fn new(state: S) -> Self {
        let readable = state.is_readable();
        let writable = state.is_writable();
        Self {
            inner: Mutex::new(Guarded {
                state,
                readable,
                writable,
            }),
            readable_cv: Condvar::new(),
            writable_cv: Condvar::new(),
            readable_notify: Notify::new(),
            writable_notify: Notify::new(),
        }
    }

    /// Mutate the state with `f`, which returns the new readable flag.
    pub fn update_readable<F>(&self, f: F)
    where
        F: FnOnce(&mut S) -> bool,
    {
        let mut guard = self.inner.lock();
        let readable = f(&mut guard.state);
        self.set_flag(&mut guard, Direction::Read, readable);
    }

    /// Mutate the state with `f`, which returns the new writable flag.
    pub fn update_writable<F>(&self, f: F)
    where
        F: FnOnce(&mut S) -> bool,
    {
        let mut guard = self.inner.lock();
        let writable = f(&mut guard.state);
        self.set_flag(&mut guard, Direction::Write, writable);
    }

    /// Mutate the state with `f`, then recompute both flags from the state.
    pub fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut S) -> R,
    {
        let mut guard = self.inner.lock();
        let result = f(&mut guard.state);
        self.refresh(&mut guard);
        result
    }

    /// Read-only view of the state under the lock.
    pub fn with_state<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&S) -> R,
    {
        let guard = self.inner.lock();
        f(&guard.state)
    }

    pub fn is_readable(&self) -> bool {
        self.inner.lock().readable
    }

    pub fn is_writable(&self) -> bool {
        self.inner.lock().writable
    }

    /// Run `op` if the readable flag is set, otherwise fail with `WouldBlock`.
    pub fn try_nonblock_read<F, R>(&self, op: F) -> StreamResult<R>
    where
        F: FnOnce(&mut S) -> StreamResult<R>,
    {
        self.try_nonblock(Direction::Read, op)
    }

    /// Run `op` if the writable flag is set, otherwise fail with `WouldBlock`.
    pub fn try_nonblock_write<F, R>(&self, op: F) -> StreamResult<R>
    where
        F: FnOnce(&mut S) -> StreamResult<R>,
    {
        self.try_nonblock(Direction::Write, op)
    }

    /// Block until the readable flag is set or `deadline` passes.
    pub fn await_readable(&self, deadline: Option<Instant>) -> StreamResult<()> {
        self.await_flag(Direction::Read, deadline)
    }

    /// Block until the writable flag is set or `deadline` passes.
    pub fn await_writable(&self, deadline: Option<Instant>) -> StreamResult<()> {
        self.await_flag(Direction::Write, deadline)
    }

    /// Wait for the readable flag without blocking the executor thread.
    pub async fn readable(&self) {
        self.flag_async(Direction::Read).await
    }

    /// Wait for the writable flag without blocking the executor thread.
    pub async fn writable(&self) {
        self.flag_async(Direction::Write).await
    }

    fn try_nonblock<F, R>(&self, direction: Direction, op: F) -> StreamResult<R>
    where
        F: FnOnce(&mut S) -> StreamResult<R>,
    {
        let mut guard = self.inner.lock();
        if !Self::flag(&guard, direction) {
            guard.state.on_would_block(direction);
            return Err(StreamError::WouldBlock);
        }
        let result = op(&mut guard.state);
        self.refresh(&mut guard);
        result
    }

    fn await_flag(&self, direction: Direction, deadline: Option<Instant>) -> StreamResult<()> {
        let condvar = match direction {
            Direction::Read => &self.readable_cv,
            Direction::Write => &self.writable_cv,
        };
        let mut guard = self.inner.lock();
        if !Self::flag(&guard, direction) {
            guard.state.on_wait(direction);
        }
        // Recheck after every wakeup; condvars may wake spuriously.
        while !Self::flag(&guard, direction) {
            match deadline {
                Some(deadline) => {
                    if condvar.wait_until(&mut guard, deadline).timed_out()
                        && !Self::flag(&guard, direction)
                    {
                        log::warn!("Timed out waiting for {:?} readiness", direction);
                        return Err(StreamError::Timeout);
                    }
                }
                None => condvar.wait(&mut guard),
            }
        }
        Ok(())
    }

    async fn flag_async(&self, direction: Direction) {
        let notify = match direction {
            Direction::Read => &self.readable_notify,
            Direction::Write => &self.writable_notify,
        };
        loop {
            let notified = notify.notified();
            tokio::pin!(notified);
            // Register before checking so a transition in between is not lost.
            notified.as_mut().enable();
            let ready = {
                let guard = self.inner.lock();
                Self::flag(&guard, direction)
            };
            if ready {
                return;
            }
            notified.await;
        }
    }

    fn flag(guard: &MutexGuard<'_, Guarded<S>>, direction: Direction) -> bool {
        match direction {
            Direction::Read => guard.readable,
            Direction::Write => guard.writable,
        }
    }

    fn refresh(&self, guard: &mut MutexGuard<'_, Guarded<S>>) {
        let readable = guard.state.is_readable();
        let writable = guard.state.is_writable();
        self.set_flag(guard, Direction::Read, readable);
        self.set_flag(guard, Direction::Write, writable);
    }

    fn set_flag(&self, guard: &mut MutexGuard<'_, Guarded<S>>, direction: Direction, value: bool) {
        let (slot, condvar, notify) = match direction {
            Direction::Read => (&mut guard.readable, &self.readable_cv, &self.readable_notify),
            Direction::Write => (&mut guard.writable, &self.writable_cv, &self.writable_notify),
        };
        if *slot != value {
            *slot = value;
            condvar.notify_all();
            notify.notify_waiters();
        }
    }
}
