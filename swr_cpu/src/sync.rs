// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Synchronization primitives used by the scheduler.

use crossbeam_utils::Backoff;
use parking_lot::{Condvar, Mutex, MutexGuard};

/// An auto-reset event.
///
/// A [`signal`](Self::signal) is latched until exactly one [`wait`](Self::wait)
/// consumes it, so a signal sent before the waiter arrives is never lost.
#[derive(Debug, Default)]
pub(crate) struct Event {
    signaled: Mutex<bool>,
    condvar: Condvar,
}

impl Event {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn signal(&self) {
        let mut signaled = self.signaled.lock();
        *signaled = true;
        self.condvar.notify_one();
    }

    /// Block until the event is signaled, then reset it.
    pub(crate) fn wait(&self) {
        let mut signaled = self.signaled.lock();
        while !*signaled {
            self.condvar.wait(&mut signaled);
        }
        *signaled = false;
    }
}

/// A count of outstanding work that any number of threads can wait to drain.
///
/// Unlike an [`Event`], reaching zero wakes every waiter.
#[derive(Debug, Default)]
pub(crate) struct WorkCounter {
    count: Mutex<usize>,
    drained: Condvar,
}

impl WorkCounter {
    pub(crate) fn increment(&self) {
        *self.count.lock() += 1;
    }

    pub(crate) fn decrement(&self) {
        let mut count = self.count.lock();
        assert!(*count > 0, "work counter decremented below zero");
        *count -= 1;
        if *count == 0 {
            self.drained.notify_all();
        }
    }

    /// Block until the count is zero.
    pub(crate) fn wait_zero(&self) {
        let mut count = self.count.lock();
        while *count != 0 {
            self.drained.wait(&mut count);
        }
    }
}

/// A mutex for short critical sections.
///
/// Acquiring it spins first, then yields the time slice, and only parks the thread once
/// the backoff is exhausted, so lightly contended hand-offs never pay for a suspension.
#[derive(Debug, Default)]
pub(crate) struct BackoffLock<T> {
    inner: Mutex<T>,
}

impl<T> BackoffLock<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
        let backoff = Backoff::new();

        loop {
            if let Some(guard) = self.inner.try_lock() {
                return guard;
            }

            if backoff.is_completed() {
                return self.inner.lock();
            }

            backoff.snooze();
        }
    }
}
