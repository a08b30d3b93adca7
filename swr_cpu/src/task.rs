// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Schedulable work items and the bounded queue holding them.

use std::collections::VecDeque;

/// A unit of work claimed by exactly one thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Task {
    /// Run the vertex and setup routines for the primitives assigned to `unit`.
    Primitives { unit: usize },
    /// Rasterize the primitives of `unit` into `cluster`.
    Pixels { unit: usize, cluster: usize },
    /// The thread was woken up and should look for work.
    Resume,
    /// No work was available; the thread parks.
    Suspend,
}

/// The queue had no room for a task. The task is handed back so it can be retried.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct QueueFull(pub(crate) Task);

/// A bounded first-in first-out queue of tasks.
///
/// The queue itself is not synchronized; the scheduler keeps it behind its backoff lock.
#[derive(Debug)]
pub(crate) struct TaskQueue {
    tasks: VecDeque<Task>,
    capacity: usize,
}

impl TaskQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            tasks: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a task, failing if the queue is at capacity.
    pub(crate) fn publish(&mut self, task: Task) -> Result<(), QueueFull> {
        if self.is_full() {
            return Err(QueueFull(task));
        }

        self.tasks.push_back(task);
        Ok(())
    }

    /// Take the oldest task.
    pub(crate) fn try_claim(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.tasks.len() >= self.capacity
    }
}
