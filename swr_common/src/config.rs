// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Parallelism settings of a renderer instance.

use crate::error::{Error, Result};

/// The maximum number of worker threads a renderer can run.
pub const MAX_THREADS: u16 = 16;
/// The maximum number of primitive units and of pixel clusters.
pub const MAX_BATCH_SLOTS: u16 = 16;
/// The default number of draw calls that can be in flight at once.
pub const DEFAULT_DRAW_CAPACITY: u16 = 16;
/// The default capacity of the task queue.
pub const DEFAULT_QUEUE_CAPACITY: u16 = 32;
/// The default number of primitives per unit.
pub const DEFAULT_BATCH_SIZE: u32 = 128;

/// Settings that stay fixed for the lifetime of a renderer.
///
/// The defaults size the pool to the available parallelism of the machine, with one unit
/// and one cluster per thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Number of worker threads.
    ///
    /// With `0` or `1`, no threads are spawned and every draw call is processed on the
    /// submitting thread before `draw` returns.
    pub num_threads: u16,
    /// Number of primitives handed to a unit at a time.
    pub batch_size: u32,
    /// Number of primitive units, i.e. how many vertex/setup batches can be in progress.
    pub unit_count: u16,
    /// Number of pixel clusters the framebuffer is interleaved into.
    pub cluster_count: u16,
    /// Number of draw-call slots in the ring.
    pub draw_capacity: u16,
    /// Number of tasks the task queue can hold.
    pub queue_capacity: u16,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get().min(MAX_THREADS as usize) as u16)
            .unwrap_or(1);

        Self::with_threads(threads)
    }
}

impl PipelineConfig {
    /// Settings for `num_threads` workers, using one unit and one cluster per thread.
    pub fn with_threads(num_threads: u16) -> Self {
        let per_thread = num_threads.clamp(1, MAX_BATCH_SLOTS);

        Self {
            num_threads,
            batch_size: DEFAULT_BATCH_SIZE,
            unit_count: per_thread,
            cluster_count: per_thread,
            draw_capacity: DEFAULT_DRAW_CAPACITY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Settings that process everything on the submitting thread.
    pub fn single_threaded() -> Self {
        Self::with_threads(1)
    }

    /// The number of threads that take part in processing tasks.
    ///
    /// In single-threaded mode this is the submitting thread.
    pub fn thread_count(&self) -> usize {
        usize::from(self.num_threads.max(1))
    }

    /// Whether worker threads are spawned at all.
    pub fn is_threaded(&self) -> bool {
        self.num_threads > 1
    }

    /// Check that all settings are within their supported bounds.
    pub fn validate(&self) -> Result<()> {
        if self.num_threads > MAX_THREADS {
            return Err(Error::InvalidConfig(format!(
                "{} threads requested, at most {MAX_THREADS} are supported",
                self.num_threads
            )));
        }

        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch size must be at least 1".into()));
        }

        for (name, value) in [("unit", self.unit_count), ("cluster", self.cluster_count)] {
            if value == 0 || value > MAX_BATCH_SLOTS {
                return Err(Error::InvalidConfig(format!(
                    "{name} count must be within 1..={MAX_BATCH_SLOTS}, got {value}"
                )));
            }
        }

        if self.draw_capacity == 0 {
            return Err(Error::InvalidConfig(
                "the draw-call ring needs at least one slot".into(),
            ));
        }

        // Every unit and every cluster can have at most one task queued, so this is
        // enough to never starve the queue for good.
        if u32::from(self.queue_capacity) < u32::from(self.unit_count) + u32::from(self.cluster_count)
        {
            return Err(Error::InvalidConfig(format!(
                "queue capacity {} is smaller than units + clusters ({})",
                self.queue_capacity,
                self.unit_count + self.cluster_count
            )));
        }

        Ok(())
    }
}
