// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Occlusion queries that span several draw calls.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Counts the samples that passed the depth test between [`begin`](Self::begin) and
/// [`end`](Self::end).
///
/// Draw calls submitted while the query is building retain it once per unit, add the
/// samples their pixel tasks produced, and release it when each unit completes. The
/// result is only exposed once the query has ended and every unit let go of it.
#[derive(Debug, Default)]
pub struct Query {
    building: AtomicBool,
    references: AtomicU32,
    samples: AtomicU64,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting from zero.
    pub fn begin(&self) {
        self.samples.store(0, Ordering::Relaxed);
        self.building.store(true, Ordering::Release);
    }

    /// Stop accepting new draw calls.
    pub fn end(&self) {
        self.building.store(false, Ordering::Release);
    }

    pub fn is_building(&self) -> bool {
        self.building.load(Ordering::Acquire)
    }

    /// The number of units still contributing to this query.
    pub fn pending_units(&self) -> u32 {
        self.references.load(Ordering::Acquire)
    }

    /// Whether the query has ended and no unit still contributes to it.
    pub fn is_complete(&self) -> bool {
        !self.is_building() && self.pending_units() == 0
    }

    /// The number of passing samples, or `None` while the result is still incomplete.
    pub fn result(&self) -> Option<u64> {
        self.is_complete()
            .then(|| self.samples.load(Ordering::Acquire))
    }

    /// Register `units` units that will contribute to the result.
    pub fn retain(&self, units: u32) {
        self.references.fetch_add(units, Ordering::AcqRel);
    }

    /// Add samples produced by a pixel task.
    pub fn add_samples(&self, samples: u32) {
        self.samples.fetch_add(u64::from(samples), Ordering::Release);
    }

    /// A contributing unit completed.
    pub fn release(&self) {
        let previous = self.references.fetch_sub(1, Ordering::AcqRel);
        assert!(previous > 0, "released a query that no unit retained");
    }
}
