// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Progress records of primitive units and pixel clusters.
//!
//! The scheduler reads these without taking the queue lock to decide whether a later
//! stage may start. Every field of a record is written before the record's reference
//! count (or `executing` flag) is published with release ordering, and readers load that
//! count with acquire ordering before looking at anything else.

use core::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use parking_lot::RwLock;
use swr_common::{Primitive, Triangle};

/// References of a unit whose primitives are being processed.
const CLAIMED: i32 = -1;

/// Progress of one primitive unit.
///
/// `references` is 0 while the unit is free, [`CLAIMED`] while its vertex and setup
/// work runs, and then the number of clusters that still have to rasterize it.
#[derive(Debug, Default)]
pub(crate) struct PrimitiveProgress {
    slot: AtomicUsize,
    sequence: AtomicU64,
    first_primitive: AtomicU32,
    primitive_count: AtomicU32,
    visible: AtomicU32,
    references: AtomicI32,
}

/// A consistent copy of the fields of a [`PrimitiveProgress`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct UnitRange {
    /// Ring slot of the draw call.
    pub(crate) slot: usize,
    /// Submission sequence number of the draw call.
    pub(crate) sequence: u64,
    pub(crate) first_primitive: u32,
    pub(crate) primitive_count: u32,
}

impl PrimitiveProgress {
    /// Whether the unit can be handed a new range of primitives.
    pub(crate) fn is_free(&self) -> bool {
        self.references.load(Ordering::Acquire) == 0
    }

    /// Assign a range of primitives to a free unit and mark it claimed.
    pub(crate) fn init(&self, range: UnitRange) {
        debug_assert!(self.is_free(), "unit reassigned while still referenced");

        self.slot.store(range.slot, Ordering::Relaxed);
        self.sequence.store(range.sequence, Ordering::Relaxed);
        self.first_primitive
            .store(range.first_primitive, Ordering::Relaxed);
        self.primitive_count
            .store(range.primitive_count, Ordering::Relaxed);
        self.visible.store(0, Ordering::Relaxed);
        self.references.store(CLAIMED, Ordering::Release);
    }

    pub(crate) fn range(&self) -> UnitRange {
        UnitRange {
            slot: self.slot.load(Ordering::Relaxed),
            sequence: self.sequence.load(Ordering::Relaxed),
            first_primitive: self.first_primitive.load(Ordering::Relaxed),
            primitive_count: self.primitive_count.load(Ordering::Relaxed),
        }
    }

    /// Setup finished: publish how many primitives survived and hand the unit to
    /// `clusters` pixel consumers.
    pub(crate) fn publish_visible(&self, visible: u32, clusters: usize) {
        self.visible.store(visible, Ordering::Relaxed);
        self.references.store(clusters as i32, Ordering::Release);
    }

    /// The range of a unit whose setup has been published, or `None` otherwise.
    pub(crate) fn ready_range(&self) -> Option<UnitRange> {
        (self.references.load(Ordering::Acquire) > 0).then(|| self.range())
    }

    pub(crate) fn visible(&self) -> u32 {
        self.visible.load(Ordering::Acquire)
    }

    /// A cluster is done with the unit. Returns `true` for the last one, after which the
    /// unit is free again.
    pub(crate) fn release_reference(&self) -> bool {
        let previous = self.references.fetch_sub(1, Ordering::AcqRel);
        assert!(previous > 0, "unit released more often than it was referenced");
        previous == 1
    }
}

/// Progress of one pixel cluster.
///
/// A cluster renders draw calls in submission order and, within a draw call, units in
/// primitive order, so blending into its rows stays deterministic.
#[derive(Debug, Default)]
pub(crate) struct PixelProgress {
    sequence: AtomicU64,
    processed_primitives: AtomicU32,
    executing: AtomicBool,
}

impl PixelProgress {
    /// Whether this idle cluster should rasterize `unit` next.
    pub(crate) fn accepts(&self, unit: &UnitRange) -> bool {
        !self.executing.load(Ordering::Acquire)
            && self.sequence.load(Ordering::Relaxed) == unit.sequence
            && self.processed_primitives.load(Ordering::Relaxed) == unit.first_primitive
    }

    pub(crate) fn is_executing(&self) -> bool {
        self.executing.load(Ordering::Acquire)
    }

    /// Reserve the cluster for a published pixel task.
    pub(crate) fn claim(&self) {
        let was_executing = self.executing.swap(true, Ordering::AcqRel);
        debug_assert!(!was_executing, "cluster claimed twice");
    }

    /// Record that the primitives of `unit` have been rasterized.
    ///
    /// When that was the last unit of the draw call (`draw_count` primitives), the
    /// cluster moves on to the next draw call.
    pub(crate) fn advance(&self, unit: &UnitRange, draw_count: u32) {
        let processed = unit.first_primitive + unit.primitive_count;

        if processed >= draw_count {
            self.sequence.store(unit.sequence + 1, Ordering::Relaxed);
            self.processed_primitives.store(0, Ordering::Relaxed);
        } else {
            self.processed_primitives
                .store(processed, Ordering::Relaxed);
        }
    }

    /// Make the cluster available to the scheduler again.
    pub(crate) fn finish(&self) {
        self.executing.store(false, Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

/// Per-unit storage for the output of the vertex and setup routines.
///
/// The primitives task writes both batches while no pixel task can reach the unit, and
/// pixel tasks only read the primitives, so the locks are never contended.
#[derive(Debug, Default)]
pub(crate) struct UnitBatch {
    pub(crate) indices: RwLock<Vec<[u32; 3]>>,
    pub(crate) triangles: RwLock<Vec<Triangle>>,
    pub(crate) primitives: RwLock<Vec<Primitive>>,
}

impl UnitBatch {
    pub(crate) fn new(batch_size: usize) -> Self {
        Self {
            indices: RwLock::new(Vec::with_capacity(batch_size)),
            triangles: RwLock::new(Vec::with_capacity(batch_size)),
            primitives: RwLock::new(Vec::with_capacity(batch_size)),
        }
    }
}
