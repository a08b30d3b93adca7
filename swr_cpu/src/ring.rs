// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The ring of in-flight draw calls.
//!
//! Each slot carries a reference count with three phases:
//!
//! - `> 0`: submitted, that many units have not completed yet,
//! - `0`: every unit completed, the bound resources are about to be returned,
//! - `-1`: resources returned, the slot can take the next draw call.
//!
//! Only the submitting thread moves a slot out of `-1`, and only the thread that takes
//! the count to `0` moves it back.

use crate::sync::{Event, WorkCounter};
use core::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use parking_lot::RwLock;
use smallvec::SmallVec;
use std::sync::Arc;
use swr_common::geometry::Topology;
use swr_common::{DrawData, PixelRoutine, Query, Resource, SetupRoutine, VertexRoutine};

/// Reference count of a slot that holds no draw call.
const FREE: i32 = -1;

/// The routines a draw call runs.
#[derive(Clone, Debug)]
pub(crate) struct RoutineSet {
    pub(crate) vertex: Arc<dyn VertexRoutine>,
    pub(crate) setup: Arc<dyn SetupRoutine>,
    pub(crate) pixel: Arc<dyn PixelRoutine>,
}

/// Resources locked on behalf of a draw call.
#[derive(Debug, Default)]
pub(crate) struct BoundResources(Vec<Arc<dyn Resource>>);

impl BoundResources {
    /// Lock `resource` until [`unlock_all`](Self::unlock_all).
    pub(crate) fn bind(&mut self, resource: Arc<dyn Resource>) {
        resource.lock();
        self.0.push(resource);
    }

    /// Undo every [`bind`](Self::bind).
    ///
    /// Workers may still hold the draw call for a moment after its last unit completed,
    /// so this only needs a shared reference.
    pub(crate) fn unlock_all(&self) {
        for resource in &self.0 {
            resource.unlock();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }
}

/// The immutable part of a submitted draw call.
#[derive(Debug)]
pub(crate) struct DrawCall {
    pub(crate) topology: Topology,
    pub(crate) batch_size: u32,
    /// Total number of primitives.
    pub(crate) count: u32,
    pub(crate) routines: RoutineSet,
    pub(crate) resources: BoundResources,
    pub(crate) queries: SmallVec<[Arc<Query>; 4]>,
    pub(crate) rasterizer_discard: bool,
    pub(crate) data: DrawData,
}

impl DrawCall {
    /// The number of units the draw call is split into.
    pub(crate) fn unit_count(&self) -> u32 {
        self.count.div_ceil(self.batch_size)
    }
}

/// The observable state of a ring slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    /// The slot can take a new draw call.
    Free,
    /// The draw call has this many units that have not completed.
    InFlight(u32),
    /// Every unit completed, but the resources haven't been returned yet.
    Drained,
}

#[derive(Debug)]
pub(crate) struct DrawSlot {
    references: AtomicI32,
    /// Next primitive to hand to a unit. Only touched under the scheduler lock.
    primitive: AtomicU32,
    count: AtomicU32,
    batch_size: AtomicU32,
    call: RwLock<Option<Arc<DrawCall>>>,
}

impl Default for DrawSlot {
    fn default() -> Self {
        Self {
            references: AtomicI32::new(FREE),
            primitive: AtomicU32::new(0),
            count: AtomicU32::new(0),
            batch_size: AtomicU32::new(1),
            call: RwLock::new(None),
        }
    }
}

impl DrawSlot {
    pub(crate) fn state(&self) -> SlotState {
        match self.references.load(Ordering::Acquire) {
            FREE => SlotState::Free,
            0 => SlotState::Drained,
            n => SlotState::InFlight(n as u32),
        }
    }

    /// The draw call in this slot.
    ///
    /// # Panics
    ///
    /// If the slot is free. Tasks only reference slots whose draw call is in flight.
    pub(crate) fn call(&self) -> Arc<DrawCall> {
        self.call
            .read()
            .clone()
            .expect("task referenced a draw-call slot that holds no draw call")
    }

    /// Whether every primitive has been handed to a unit.
    pub(crate) fn is_exhausted(&self) -> bool {
        self.primitive.load(Ordering::Relaxed) >= self.count.load(Ordering::Relaxed)
    }

    /// Hand out the next batch of primitives, returning `(first, count)`.
    pub(crate) fn take_batch(&self) -> (u32, u32) {
        let first = self.primitive.load(Ordering::Relaxed);
        let count = self.count.load(Ordering::Relaxed);
        let batch = self.batch_size.load(Ordering::Relaxed);
        let taken = batch.min(count - first);

        self.primitive.store(first + taken, Ordering::Relaxed);
        (first, taken)
    }
}

/// Fixed-capacity storage for in-flight draw calls.
#[derive(Debug)]
pub(crate) struct DrawRing {
    slots: Box<[DrawSlot]>,
    /// Signaled whenever a slot is released. Only the submitting thread waits on it.
    released: Event,
    /// Slots that are not free.
    busy: WorkCounter,
}

impl DrawRing {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| DrawSlot::default()).collect(),
            released: Event::new(),
            busy: WorkCounter::default(),
        }
    }

    pub(crate) fn slot(&self, index: usize) -> &DrawSlot {
        &self.slots[index]
    }

    pub(crate) fn states(&self) -> Vec<SlotState> {
        self.slots.iter().map(DrawSlot::state).collect()
    }

    /// Index of a free slot, if there is one.
    pub(crate) fn find_free(&self) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.state() == SlotState::Free)
    }

    /// Index of a free slot, blocking until a worker releases one.
    pub(crate) fn acquire(&self) -> usize {
        loop {
            if let Some(index) = self.find_free() {
                return index;
            }

            log::trace!("draw-call ring is full, waiting for a release");
            self.released.wait();
        }
    }

    /// Block until every slot is free. Any number of threads may wait at once.
    pub(crate) fn wait_idle(&self) {
        self.busy.wait_zero();
    }

    /// Place `call` into the free slot `index`.
    ///
    /// A draw call without units is drained and released right away, so it never
    /// becomes visible to the scheduler. Returns whether the call is in flight.
    pub(crate) fn submit(&self, index: usize, call: DrawCall) -> bool {
        let slot = &self.slots[index];
        let units = call.unit_count();
        let Ok(references) = i32::try_from(units) else {
            panic!("draw call of {units} units exceeds the range of slot references");
        };

        slot.primitive.store(0, Ordering::Relaxed);
        slot.count.store(call.count, Ordering::Relaxed);
        slot.batch_size.store(call.batch_size, Ordering::Relaxed);
        *slot.call.write() = Some(Arc::new(call));
        self.busy.increment();

        if let Err(actual) =
            slot.references
                .compare_exchange(FREE, references, Ordering::AcqRel, Ordering::Acquire)
        {
            panic!("submitted into draw-call slot {index} while it had {actual} references");
        }

        if units == 0 {
            self.release(index);
            return false;
        }

        true
    }

    /// A unit of the draw call in slot `index` completed. Releases the slot when it was
    /// the last one.
    pub(crate) fn complete_unit(&self, index: usize) {
        let previous = self.slots[index]
            .references
            .fetch_sub(1, Ordering::AcqRel);
        assert!(
            previous > 0,
            "draw-call slot {index} completed more units than it had"
        );

        if previous == 1 {
            self.release(index);
        }
    }

    /// Return the resources of a drained slot and make it free.
    fn release(&self, index: usize) {
        let slot = &self.slots[index];
        debug_assert_eq!(slot.state(), SlotState::Drained);

        if let Some(call) = slot.call.write().take() {
            call.resources.unlock_all();
        }

        slot.references.store(FREE, Ordering::Release);
        log::trace!("released draw-call slot {index}");
        self.released.signal();
        self.busy.decrement();
    }
}
