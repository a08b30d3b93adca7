// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Task discovery and execution.
//!
//! A draw call is split into units of `batch_size` primitives. For each unit a
//! [`Task::Primitives`] runs the vertex and setup routines, and then one
//! [`Task::Pixels`] per cluster rasterizes the surviving primitives into that cluster's
//! rows. All threads (the workers, or the submitting thread in single-threaded mode)
//! run the same loop: take the scheduler lock, refill the queue from the progress
//! records, claim one task, release the lock and execute it.

use crate::assembly;
use crate::progress::{PixelProgress, PrimitiveProgress, UnitBatch, UnitRange};
use crate::ring::{DrawCall, DrawRing};
use crate::sync::{BackoffLock, Event};
use crate::task::{QueueFull, Task, TaskQueue};
use crate::timers::StageTimers;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use swr_common::{Cluster, PipelineConfig, Stage, Triangle};

/// Number of consecutive scans that hit a full queue before it is reported.
const SATURATION_WARNING: u32 = 64;

/// State that is only touched under the scheduler lock.
#[derive(Debug)]
struct SchedulerState {
    queue: TaskQueue,
    /// Ring slot of each submitted draw call, indexed by sequence number modulo the
    /// ring capacity.
    draw_list: Box<[usize]>,
    /// Sequence number of the oldest draw call that still has primitives to hand out.
    current_draw: u64,
    /// Sequence number the next submitted draw call gets.
    next_draw: u64,
    threads_awake: usize,
    /// The task each thread is executing, or [`Task::Suspend`] if it is parked.
    tasks: Box<[Task]>,
    saturated_scans: u32,
}

/// Everything the submitting thread and the workers share.
#[derive(Debug)]
pub(crate) struct Pipeline {
    pub(crate) config: PipelineConfig,
    pub(crate) ring: DrawRing,
    units: Box<[PrimitiveProgress]>,
    batches: Box<[UnitBatch]>,
    clusters: Box<[PixelProgress]>,
    state: BackoffLock<SchedulerState>,
    resume: Box<[Event]>,
    suspend: Box<[Event]>,
    /// Signaled by the thread that takes `threads_awake` to zero.
    all_asleep: Event,
    exit: AtomicBool,
    pub(crate) timers: Box<[StageTimers]>,
}

impl Pipeline {
    pub(crate) fn new(config: PipelineConfig) -> Self {
        let threads = config.thread_count();
        let draw_capacity = usize::from(config.draw_capacity);
        let batch_size = config.batch_size as usize;

        Self {
            ring: DrawRing::new(draw_capacity),
            units: (0..config.unit_count)
                .map(|_| PrimitiveProgress::default())
                .collect(),
            batches: (0..config.unit_count)
                .map(|_| UnitBatch::new(batch_size))
                .collect(),
            clusters: (0..config.cluster_count)
                .map(|_| PixelProgress::default())
                .collect(),
            state: BackoffLock::new(SchedulerState {
                queue: TaskQueue::new(usize::from(config.queue_capacity)),
                draw_list: vec![0; draw_capacity].into_boxed_slice(),
                current_draw: 0,
                next_draw: 0,
                threads_awake: 0,
                tasks: vec![Task::Suspend; threads].into_boxed_slice(),
                saturated_scans: 0,
            }),
            resume: (0..threads).map(|_| Event::new()).collect(),
            suspend: (0..threads).map(|_| Event::new()).collect(),
            all_asleep: Event::new(),
            exit: AtomicBool::new(false),
            timers: (0..threads).map(|_| StageTimers::default()).collect(),
            config,
        }
    }

    fn thread_count(&self) -> usize {
        self.resume.len()
    }

    /// Make the draw call in `slot` visible to the scheduler and get a thread going.
    ///
    /// In single-threaded mode the draw call is processed before this returns.
    pub(crate) fn enqueue(&self, slot: usize) {
        {
            let mut state = self.state.lock();
            let sequence = state.next_draw;
            let capacity = state.draw_list.len();
            state.draw_list[(sequence % capacity as u64) as usize] = slot;
            state.next_draw += 1;

            if state.threads_awake == 0 {
                if self.config.is_threaded() {
                    self.wake(&mut state, 0);
                } else {
                    state.tasks[0] = Task::Resume;
                    state.threads_awake = 1;
                }
            }
        }

        if !self.config.is_threaded() {
            self.task_loop(0);
        }
    }

    /// Resume parked thread `thread`. The caller holds the scheduler lock.
    fn wake(&self, state: &mut SchedulerState, thread: usize) {
        // The worker signals `suspend` right before it parks; waiting for that ensures
        // the resume below isn't consumed by an earlier iteration of its loop.
        self.suspend[thread].wait();
        state.tasks[thread] = Task::Resume;
        self.resume[thread].signal();
        state.threads_awake += 1;
    }

    /// The body of a worker thread.
    pub(crate) fn thread_loop(&self, thread: usize) {
        log::debug!("worker {thread} started");

        loop {
            self.suspend[thread].signal();
            self.resume[thread].wait();

            if self.exit.load(Ordering::Acquire) {
                break;
            }

            self.task_loop(thread);
        }

        log::debug!("worker {thread} exiting");
    }

    /// Execute tasks until none can be claimed.
    fn task_loop(&self, thread: usize) {
        loop {
            let task = self.schedule_task(thread);
            if task == Task::Suspend {
                break;
            }

            self.execute_task(thread, task);
        }
    }

    /// Claim the next task for `thread`, waking parked threads if more work is queued.
    fn schedule_task(&self, thread: usize) -> Task {
        let mut state = self.state.lock();
        let threads = self.thread_count();

        if state.queue.len() < threads - state.threads_awake + 1 {
            self.find_available_tasks(&mut state);
        }

        let Some(task) = state.queue.try_claim() else {
            state.tasks[thread] = Task::Suspend;
            state.threads_awake -= 1;
            if state.threads_awake == 0 {
                self.all_asleep.signal();
            }
            return Task::Suspend;
        };

        log::trace!("thread {thread} claimed {task:?}");
        state.tasks[thread] = task;

        if state.threads_awake != threads {
            let mut wakeup = (state.queue.len() + 1).saturating_sub(state.threads_awake);

            for i in 0..threads {
                if wakeup == 0 {
                    break;
                }

                if state.tasks[i] == Task::Suspend {
                    self.wake(&mut state, i);
                    wakeup -= 1;
                }
            }
        }

        task
    }

    /// Publish every task whose dependencies are satisfied.
    fn find_available_tasks(&self, state: &mut SchedulerState) {
        let result = self
            .find_pixel_tasks(state)
            .and_then(|()| self.find_primitive_tasks(state));

        match result {
            Ok(()) => state.saturated_scans = 0,
            Err(QueueFull(task)) => {
                // Nothing was mutated for the rejected task; the next scan finds it again.
                state.saturated_scans += 1;
                if state.saturated_scans == SATURATION_WARNING {
                    log::warn!(
                        "task queue stayed full for {SATURATION_WARNING} scans, last rejected {task:?}"
                    );
                }
            }
        }
    }

    fn find_pixel_tasks(&self, state: &mut SchedulerState) -> Result<(), QueueFull> {
        for (cluster, progress) in self.clusters.iter().enumerate() {
            if progress.is_executing() {
                continue;
            }

            for (unit, primitives) in self.units.iter().enumerate() {
                let Some(range) = primitives.ready_range() else {
                    continue;
                };

                if progress.accepts(&range) {
                    state.queue.publish(Task::Pixels { unit, cluster })?;
                    progress.claim();
                    break;
                }
            }
        }

        Ok(())
    }

    fn find_primitive_tasks(&self, state: &mut SchedulerState) -> Result<(), QueueFull> {
        for (unit, progress) in self.units.iter().enumerate() {
            if state.current_draw == state.next_draw {
                break;
            }

            if !progress.is_free() {
                continue;
            }

            if state.queue.is_full() {
                return Err(QueueFull(Task::Primitives { unit }));
            }

            let capacity = state.draw_list.len() as u64;
            let sequence = state.current_draw;
            let slot = state.draw_list[(sequence % capacity) as usize];
            let draw = self.ring.slot(slot);
            let (first_primitive, primitive_count) = draw.take_batch();

            // Move on eagerly, so the draw list entry of a drained draw call is never read
            // again once its slot is released and reused.
            if draw.is_exhausted() {
                state.current_draw += 1;
            }

            progress.init(UnitRange {
                slot,
                sequence,
                first_primitive,
                primitive_count,
            });
            state.queue.publish(Task::Primitives { unit })?;
        }

        Ok(())
    }

    fn execute_task(&self, thread: usize, task: Task) {
        match task {
            Task::Primitives { unit } => self.process_primitives(thread, unit),
            Task::Pixels { unit, cluster } => self.process_pixels(thread, unit, cluster),
            Task::Resume | Task::Suspend => {
                unreachable!("control task {task:?} was queued")
            }
        }
    }

    /// Run the vertex and setup routines of `unit`, then hand it to the clusters.
    fn process_primitives(&self, thread: usize, unit: usize) {
        let range = self.units[unit].range();
        let call = self.ring.slot(range.slot).call();
        let batch = &self.batches[unit];
        let timers = &self.timers[thread];

        let mut triangles = batch.triangles.write();
        self.process_primitive_vertices(thread, unit, &range, &call, &mut triangles);

        let mut primitives = batch.primitives.write();
        primitives.clear();
        if !call.rasterizer_discard {
            timers.time(Stage::Setup, || {
                call.routines
                    .setup
                    .setup(&mut primitives, &triangles, call.topology, &call.data);
            });
        }

        let visible = primitives.len() as u32;
        drop(primitives);
        drop(triangles);

        self.units[unit].publish_visible(visible, self.clusters.len());
    }

    fn process_primitive_vertices(
        &self,
        thread: usize,
        unit: usize,
        range: &UnitRange,
        call: &DrawCall,
        triangles: &mut Vec<Triangle>,
    ) {
        let mut indices = self.batches[unit].indices.write();
        assembly::assemble(
            &mut indices,
            call.topology,
            range.first_primitive,
            range.primitive_count,
            call.count,
            &call.data,
        );

        triangles.clear();
        triangles.resize(indices.len(), Triangle::default());
        self.timers[thread].time(Stage::Vertex, || {
            call.routines.vertex.process(triangles, &indices, &call.data);
        });
    }

    fn process_pixels(&self, thread: usize, unit: usize, cluster: usize) {
        let range = self.units[unit].range();
        let call = self.ring.slot(range.slot).call();

        if self.units[unit].visible() > 0 {
            let primitives = self.batches[unit].primitives.read();
            let target = Cluster {
                index: cluster as u32,
                count: self.clusters.len() as u32,
            };
            let samples = self.timers[thread].time(Stage::Pixel, || {
                call.routines.pixel.rasterize(&primitives, target, &call.data)
            });

            if samples > 0 {
                for query in &call.queries {
                    query.add_samples(samples);
                }
            }
        }

        self.finish_rendering(unit, cluster, &range, call);
    }

    /// Account for a finished pixel task, releasing the unit and draw call when it was
    /// their last.
    fn finish_rendering(&self, unit: usize, cluster: usize, range: &UnitRange, call: Arc<DrawCall>) {
        let progress = &self.clusters[cluster];
        progress.advance(range, call.count);

        if self.units[unit].release_reference() {
            for query in &call.queries {
                query.release();
            }
            drop(call);
            self.ring.complete_unit(range.slot);
        }

        // Last, so the scheduler can't hand this cluster another task before the
        // accounting above is visible.
        progress.finish();
    }

    /// Block until every submitted draw call has been released.
    pub(crate) fn synchronize(&self) {
        self.ring.wait_idle();
    }

    /// Park every worker and make them leave their loops. Returns once the exit flag is
    /// set and every worker was resumed to observe it.
    pub(crate) fn stop_workers(&self) {
        self.synchronize();

        // Workers that just released the last draw call may still be scanning. A signal
        // left over from an earlier idle period only costs another check.
        while self.state.lock().threads_awake != 0 {
            self.all_asleep.wait();
        }

        self.exit.store(true, Ordering::Release);
        for resume in &self.resume {
            resume.signal();
        }
    }
}
