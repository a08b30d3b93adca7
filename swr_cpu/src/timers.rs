// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-thread time spent in each routine stage.

use core::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use swr_common::Stage;

/// Accumulated routine time of one thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StageTimes {
    pub vertex: Duration,
    pub setup: Duration,
    pub pixel: Duration,
}

impl StageTimes {
    pub fn total(&self) -> Duration {
        self.vertex + self.setup + self.pixel
    }
}

#[derive(Debug, Default)]
pub(crate) struct StageTimers {
    vertex: AtomicU64,
    setup: AtomicU64,
    pixel: AtomicU64,
}

impl StageTimers {
    fn counter(&self, stage: Stage) -> &AtomicU64 {
        match stage {
            Stage::Vertex => &self.vertex,
            Stage::Setup => &self.setup,
            Stage::Pixel => &self.pixel,
        }
    }

    /// Run `f`, adding its wall time to `stage`.
    pub(crate) fn time<T>(&self, stage: Stage, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        let nanos = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.counter(stage).fetch_add(nanos, Ordering::Relaxed);
        result
    }

    pub(crate) fn snapshot(&self) -> StageTimes {
        let load = |stage| Duration::from_nanos(self.counter(stage).load(Ordering::Relaxed));

        StageTimes {
            vertex: load(Stage::Vertex),
            setup: load(Stage::Setup),
            pixel: load(Stage::Pixel),
        }
    }

    pub(crate) fn reset(&self) {
        for stage in [Stage::Vertex, Stage::Setup, Stage::Pixel] {
            self.counter(stage).store(0, Ordering::Relaxed);
        }
    }
}
