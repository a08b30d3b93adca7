// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The worker threads of a renderer.

use crate::scheduler::Pipeline;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use swr_common::Result;

/// Owns the worker threads running [`Pipeline::thread_loop`].
#[derive(Debug, Default)]
pub(crate) struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn one worker per thread of `pipeline`, or none in single-threaded mode.
    pub(crate) fn spawn(pipeline: &Arc<Pipeline>) -> Result<Self> {
        let mut pool = Self::default();
        if !pipeline.config.is_threaded() {
            return Ok(pool);
        }

        let threads = pipeline.config.thread_count();
        for index in 0..threads {
            let shared = pipeline.clone();
            let spawned = thread::Builder::new()
                .name(format!("swr-worker-{index}"))
                .spawn(move || shared.thread_loop(index));

            match spawned {
                Ok(handle) => pool.workers.push(handle),
                Err(err) => {
                    log::error!("couldn't spawn worker {index}: {err}");
                    pool.shutdown(pipeline);
                    return Err(err.into());
                }
            }
        }

        log::debug!("started {threads} worker threads");
        Ok(pool)
    }

    /// Wait for all submitted work, then stop and join every worker.
    pub(crate) fn shutdown(&mut self, pipeline: &Pipeline) {
        if self.workers.is_empty() {
            return;
        }

        pipeline.stop_workers();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("a worker thread panicked");
            }
        }

        log::debug!("worker threads stopped");
    }

    pub(crate) fn len(&self) -> usize {
        self.workers.len()
    }
}
