// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A multi-threaded draw-call scheduler for a software 3D pipeline.
//!
//! [`Renderer`] accepts draw calls on one thread and processes them on a fixed pool of
//! workers. Each draw call is split into units of primitives; a unit first runs the
//! vertex and setup routines, and then every pixel cluster (an interleaved set of
//! framebuffer rows) rasterizes it. Clusters process draw calls in submission order and
//! units in primitive order, so the result doesn't depend on how tasks were distributed.
//!
//! The routines themselves come from a [`Backend`], which fingerprints its state so the
//! renderer can cache compiled routines per stage.
//!
//! With [`PipelineConfig::single_threaded`] no threads are spawned and every draw call
//! is processed on the calling thread before [`Renderer::draw`] returns.

// LINEBENDER LINT SET - lib.rs - v2
// See https://linebender.org/wiki/canonical-lints/
// These lints aren't included in Cargo.toml because they
// shouldn't apply to examples and tests
#![warn(unused_crate_dependencies)]
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET
#![allow(missing_docs, reason = "We have many as-yet undocumented items.")]

mod assembly;
mod backend;
mod blit;
mod pool;
mod progress;
mod query;
mod renderer;
mod ring;
mod scheduler;
mod sync;
mod task;
mod timers;

pub use backend::{Backend, PipelineState};
pub use blit::Filter;
pub use renderer::{DrawType, Renderer};
pub use ring::SlotState;
pub use timers::StageTimes;

pub use swr_common;
pub use swr_common::{Error, PipelineConfig, Result};
