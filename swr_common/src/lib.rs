// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core data structures shared by the software pipeline.
//!
//! This crate holds everything the scheduler in `swr_cpu` exchanges with its
//! collaborators:
//!
//! - [`PipelineConfig`], the parallelism settings of a renderer.
//! - [`Buffer`] and [`Surface`], the resources draw calls bind and lock.
//! - [`DrawData`], the immutable parameter block routines read.
//! - The routine traits ([`VertexRoutine`], [`SetupRoutine`], [`PixelRoutine`]) and the
//!   [`RoutineCache`] that memoizes them by configuration.
//! - [`Query`], an occlusion query spanning several draw calls.

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

pub mod cache;
pub mod config;
pub mod draw_data;
pub mod error;
pub mod geometry;
pub mod query;
pub mod resource;
pub mod routine;

pub use cache::{CacheStats, RoutineCache};
pub use config::PipelineConfig;
pub use draw_data::DrawData;
pub use error::{Error, Result};
pub use query::Query;
pub use resource::{Buffer, Resource, Surface};
pub use routine::{
    Cluster, PixelRoutine, Primitive, RoutineError, SetupRoutine, Stage, Triangle, Vertex,
    VertexRoutine,
};
