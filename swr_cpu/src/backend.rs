// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The seam between the scheduler and the code generator.

use core::fmt::Debug;
use core::hash::Hash;
use std::sync::Arc;
use swr_common::geometry::Topology;
use swr_common::{PixelRoutine, RoutineError, SetupRoutine, VertexRoutine};

/// The configuration fingerprints of the three stages of a draw call.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PipelineState<V, S, P> {
    pub vertex: V,
    pub setup: S,
    pub pixel: P,
    /// Skip setup and rasterization; only the vertex routine runs.
    pub rasterizer_discard: bool,
}

/// Produces routines for the renderer.
///
/// A backend owns whatever state determines the routines (shaders, blend and depth
/// state, vertex formats, ...). The renderer asks it to [`resolve`](Self::resolve) that
/// state into hashable fingerprints and only calls the `compile_*` methods for
/// fingerprints its caches haven't seen yet, so two equal fingerprints must describe
/// routines that behave identically.
pub trait Backend: Send {
    type VertexState: Clone + Eq + Hash + Debug + Send;
    type SetupState: Clone + Eq + Hash + Debug + Send;
    type PixelState: Clone + Eq + Hash + Debug + Send;

    /// Fingerprint the current state for a draw call of `topology`.
    fn resolve(
        &self,
        topology: Topology,
    ) -> PipelineState<Self::VertexState, Self::SetupState, Self::PixelState>;

    fn compile_vertex(
        &self,
        state: &Self::VertexState,
    ) -> Result<Arc<dyn VertexRoutine>, RoutineError>;

    fn compile_setup(&self, state: &Self::SetupState)
        -> Result<Arc<dyn SetupRoutine>, RoutineError>;

    fn compile_pixel(&self, state: &Self::PixelState)
        -> Result<Arc<dyn PixelRoutine>, RoutineError>;
}
