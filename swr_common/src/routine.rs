// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compiled stage routines and the data they exchange.
//!
//! How a routine is produced (and what it does numerically) is up to the code generator
//! behind `swr_cpu::Backend`. The pipeline only calls into them: the
//! vertex routine for each unit's primitives, the setup routine right after it on the
//! same thread, and the pixel routine once per cluster.

use crate::draw_data::DrawData;
use crate::geometry::{Float4, Topology};
use core::fmt::{Debug, Display, Formatter};
use thiserror::Error;

/// The maximum number of varyings a vertex carries next to its position.
pub const MAX_VARYINGS: usize = 8;

/// A pipeline stage that runs a compiled routine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Vertex,
    Setup,
    Pixel,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Vertex => "vertex",
            Self::Setup => "setup",
            Self::Pixel => "pixel",
        })
    }
}

/// Generating a routine failed, typically because executable memory ran out.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("couldn't generate {stage} routine: {reason}")]
pub struct RoutineError {
    pub stage: Stage,
    pub reason: String,
}

impl RoutineError {
    pub fn new(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            reason: reason.into(),
        }
    }
}

/// A transformed vertex.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vertex {
    /// Clip-space position.
    pub position: Float4,
    pub varyings: [Float4; MAX_VARYINGS],
    /// Clip tests this vertex failed.
    pub clip_flags: u32,
}

/// The vertices of one assembled primitive.
///
/// Points repeat their vertex three times and lines repeat their second vertex.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Triangle {
    pub vertices: [Vertex; 3],
}

/// A primitive that survived setup and is ready to be rasterized.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Primitive {
    pub vertices: [Vertex; 3],
    /// First covered row.
    pub y_min: i32,
    /// Row after the last covered row.
    pub y_max: i32,
    pub x_min: i32,
    pub x_max: i32,
    pub front_facing: bool,
}

/// The part of the framebuffer a pixel routine invocation is responsible for.
///
/// Rows are interleaved: cluster `index` owns every row `y` with
/// `y % count == index`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cluster {
    pub index: u32,
    pub count: u32,
}

impl Cluster {
    /// Whether row `y` belongs to this cluster.
    pub fn owns_row(&self, y: i32) -> bool {
        y >= 0 && y as u32 % self.count == self.index
    }

    /// The first row at or after `y` that belongs to this cluster.
    pub fn first_row_from(&self, y: i32) -> i32 {
        let y = y.max(0);
        let offset = (self.index + self.count - y as u32 % self.count) % self.count;
        y + offset as i32
    }
}

/// Transforms the vertices of a unit.
pub trait VertexRoutine: Send + Sync {
    /// Fill `output[i]` with the vertices named by `indices[i]`.
    ///
    /// `output` and `indices` have the same length: one entry per primitive.
    fn process(&self, output: &mut [Triangle], indices: &[[u32; 3]], data: &DrawData);
}

/// Turns transformed vertices into rasterizable primitives.
pub trait SetupRoutine: Send + Sync {
    /// Append the primitives of `triangles` that survive clipping and culling to
    /// `output`.
    fn setup(
        &self,
        output: &mut Vec<Primitive>,
        triangles: &[Triangle],
        topology: Topology,
        data: &DrawData,
    );
}

/// Rasterizes and shades the rows of one cluster.
pub trait PixelRoutine: Send + Sync {
    /// Render `primitives` into `cluster`, returning the number of samples that passed
    /// the depth test.
    fn rasterize(&self, primitives: &[Primitive], cluster: Cluster, data: &DrawData) -> u32;
}

impl Debug for dyn VertexRoutine {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str("VertexRoutine { .. }")
    }
}

impl Debug for dyn SetupRoutine {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str("SetupRoutine { .. }")
    }
}

impl Debug for dyn PixelRoutine {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str("PixelRoutine { .. }")
    }
}
