// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A backend with simple, deterministic routines shared across the tests.
//!
//! Vertices are fetched as `[f32; 2]` pixel positions from input 0. Setup turns each
//! primitive into its bounding box and culls primitives with a negative coordinate.
//! The pixel routine fills the bounding box rows of its cluster in render target 0 with
//! pixel constant 0 (as RGBA8), and records pixel constant 1 as a tag.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use swr_cpu::swr_common::draw_data::VertexStream;
use swr_cpu::swr_common::geometry::Topology;
use swr_cpu::swr_common::{
    Buffer, Cluster, DrawData, PixelRoutine, Primitive, RoutineError, SetupRoutine, Stage,
    Surface, Triangle, VertexRoutine,
};
use swr_cpu::{Backend, PipelineConfig, PipelineState, Renderer};

/// Blocks pixel routines until opened.
#[derive(Debug, Default)]
pub(crate) struct Gate {
    open: Mutex<bool>,
    condvar: Condvar,
}

impl Gate {
    pub(crate) fn closed() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn open(&self) {
        *self.open.lock() = true;
        self.condvar.notify_all();
    }

    fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.condvar.wait(&mut open);
        }
    }
}

/// What the routines of a [`TestBackend`] observed.
#[derive(Debug, Default)]
pub(crate) struct Log {
    compiles: [AtomicUsize; 3],
    /// `(cluster, tag)` for every rasterized unit.
    rasterized: Mutex<Vec<(u32, u32)>>,
}

impl Log {
    pub(crate) fn compiles(&self, stage: Stage) -> usize {
        self.compiles[stage as usize].load(Ordering::Relaxed)
    }

    pub(crate) fn total_compiles(&self) -> usize {
        [Stage::Vertex, Stage::Setup, Stage::Pixel]
            .map(|stage| self.compiles(stage))
            .iter()
            .sum()
    }

    /// The tags each cluster rasterized, in order.
    pub(crate) fn tags_per_cluster(&self, clusters: u32) -> Vec<Vec<u32>> {
        let rasterized = self.rasterized.lock();
        (0..clusters)
            .map(|cluster| {
                rasterized
                    .iter()
                    .filter(|(c, _)| *c == cluster)
                    .map(|(_, tag)| *tag)
                    .collect()
            })
            .collect()
    }
}

#[derive(Debug, Default)]
pub(crate) struct TestBackend {
    /// Part of every fingerprint; changing it means "new shaders".
    pub(crate) shader: u32,
    pub(crate) rasterizer_discard: bool,
    /// Make generation of this stage fail.
    pub(crate) fail: Option<Stage>,
    pub(crate) gate: Option<Arc<Gate>>,
    pub(crate) pixel_delay: Option<Duration>,
    pub(crate) log: Arc<Log>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct SetupKey {
    shader: u32,
    triangles: bool,
}

impl TestBackend {
    fn compile(&self, stage: Stage) -> Result<(), RoutineError> {
        if self.fail == Some(stage) {
            return Err(RoutineError::new(stage, "out of executable memory"));
        }

        self.log.compiles[stage as usize].fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl Backend for TestBackend {
    type VertexState = u32;
    type SetupState = SetupKey;
    type PixelState = u32;

    fn resolve(&self, topology: Topology) -> PipelineState<u32, SetupKey, u32> {
        PipelineState {
            vertex: self.shader,
            setup: SetupKey {
                shader: self.shader,
                triangles: topology.is_triangle(),
            },
            pixel: self.shader,
            rasterizer_discard: self.rasterizer_discard,
        }
    }

    fn compile_vertex(&self, _: &u32) -> Result<Arc<dyn VertexRoutine>, RoutineError> {
        self.compile(Stage::Vertex)?;
        Ok(Arc::new(FetchPositions))
    }

    fn compile_setup(&self, _: &SetupKey) -> Result<Arc<dyn SetupRoutine>, RoutineError> {
        self.compile(Stage::Setup)?;
        Ok(Arc::new(BoundingBoxes))
    }

    fn compile_pixel(&self, _: &u32) -> Result<Arc<dyn PixelRoutine>, RoutineError> {
        self.compile(Stage::Pixel)?;
        Ok(Arc::new(FillRows {
            gate: self.gate.clone(),
            delay: self.pixel_delay,
            log: self.log.clone(),
        }))
    }
}

struct FetchPositions;

impl VertexRoutine for FetchPositions {
    fn process(&self, output: &mut [Triangle], indices: &[[u32; 3]], data: &DrawData) {
        for (triangle, indices) in output.iter_mut().zip(indices) {
            for (vertex, &index) in triangle.vertices.iter_mut().zip(indices) {
                let [x, y] = data.attribute::<[f32; 2]>(0, index).unwrap_or([-1.0, -1.0]);
                vertex.position = [x, y, 0.0, 1.0];
                vertex.varyings[0] = [index as f32, 0.0, 0.0, 0.0];
                vertex.clip_flags = u32::from(x < 0.0 || y < 0.0);
            }
        }
    }
}

struct BoundingBoxes;

impl SetupRoutine for BoundingBoxes {
    fn setup(
        &self,
        output: &mut Vec<Primitive>,
        triangles: &[Triangle],
        _: Topology,
        _: &DrawData,
    ) {
        for triangle in triangles {
            if triangle.vertices.iter().any(|v| v.clip_flags != 0) {
                continue;
            }

            let xs = triangle.vertices.map(|v| v.position[0]);
            let ys = triangle.vertices.map(|v| v.position[1]);
            let min = |v: [f32; 3]| v.into_iter().fold(f32::INFINITY, f32::min).floor() as i32;
            let max = |v: [f32; 3]| v.into_iter().fold(f32::NEG_INFINITY, f32::max).ceil() as i32;

            let (x_min, y_min) = (min(xs), min(ys));
            output.push(Primitive {
                vertices: triangle.vertices,
                x_min,
                y_min,
                x_max: max(xs).max(x_min + 1),
                y_max: max(ys).max(y_min + 1),
                front_facing: true,
            });
        }
    }
}

struct FillRows {
    gate: Option<Arc<Gate>>,
    delay: Option<Duration>,
    log: Arc<Log>,
}

impl PixelRoutine for FillRows {
    fn rasterize(&self, primitives: &[Primitive], cluster: Cluster, data: &DrawData) -> u32 {
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let color = pack(data.constants.ps.c[0]);
        let tag = data.constants.ps.c[1][0] as u32;
        self.log.rasterized.lock().push((cluster.index, tag));

        let Some(target) = data.color_target(0) else {
            return 0;
        };

        let mut samples = 0;
        for primitive in primitives {
            let y_max = primitive.y_max.min(target.height() as i32);
            let x_min = primitive.x_min.max(0);
            let x_max = primitive.x_max.min(target.width() as i32);

            let mut y = cluster.first_row_from(primitive.y_min);
            while y < y_max {
                for x in x_min..x_max {
                    target.write(x as u32, y as u32, color);
                    samples += 1;
                }
                y += cluster.count as i32;
            }
        }

        samples
    }
}

/// Pack a float colour as RGBA8, red in the lowest byte.
pub(crate) fn pack(color: [f32; 4]) -> u32 {
    u32::from_le_bytes(color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
}

/// Vertices of one triangle per rectangle, whose bounding box is that rectangle.
pub(crate) fn rect_triangles(rects: &[[f32; 4]]) -> Arc<Buffer> {
    let vertices: Vec<[f32; 2]> = rects
        .iter()
        .flat_map(|&[x0, y0, x1, y1]| [[x0, y0], [x1, y0], [x0, y1]])
        .collect();
    Arc::new(Buffer::from_pod(&vertices))
}

/// A renderer drawing into a fresh `width`×`height` target.
pub(crate) fn renderer(
    backend: TestBackend,
    config: PipelineConfig,
    width: u32,
    height: u32,
) -> (Renderer<TestBackend>, Arc<Surface>) {
    let mut renderer = Renderer::new(backend, config).unwrap();
    let target = Arc::new(Surface::new(width, height));
    renderer.set_render_target(0, Some(target.clone())).unwrap();
    (renderer, target)
}

/// Bind `vertices` to input 0 and set the fill colour and tag.
pub(crate) fn prepare(
    renderer: &mut Renderer<TestBackend>,
    vertices: Arc<Buffer>,
    color: [f32; 4],
    tag: u32,
) {
    renderer
        .set_input_stream(0, VertexStream::buffer::<[f32; 2]>(vertices))
        .unwrap();
    renderer
        .set_pixel_shader_constant_f(0, &[color, [tag as f32, 0.0, 0.0, 0.0]])
        .unwrap();
}

/// Settings with `threads` workers and small batches, so draw calls span several units.
pub(crate) fn config(threads: u16) -> PipelineConfig {
    PipelineConfig {
        batch_size: 2,
        ..PipelineConfig::with_threads(threads)
    }
}

pub(crate) const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
pub(crate) const GREEN: [f32; 4] = [0.0, 1.0, 0.0, 1.0];
pub(crate) const BLUE: [f32; 4] = [0.0, 0.0, 1.0, 1.0];
