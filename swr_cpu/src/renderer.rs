// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The submitting side of the pipeline.

use crate::backend::Backend;
use crate::blit::{self, Filter};
use crate::pool::WorkerPool;
use crate::query::QueryTracker;
use crate::ring::{BoundResources, DrawCall, RoutineSet, SlotState};
use crate::scheduler::Pipeline;
use crate::timers::StageTimes;
use core::fmt::{Debug, Formatter};
use std::sync::Arc;
use swr_common::draw_data::{
    DirtyConstants, IndexView, ShaderConstants, StreamSource, TextureType, VertexStream,
    VERTEX_UNIFORM_VECTORS,
};
use swr_common::geometry::{
    ClipFlags, Float4, IndexFormat, Matrix, Plane, Rect, Topology, Viewport, ViewportTransform,
};
use swr_common::{
    Buffer, CacheStats, DrawData, Error, PipelineConfig, PixelRoutine, Query, Resource, Result,
    RoutineCache, SetupRoutine, Stage, Surface, VertexRoutine,
};

/// Units of a draw call are counted by the ring slot's signed reference count.
const MAX_UNITS: u32 = i32::MAX as u32;

/// Number of distinct vertex numbers.
const VERTEX_NUMBERS: u64 = 1 << 32;

/// What a draw call draws: a topology, and the index format if it is indexed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawType {
    pub topology: Topology,
    /// Set for draw calls that fetch their vertex indices from the index buffer.
    pub index_format: Option<IndexFormat>,
}

impl DrawType {
    pub fn indexed(topology: Topology, format: IndexFormat) -> Self {
        Self {
            topology,
            index_format: Some(format),
        }
    }
}

impl From<Topology> for DrawType {
    fn from(topology: Topology) -> Self {
        Self {
            topology,
            index_format: None,
        }
    }
}

#[derive(Clone, Debug)]
struct ResolvedRoutines {
    routines: RoutineSet,
    rasterizer_discard: bool,
}

/// The constant block of one ring slot.
///
/// Constant setters only write the renderer's master copy and raise `dirty`; a slot's
/// block catches up with the master copy when the next draw call is submitted into it.
#[derive(Debug)]
struct SlotConstants {
    block: Arc<ShaderConstants>,
    dirty: DirtyConstants,
}

impl SlotConstants {
    fn new() -> Self {
        Self {
            block: Arc::default(),
            dirty: DirtyConstants::ALL,
        }
    }

    fn refresh(&mut self, source: &ShaderConstants) -> (Arc<ShaderConstants>, DirtyConstants) {
        let dirty = core::mem::take(&mut self.dirty);
        if !dirty.is_clean() {
            // Copies the block if the previous draw call in this slot still holds it.
            Arc::make_mut(&mut self.block).copy_dirty(source, &dirty);
        }

        (self.block.clone(), dirty)
    }
}

/// A software renderer that splits draw calls into tasks and runs them on a pool of
/// worker threads.
///
/// State set through the `set_*` methods is captured by the next [`draw`](Self::draw)
/// call, so it can be changed freely while earlier draw calls are still being processed.
/// Dropping the renderer waits for all submitted work to finish.
///
/// ```ignore
/// let mut renderer = Renderer::new(backend, PipelineConfig::default())?;
/// renderer.set_render_target(0, Some(target.clone()))?;
/// renderer.draw(Topology::TriangleList, 0, 2, true)?;
/// renderer.synchronize();
/// ```
pub struct Renderer<B: Backend> {
    backend: B,
    pipeline: Arc<Pipeline>,
    pool: WorkerPool,
    vertex_routines: RoutineCache<B::VertexState, dyn VertexRoutine>,
    setup_routines: RoutineCache<B::SetupState, dyn SetupRoutine>,
    pixel_routines: RoutineCache<B::PixelState, dyn PixelRoutine>,
    /// The routines of the last `draw` that updated them.
    resolved: Option<ResolvedRoutines>,
    constants: ShaderConstants,
    slot_constants: Box<[SlotConstants]>,
    /// Everything but the constants and index range of the next draw call.
    state: DrawData,
    index_buffer: Option<Arc<Buffer>>,
    queries: QueryTracker,
}

impl<B: Backend> Renderer<B> {
    /// Create a renderer, spawning its worker threads.
    pub fn new(backend: B, config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        let pipeline = Arc::new(Pipeline::new(config));
        let pool = WorkerPool::spawn(&pipeline)?;

        Ok(Self {
            backend,
            pool,
            vertex_routines: RoutineCache::new("vertex"),
            setup_routines: RoutineCache::new("setup"),
            pixel_routines: RoutineCache::new("pixel"),
            resolved: None,
            constants: ShaderConstants::default(),
            slot_constants: (0..config.draw_capacity)
                .map(|_| SlotConstants::new())
                .collect(),
            state: DrawData::default(),
            index_buffer: None,
            queries: QueryTracker::default(),
            pipeline,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.pipeline.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the backend, e.g. to change shaders.
    ///
    /// The next draw call has to pass `update = true` for changes to take effect.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Submit a draw call of `primitive_count` primitives.
    ///
    /// For indexed draw calls `index_offset` is the first index to read from the index
    /// buffer; otherwise it is added to every vertex number. With `update`, the routines
    /// are resolved from the backend's current state, otherwise those of the previous
    /// draw call are reused.
    ///
    /// Returns as soon as the draw call is queued. This blocks only while every slot of
    /// the draw-call ring is in flight, and in single-threaded mode, where the draw call
    /// is processed before returning.
    pub fn draw(
        &mut self,
        draw_type: impl Into<DrawType>,
        index_offset: u32,
        primitive_count: u32,
        update: bool,
    ) -> Result<()> {
        let DrawType {
            topology,
            index_format,
        } = draw_type.into();

        let resolved = self
            .resolve_routines(topology, update)
            .inspect_err(|err| log::warn!("draw call abandoned: {err}"))?;
        self.check_counts(topology, index_format, index_offset, primitive_count)?;
        let indices = self.index_view(topology, index_format, index_offset, primitive_count)?;
        self.check_inputs()?;

        let slot = self.pipeline.ring.acquire();
        let (constants, dirty) = self.slot_constants[slot].refresh(&self.constants);

        let mut data = self.state.clone();
        data.constants = constants;
        data.base_vertex = if indices.is_some() { 0 } else { index_offset };
        data.indices = indices;

        let resources = bind_resources(&data);
        let batch_size = self.pipeline.config.batch_size;
        let queries = self
            .queries
            .capture(primitive_count.div_ceil(batch_size));

        log::trace!(
            "draw call of {primitive_count} {topology:?} primitives in slot {slot}: \
             {} resources, {} queries, dirty {dirty:?}",
            resources.len(),
            queries.len(),
        );

        let call = DrawCall {
            topology,
            batch_size,
            count: primitive_count,
            routines: resolved.routines,
            resources,
            queries,
            rasterizer_discard: resolved.rasterizer_discard,
            data,
        };

        if self.pipeline.ring.submit(slot, call) {
            self.pipeline.enqueue(slot);
        }

        Ok(())
    }

    fn resolve_routines(&mut self, topology: Topology, update: bool) -> Result<ResolvedRoutines> {
        if !update {
            if let Some(resolved) = &self.resolved {
                return Ok(resolved.clone());
            }
        }

        let state = self.backend.resolve(topology);
        let backend = &self.backend;
        let vertex = self
            .vertex_routines
            .acquire(&state.vertex, |key| backend.compile_vertex(key))?;
        let setup = self
            .setup_routines
            .acquire(&state.setup, |key| backend.compile_setup(key))?;
        let pixel = self
            .pixel_routines
            .acquire(&state.pixel, |key| backend.compile_pixel(key))?;

        let resolved = ResolvedRoutines {
            routines: RoutineSet {
                vertex,
                setup,
                pixel,
            },
            rasterizer_discard: state.rasterizer_discard,
        };
        self.resolved = Some(resolved.clone());

        Ok(resolved)
    }

    fn index_view(
        &self,
        topology: Topology,
        format: Option<IndexFormat>,
        index_offset: u32,
        primitive_count: u32,
    ) -> Result<Option<IndexView>> {
        let Some(format) = format else {
            return Ok(None);
        };

        let buffer = self.index_buffer.clone().ok_or_else(|| {
            Error::invalid_operation("indexed draw call without an index buffer")
        })?;
        let view = IndexView {
            buffer,
            format,
            first: index_offset as usize,
        };

        let needed = topology.vertex_count(primitive_count);
        if (view.available() as u64) < needed {
            return Err(Error::invalid_operation(format!(
                "draw call needs {needed} indices from offset {index_offset}, \
                 the index buffer has {}",
                view.available()
            )));
        }

        Ok(Some(view))
    }

    /// Reject draw calls whose units or vertex numbers don't fit the pipeline's counters.
    fn check_counts(
        &self,
        topology: Topology,
        format: Option<IndexFormat>,
        index_offset: u32,
        primitive_count: u32,
    ) -> Result<()> {
        let units = primitive_count.div_ceil(self.pipeline.config.batch_size);
        if units > MAX_UNITS {
            return Err(Error::invalid_operation(format!(
                "draw call of {primitive_count} primitives needs {units} units, \
                 at most {MAX_UNITS} are supported"
            )));
        }

        // Vertex numbers are 32 bits, and non-indexed draw calls add the offset to each.
        let mut vertex_end = topology.vertex_count(primitive_count);
        if format.is_none() {
            vertex_end += u64::from(index_offset);
        }
        if vertex_end > VERTEX_NUMBERS {
            return Err(Error::invalid_operation(format!(
                "draw call of {primitive_count} {topology:?} primitives from offset \
                 {index_offset} exceeds the 32-bit vertex range"
            )));
        }

        Ok(())
    }

    fn check_inputs(&self) -> Result<()> {
        for (index, input) in self.state.inputs.iter().enumerate() {
            if input.enabled && input.source.is_none() {
                return Err(Error::invalid_operation(format!(
                    "vertex input {index} is enabled but has no source"
                )));
            }
        }

        Ok(())
    }

    /// Copy `source_rect` of `source` into `dest_rect` of `dest`, scaling with `filter`.
    ///
    /// Waits for all submitted draw calls first, since they may render to either surface.
    pub fn blit(
        &self,
        source: &Surface,
        source_rect: Rect,
        dest: &Surface,
        dest_rect: Rect,
        filter: Filter,
    ) -> Result<()> {
        self.synchronize();
        blit::blit(source, source_rect, dest, dest_rect, filter)
    }

    /// Block until every submitted draw call has been processed and its resources
    /// unlocked.
    pub fn synchronize(&self) {
        self.pipeline.synchronize();
    }

    /// Drop every cached routine, e.g. after the code generator changed.
    ///
    /// Draw calls in flight keep the routines they were submitted with.
    pub fn invalidate_routines(&mut self) {
        self.vertex_routines.invalidate();
        self.setup_routines.invalidate();
        self.pixel_routines.invalidate();
        self.resolved = None;
    }

    pub fn routine_cache_stats(&self, stage: Stage) -> CacheStats {
        match stage {
            Stage::Vertex => self.vertex_routines.stats(),
            Stage::Setup => self.setup_routines.stats(),
            Stage::Pixel => self.pixel_routines.stats(),
        }
    }

    /// The number of threads that execute tasks, which is also the number of
    /// [`stage_times`](Self::stage_times) entries.
    pub fn thread_count(&self) -> usize {
        self.pipeline.timers.len()
    }

    /// Time thread `thread` spent in each routine stage since the last
    /// [`reset_timers`](Self::reset_timers).
    pub fn stage_times(&self, thread: usize) -> Option<StageTimes> {
        self.pipeline.timers.get(thread).map(|t| t.snapshot())
    }

    pub fn reset_timers(&self) {
        for timers in &self.pipeline.timers {
            timers.reset();
        }
    }

    /// The state of every slot of the draw-call ring.
    pub fn slot_states(&self) -> Vec<SlotState> {
        self.pipeline.ring.states()
    }

    pub fn set_index_buffer(&mut self, buffer: Option<Arc<Buffer>>) {
        self.index_buffer = buffer;
    }

    pub fn set_input_stream(&mut self, index: usize, stream: VertexStream) -> Result<()> {
        *checked(&mut self.state.inputs, index, "vertex input")? = stream;
        Ok(())
    }

    /// Bind `data` as client memory to input `index`, copying it.
    pub fn set_client_stream(
        &mut self,
        index: usize,
        data: &[u8],
        offset: usize,
        stride: usize,
    ) -> Result<()> {
        self.set_input_stream(
            index,
            VertexStream {
                enabled: true,
                source: Some(StreamSource::Client(data.into())),
                offset,
                stride,
            },
        )
    }

    pub fn set_render_target(&mut self, index: usize, target: Option<Arc<Surface>>) -> Result<()> {
        *checked(&mut self.state.targets.color, index, "render target")? = target;
        Ok(())
    }

    pub fn set_depth_stencil(&mut self, surface: Option<Arc<Surface>>) {
        self.state.targets.depth_stencil = surface;
    }

    pub fn set_texture_resource(
        &mut self,
        sampler: usize,
        resource: Option<Arc<dyn Resource>>,
    ) -> Result<()> {
        checked(&mut self.state.textures, sampler, "sampler")?.resource = resource;
        Ok(())
    }

    pub fn set_texture_type(&mut self, sampler: usize, texture_type: TextureType) -> Result<()> {
        checked(&mut self.state.textures, sampler, "sampler")?.texture_type = texture_type;
        Ok(())
    }

    pub fn set_texture_level(
        &mut self,
        sampler: usize,
        face: usize,
        level: usize,
        surface: Option<Arc<Surface>>,
    ) -> Result<()> {
        let binding = checked(&mut self.state.textures, sampler, "sampler")?;
        let faces = checked(&mut binding.levels, face, "cube face")?;
        *checked(faces, level, "mipmap level")? = surface;
        Ok(())
    }

    pub fn set_vertex_shader_constant_f(&mut self, index: usize, values: &[Float4]) -> Result<()> {
        let end = write_registers(
            &mut self.constants.vs.c[..VERTEX_UNIFORM_VECTORS],
            index,
            values,
            "vertex float constant",
        )?;
        self.mark_dirty(|d| &mut d.vs_f, end);
        Ok(())
    }

    pub fn set_vertex_shader_constant_i(&mut self, index: usize, values: &[[i32; 4]]) -> Result<()> {
        let end = write_registers(
            &mut self.constants.vs.i,
            index,
            values,
            "vertex integer constant",
        )?;
        self.mark_dirty(|d| &mut d.vs_i, end);
        Ok(())
    }

    pub fn set_vertex_shader_constant_b(&mut self, index: usize, values: &[bool]) -> Result<()> {
        let end = write_registers(
            &mut self.constants.vs.b,
            index,
            values,
            "vertex boolean constant",
        )?;
        self.mark_dirty(|d| &mut d.vs_b, end);
        Ok(())
    }

    pub fn set_pixel_shader_constant_f(&mut self, index: usize, values: &[Float4]) -> Result<()> {
        let end = write_registers(
            &mut self.constants.ps.c,
            index,
            values,
            "pixel float constant",
        )?;
        self.mark_dirty(|d| &mut d.ps_f, end);
        Ok(())
    }

    pub fn set_pixel_shader_constant_i(&mut self, index: usize, values: &[[i32; 4]]) -> Result<()> {
        let end = write_registers(
            &mut self.constants.ps.i,
            index,
            values,
            "pixel integer constant",
        )?;
        self.mark_dirty(|d| &mut d.ps_i, end);
        Ok(())
    }

    pub fn set_pixel_shader_constant_b(&mut self, index: usize, values: &[bool]) -> Result<()> {
        let end = write_registers(
            &mut self.constants.ps.b,
            index,
            values,
            "pixel boolean constant",
        )?;
        self.mark_dirty(|d| &mut d.ps_b, end);
        Ok(())
    }

    /// Raise the high-water mark selected by `field` to `end` in every slot.
    fn mark_dirty(&mut self, field: fn(&mut DirtyConstants) -> &mut usize, end: usize) {
        for slot in self.slot_constants.iter_mut() {
            let mark = field(&mut slot.dirty);
            *mark = (*mark).max(end);
        }
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.state.viewport_transform = ViewportTransform::from(&viewport);
        self.state.viewport = viewport;
    }

    pub fn set_clip_flags(&mut self, flags: ClipFlags) {
        self.state.clip_flags = flags;
    }

    pub fn set_clip_plane(&mut self, index: usize, plane: [f32; 4]) -> Result<()> {
        *checked(&mut self.state.clip_planes, index, "clip plane")? = Plane::from(plane);
        Ok(())
    }

    pub fn set_model_matrix(&mut self, index: usize, matrix: Matrix) -> Result<()> {
        *checked(&mut self.state.transform.model, index, "model matrix")? = matrix;
        Ok(())
    }

    pub fn set_view_matrix(&mut self, matrix: Matrix) {
        self.state.transform.view = matrix;
    }

    pub fn set_base_matrix(&mut self, matrix: Matrix) {
        self.state.transform.base = matrix;
    }

    pub fn set_projection_matrix(&mut self, matrix: Matrix) {
        self.state.transform.projection = matrix;
    }

    pub fn set_post_transform_enable(&mut self, enable: bool) {
        self.state.transform.post_transform = enable;
    }

    pub fn set_pos_scale(&mut self, scale: [f32; 2]) {
        self.state.pos_scale = scale;
    }

    pub fn set_pos_offset(&mut self, offset: [f32; 2]) {
        self.state.pos_offset = offset;
    }

    pub fn set_depth_bias(&mut self, bias: f32) {
        self.state.depth_bias = bias;
    }

    pub fn set_slope_depth_bias(&mut self, bias: f32) {
        self.state.slope_depth_bias = bias;
    }

    /// Register `query`. It only counts samples between `begin_query` and `end_query`.
    pub fn add_query(&mut self, query: Arc<Query>) {
        self.queries.add(query);
    }

    /// Unregister `query`. Draw calls already submitted still report to it.
    pub fn remove_query(&mut self, query: &Arc<Query>) {
        self.queries.remove(query);
    }

    /// Reset `query` and count the samples of every following draw call into it.
    pub fn begin_query(&mut self, query: &Arc<Query>) {
        self.queries.begin(query);
    }

    pub fn end_query(&mut self, query: &Arc<Query>) {
        self.queries.end(query);
    }
}

impl<B: Backend> Debug for Renderer<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Renderer")
            .field("config", &self.pipeline.config)
            .field("workers", &self.pool.len())
            .field("slots", &self.slot_states())
            .field("vertex_routines", &self.vertex_routines)
            .field("setup_routines", &self.setup_routines)
            .field("pixel_routines", &self.pixel_routines)
            .finish_non_exhaustive()
    }
}

impl<B: Backend> Drop for Renderer<B> {
    fn drop(&mut self) {
        self.pool.shutdown(&self.pipeline);
    }
}

/// Lock every resource `data` reads or writes.
fn bind_resources(data: &DrawData) -> BoundResources {
    let mut resources = BoundResources::default();

    if let Some(indices) = &data.indices {
        resources.bind(indices.buffer.clone());
    }

    for input in data.inputs.iter().filter(|input| input.enabled) {
        if let Some(StreamSource::Buffer(buffer)) = &input.source {
            resources.bind(buffer.clone());
        }
    }

    for texture in &data.textures {
        if let Some(resource) = &texture.resource {
            resources.bind(resource.clone());
        }
    }

    for target in data.targets.color.iter().flatten() {
        resources.bind(target.clone());
    }

    if let Some(depth_stencil) = &data.targets.depth_stencil {
        resources.bind(depth_stencil.clone());
    }

    resources
}

fn checked<'a, T>(items: &'a mut [T], index: usize, what: &str) -> Result<&'a mut T> {
    let len = items.len();
    items.get_mut(index).ok_or_else(|| {
        Error::invalid_operation(format!("{what} {index} is out of range (0..{len})"))
    })
}

/// Write `values` to `file[index..]`, returning the end of the written range.
fn write_registers<T: Copy>(
    file: &mut [T],
    index: usize,
    values: &[T],
    what: &str,
) -> Result<usize> {
    let len = file.len();
    let end = index
        .checked_add(values.len())
        .filter(|&end| end <= len)
        .ok_or_else(|| {
            Error::invalid_operation(format!(
                "{what} registers {index}..{} exceed the {len} available",
                index.saturating_add(values.len())
            ))
        })?;

    file[index..end].copy_from_slice(values);
    Ok(end)
}
