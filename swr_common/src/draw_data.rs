// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The immutable parameter block of a draw call.
//!
//! A [`DrawData`] is assembled by the submitting thread from the renderer's current
//! state and is only ever read afterwards. Routines receive it by reference.

use crate::geometry::{
    ClipFlags, Float4, IndexFormat, Matrix, Plane, Viewport, ViewportTransform, IDENTITY,
};
use crate::resource::{Buffer, Resource, Surface};
use std::sync::Arc;

/// Number of vertex input streams.
pub const MAX_VERTEX_INPUTS: usize = 16;
/// Number of float constant registers of the vertex stage. One extra register reads as
/// zero for out-of-range relative addressing.
pub const VERTEX_UNIFORM_VECTORS: usize = 256;
/// Number of float constant registers of the pixel stage.
pub const FRAGMENT_UNIFORM_VECTORS: usize = 224;
/// Number of integer and boolean constant registers of each stage.
pub const MAX_INT_CONSTANTS: usize = 16;
/// Number of samplers of the pixel stage.
pub const TEXTURE_IMAGE_UNITS: usize = 16;
/// Number of samplers of the vertex stage, following the pixel samplers.
pub const VERTEX_TEXTURE_IMAGE_UNITS: usize = 4;
/// Total number of samplers.
pub const TOTAL_IMAGE_UNITS: usize = TEXTURE_IMAGE_UNITS + VERTEX_TEXTURE_IMAGE_UNITS;
/// Number of mipmap levels per texture face.
pub const MIPMAP_LEVELS: usize = 14;
/// Number of faces of a cube texture.
pub const CUBE_FACES: usize = 6;
/// Number of colour render targets.
pub const RENDER_TARGETS: usize = 4;
/// Number of user clip planes.
pub const CLIP_PLANES: usize = 6;
/// Number of model matrices used for vertex blending.
pub const MODEL_MATRICES: usize = 12;

/// Constant registers of the vertex stage.
#[derive(Clone, Debug, PartialEq)]
pub struct VertexConstants {
    pub c: [Float4; VERTEX_UNIFORM_VECTORS + 1],
    pub i: [[i32; 4]; MAX_INT_CONSTANTS],
    pub b: [bool; MAX_INT_CONSTANTS],
}

/// Constant registers of the pixel stage.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelConstants {
    pub c: [Float4; FRAGMENT_UNIFORM_VECTORS],
    pub i: [[i32; 4]; MAX_INT_CONSTANTS],
    pub b: [bool; MAX_INT_CONSTANTS],
}

/// The constant registers of both programmable stages.
#[derive(Clone, Debug, PartialEq)]
pub struct ShaderConstants {
    pub vs: VertexConstants,
    pub ps: PixelConstants,
}

impl Default for ShaderConstants {
    fn default() -> Self {
        Self {
            vs: VertexConstants {
                c: [[0.0; 4]; VERTEX_UNIFORM_VECTORS + 1],
                i: [[0; 4]; MAX_INT_CONSTANTS],
                b: [false; MAX_INT_CONSTANTS],
            },
            ps: PixelConstants {
                c: [[0.0; 4]; FRAGMENT_UNIFORM_VECTORS],
                i: [[0; 4]; MAX_INT_CONSTANTS],
                b: [false; MAX_INT_CONSTANTS],
            },
        }
    }
}

impl ShaderConstants {
    /// Copy the registers marked in `dirty` from `source`.
    pub fn copy_dirty(&mut self, source: &Self, dirty: &DirtyConstants) {
        let vs_f = dirty.vs_f.min(VERTEX_UNIFORM_VECTORS);
        self.vs.c[..vs_f].copy_from_slice(&source.vs.c[..vs_f]);
        self.vs.i[..dirty.vs_i].copy_from_slice(&source.vs.i[..dirty.vs_i]);
        self.vs.b[..dirty.vs_b].copy_from_slice(&source.vs.b[..dirty.vs_b]);
        self.ps.c[..dirty.ps_f].copy_from_slice(&source.ps.c[..dirty.ps_f]);
        self.ps.i[..dirty.ps_i].copy_from_slice(&source.ps.i[..dirty.ps_i]);
        self.ps.b[..dirty.ps_b].copy_from_slice(&source.ps.b[..dirty.ps_b]);
    }
}

/// High-water marks of constant registers changed since a block was last refreshed.
///
/// Each field counts registers from the start of its register file, so copying the
/// prefix `[..n]` is enough to bring a stale block up to date.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DirtyConstants {
    pub vs_f: usize,
    pub vs_i: usize,
    pub vs_b: usize,
    pub ps_f: usize,
    pub ps_i: usize,
    pub ps_b: usize,
}

impl DirtyConstants {
    /// Everything is dirty.
    pub const ALL: Self = Self {
        vs_f: VERTEX_UNIFORM_VECTORS,
        vs_i: MAX_INT_CONSTANTS,
        vs_b: MAX_INT_CONSTANTS,
        ps_f: FRAGMENT_UNIFORM_VECTORS,
        ps_i: MAX_INT_CONSTANTS,
        ps_b: MAX_INT_CONSTANTS,
    };

    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Where the data of a vertex input stream lives.
#[derive(Clone, Debug)]
pub enum StreamSource {
    /// A buffer object owned by the host.
    Buffer(Arc<Buffer>),
    /// Client memory that was copied at the time the stream was bound.
    Client(Arc<[u8]>),
}

impl StreamSource {
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Buffer(buffer) => buffer.data(),
            Self::Client(bytes) => bytes,
        }
    }
}

/// One vertex input as prepared by the attribute streaming layer.
#[derive(Clone, Debug, Default)]
pub struct VertexStream {
    /// Whether the vertex program reads this input.
    pub enabled: bool,
    pub source: Option<StreamSource>,
    /// Byte offset of the first element.
    pub offset: usize,
    /// Distance between elements in bytes.
    pub stride: usize,
}

impl VertexStream {
    /// An enabled stream reading tightly packed `T`s from `buffer`.
    pub fn buffer<T>(buffer: Arc<Buffer>) -> Self {
        Self {
            enabled: true,
            source: Some(StreamSource::Buffer(buffer)),
            offset: 0,
            stride: size_of::<T>(),
        }
    }

    /// Read element `index` of the stream.
    ///
    /// Returns `None` if the stream has no source or the element lies outside of it.
    pub fn fetch<T: bytemuck::Pod>(&self, index: u32) -> Option<T> {
        let bytes = self.source.as_ref()?.bytes();
        let start = self
            .offset
            .checked_add(self.stride.checked_mul(index as usize)?)?;
        let element = bytes.get(start..start.checked_add(size_of::<T>())?)?;

        Some(bytemuck::pod_read_unaligned(element))
    }
}

/// The index buffer range of an indexed draw call.
#[derive(Clone, Debug)]
pub struct IndexView {
    pub buffer: Arc<Buffer>,
    pub format: IndexFormat,
    /// Offset of the first index of the draw call, in indices.
    pub first: usize,
}

impl IndexView {
    /// Read index `i` of the draw call.
    pub fn get(&self, i: u32) -> Option<u32> {
        let size = self.format.size();
        let start = (self.first + i as usize) * size;
        let bytes = self.buffer.data().get(start..start + size)?;

        Some(match self.format {
            IndexFormat::U8 => u32::from(bytes[0]),
            IndexFormat::U16 => u32::from(bytemuck::pod_read_unaligned::<u16>(bytes)),
            IndexFormat::U32 => bytemuck::pod_read_unaligned::<u32>(bytes),
        })
    }

    /// The number of indices available from `first` on.
    pub fn available(&self) -> usize {
        (self.buffer.len() / self.format.size()).saturating_sub(self.first)
    }
}

/// The kind of image bound to a sampler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextureType {
    #[default]
    Texture2D,
    Cube,
    Texture3D,
}

/// The images bound to one sampler.
#[derive(Clone, Debug, Default)]
pub struct TextureBinding {
    pub texture_type: TextureType,
    /// The texture object that owns the images, locked while a draw call uses it.
    pub resource: Option<Arc<dyn Resource>>,
    /// Images per face and mipmap level.
    pub levels: [[Option<Arc<Surface>>; MIPMAP_LEVELS]; CUBE_FACES],
}

impl TextureBinding {
    pub fn level(&self, face: usize, level: usize) -> Option<&Arc<Surface>> {
        self.levels.get(face)?.get(level)?.as_ref()
    }
}

/// The surfaces pixels are written to.
#[derive(Clone, Debug, Default)]
pub struct RenderTargets {
    pub color: [Option<Arc<Surface>>; RENDER_TARGETS],
    pub depth_stencil: Option<Arc<Surface>>,
}

/// Fixed-function transformation state.
#[derive(Clone, Debug, PartialEq)]
pub struct TransformState {
    pub model: [Matrix; MODEL_MATRICES],
    pub view: Matrix,
    pub base: Matrix,
    pub projection: Matrix,
    /// Positions are already transformed; skip the matrices.
    pub post_transform: bool,
}

impl Default for TransformState {
    fn default() -> Self {
        Self {
            model: [IDENTITY; MODEL_MATRICES],
            view: IDENTITY,
            base: IDENTITY,
            projection: IDENTITY,
            post_transform: false,
        }
    }
}

/// Everything a draw call's routines read, captured at submission time.
#[derive(Clone, Debug)]
pub struct DrawData {
    pub constants: Arc<ShaderConstants>,
    pub inputs: [VertexStream; MAX_VERTEX_INPUTS],
    /// Set for indexed draw calls.
    pub indices: Option<IndexView>,
    /// Added to every vertex index of non-indexed draw calls.
    pub base_vertex: u32,
    pub textures: [TextureBinding; TOTAL_IMAGE_UNITS],
    pub targets: RenderTargets,
    pub viewport: Viewport,
    pub viewport_transform: ViewportTransform,
    pub clip_planes: [Plane; CLIP_PLANES],
    pub clip_flags: ClipFlags,
    pub transform: TransformState,
    pub pos_scale: [f32; 2],
    pub pos_offset: [f32; 2],
    pub depth_bias: f32,
    pub slope_depth_bias: f32,
}

impl Default for DrawData {
    fn default() -> Self {
        Self {
            constants: Arc::default(),
            inputs: Default::default(),
            indices: None,
            base_vertex: 0,
            textures: Default::default(),
            targets: RenderTargets::default(),
            viewport: Viewport::default(),
            viewport_transform: ViewportTransform::default(),
            clip_planes: [Plane::default(); CLIP_PLANES],
            clip_flags: ClipFlags::NONE,
            transform: TransformState::default(),
            pos_scale: [1.0, 1.0],
            pos_offset: [0.0, 0.0],
            depth_bias: 0.0,
            slope_depth_bias: 0.0,
        }
    }
}

impl DrawData {
    /// Resolve the vertex index of the `i`th index of the draw call.
    pub fn vertex_index(&self, i: u32) -> u32 {
        match &self.indices {
            // Validated at submission time, so a miss can only come from a routine
            // asking for an index outside the draw call.
            Some(indices) => indices.get(i).unwrap_or(0),
            None => self.base_vertex.wrapping_add(i),
        }
    }

    /// Read element `vertex` of input stream `input`.
    pub fn attribute<T: bytemuck::Pod>(&self, input: usize, vertex: u32) -> Option<T> {
        self.inputs.get(input)?.fetch(vertex)
    }

    /// The colour target `index`, if bound.
    pub fn color_target(&self, index: usize) -> Option<&Surface> {
        self.targets.color.get(index)?.as_deref()
    }
}
