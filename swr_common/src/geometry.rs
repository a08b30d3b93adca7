// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Plain value types describing geometry and fixed-function state.

/// Four packed floats, the register type of shader constants and vertex outputs.
pub type Float4 = [f32; 4];

/// A row-major 4x4 matrix.
pub type Matrix = [[f32; 4]; 4];

/// The identity matrix.
pub const IDENTITY: Matrix = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// How consecutive vertices are grouped into primitives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topology {
    PointList,
    LineList,
    LineStrip,
    LineLoop,
    TriangleList,
    TriangleStrip,
    TriangleFan,
}

impl Topology {
    /// The number of vertices (or indices) consumed by `primitives` primitives.
    pub fn vertex_count(self, primitives: u32) -> u64 {
        let primitives = u64::from(primitives);
        if primitives == 0 {
            return 0;
        }

        match self {
            Self::PointList | Self::LineLoop => primitives,
            Self::LineList => primitives * 2,
            Self::LineStrip => primitives + 1,
            Self::TriangleList => primitives * 3,
            Self::TriangleStrip | Self::TriangleFan => primitives + 2,
        }
    }

    /// Whether the primitives of this topology are triangles.
    pub fn is_triangle(self) -> bool {
        matches!(
            self,
            Self::TriangleList | Self::TriangleStrip | Self::TriangleFan
        )
    }
}

/// The element size of an index buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    U8,
    U16,
    U32,
}

impl IndexFormat {
    /// Size of one index in bytes.
    pub fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

/// An integer rectangle, with exclusive `x1`/`y1`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl Rect {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// A rectangle at the origin with the given size.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    pub fn width(&self) -> i32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> i32 {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Whether `self` lies fully inside `other`.
    pub fn is_within(&self, other: &Self) -> bool {
        self.x0 >= other.x0 && self.y0 >= other.y0 && self.x1 <= other.x1 && self.y1 <= other.y1
    }
}

/// The viewport transform applied after projection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_z: f32,
    pub max_z: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            min_z: 0.0,
            max_z: 1.0,
        }
    }
}

/// Scale and offset derived from a [`Viewport`], in the form routines consume it.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ViewportTransform {
    /// Half the viewport extent, `(w / 2, h / 2, depth range, 1)`.
    pub scale: Float4,
    /// The viewport centre, `(x + w / 2, y + h / 2, near depth, 0)`.
    pub offset: Float4,
}

impl From<&Viewport> for ViewportTransform {
    fn from(viewport: &Viewport) -> Self {
        let half_width = viewport.width * 0.5;
        let half_height = viewport.height * 0.5;

        Self {
            scale: [half_width, half_height, viewport.max_z - viewport.min_z, 1.0],
            offset: [
                viewport.x + half_width,
                viewport.y + half_height,
                viewport.min_z,
                0.0,
            ],
        }
    }
}

/// A clip plane `a * x + b * y + c * z + d * w >= 0`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Plane {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
}

impl From<[f32; 4]> for Plane {
    fn from([a, b, c, d]: [f32; 4]) -> Self {
        Self { a, b, c, d }
    }
}

/// Which clip tests vertices are subjected to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ClipFlags(pub u32);

impl ClipFlags {
    pub const NONE: Self = Self(0);
    /// Clip against the view frustum.
    pub const FRUSTUM: Self = Self(0x3F);
    /// Discard vertices with non-finite coordinates.
    pub const FINITE: Self = Self(1 << 7);
    /// First user clip plane; planes `1..6` use the following bits.
    pub const PLANE0: Self = Self(1 << 8);

    /// The flag for user clip plane `index`.
    pub fn plane(index: usize) -> Self {
        Self(Self::PLANE0.0 << index)
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl core::ops::BitOr for ClipFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
