// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Buffers and surfaces that draw calls bind.
//!
//! A resource is locked once for every in-flight draw call that references it, and
//! unlocked when that draw call's ring slot is released. While a resource is locked its
//! owner must treat it as borrowed by the pipeline.

use core::fmt::{Debug, Formatter};
use core::sync::atomic::{AtomicU32, Ordering};

/// Something a draw call can hold on to while it is in flight.
pub trait Resource: Debug + Send + Sync {
    /// Record one more in-flight user.
    fn lock(&self);
    /// Drop one in-flight user.
    fn unlock(&self);
    /// Whether any in-flight draw call still references this resource.
    fn is_locked(&self) -> bool;
}

/// Count of in-flight users of a resource.
#[derive(Debug, Default)]
pub struct ResourceLock(AtomicU32);

impl ResourceLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }

    pub fn unlock(&self) {
        let previous = self.0.fetch_sub(1, Ordering::AcqRel);
        assert!(previous > 0, "unlocked a resource that wasn't locked");
    }

    pub fn count(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }
}

/// Immutable bytes, used for vertex and index data.
pub struct Buffer {
    data: Box<[u8]>,
    lock: ResourceLock,
}

impl Buffer {
    pub fn new(data: impl Into<Box<[u8]>>) -> Self {
        Self {
            data: data.into(),
            lock: ResourceLock::new(),
        }
    }

    /// Create a buffer holding the bytes of a slice of plain data.
    pub fn from_pod<T: bytemuck::Pod>(data: &[T]) -> Self {
        Self::new(bytemuck::cast_slice::<T, u8>(data).to_vec())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// How many in-flight draw calls reference this buffer.
    pub fn lock_count(&self) -> u32 {
        self.lock.count()
    }
}

impl Debug for Buffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.data.len())
            .field("locks", &self.lock.count())
            .finish()
    }
}

impl Resource for Buffer {
    fn lock(&self) {
        self.lock.lock();
    }

    fn unlock(&self) {
        self.lock.unlock();
    }

    fn is_locked(&self) -> bool {
        self.lock.count() > 0
    }
}

/// A 2D grid of 32-bit texels, used for render targets, depth buffers and textures.
///
/// Texels are stored atomically so that clusters rendering disjoint rows of the same
/// target can write concurrently. Colour surfaces use RGBA8 packed with red in the
/// lowest byte; depth surfaces store `f32` bits.
pub struct Surface {
    width: u32,
    height: u32,
    texels: Box<[AtomicU32]>,
    lock: ResourceLock,
}

impl Surface {
    /// Create a surface with every texel set to zero.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, 0)
    }

    pub fn filled(width: u32, height: u32, value: u32) -> Self {
        let len = width as usize * height as usize;

        Self {
            width,
            height,
            texels: (0..len).map(|_| AtomicU32::new(value)).collect(),
            lock: ResourceLock::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Read a texel, `None` if out of bounds.
    pub fn read(&self, x: u32, y: u32) -> Option<u32> {
        self.index(x, y)
            .map(|i| self.texels[i].load(Ordering::Relaxed))
    }

    /// Write a texel, ignoring out-of-bounds coordinates.
    pub fn write(&self, x: u32, y: u32, value: u32) {
        if let Some(i) = self.index(x, y) {
            self.texels[i].store(value, Ordering::Relaxed);
        }
    }

    /// Access a row of texels directly.
    pub fn row(&self, y: u32) -> Option<&[AtomicU32]> {
        if y >= self.height {
            return None;
        }

        let start = y as usize * self.width as usize;
        Some(&self.texels[start..start + self.width as usize])
    }

    pub fn fill(&self, value: u32) {
        for texel in self.texels.iter() {
            texel.store(value, Ordering::Relaxed);
        }
    }

    /// Copy out all texels, row by row.
    pub fn to_vec(&self) -> Vec<u32> {
        self.texels
            .iter()
            .map(|t| t.load(Ordering::Relaxed))
            .collect()
    }

    /// Copy out all texels as bytes, in native byte order.
    pub fn to_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.to_vec()).to_vec()
    }

    /// How many in-flight draw calls reference this surface.
    pub fn lock_count(&self) -> u32 {
        self.lock.count()
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height)
            .then(|| y as usize * self.width as usize + x as usize)
    }
}

impl Debug for Surface {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("locks", &self.lock.count())
            .finish()
    }
}

impl Resource for Surface {
    fn lock(&self) {
        self.lock.lock();
    }

    fn unlock(&self) {
        self.lock.unlock();
    }

    fn is_locked(&self) -> bool {
        self.lock.count() > 0
    }
}
