// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scaled copies between surfaces.

use core::sync::atomic::Ordering;
use rayon::prelude::*;
use swr_common::geometry::Rect;
use swr_common::{Error, Result, Surface};

/// How texels are sampled when the source and destination rectangles differ in size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Filter {
    #[default]
    Nearest,
    /// Interpolates the four nearest texels, per 8-bit channel.
    Linear,
}

/// Copy `source_rect` of `source` into `dest_rect` of `dest`, scaling as needed.
pub(crate) fn blit(
    source: &Surface,
    source_rect: Rect,
    dest: &Surface,
    dest_rect: Rect,
    filter: Filter,
) -> Result<()> {
    check_rect("source", source, source_rect)?;
    check_rect("destination", dest, dest_rect)?;

    let scale_x = source_rect.width() as f32 / dest_rect.width() as f32;
    let scale_y = source_rect.height() as f32 / dest_rect.height() as f32;
    let sampler = Sampler {
        source,
        rect: source_rect,
    };

    (dest_rect.y0..dest_rect.y1).into_par_iter().for_each(|y| {
        let Some(row) = dest.row(y as u32) else {
            return;
        };
        let v = (y - dest_rect.y0) as f32 + 0.5;

        for x in dest_rect.x0..dest_rect.x1 {
            let u = (x - dest_rect.x0) as f32 + 0.5;
            let texel = match filter {
                Filter::Nearest => sampler.nearest(u * scale_x, v * scale_y),
                Filter::Linear => sampler.linear(u * scale_x - 0.5, v * scale_y - 0.5),
            };
            row[x as usize].store(texel, Ordering::Relaxed);
        }
    });

    Ok(())
}

fn check_rect(name: &str, surface: &Surface, rect: Rect) -> Result<()> {
    if rect.is_empty() {
        return Err(Error::invalid_operation(format!(
            "{name} rectangle {rect:?} is empty"
        )));
    }

    if !rect.is_within(&Rect::from_size(surface.width(), surface.height())) {
        return Err(Error::invalid_operation(format!(
            "{name} rectangle {rect:?} exceeds the {}x{} surface",
            surface.width(),
            surface.height()
        )));
    }

    Ok(())
}

struct Sampler<'a> {
    source: &'a Surface,
    rect: Rect,
}

impl Sampler<'_> {
    /// The texel at `(x, y)` relative to the rectangle, clamped to it.
    fn texel(&self, x: i32, y: i32) -> u32 {
        let x = (self.rect.x0 + x).clamp(self.rect.x0, self.rect.x1 - 1);
        let y = (self.rect.y0 + y).clamp(self.rect.y0, self.rect.y1 - 1);
        self.source.read(x as u32, y as u32).unwrap_or(0)
    }

    fn nearest(&self, u: f32, v: f32) -> u32 {
        self.texel(u.floor() as i32, v.floor() as i32)
    }

    fn linear(&self, u: f32, v: f32) -> u32 {
        let (x, y) = (u.floor(), v.floor());
        let (fx, fy) = (u - x, v - y);
        let (x, y) = (x as i32, y as i32);

        let top = lerp(self.texel(x, y), self.texel(x + 1, y), fx);
        let bottom = lerp(self.texel(x, y + 1), self.texel(x + 1, y + 1), fx);
        lerp(top, bottom, fy)
    }
}

fn lerp(a: u32, b: u32, t: f32) -> u32 {
    let a = a.to_le_bytes();
    let b = b.to_le_bytes();
    let mut out = [0_u8; 4];

    for i in 0..4 {
        let value = f32::from(a[i]) + (f32::from(b[i]) - f32::from(a[i])) * t;
        out[i] = value.round().clamp(0.0, 255.0) as u8;
    }

    u32::from_le_bytes(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Surface {
        let surface = Surface::new(width, height);
        for y in 0..height {
            for x in 0..width {
                surface.write(x, y, y * 16 + x);
            }
        }
        surface
    }

    #[test]
    fn same_size_copy_is_exact() {
        let source = gradient(4, 4);
        let dest = Surface::new(4, 4);
        for filter in [Filter::Nearest, Filter::Linear] {
            blit(&source, Rect::from_size(4, 4), &dest, Rect::from_size(4, 4), filter).unwrap();
            assert_eq!(dest.to_vec(), source.to_vec());
        }
    }

    #[test]
    fn nearest_upscale_repeats_texels() {
        let source = gradient(2, 1);
        let dest = Surface::new(4, 2);
        blit(
            &source,
            Rect::from_size(2, 1),
            &dest,
            Rect::from_size(4, 2),
            Filter::Nearest,
        )
        .unwrap();
        assert_eq!(dest.to_vec(), [0, 0, 1, 1, 0, 0, 1, 1]);
    }

    #[test]
    fn linear_averages_channels() {
        let source = Surface::new(2, 1);
        source.write(0, 0, 0x00_00_00_00);
        source.write(1, 0, 0xFF_C8_64_20);
        let dest = Surface::new(1, 1);
        blit(
            &source,
            Rect::from_size(2, 1),
            &dest,
            Rect::from_size(1, 1),
            Filter::Linear,
        )
        .unwrap();
        assert_eq!(dest.read(0, 0), Some(0x80_64_32_10));
    }

    #[test]
    fn only_the_destination_rectangle_is_written() {
        let source = Surface::filled(2, 2, 7);
        let dest = Surface::new(4, 4);
        blit(
            &source,
            Rect::from_size(2, 2),
            &dest,
            Rect::new(1, 1, 3, 3),
            Filter::Nearest,
        )
        .unwrap();
        assert_eq!(dest.read(0, 0), Some(0));
        assert_eq!(dest.read(1, 1), Some(7));
        assert_eq!(dest.read(2, 2), Some(7));
        assert_eq!(dest.read(3, 3), Some(0));
    }

    #[test]
    fn rejects_bad_rectangles() {
        let surface = Surface::new(4, 4);
        let err = blit(
            &surface,
            Rect::new(0, 0, 5, 4),
            &surface,
            Rect::from_size(4, 4),
            Filter::Nearest,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));

        let err = blit(
            &surface,
            Rect::from_size(4, 4),
            &surface,
            Rect::new(2, 2, 2, 4),
            Filter::Nearest,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
    }
}
