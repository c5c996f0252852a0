//! Frame Sampler
//!
//! Turns live video frames into per-lane motion signals:
//! - Normalized finish-line regions with clamped edit operations
//! - Area-resampled luma grids for a region of a frame
//! - Mean absolute difference between consecutive grids

pub mod grid;
pub mod region;
pub mod sampler;
pub mod score;

pub use grid::IntensityGrid;
pub use region::{DragHandle, PixelRect, Region, MIN_REGION_EXTENT};
pub use sampler::{RegionSampler, DEFAULT_DOWNSCALE};
pub use score::change_score;

use image::{ImageBuffer, Rgb, Rgba};
use thiserror::Error;

/// Sampler error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SamplerError {
    #[error("Frame has no pixels ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },

    #[error("Frame buffer too small: {actual} bytes for {width}x{height} {format:?}")]
    BufferSize {
        width: u32,
        height: u32,
        format: PixelFormat,
        actual: usize,
    },
}

/// Pixel layout of an incoming frame buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8,
    Rgb8,
}

impl PixelFormat {
    /// Bytes per pixel
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }
}

/// Borrowed RGBA frame as delivered by the video collaborator
pub type RgbaFrame<'a> = ImageBuffer<Rgba<u8>, &'a [u8]>;

/// Borrowed RGB frame
pub type RgbFrame<'a> = ImageBuffer<Rgb<u8>, &'a [u8]>;

/// Wrap a raw RGBA buffer without copying it
pub fn rgba_frame(data: &[u8], width: u32, height: u32) -> Result<RgbaFrame<'_>, SamplerError> {
    check_dimensions(data, width, height, PixelFormat::Rgba8)?;
    ImageBuffer::from_raw(width, height, data).ok_or(SamplerError::BufferSize {
        width,
        height,
        format: PixelFormat::Rgba8,
        actual: data.len(),
    })
}

/// Wrap a raw RGB24 buffer without copying it
pub fn rgb_frame(data: &[u8], width: u32, height: u32) -> Result<RgbFrame<'_>, SamplerError> {
    check_dimensions(data, width, height, PixelFormat::Rgb8)?;
    ImageBuffer::from_raw(width, height, data).ok_or(SamplerError::BufferSize {
        width,
        height,
        format: PixelFormat::Rgb8,
        actual: data.len(),
    })
}

fn check_dimensions(
    data: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<(), SamplerError> {
    if width == 0 || height == 0 {
        return Err(SamplerError::EmptyFrame { width, height });
    }
    let required = width as usize * height as usize * format.channels();
    if data.len() < required {
        return Err(SamplerError::BufferSize {
            width,
            height,
            format,
            actual: data.len(),
        });
    }
    Ok(())
}

/// Fixed-point luma: `(77*R + 150*G + 29*B) >> 8`
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luma_extremes() {
        assert_eq!(luma(0, 0, 0), 0);
        assert_eq!(luma(255, 255, 255), 255);
        // Green dominates
        assert!(luma(0, 255, 0) > luma(255, 0, 0));
        assert!(luma(255, 0, 0) > luma(0, 0, 255));
    }

    #[test]
    fn test_rgba_frame_rejects_short_buffer() {
        let data = vec![0u8; 10];
        let err = rgba_frame(&data, 4, 4).unwrap_err();
        assert!(matches!(err, SamplerError::BufferSize { actual: 10, .. }));
    }

    #[test]
    fn test_empty_frame() {
        let data: Vec<u8> = vec![];
        assert_eq!(
            rgb_frame(&data, 0, 3).unwrap_err(),
            SamplerError::EmptyFrame { width: 0, height: 3 }
        );
    }

    #[test]
    fn test_wrap_exact_buffer() {
        let data = vec![7u8; 4 * 3 * 2];
        let frame = rgba_frame(&data, 3, 2).unwrap();
        assert_eq!(frame.dimensions(), (3, 2));
    }
}
