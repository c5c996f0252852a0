//! Region sampling with area resampling

use image::{GenericImageView, Pixel};
use ndarray::Array2;
use tracing::trace;

use crate::{luma, IntensityGrid, Region};

/// Default downscale factor between region pixels and grid cells
pub const DEFAULT_DOWNSCALE: u32 = 4;

/// Reduces a region of a frame to a small luma grid.
///
/// Owns a scratch accumulator that is resized on demand and reused between
/// calls, so steady-state sampling does not allocate beyond the output grid.
#[derive(Debug, Clone)]
pub struct RegionSampler {
    downscale: u32,
    /// Per-cell `[r, g, b, count]` sums
    scratch: Vec<[u32; 4]>,
}

impl Default for RegionSampler {
    fn default() -> Self {
        Self::new(DEFAULT_DOWNSCALE)
    }
}

impl RegionSampler {
    /// Create a sampler; a downscale of 0 is treated as 1
    pub fn new(downscale: u32) -> Self {
        Self {
            downscale: downscale.max(1),
            scratch: Vec::new(),
        }
    }

    pub fn downscale(&self) -> u32 {
        self.downscale
    }

    /// Grid `(width, height)` for a region in a frame of the given size.
    ///
    /// Pure function of its arguments; frame contents never matter.
    pub fn grid_dimensions(&self, region: &Region, frame_width: u32, frame_height: u32) -> (usize, usize) {
        let rect = region.pixel_bounds(frame_width, frame_height);
        let width = (rect.width / self.downscale).max(1) as usize;
        let height = (rect.height / self.downscale).max(1) as usize;
        (width, height)
    }

    /// Sample `region` of `frame` into a luma grid.
    ///
    /// Every source pixel of the region contributes to exactly one cell; each
    /// cell's colour is the mean of its pixels, converted to luma afterwards.
    pub fn sample<I>(&mut self, frame: &I, region: &Region) -> IntensityGrid
    where
        I: GenericImageView,
        I::Pixel: Pixel<Subpixel = u8>,
    {
        let (frame_width, frame_height) = frame.dimensions();
        let rect = region.pixel_bounds(frame_width, frame_height);
        let (grid_width, grid_height) = self.grid_dimensions(region, frame_width, frame_height);

        self.scratch.clear();
        self.scratch.resize(grid_width * grid_height, [0; 4]);

        let src_w = rect.width as usize;
        let src_h = rect.height as usize;
        for py in 0..src_h {
            let row = (py * grid_height / src_h) * grid_width;
            for px in 0..src_w {
                let cell = &mut self.scratch[row + px * grid_width / src_w];
                let rgb = frame
                    .get_pixel(rect.x + px as u32, rect.y + py as u32)
                    .to_rgb();
                cell[0] += rgb[0] as u32;
                cell[1] += rgb[1] as u32;
                cell[2] += rgb[2] as u32;
                cell[3] += 1;
            }
        }

        trace!(
            "Sampled {}x{} px region into {}x{} grid",
            src_w,
            src_h,
            grid_width,
            grid_height
        );

        let scratch = &self.scratch;
        IntensityGrid::from_array(Array2::from_shape_fn((grid_height, grid_width), |(y, x)| {
            let [r, g, b, n] = scratch[y * grid_width + x];
            let n = n.max(1);
            let mean = |sum: u32| ((sum + n / 2) / n) as u8;
            luma(mean(r), mean(g), mean(b))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use proptest::prelude::*;

    fn solid(width: u32, height: u32, value: u8) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([value, value, value, 255]))
    }

    #[test]
    fn test_grid_dimensions() {
        let sampler = RegionSampler::default();
        let region = Region::new(0.25, 0.5, 0.5, 0.25);
        // 320x120 px region downscaled by 4
        assert_eq!(sampler.grid_dimensions(&region, 640, 480), (80, 30));
    }

    #[test]
    fn test_small_region_keeps_one_cell() {
        let sampler = RegionSampler::default();
        let region = Region::new(0.0, 0.0, 0.05, 0.05);
        assert_eq!(sampler.grid_dimensions(&region, 40, 40), (1, 1));
    }

    #[test]
    fn test_solid_frame_luma() {
        let mut sampler = RegionSampler::default();
        let frame = solid(64, 64, 128);
        let grid = sampler.sample(&frame, &Region::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(grid.dimensions(), (16, 16));
        assert!(grid.iter().all(|&v| v == luma(128, 128, 128)));
    }

    #[test]
    fn test_area_average() {
        // Left half black, right half white; one cell spans both
        let frame = RgbImage::from_fn(8, 4, |x, _| if x < 4 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) });
        let mut sampler = RegionSampler::new(8);
        let grid = sampler.sample(&frame, &Region::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(grid.dimensions(), (1, 1));
        let v = grid.get(0, 0).unwrap();
        assert!((126..=129).contains(&v), "got {}", v);
    }

    #[test]
    fn test_only_region_pixels_count() {
        // Bright square in the top-left quarter only
        let frame = RgbaImage::from_fn(40, 40, |x, y| {
            if x < 20 && y < 20 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        });
        let mut sampler = RegionSampler::default();
        let dark = sampler.sample(&frame, &Region::new(0.5, 0.5, 0.5, 0.5));
        assert!(dark.iter().all(|&v| v == 0));
        let bright = sampler.sample(&frame, &Region::new(0.0, 0.0, 0.5, 0.5));
        assert!(bright.iter().all(|&v| v == 255));
    }

    #[test]
    fn test_scratch_reused_across_sizes() {
        let mut sampler = RegionSampler::default();
        let frame = solid(100, 100, 50);
        let big = sampler.sample(&frame, &Region::new(0.0, 0.0, 1.0, 1.0));
        let small = sampler.sample(&frame, &Region::new(0.1, 0.1, 0.2, 0.2));
        assert_eq!(big.dimensions(), (25, 25));
        assert_eq!(small.dimensions(), (5, 5));
        assert!(small.iter().all(|&v| v == luma(50, 50, 50)));
    }

    proptest! {
        #[test]
        fn prop_dimensions_ignore_content(
            x in 0.0f32..1.0,
            y in 0.0f32..1.0,
            w in 0.0f32..1.2,
            h in 0.0f32..1.2,
            fw in 1u32..96,
            fh in 1u32..96,
            a in any::<u8>(),
            b in any::<u8>(),
        ) {
            let region = Region::new(x, y, w, h);
            let mut sampler = RegionSampler::default();
            let expected = sampler.grid_dimensions(&region, fw, fh);
            let first = sampler.sample(&solid(fw, fh, a), &region);
            let noisy = RgbaImage::from_fn(fw, fh, |px, py| {
                let v = a.wrapping_mul(px as u8).wrapping_add(b.wrapping_mul(py as u8));
                Rgba([v, b, a, 255])
            });
            let second = sampler.sample(&noisy, &region);
            prop_assert_eq!(first.dimensions(), expected);
            prop_assert_eq!(second.dimensions(), expected);
        }
    }
}
