//! Downsampled luma grids

use ndarray::Array2;

/// Grayscale view of one lane's region for one frame.
///
/// Stored row-major as `height x width`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntensityGrid {
    samples: Array2<u8>,
}

impl IntensityGrid {
    /// Build a grid from row-major luma samples; `None` if the length does not match
    pub fn from_samples(width: usize, height: usize, samples: Vec<u8>) -> Option<Self> {
        Array2::from_shape_vec((height, width), samples)
            .ok()
            .map(|samples| Self { samples })
    }

    pub(crate) fn from_array(samples: Array2<u8>) -> Self {
        Self { samples }
    }

    /// Grid filled with one value
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            samples: Array2::from_elem((height, width), value),
        }
    }

    /// Grid width in cells
    pub fn width(&self) -> usize {
        self.samples.ncols()
    }

    /// Grid height in cells
    pub fn height(&self) -> usize {
        self.samples.nrows()
    }

    /// `(width, height)`
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width(), self.height())
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Luma at column `x`, row `y`
    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        self.samples.get((y, x)).copied()
    }

    /// Iterate samples in row-major order
    pub fn iter(&self) -> impl Iterator<Item = &u8> {
        self.samples.iter()
    }

    /// Underlying array
    pub fn as_array(&self) -> &Array2<u8> {
        &self.samples
    }
}
