//! Normalized finish-line regions

use serde::{Deserialize, Serialize};

/// Smallest allowed width/height of a region, as a fraction of the frame
pub const MIN_REGION_EXTENT: f32 = 0.05;

/// Rectangle in normalized frame coordinates ([0,1] x [0,1])
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Integer pixel bounds of a region within a concrete frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Corner handle used when resizing a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragHandle {
    Nw,
    Ne,
    Sw,
    Se,
}

impl Default for Region {
    fn default() -> Self {
        Self {
            x: 0.25,
            y: 0.425,
            width: 0.5,
            height: 0.15,
        }
    }
}

/// `clamp` that tolerates `lo > hi` from float rounding (`lo` wins)
fn bounded(value: f32, lo: f32, hi: f32) -> f32 {
    value.min(hi).max(lo)
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

impl Region {
    /// Create a region, clamping all four fields jointly
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
        .clamped()
    }

    /// Return a copy that satisfies the region invariants.
    ///
    /// Extent is clamped to `[MIN_REGION_EXTENT, 1]` first, then the origin is
    /// clamped so the rectangle never leaves the frame. Non-finite values fall
    /// back to the minimum extent / zero origin.
    pub fn clamped(self) -> Self {
        let width = bounded(finite_or(self.width, MIN_REGION_EXTENT), MIN_REGION_EXTENT, 1.0);
        let height = bounded(finite_or(self.height, MIN_REGION_EXTENT), MIN_REGION_EXTENT, 1.0);
        let x = bounded(finite_or(self.x, 0.0), 0.0, 1.0 - width);
        let y = bounded(finite_or(self.y, 0.0), 0.0, 1.0 - height);
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Move the whole region by `(dx, dy)` from `start`, keeping its size
    pub fn translated(start: Region, dx: f32, dy: f32) -> Self {
        let start = start.clamped();
        Self {
            x: bounded(start.x + finite_or(dx, 0.0), 0.0, 1.0 - start.width),
            y: bounded(start.y + finite_or(dy, 0.0), 0.0, 1.0 - start.height),
            ..start
        }
    }

    /// Resize `start` by dragging one corner by `(dx, dy)`.
    ///
    /// The opposite corner stays fixed; the dragged edges stop at the frame
    /// border and at `MIN_REGION_EXTENT` from the fixed edges.
    pub fn dragged(start: Region, handle: DragHandle, dx: f32, dy: f32) -> Self {
        let s = start.clamped();
        let dx = finite_or(dx, 0.0);
        let dy = finite_or(dy, 0.0);
        let right = s.x + s.width;
        let bottom = s.y + s.height;

        let drag_left = || bounded(s.x + dx, 0.0, right - MIN_REGION_EXTENT);
        let drag_top = || bounded(s.y + dy, 0.0, bottom - MIN_REGION_EXTENT);
        let drag_width = || bounded(s.width + dx, MIN_REGION_EXTENT, 1.0 - s.x);
        let drag_height = || bounded(s.height + dy, MIN_REGION_EXTENT, 1.0 - s.y);

        let region = match handle {
            DragHandle::Nw => {
                let x = drag_left();
                let y = drag_top();
                Region {
                    x,
                    y,
                    width: right - x,
                    height: bottom - y,
                }
            }
            DragHandle::Ne => {
                let y = drag_top();
                Region {
                    x: s.x,
                    y,
                    width: drag_width(),
                    height: bottom - y,
                }
            }
            DragHandle::Sw => {
                let x = drag_left();
                Region {
                    x,
                    y: s.y,
                    width: right - x,
                    height: drag_height(),
                }
            }
            DragHandle::Se => Region {
                x: s.x,
                y: s.y,
                width: drag_width(),
                height: drag_height(),
            },
        };
        // Float rounding on `right - x` can land a hair outside the bounds
        region.clamped()
    }

    /// Integer pixel bounds inside a `frame_width` x `frame_height` frame.
    ///
    /// Origin is floored, extent is floored with a minimum of 1 pixel, and the
    /// result is cut to the frame. Depends only on the region and frame size.
    pub fn pixel_bounds(&self, frame_width: u32, frame_height: u32) -> PixelRect {
        let r = self.clamped();
        let fw = frame_width.max(1);
        let fh = frame_height.max(1);

        let x = ((r.x * fw as f32).floor() as u32).min(fw - 1);
        let y = ((r.y * fh as f32).floor() as u32).min(fh - 1);
        let width = ((r.width * fw as f32).floor() as u32).max(1).min(fw - x);
        let height = ((r.height * fh as f32).floor() as u32).max(1).min(fh - y);

        PixelRect {
            x,
            y,
            width,
            height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_valid(r: Region) {
        assert!(r.width >= MIN_REGION_EXTENT - 1e-6, "{:?}", r);
        assert!(r.height >= MIN_REGION_EXTENT - 1e-6, "{:?}", r);
        assert!(r.x >= 0.0 && r.y >= 0.0, "{:?}", r);
        assert!(r.x + r.width <= 1.0 + 1e-6, "{:?}", r);
        assert!(r.y + r.height <= 1.0 + 1e-6, "{:?}", r);
    }

    #[test]
    fn test_degenerate_region_clamps_to_minimum() {
        let r = Region::new(0.5, 0.5, 0.0, -1.0);
        assert_eq!(r.width, MIN_REGION_EXTENT);
        assert_eq!(r.height, MIN_REGION_EXTENT);
        assert_valid(r);
    }

    #[test]
    fn test_oversized_region() {
        let r = Region::new(0.8, 0.9, 3.0, 0.5);
        assert_eq!(r.width, 1.0);
        assert_eq!(r.x, 0.0);
        assert!((r.y - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_nan_fields() {
        let r = Region::new(f32::NAN, 0.1, f32::INFINITY, 0.2);
        assert_valid(r);
        assert_eq!(r.x, 0.0);
    }

    #[test]
    fn test_translate_stops_at_border() {
        let start = Region::new(0.6, 0.1, 0.3, 0.2);
        let moved = Region::translated(start, 0.5, -0.5);
        assert!((moved.x - 0.7).abs() < 1e-6);
        assert_eq!(moved.y, 0.0);
        assert_eq!(moved.width, start.width);
    }

    #[test]
    fn test_drag_never_inverts() {
        let start = Region::new(0.2, 0.2, 0.3, 0.3);
        // Drag the top-left corner far past the bottom-right one
        let r = Region::dragged(start, DragHandle::Nw, 0.9, 0.9);
        assert_valid(r);
        assert!((r.x + r.width - 0.5).abs() < 1e-5);
        assert!((r.width - MIN_REGION_EXTENT).abs() < 1e-5);

        let r = Region::dragged(start, DragHandle::Se, -0.9, 2.0);
        assert_valid(r);
        assert_eq!(r.width, MIN_REGION_EXTENT);
        assert!((r.height - 0.8).abs() < 1e-5);
    }

    #[test]
    fn test_drag_ne_and_sw() {
        let start = Region::new(0.2, 0.2, 0.3, 0.3);
        let ne = Region::dragged(start, DragHandle::Ne, 0.1, -0.1);
        assert!((ne.width - 0.4).abs() < 1e-5);
        assert!((ne.y - 0.1).abs() < 1e-5);
        assert!((ne.height - 0.4).abs() < 1e-5);

        let sw = Region::dragged(start, DragHandle::Sw, -0.1, 0.1);
        assert!((sw.x - 0.1).abs() < 1e-5);
        assert!((sw.width - 0.4).abs() < 1e-5);
        assert!((sw.height - 0.4).abs() < 1e-5);
    }

    #[test]
    fn test_pixel_bounds() {
        let r = Region::new(0.25, 0.5, 0.5, 0.25);
        assert_eq!(
            r.pixel_bounds(640, 480),
            PixelRect {
                x: 160,
                y: 240,
                width: 320,
                height: 120
            }
        );
    }

    #[test]
    fn test_pixel_bounds_tiny_frame() {
        let r = Region::new(0.95, 0.95, 0.05, 0.05);
        let b = r.pixel_bounds(3, 2);
        assert_eq!(b.width, 1);
        assert_eq!(b.height, 1);
        assert!(b.x < 3 && b.y < 2);
    }
}
