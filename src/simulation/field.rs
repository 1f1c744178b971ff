//! Field buffers
//!
//! A field buffer is the CPU counterpart of a float render target: a 2D grid of
//! samples addressed either by integer texel (with clamp-to-edge) or by uv with
//! bilinear filtering. Row 0 is the bottom edge (v = 0).

use cgmath::{Vector2, Zero};
use std::ops::{Add, Mul, Sub};

/// Anything that can live in a field buffer and be linearly filtered
pub trait Sample:
    Copy + Zero + Add<Output = Self> + Sub<Output = Self> + Mul<f32, Output = Self>
{
}

impl<T> Sample for T where
    T: Copy + Zero + Add<Output = T> + Sub<Output = T> + Mul<f32, Output = T>
{
}

pub type VelocityField = FieldBuffer<Vector2<f32>>;
pub type ScalarField = FieldBuffer<f32>;

/// Largest grid axis; matches the device texture and storage binding limits
pub const MAX_GRID_DIMENSION: usize = 4096;

/// Grid dimensions in cells
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridSize {
    pub width: usize,
    pub height: usize,
}

impl GridSize {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Grid size for a container at the given resolution scale.
    ///
    /// Each axis is `max(1, round(resolution * dimension))`, capped at
    /// [`MAX_GRID_DIMENSION`].
    pub fn for_container(resolution: f32, container: (f32, f32)) -> Self {
        let axis = |dim: f32| {
            let cells = (resolution * dim).round();
            if cells.is_nan() || cells < 1.0 {
                1
            } else if cells >= MAX_GRID_DIMENSION as f32 {
                MAX_GRID_DIMENSION
            } else {
                cells as usize
            }
        };
        Self::new(axis(container.0), axis(container.1))
    }

    pub fn cells(&self) -> usize {
        self.width.saturating_mul(self.height)
    }

    /// Size of one cell in uv units
    pub fn cell_scale(&self) -> Vector2<f32> {
        Vector2::new(1.0 / self.width as f32, 1.0 / self.height as f32)
    }

    /// Per-axis correction so that velocities are isotropic on non-square grids
    pub fn aspect_ratio(&self) -> Vector2<f32> {
        let longest = self.width.max(self.height) as f32;
        Vector2::new(longest / self.width as f32, longest / self.height as f32)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldBuffer<T> {
    size: GridSize,
    data: Vec<T>,
}

impl<T: Sample> FieldBuffer<T> {
    /// Create a zero-filled buffer
    pub fn new(size: GridSize) -> Self {
        Self {
            size,
            data: vec![T::zero(); size.cells()],
        }
    }

    pub fn from_fn(size: GridSize, f: impl Fn(usize, usize) -> T) -> Self {
        let data = (0..size.cells())
            .map(|i| f(i % size.width, i / size.width))
            .collect();
        Self { size, data }
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    pub fn width(&self) -> usize {
        self.size.width
    }

    pub fn height(&self) -> usize {
        self.size.height
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    fn idx(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.size.width && y < self.size.height);
        y * self.size.width + x
    }

    pub fn get(&self, x: usize, y: usize) -> T {
        self.data[self.idx(x, y)]
    }

    pub fn set(&mut self, x: usize, y: usize, value: T) {
        let i = self.idx(x, y);
        self.data[i] = value;
    }

    /// Texel fetch with clamp-to-edge addressing
    pub fn fetch(&self, x: isize, y: isize) -> T {
        let cx = x.clamp(0, self.size.width as isize - 1) as usize;
        let cy = y.clamp(0, self.size.height as isize - 1) as usize;
        self.get(cx, cy)
    }

    /// Centre of a texel in uv space
    pub fn cell_uv(&self, x: usize, y: usize) -> Vector2<f32> {
        Vector2::new(
            (x as f32 + 0.5) / self.size.width as f32,
            (y as f32 + 0.5) / self.size.height as f32,
        )
    }

    /// Bilinear sample at `uv`, clamped to the edge texels
    pub fn sample(&self, uv: Vector2<f32>) -> T {
        let gx = uv.x * self.size.width as f32 - 0.5;
        let gy = uv.y * self.size.height as f32 - 0.5;
        if !gx.is_finite() || !gy.is_finite() {
            return T::zero();
        }
        let x0 = gx.floor();
        let y0 = gy.floor();
        let sx = gx - x0;
        let sy = gy - y0;
        let (x0, y0) = (x0 as isize, y0 as isize);

        let v00 = self.fetch(x0, y0);
        let v10 = self.fetch(x0 + 1, y0);
        let v01 = self.fetch(x0, y0 + 1);
        let v11 = self.fetch(x0 + 1, y0 + 1);
        let bottom = v00 + (v10 - v00) * sx;
        let top = v01 + (v11 - v01) * sx;
        bottom + (top - bottom) * sy
    }

    pub fn fill(&mut self, value: T) {
        self.data.iter_mut().for_each(|v| *v = value);
    }
}

/// RMS of the central-difference divergence of `velocity`.
///
/// Only cells whose stencil stays two cells away from the edge are counted, so
/// the untouched boundary ring does not dominate the measure.
pub fn divergence_norm(velocity: &VelocityField) -> f32 {
    let (w, h) = (velocity.width(), velocity.height());
    if w < 5 || h < 5 {
        return 0.0;
    }
    let mut sum = 0.0;
    let mut count = 0usize;
    for y in 2..h - 2 {
        for x in 2..w - 2 {
            let (xi, yi) = (x as isize, y as isize);
            let div = (velocity.fetch(xi + 1, yi).x - velocity.fetch(xi - 1, yi).x
                + velocity.fetch(xi, yi + 1).y
                - velocity.fetch(xi, yi - 1).y)
                / 2.0;
            sum += div * div;
            count += 1;
        }
    }
    (sum / count as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_size_rounds_and_floors_at_one() {
        assert_eq!(
            GridSize::for_container(0.5, (801.0, 600.0)),
            GridSize::new(401, 300)
        );
        assert_eq!(GridSize::for_container(0.5, (0.4, 0.0)), GridSize::new(1, 1));
        assert_eq!(
            GridSize::for_container(0.25, (10.0, 6.0)),
            GridSize::new(3, 2)
        );
    }

    #[test]
    fn test_grid_size_is_capped_at_device_limit() {
        let huge = GridSize::for_container(10.0, (1200.0, 800.0));
        assert_eq!(huge, GridSize::new(MAX_GRID_DIMENSION, MAX_GRID_DIMENSION));
        let wide = GridSize::for_container(4.0, (1200.0, 800.0));
        assert_eq!(wide, GridSize::new(MAX_GRID_DIMENSION, 3200));
        let unbounded = GridSize::for_container(f32::INFINITY, (1.0, 1.0));
        assert_eq!(unbounded, GridSize::new(MAX_GRID_DIMENSION, MAX_GRID_DIMENSION));
        assert_eq!(unbounded.cells(), MAX_GRID_DIMENSION * MAX_GRID_DIMENSION);
        assert_eq!(GridSize::new(usize::MAX, 2).cells(), usize::MAX);
    }

    #[test]
    fn test_fetch_clamps_to_edge() {
        let field = ScalarField::from_fn(GridSize::new(3, 2), |x, y| (x + 10 * y) as f32);
        assert_eq!(field.fetch(-4, 0), 0.0);
        assert_eq!(field.fetch(7, 1), 12.0);
        assert_eq!(field.fetch(1, 9), 11.0);
    }

    #[test]
    fn test_sample_hits_texel_centres_exactly() {
        let field = ScalarField::from_fn(GridSize::new(4, 4), |x, y| (x * 4 + y) as f32);
        for y in 0..4 {
            for x in 0..4 {
                let uv = field.cell_uv(x, y);
                assert!((field.sample(uv) - field.get(x, y)).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_sample_interpolates_between_centres() {
        let field = ScalarField::from_fn(GridSize::new(2, 1), |x, _| x as f32);
        let mid = field.sample(Vector2::new(0.5, 0.5));
        assert!((mid - 0.5).abs() < 1e-6);
        // Beyond the last centre the edge value is held
        assert_eq!(field.sample(Vector2::new(1.5, 0.5)), 1.0);
        assert_eq!(field.sample(Vector2::new(-3.0, 0.5)), 0.0);
    }

    #[test]
    fn test_aspect_ratio_scales_short_axis() {
        let ratio = GridSize::new(200, 100).aspect_ratio();
        assert_eq!(ratio, Vector2::new(1.0, 2.0));
    }

    #[test]
    fn test_divergence_norm_of_uniform_flow_is_zero() {
        let field = VelocityField::from_fn(GridSize::new(8, 8), |_, _| Vector2::new(0.3, -0.1));
        assert!(divergence_norm(&field) < 1e-7);

        let source = VelocityField::from_fn(GridSize::new(8, 8), |x, _| {
            Vector2::new(x as f32, 0.0)
        });
        assert!((divergence_norm(&source) - 1.0).abs() < 1e-6);
    }
}
