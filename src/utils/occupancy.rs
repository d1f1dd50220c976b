// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Per joint type occupancy grid used to suppress duplicate detections.

use ndarray::Array3;

/// Coarse boolean grid per joint type.
///
/// Positions are in image pixels and divided by `reduction` before indexing. A claim
/// covers a square with half-width `max(min_scale / reduction, sigma / reduction)` cells.
#[derive(Debug, Clone)]
pub struct Occupancy {
    occupied: Array3<bool>,
    reduction: f32,
    min_scale_reduced: f32,
}

impl Occupancy {
    /// Create an empty grid.
    ///
    /// # Arguments
    ///
    /// * `n_fields` - Number of joint types.
    /// * `shape` - Image extent (height, width) in pixels.
    /// * `reduction` - Pixels per grid cell.
    /// * `min_scale` - Minimum claim half-width in pixels.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn new(n_fields: usize, shape: (usize, usize), reduction: f32, min_scale: f32) -> Self {
        let reduction = reduction.max(1.0);
        let height = (shape.0 as f32 / reduction) as usize + 1;
        let width = (shape.1 as f32 / reduction) as usize + 1;
        Self {
            occupied: Array3::from_elem((n_fields, height, width), false),
            reduction,
            min_scale_reduced: min_scale / reduction,
        }
    }

    /// Claim the neighbourhood of a position for one joint type.
    /// Unknown joint types are ignored.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn set(&mut self, field: usize, x: f32, y: f32, sigma: f32) {
        let (n_fields, height, width) = self.occupied.dim();
        if field >= n_fields {
            return;
        }

        let x = x / self.reduction;
        let y = y / self.reduction;
        let sigma = self.min_scale_reduced.max(sigma / self.reduction);

        // truncation toward zero matches the truncating lookup in `get`
        let (min_x, max_x) = claim_range(x, sigma, width as i64);
        let (min_y, max_y) = claim_range(y, sigma, height as i64);
        for yy in min_y..max_y {
            for xx in min_x..max_x {
                self.occupied[[field, yy, xx]] = true;
            }
        }
    }

    /// Whether a position is claimed for a joint type.
    ///
    /// Reduced positions truncate toward zero like claims do, so `(-reduction, 0)` maps
    /// to the first cell. Unknown joint types, NaN and positions outside the grid count
    /// as claimed.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap
    )]
    pub fn get(&self, field: usize, x: f32, y: f32) -> bool {
        let (n_fields, height, width) = self.occupied.dim();
        if field >= n_fields || x.is_nan() || y.is_nan() {
            return true;
        }
        let xi = (x / self.reduction) as i64;
        let yi = (y / self.reduction) as i64;
        if xi < 0 || yi < 0 || xi >= width as i64 || yi >= height as i64 {
            return true;
        }
        self.occupied[[field, yi as usize, xi as usize]]
    }

    /// Whether a position is still free for a joint type.
    #[must_use]
    pub fn is_free(&self, field: usize, x: f32, y: f32) -> bool {
        !self.get(field, x, y)
    }

}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn claim_range(center: f32, sigma: f32, size: i64) -> (usize, usize) {
    let min = ((center - sigma) as i64).clamp(0, size - 1);
    let max = ((center + sigma) as i64).clamp(min + 1, size);
    (min as usize, max as usize)
}
