// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! High-resolution accumulation of the CIF field.

use ndarray::{Array3, ArrayView3};

use crate::fields::CifField;

/// CIF vectors below this confidence do not contribute.
const CIF_ACCUMULATE_THRESHOLD: f32 = 0.1;
/// Approximate number of field cells voting for the same joint.
const NEIGHBORS: f32 = 16.0;

/// Dense per joint type confidence map at image resolution.
///
/// Every CIF vector adds a truncated Gaussian at the position it points to. Reads
/// are clipped to `[0, 1]`.
#[derive(Debug, Clone)]
pub struct CifHr {
    accumulated: Array3<f32>,
}

impl CifHr {
    /// Create an empty map.
    ///
    /// # Arguments
    ///
    /// * `n_fields` - Number of joint types.
    /// * `shape` - Image extent (height, width) in pixels.
    #[must_use]
    pub fn new(n_fields: usize, shape: (usize, usize)) -> Self {
        Self {
            accumulated: Array3::zeros((n_fields, shape.0, shape.1)),
        }
    }

    /// Add a CIF field to the map.
    ///
    /// # Arguments
    ///
    /// * `cif` - The CIF field.
    /// * `min_scale` - Vectors with a smaller scale (in pixels) are skipped.
    /// * `factor` - Multiplier for every contribution.
    #[allow(clippy::cast_precision_loss)]
    pub fn accumulate(&mut self, cif: &CifField<'_>, min_scale: f32, factor: f32) {
        let data = cif.data();
        let stride = cif.stride() as f32;
        let min_scale_f = min_scale / stride;
        let (n_fields, _, height, width) = data.dim();

        for f in 0..n_fields.min(self.accumulated.dim().0) {
            for j in 0..height {
                for i in 0..width {
                    let v = data[[f, 0, j, i]];
                    if v < CIF_ACCUMULATE_THRESHOLD {
                        continue;
                    }
                    let scale = data[[f, 4, j, i]];
                    if scale < min_scale_f {
                        continue;
                    }
                    let x = data[[f, 1, j, i]] * stride;
                    let y = data[[f, 2, j, i]] * stride;
                    let sigma = (0.5 * scale * stride).max(1.0);

                    self.add_gauss(f, v / NEIGHBORS * factor, x, y, sigma, 1.0);
                }
            }
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn add_gauss(&mut self, f: usize, v: f32, x: f32, y: f32, sigma: f32, truncate: f32) {
        if !(x.is_finite() && y.is_finite()) {
            return;
        }
        let (_, height, width) = self.accumulated.dim();
        let (height, width) = (height as i64, width as i64);

        let min_x = ((x - truncate * sigma) as i64).clamp(0, width - 1);
        let max_x = ((x + truncate * sigma + 1.0) as i64).clamp(min_x + 1, width);
        let min_y = ((y - truncate * sigma) as i64).clamp(0, height - 1);
        let max_y = ((y + truncate * sigma + 1.0) as i64).clamp(min_y + 1, height);

        let sigma2 = sigma * sigma;
        let truncate2_sigma2 = truncate * truncate * sigma2;
        for xx in min_x..max_x {
            let dx2 = (xx as f32 - x).powi(2);
            for yy in min_y..max_y {
                let dy2 = (yy as f32 - y).powi(2);
                let vv = if dx2 < 0.25 && dy2 < 0.25 {
                    v
                } else {
                    let d2 = dx2 + dy2;
                    if d2 > truncate2_sigma2 {
                        continue;
                    }
                    v * (-0.5 * d2 / sigma2).exp()
                };
                self.accumulated[[f, yy as usize, xx as usize]] += vv;
            }
        }
    }

    /// Confidence at the pixel nearest to `(x, y)`. Zero outside the map.
    #[must_use]
    pub fn value_at(&self, f: usize, x: f32, y: f32) -> f32 {
        self.cell(f, x, y)
            .map_or(0.0, |(yi, xi)| self.accumulated[[f, yi, xi]].min(1.0))
    }

    /// Strongest pixel within a square of half-width `radius` around `(x, y)`.
    ///
    /// Returns `(x, y, confidence)` of the first strictly best pixel in row-major
    /// order, or `None` when every pixel in the window is zero.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn peak_near(&self, f: usize, x: f32, y: f32, radius: f32) -> Option<(f32, f32, f32)> {
        let (n_fields, height, width) = self.accumulated.dim();
        if f >= n_fields || !(x.is_finite() && y.is_finite()) {
            return None;
        }
        let radius = radius.max(0.0);
        let lo = |c: f32| (c - radius).round().max(0.0) as usize;
        let hi = |c: f32, size: usize| ((c + radius).round().max(-1.0) + 1.0).min(size as f32) as usize;

        let mut best: Option<(usize, usize, f32)> = None;
        for yy in lo(y)..hi(y, height) {
            for xx in lo(x)..hi(x, width) {
                let v = self.accumulated[[f, yy, xx]].min(1.0);
                if v > best.map_or(0.0, |b| b.2) {
                    best = Some((xx, yy, v));
                }
            }
        }
        best.map(|(xx, yy, v)| (xx as f32, yy as f32, v))
    }

    /// Raw accumulated map (not clipped).
    #[must_use]
    pub fn accumulated(&self) -> ArrayView3<'_, f32> {
        self.accumulated.view()
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn cell(&self, f: usize, x: f32, y: f32) -> Option<(usize, usize)> {
        let (n_fields, height, width) = self.accumulated.dim();
        let (x, y) = (x.round(), y.round());
        if f >= n_fields || !(x >= 0.0 && y >= 0.0) {
            return None;
        }
        let (xi, yi) = (x as usize, y as usize);
        (xi < width && yi < height).then_some((yi, xi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    /// 16 cells voting for the same pixel accumulate to their confidence.
    fn voting_field(c: f32, x: f32, y: f32, scale: f32) -> Array4<f32> {
        let mut data = Array4::zeros((1, 5, 8, 8));
        for j in 0..4 {
            for i in 0..4 {
                data[[0, 0, j, i]] = c;
                data[[0, 1, j, i]] = x;
                data[[0, 2, j, i]] = y;
                data[[0, 4, j, i]] = scale;
            }
        }
        data
    }

    #[test]
    fn test_accumulate_votes() {
        let data = voting_field(0.8, 3.0, 4.0, 2.0);
        let mut cifhr = CifHr::new(1, (8, 8));
        cifhr.accumulate(&CifField::new(data.view(), 1), 0.0, 1.0);

        assert!((cifhr.value_at(0, 3.0, 4.0) - 0.8).abs() < 1e-5);
        // one sigma (1 pixel) away the Gaussian has decayed
        let side = cifhr.value_at(0, 4.0, 4.0);
        assert!(side > 0.0 && side < 0.8);
        // beyond the truncation radius nothing is added
        assert!(cifhr.value_at(0, 6.0, 4.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_stride_and_clipping() {
        let data = voting_field(1.0, 2.0, 1.0, 1.0);
        let mut cifhr = CifHr::new(1, (29, 29));
        let cif = CifField::new(data.view(), 4);
        cifhr.accumulate(&cif, 0.0, 1.0);
        cifhr.accumulate(&cif, 0.0, 1.0);

        // positions scale with the stride and reads are clipped
        assert!((cifhr.value_at(0, 8.0, 4.0) - 1.0).abs() < f32::EPSILON);
        assert!(cifhr.accumulated()[[0, 4, 8]] > 1.5);
        assert!(cifhr.value_at(0, -3.0, 4.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_low_confidence_and_min_scale_skipped() {
        let data = voting_field(0.05, 3.0, 3.0, 2.0);
        let mut cifhr = CifHr::new(1, (8, 8));
        cifhr.accumulate(&CifField::new(data.view(), 1), 0.0, 1.0);
        assert!(cifhr.value_at(0, 3.0, 3.0).abs() < f32::EPSILON);

        let data = voting_field(0.9, 3.0, 3.0, 2.0);
        cifhr.accumulate(&CifField::new(data.view(), 1), 3.0, 1.0);
        assert!(cifhr.value_at(0, 3.0, 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_peak_near() {
        let data = voting_field(0.6, 5.0, 5.0, 2.0);
        let mut cifhr = CifHr::new(1, (8, 8));
        cifhr.accumulate(&CifField::new(data.view(), 1), 0.0, 1.0);

        let (x, y, v) = cifhr.peak_near(0, 4.0, 6.0, 2.0).unwrap();
        assert_eq!((x, y), (5.0, 5.0));
        assert!((v - 0.6).abs() < 1e-5);

        assert!(cifhr.peak_near(0, 0.0, 0.0, 1.0).is_none());
        assert!(cifhr.peak_near(1, 5.0, 5.0, 1.0).is_none());

        cifhr.accumulated.fill(0.0);
        assert!(cifhr.peak_near(0, 5.0, 5.0, 2.0).is_none());
    }
}
