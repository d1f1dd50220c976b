// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Borrowed network output fields.
//!
//! Both fields are 4D arrays `(n_fields, channels, height, width)` in field
//! coordinates. Positions and scales are multiplied by the stride when read, so
//! everything downstream works in image pixels.

use ndarray::ArrayView4;

use crate::error::{DecodeError, Result};
use crate::skeleton::Topology;

/// Composite intensity field: one field per joint type with channels
/// confidence, x, y, b, scale.
#[derive(Debug, Clone, Copy)]
pub struct CifField<'a> {
    data: ArrayView4<'a, f32>,
    stride: usize,
}

/// Composite association field: one field per limb with channels
/// confidence, x1, y1, x2, y2, b1, b2, s1, s2.
#[derive(Debug, Clone, Copy)]
pub struct CafField<'a> {
    data: ArrayView4<'a, f32>,
    stride: usize,
}

impl<'a> CifField<'a> {
    /// Channels per CIF vector.
    pub const N_CHANNELS: usize = 5;

    /// Wrap a CIF array.
    #[must_use]
    pub const fn new(data: ArrayView4<'a, f32>, stride: usize) -> Self {
        Self { data, stride }
    }

    /// Raw field data.
    #[must_use]
    pub const fn data(&self) -> &ArrayView4<'a, f32> {
        &self.data
    }

    /// Stride between field cells in image pixels.
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// Shape of the high-resolution map this field covers.
    #[must_use]
    pub fn hr_shape(&self) -> (usize, usize) {
        hr_shape(&self.data, self.stride)
    }

    /// Check the field against the topology.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::FieldShapeError`] on a zero stride, an empty spatial
    /// extent, a wrong channel count or a field count other than `n_keypoints`.
    pub fn validate(&self, topology: &Topology) -> Result<()> {
        validate(
            "CIF",
            &self.data,
            self.stride,
            topology.n_keypoints(),
            Self::N_CHANNELS,
        )
    }
}

impl<'a> CafField<'a> {
    /// Channels per CAF vector.
    pub const N_CHANNELS: usize = 9;

    /// Wrap a CAF array.
    #[must_use]
    pub const fn new(data: ArrayView4<'a, f32>, stride: usize) -> Self {
        Self { data, stride }
    }

    /// Raw field data.
    #[must_use]
    pub const fn data(&self) -> &ArrayView4<'a, f32> {
        &self.data
    }

    /// Stride between field cells in image pixels.
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// Shape of the high-resolution map this field covers.
    #[must_use]
    pub fn hr_shape(&self) -> (usize, usize) {
        hr_shape(&self.data, self.stride)
    }

    /// Check the field against the topology.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::FieldShapeError`] on a zero stride, an empty spatial
    /// extent, a wrong channel count or a field count other than the number of limbs.
    pub fn validate(&self, topology: &Topology) -> Result<()> {
        validate(
            "CAF",
            &self.data,
            self.stride,
            topology.n_limbs(),
            Self::N_CHANNELS,
        )
    }
}

/// Check that both fields cover the same image extent.
///
/// # Errors
///
/// Returns [`DecodeError::FieldShapeError`] when the strided extents differ.
pub fn validate_pair(cif: &CifField<'_>, caf: &CafField<'_>) -> Result<()> {
    let (cif_hr, caf_hr) = (cif.hr_shape(), caf.hr_shape());
    if cif_hr != caf_hr {
        return Err(DecodeError::FieldShapeError(format!(
            "CIF covers {}x{} pixels at stride {} but CAF covers {}x{} pixels at stride {}",
            cif_hr.1,
            cif_hr.0,
            cif.stride(),
            caf_hr.1,
            caf_hr.0,
            caf.stride()
        )));
    }
    Ok(())
}

fn hr_shape(data: &ArrayView4<'_, f32>, stride: usize) -> (usize, usize) {
    let shape = data.shape();
    (
        shape[2].saturating_sub(1) * stride + 1,
        shape[3].saturating_sub(1) * stride + 1,
    )
}

fn validate(
    name: &str,
    data: &ArrayView4<'_, f32>,
    stride: usize,
    n_fields: usize,
    n_channels: usize,
) -> Result<()> {
    let shape = data.shape();
    if stride == 0 {
        return Err(DecodeError::FieldShapeError(format!(
            "{name} stride must be positive"
        )));
    }
    if shape[0] != n_fields {
        return Err(DecodeError::FieldShapeError(format!(
            "{name} has {} fields, topology expects {n_fields} (shape {shape:?})",
            shape[0]
        )));
    }
    if shape[1] != n_channels {
        return Err(DecodeError::FieldShapeError(format!(
            "{name} has {} channels, expected {n_channels} (shape {shape:?})",
            shape[1]
        )));
    }
    if shape[2] == 0 || shape[3] == 0 {
        return Err(DecodeError::FieldShapeError(format!(
            "{name} has an empty spatial extent (shape {shape:?})"
        )));
    }
    Ok(())
}
