// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Seed extraction from the CIF field.

use std::cmp::Ordering;

use crate::annotation::Joint;
use crate::fields::CifField;
use crate::utils::cif_hr::CifHr;
use crate::utils::occupancy::Occupancy;

/// A single-joint detection that starts one annotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Seed {
    /// Joint type.
    pub field: usize,
    /// Rescored joint in image pixels.
    pub joint: Joint,
}

/// Collects seed candidates and returns them sorted and suppressed.
#[derive(Debug)]
pub struct CifSeeds<'a> {
    cifhr: &'a CifHr,
    cif_threshold: f32,
    seed_threshold: f32,
    seeds: Vec<Seed>,
}

impl<'a> CifSeeds<'a> {
    /// Create an empty seed collector over an accumulated confidence map.
    #[must_use]
    pub const fn new(cifhr: &'a CifHr, cif_threshold: f32, seed_threshold: f32) -> Self {
        Self {
            cifhr,
            cif_threshold,
            seed_threshold,
            seeds: Vec::new(),
        }
    }

    /// Add every CIF vector whose rescored confidence passes the seed threshold.
    ///
    /// The rescored confidence is `0.9 * cifhr + 0.1 * c`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fill(mut self, cif: &CifField<'_>) -> Self {
        let data = cif.data();
        let stride = cif.stride() as f32;
        let (n_fields, _, height, width) = data.dim();

        for f in 0..n_fields {
            for j in 0..height {
                for i in 0..width {
                    let c = data[[f, 0, j, i]];
                    if c < self.cif_threshold {
                        continue;
                    }
                    let x = data[[f, 1, j, i]] * stride;
                    let y = data[[f, 2, j, i]] * stride;
                    let v = 0.9 * self.cifhr.value_at(f, x, y) + 0.1 * c;
                    if v < self.seed_threshold {
                        continue;
                    }
                    let s = data[[f, 4, j, i]] * stride;
                    self.seeds.push(Seed {
                        field: f,
                        joint: Joint::new(v, x, y, s),
                    });
                }
            }
        }

        self
    }

    /// Seeds in descending confidence with duplicates of the same joint suppressed.
    ///
    /// Ties are ordered by joint type, then y, then x, so the result does not depend
    /// on field traversal order.
    #[must_use]
    pub fn get(mut self) -> Vec<Seed> {
        self.seeds.sort_by(seed_cmp_desc);

        let (n_fields, height, width) = self.cifhr.accumulated().dim();
        let mut occupied = Occupancy::new(n_fields, (height, width), 2.0, 4.0);

        let mut seeds = Vec::with_capacity(self.seeds.len());
        for seed in self.seeds {
            let Joint { x, y, s, .. } = seed.joint;
            if occupied.get(seed.field, x, y) {
                continue;
            }
            occupied.set(seed.field, x, y, s);
            seeds.push(seed);
        }
        seeds
    }
}

fn seed_cmp_desc(a: &Seed, b: &Seed) -> Ordering {
    b.joint
        .v
        .total_cmp(&a.joint.v)
        .then_with(|| a.field.cmp(&b.field))
        .then_with(|| a.joint.y.total_cmp(&b.joint.y))
        .then_with(|| a.joint.x.total_cmp(&b.joint.x))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    fn vote(data: &mut Array4<f32>, f: usize, cells: (usize, usize), c: f32, x: f32, y: f32) {
        for j in cells.0..cells.0 + 4 {
            for i in cells.1..cells.1 + 4 {
                data[[f, 0, j, i]] = c;
                data[[f, 1, j, i]] = x;
                data[[f, 2, j, i]] = y;
                data[[f, 4, j, i]] = 2.0;
            }
        }
    }

    fn seeds_for(data: &Array4<f32>, seed_threshold: f32) -> Vec<Seed> {
        let cif = CifField::new(data.view(), 1);
        let (height, width) = cif.hr_shape();
        let mut cifhr = CifHr::new(data.dim().0, (height, width));
        cifhr.accumulate(&cif, 0.0, 1.0);
        CifSeeds::new(&cifhr, 0.1, seed_threshold).fill(&cif).get()
    }

    #[test]
    fn test_duplicate_votes_collapse() {
        let mut data = Array4::zeros((1, 5, 20, 20));
        vote(&mut data, 0, (0, 0), 0.9, 5.0, 5.0);

        let seeds = seeds_for(&data, 0.5);
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].field, 0);
        assert!((seeds[0].joint.v - 0.9).abs() < 1e-5);
        assert_eq!((seeds[0].joint.x, seeds[0].joint.y), (5.0, 5.0));
        assert!((seeds[0].joint.s - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_sorted_descending_and_thresholded() {
        let mut data = Array4::zeros((2, 5, 20, 20));
        vote(&mut data, 0, (0, 0), 0.6, 4.0, 4.0);
        vote(&mut data, 1, (8, 8), 0.95, 15.0, 15.0);
        vote(&mut data, 0, (12, 0), 0.3, 3.0, 16.0);

        let seeds = seeds_for(&data, 0.5);
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[0].field, 1);
        assert_eq!(seeds[1].field, 0);
        assert!(seeds[0].joint.v > seeds[1].joint.v);
    }

    #[test]
    fn test_same_position_different_joint_types_kept() {
        let mut data = Array4::zeros((2, 5, 20, 20));
        vote(&mut data, 0, (0, 0), 0.8, 6.0, 6.0);
        vote(&mut data, 1, (4, 4), 0.8, 6.0, 6.0);

        let seeds = seeds_for(&data, 0.5);
        assert_eq!(seeds.len(), 2);
        // ties ordered by joint type
        assert_eq!(seeds[0].field, 0);
        assert_eq!(seeds[1].field, 1);
    }
}
