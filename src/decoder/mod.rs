// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! CIF/CAF decoding.
//!
//! [`CifCaf`] turns a composite intensity field and a composite association field into
//! skeletons. Seeds come from the accumulated intensity map, each unclaimed seed is grown
//! along the skeleton by [`GreedyGrower`], and the joints of every finished annotation
//! are claimed in an occupancy grid so later seeds on the same person are skipped.

pub mod connection;
pub mod force_complete;
pub mod frontier;
pub mod grow;
pub mod nms;

use std::time::Instant;

use ndarray::{Array2, ArrayView4};

pub use connection::{grow_connection_blend, ConnectionEvaluator, ConnectionValue};
pub use force_complete::{flood_fill, ForceCompleteConnection, ForceCompleter};
pub use frontier::{Candidate, Frontier, FrontierEntry};
pub use grow::GreedyGrower;
pub use nms::KeypointNms;

use crate::annotation::{annotations_to_array, sort_by_score, Annotation};
use crate::config::DecoderConfig;
use crate::error::Result;
use crate::fields::{validate_pair, CafField, CifField};
use crate::skeleton::Topology;
use crate::utils::{CafScored, CifHr, CifSeeds, Occupancy};
use crate::verbose;

/// Pixels per cell of the decoder occupancy grid.
const OCCUPANCY_REDUCTION: f32 = 2.0;
/// Minimum claim half-width of the decoder occupancy grid in pixels.
const OCCUPANCY_MIN_SCALE: f32 = 4.0;

/// CIF/CAF pose decoder for one skeleton topology.
///
/// The decoder holds no per-image state, so one instance can decode any number of
/// images. Every call builds its own dense map, occupancy grid and frontiers.
///
/// # Example
///
/// ```rust
/// use cifcaf_decoder::{CifCaf, DecoderConfig};
/// use ndarray::Array4;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let decoder = CifCaf::coco_person(DecoderConfig::new())?;
///
/// let cif = Array4::<f32>::zeros((17, 5, 33, 33));
/// let caf = Array4::<f32>::zeros((19, 9, 33, 33));
/// let rows = decoder.decode(cif.view(), 8, caf.view(), 8)?;
/// assert_eq!(rows.ncols(), 6);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CifCaf {
    topology: Topology,
    config: DecoderConfig,
}

impl CifCaf {
    /// Create a decoder.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DecodeError::ConfigError`] if the configuration is invalid.
    pub fn new(topology: Topology, config: DecoderConfig) -> Result<Self> {
        let config = config.validated()?;
        Ok(Self { topology, config })
    }

    /// Create a decoder for the COCO person skeleton.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DecodeError::ConfigError`] if the configuration is invalid.
    pub fn coco_person(config: DecoderConfig) -> Result<Self> {
        Self::new(Topology::coco_person(), config)
    }

    /// The skeleton topology.
    #[must_use]
    pub const fn topology(&self) -> &Topology {
        &self.topology
    }

    /// The validated configuration.
    #[must_use]
    pub const fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode one image into annotations sorted by descending score.
    ///
    /// # Arguments
    ///
    /// * `cif` - Intensity field, one field per joint type.
    /// * `caf` - Association field, one field per limb.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DecodeError::FieldShapeError`] if a field does not match the
    /// topology or the two fields cover different image extents.
    pub fn call(&self, cif: &CifField<'_>, caf: &CafField<'_>) -> Result<Vec<Annotation>> {
        cif.validate(&self.topology)?;
        caf.validate(&self.topology)?;
        validate_pair(cif, caf)?;

        let start = Instant::now();
        let hr_shape = cif.hr_shape();
        let n_keypoints = self.topology.n_keypoints();

        let mut cifhr = CifHr::new(n_keypoints, hr_shape);
        cifhr.accumulate(cif, 0.0, 1.0);
        let seeds = CifSeeds::new(&cifhr, self.config.cif_threshold, self.config.seed_threshold)
            .fill(cif)
            .get();
        let caf_scored = CafScored::new(
            self.topology.n_limbs(),
            self.config.caf_threshold,
            self.config.cif_floor,
        )
        .fill(caf, &self.topology, &cifhr);
        let prepare_time = start.elapsed().as_secs_f64() * 1000.0;
        verbose!(
            "seeds: {}, caf entries: {} forward / {} backward ({:.1}ms)",
            seeds.len(),
            caf_scored.n_forward(),
            caf_scored.n_backward(),
            prepare_time
        );

        let start_grow = Instant::now();
        let mut occupied = Occupancy::new(n_keypoints, hr_shape, OCCUPANCY_REDUCTION, OCCUPANCY_MIN_SCALE);
        let evaluator = ConnectionEvaluator::new(&caf_scored, &self.topology, &self.config);
        let grower = GreedyGrower::new(&self.topology, evaluator, self.config.greedy);

        let mut annotations = Vec::new();
        for seed in &seeds {
            if occupied.get(seed.field, seed.joint.x, seed.joint.y) {
                continue;
            }
            let mut ann = Annotation::new(&self.topology).with_seed(seed.field, seed.joint);
            grower.grow(&mut ann);
            mark_occupied(&mut occupied, &ann);
            annotations.push(ann);
        }
        let grow_time = start_grow.elapsed().as_secs_f64() * 1000.0;
        verbose!("annotations: {} ({:.1}ms)", annotations.len(), grow_time);

        let start_complete = Instant::now();
        if self.config.force_complete {
            let completer = ForceCompleter::new(&self.topology, &cifhr, caf, &self.config);
            let completed = completer.complete(&mut annotations, &mut occupied);
            verbose!("force complete: {completed} joints");
        }
        if self.config.flood_fill {
            let filled: usize = annotations
                .iter_mut()
                .map(|ann| flood_fill(ann, &self.topology))
                .sum();
            verbose!("flood fill: {filled} joints");
        }
        if self.config.nms {
            annotations = KeypointNms::from_config(&self.config).annotations(annotations);
        }
        sort_by_score(&mut annotations);
        let complete_time = start_complete.elapsed().as_secs_f64() * 1000.0;

        verbose!(
            "decoded {} annotations in {:.1}ms ({:.1}ms prepare, {:.1}ms grow, {:.1}ms complete)",
            annotations.len(),
            start.elapsed().as_secs_f64() * 1000.0,
            prepare_time,
            grow_time,
            complete_time
        );
        Ok(annotations)
    }

    /// Decode one image into rows of `(skeleton_index, joint_type, v, x, y, s)`.
    ///
    /// Coordinates and scales are in image pixels. Skeletons appear by descending score,
    /// each with one row per joint type including unfilled ones.
    ///
    /// # Errors
    ///
    /// Same as [`CifCaf::call`].
    pub fn decode(
        &self,
        cif: ArrayView4<'_, f32>,
        cif_stride: usize,
        caf: ArrayView4<'_, f32>,
        caf_stride: usize,
    ) -> Result<Array2<f32>> {
        let annotations = self.call(&CifField::new(cif, cif_stride), &CafField::new(caf, caf_stride))?;
        Ok(annotations_to_array(&annotations))
    }
}

fn mark_occupied(occupied: &mut Occupancy, ann: &Annotation) {
    for (joint_type, joint) in ann.joints().iter().enumerate() {
        if joint.is_found() {
            occupied.set(joint_type, joint.x, joint.y, joint.s);
        }
    }
}
