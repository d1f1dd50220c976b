// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Skeleton topology: joint types and the limbs connecting them.

use crate::error::{DecodeError, Result};

/// COCO keypoint names, indexed by joint type.
pub const COCO_KEYPOINTS: [&str; 17] = [
    "nose",
    "left_eye",
    "right_eye",
    "left_ear",
    "right_ear",
    "left_shoulder",
    "right_shoulder",
    "left_elbow",
    "right_elbow",
    "left_wrist",
    "right_wrist",
    "left_hip",
    "right_hip",
    "left_knee",
    "right_knee",
    "left_ankle",
    "right_ankle",
];

/// COCO person skeleton (pairs of 0-based keypoint indices).
/// The limb index is also the index of the matching CAF field.
pub const COCO_PERSON_SKELETON: [[usize; 2]; 19] = [
    [15, 13], // left ankle to left knee
    [13, 11], // left knee to left hip
    [16, 14], // right ankle to right knee
    [14, 12], // right knee to right hip
    [11, 12], // left hip to right hip
    [5, 11],  // left shoulder to left hip
    [6, 12],  // right shoulder to right hip
    [5, 6],   // left shoulder to right shoulder
    [5, 7],   // left shoulder to left elbow
    [6, 8],   // right shoulder to right elbow
    [7, 9],   // left elbow to left wrist
    [8, 10],  // right elbow to right wrist
    [1, 2],   // left eye to right eye
    [0, 1],   // nose to left eye
    [0, 2],   // nose to right eye
    [1, 3],   // left eye to left ear
    [2, 4],   // right eye to right ear
    [3, 5],   // left ear to left shoulder
    [4, 6],   // right ear to right shoulder
];

/// COCO score weights: the three most confident keypoints count triple.
pub const COCO_SCORE_WEIGHTS: [f32; 17] = [
    3.0, 3.0, 3.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0,
];

/// One end of a limb as seen from the other end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimbEnd {
    /// Joint type at the far end.
    pub other: usize,
    /// Limb (and CAF field) index.
    pub limb: usize,
    /// `true` when walking the limb from its first to its second joint.
    pub forward: bool,
}

/// Skeleton topology shared read-only by every decode of one body model.
#[derive(Debug, Clone)]
pub struct Topology {
    n_keypoints: usize,
    limbs: Vec<[usize; 2]>,
    confidence_scales: Option<Vec<f32>>,
    score_weights: Vec<f32>,
    by_source: Vec<Vec<LimbEnd>>,
}

impl Topology {
    /// Create a topology with uniform score weights.
    ///
    /// # Arguments
    ///
    /// * `n_keypoints` - Number of joint types.
    /// * `limbs` - Pairs of joint types, one per CAF field.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::TopologyError`] if a limb references a joint type
    /// `>= n_keypoints` or connects a joint type to itself.
    pub fn new(n_keypoints: usize, limbs: Vec<[usize; 2]>) -> Result<Self> {
        if n_keypoints == 0 {
            return Err(DecodeError::TopologyError(
                "topology needs at least one keypoint".to_string(),
            ));
        }
        for (limb_i, &[j1, j2]) in limbs.iter().enumerate() {
            if j1 >= n_keypoints || j2 >= n_keypoints {
                return Err(DecodeError::TopologyError(format!(
                    "limb {limb_i} ({j1}, {j2}) references a joint type >= n_keypoints ({n_keypoints})"
                )));
            }
            if j1 == j2 {
                return Err(DecodeError::TopologyError(format!(
                    "limb {limb_i} connects joint type {j1} to itself"
                )));
            }
        }

        Ok(Self::from_valid_limbs(n_keypoints, limbs))
    }

    /// Build the adjacency for limbs already known to be in range.
    fn from_valid_limbs(n_keypoints: usize, limbs: Vec<[usize; 2]>) -> Self {
        let mut by_source = vec![Vec::new(); n_keypoints];
        for (limb_i, &[j1, j2]) in limbs.iter().enumerate() {
            by_source[j1].push(LimbEnd {
                other: j2,
                limb: limb_i,
                forward: true,
            });
            by_source[j2].push(LimbEnd {
                other: j1,
                limb: limb_i,
                forward: false,
            });
        }

        Self {
            n_keypoints,
            limbs,
            confidence_scales: None,
            score_weights: vec![1.0; n_keypoints],
            by_source,
        }
    }

    /// The 17-keypoint COCO person topology.
    #[must_use]
    pub fn coco_person() -> Self {
        Self {
            score_weights: COCO_SCORE_WEIGHTS.to_vec(),
            ..Self::from_valid_limbs(COCO_KEYPOINTS.len(), COCO_PERSON_SKELETON.to_vec())
        }
    }

    /// Set per-limb confidence scales.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::TopologyError`] if there is not exactly one scale per limb.
    pub fn with_confidence_scales(mut self, scales: Vec<f32>) -> Result<Self> {
        if scales.len() != self.limbs.len() {
            return Err(DecodeError::TopologyError(format!(
                "expected {} confidence scales, got {}",
                self.limbs.len(),
                scales.len()
            )));
        }
        self.confidence_scales = Some(scales);
        Ok(self)
    }

    /// Set the weights used to score annotations.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::TopologyError`] if there is not exactly one weight per joint type.
    pub fn with_score_weights(mut self, weights: Vec<f32>) -> Result<Self> {
        if weights.len() != self.n_keypoints {
            return Err(DecodeError::TopologyError(format!(
                "expected {} score weights, got {}",
                self.n_keypoints,
                weights.len()
            )));
        }
        self.score_weights = weights;
        Ok(self)
    }

    /// Number of joint types.
    #[must_use]
    pub const fn n_keypoints(&self) -> usize {
        self.n_keypoints
    }

    /// Number of limbs.
    #[must_use]
    pub fn n_limbs(&self) -> usize {
        self.limbs.len()
    }

    /// Limb definitions.
    #[must_use]
    pub fn limbs(&self) -> &[[usize; 2]] {
        &self.limbs
    }

    /// Annotation score weights.
    #[must_use]
    pub fn score_weights(&self) -> &[f32] {
        &self.score_weights
    }

    /// Limbs incident to `joint`, in limb order.
    #[must_use]
    pub fn neighbours(&self, joint: usize) -> &[LimbEnd] {
        self.by_source.get(joint).map(Vec::as_slice).unwrap_or_default()
    }

    /// The limb walked from `start` to `end`, if any.
    #[must_use]
    pub fn limb_between(&self, start: usize, end: usize) -> Option<LimbEnd> {
        self.neighbours(start)
            .iter()
            .find(|limb| limb.other == end)
            .copied()
    }

    /// Confidence scale of a limb, `1.0` when none are configured.
    #[must_use]
    pub fn confidence_scale(&self, limb: usize) -> f32 {
        self.confidence_scales
            .as_ref()
            .and_then(|scales| scales.get(limb).copied())
            .unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coco_person() {
        let topology = Topology::coco_person();
        assert_eq!(topology.n_keypoints(), 17);
        assert_eq!(topology.n_limbs(), 19);
        assert_eq!(topology.score_weights()[0], 3.0);

        // left shoulder touches left hip, right shoulder, left elbow and left ear
        let others: Vec<usize> = topology.neighbours(5).iter().map(|l| l.other).collect();
        assert_eq!(others, vec![11, 6, 7, 3]);
    }

    #[test]
    fn test_out_of_range_limb() {
        let err = Topology::new(2, vec![[0, 2]]).unwrap_err();
        assert!(matches!(err, DecodeError::TopologyError(_)));
        assert!(err.to_string().contains("limb 0"));
    }

    #[test]
    fn test_self_limb() {
        assert!(Topology::new(3, vec![[1, 1]]).is_err());
        assert!(Topology::new(0, vec![]).is_err());
    }

    #[test]
    fn test_limb_direction() {
        let topology = Topology::new(3, vec![[0, 1], [2, 1]]).unwrap();
        let forward = topology.limb_between(0, 1).unwrap();
        assert_eq!(forward.limb, 0);
        assert!(forward.forward);

        let backward = topology.limb_between(1, 2).unwrap();
        assert_eq!(backward.limb, 1);
        assert!(!backward.forward);

        assert!(topology.limb_between(0, 2).is_none());
    }

    #[test]
    fn test_confidence_scales() {
        let topology = Topology::new(3, vec![[0, 1], [1, 2]]).unwrap();
        assert!((topology.confidence_scale(1) - 1.0).abs() < f32::EPSILON);
        assert!(topology.clone().with_confidence_scales(vec![0.5]).is_err());

        let topology = topology.with_confidence_scales(vec![0.5, 0.25]).unwrap();
        assert!((topology.confidence_scale(1) - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn test_score_weights_length() {
        let topology = Topology::new(2, vec![[0, 1]]).unwrap();
        assert!(topology.clone().with_score_weights(vec![1.0]).is_err());
        assert!(topology.with_score_weights(vec![2.0, 1.0]).is_ok());
    }
}
