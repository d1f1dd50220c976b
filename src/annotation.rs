// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Decoded skeletons.
//!
//! An [`Annotation`] holds one [`Joint`] slot per joint type. A slot with `v == 0` is
//! unfilled; once filled it is never overwritten by growth or completion.

use ndarray::Array2;

use crate::skeleton::Topology;

/// Number of columns in the flat output array: skeleton, joint type, v, x, y, s.
pub const ROW_WIDTH: usize = 6;

/// A single body-part detection.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Joint {
    /// Confidence. `0.0` means "not found".
    pub v: f32,
    /// X coordinate in image pixels.
    pub x: f32,
    /// Y coordinate in image pixels.
    pub y: f32,
    /// Spatial scale in image pixels.
    pub s: f32,
}

impl Joint {
    /// Create a new joint.
    #[must_use]
    pub const fn new(v: f32, x: f32, y: f32, s: f32) -> Self {
        Self { v, x, y, s }
    }

    /// Whether this joint carries a detection.
    #[must_use]
    pub fn is_found(&self) -> bool {
        self.v > 0.0
    }
}

/// One accepted limb of a grown annotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodingStep {
    /// Joint type the limb was grown from.
    pub start: usize,
    /// Joint type that was filled.
    pub end: usize,
    /// Frontier priority bound the limb was admitted with.
    pub bound: f32,
    /// The accepted joint.
    pub joint: Joint,
}

/// A skeleton: one joint slot per joint type.
#[derive(Debug, Clone)]
pub struct Annotation {
    joints: Vec<Joint>,
    score_weights: Vec<f32>,
    decoding_order: Vec<DecodingStep>,
}

impl Annotation {
    /// Create an empty annotation for a topology.
    #[must_use]
    pub fn new(topology: &Topology) -> Self {
        Self {
            joints: vec![Joint::default(); topology.n_keypoints()],
            score_weights: topology.score_weights().to_vec(),
            decoding_order: Vec::new(),
        }
    }

    /// Fill the seed slot.
    #[must_use]
    pub fn with_seed(mut self, joint_type: usize, joint: Joint) -> Self {
        self.fill(joint_type, joint);
        self
    }

    /// All joint slots, indexed by joint type.
    #[must_use]
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// Joint slot of one joint type. Out-of-range types read as unfilled.
    #[must_use]
    pub fn joint(&self, joint_type: usize) -> Joint {
        self.joints.get(joint_type).copied().unwrap_or_default()
    }

    /// Whether a slot carries a detection.
    #[must_use]
    pub fn is_filled(&self, joint_type: usize) -> bool {
        self.joint(joint_type).is_found()
    }

    /// Number of filled slots.
    #[must_use]
    pub fn n_filled(&self) -> usize {
        self.joints.iter().filter(|j| j.is_found()).count()
    }

    /// Limbs accepted during growth, in acceptance order.
    #[must_use]
    pub fn decoding_order(&self) -> &[DecodingStep] {
        &self.decoding_order
    }

    /// Weighted mean of the joint confidences sorted in descending order.
    #[must_use]
    pub fn score(&self) -> f32 {
        let total: f32 = self.score_weights.iter().sum();
        if total <= 0.0 {
            return 0.0;
        }
        let mut v: Vec<f32> = self.joints.iter().map(|j| j.v).collect();
        v.sort_by(|a, b| b.total_cmp(a));
        v.iter()
            .zip(&self.score_weights)
            .map(|(v, w)| v * w)
            .sum::<f32>()
            / total
    }

    /// Write a joint into an unfilled slot. Returns `false` and leaves the slot
    /// untouched if it is already filled or out of range.
    pub(crate) fn fill(&mut self, joint_type: usize, joint: Joint) -> bool {
        match self.joints.get_mut(joint_type) {
            Some(slot) if !slot.is_found() => {
                *slot = joint;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn record(&mut self, step: DecodingStep) {
        self.decoding_order.push(step);
    }

    /// Limit the confidence of one slot.
    pub(crate) fn cap_confidence(&mut self, joint_type: usize, max_v: f32) {
        if let Some(slot) = self.joints.get_mut(joint_type) {
            slot.v = slot.v.min(max_v);
        }
    }

    /// Reset one slot to unfilled.
    pub(crate) fn clear(&mut self, joint_type: usize) {
        if let Some(slot) = self.joints.get_mut(joint_type) {
            *slot = Joint::default();
        }
    }

    /// Clear every slot whose confidence is below `threshold`.
    pub(crate) fn clear_below(&mut self, threshold: f32) {
        for slot in &mut self.joints {
            if slot.v < threshold {
                *slot = Joint::default();
            }
        }
    }
}

/// Sort annotations by descending score. Equal scores keep their order.
pub fn sort_by_score(annotations: &mut [Annotation]) {
    annotations.sort_by(|a, b| b.score().total_cmp(&a.score()));
}

/// Flatten annotations into rows of `(skeleton_index, joint_type, v, x, y, s)`.
///
/// Every slot produces a row, unfilled ones with `v == 0`, so the output has
/// `annotations.len() * n_keypoints` rows.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn annotations_to_array(annotations: &[Annotation]) -> Array2<f32> {
    let n_rows: usize = annotations.iter().map(|ann| ann.joints.len()).sum();
    let mut data = Array2::zeros((n_rows, ROW_WIDTH));

    let mut row = 0;
    for (ann_i, ann) in annotations.iter().enumerate() {
        for (joint_i, joint) in ann.joints.iter().enumerate() {
            data[[row, 0]] = ann_i as f32;
            data[[row, 1]] = joint_i as f32;
            data[[row, 2]] = joint.v;
            data[[row, 3]] = joint.x;
            data[[row, 4]] = joint.y;
            data[[row, 5]] = joint.s;
            row += 1;
        }
    }

    data
}
