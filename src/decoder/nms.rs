// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Keypoint non-maximum suppression over finished annotations.

use crate::annotation::{sort_by_score, Annotation};
use crate::config::DecoderConfig;
use crate::utils::Occupancy;

/// Removes keypoints that a higher-scoring annotation already claims.
#[derive(Debug, Clone, Copy)]
pub struct KeypointNms {
    /// Annotations scoring below this are dropped.
    pub instance_threshold: f32,
    /// Keypoints below this confidence are cleared.
    pub keypoint_threshold: f32,
}

impl KeypointNms {
    /// Thresholds from a decoder configuration.
    #[must_use]
    pub const fn from_config(config: &DecoderConfig) -> Self {
        Self {
            instance_threshold: config.instance_threshold,
            keypoint_threshold: config.effective_nms_keypoint_threshold(),
        }
    }

    /// Apply suppression and return the surviving annotations by descending score.
    ///
    /// Never adds a joint; it only clears slots and drops annotations.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn annotations(&self, mut annotations: Vec<Annotation>) -> Vec<Annotation> {
        self.filter(&mut annotations);
        let Some(n_fields) = annotations.first().map(|ann| ann.joints().len()) else {
            return annotations;
        };

        // grid origin at the smallest joint position so border joints stay in range
        let (min_x, min_y, max_x, max_y) = annotations
            .iter()
            .flat_map(Annotation::joints)
            .filter(|joint| joint.is_found())
            .fold((0.0f32, 0.0f32, 0.0f32, 0.0f32), |(x0, y0, x1, y1), joint| {
                (x0.min(joint.x), y0.min(joint.y), x1.max(joint.x), y1.max(joint.y))
            });
        let shape = ((max_y - min_y + 1.0) as usize, (max_x - min_x + 1.0) as usize);
        let mut occupied = Occupancy::new(n_fields, shape, 2.0, 4.0);

        sort_by_score(&mut annotations);
        for ann in &mut annotations {
            for joint_type in 0..n_fields {
                let joint = ann.joint(joint_type);
                if !joint.is_found() {
                    continue;
                }
                let (x, y) = (joint.x - min_x, joint.y - min_y);
                if occupied.get(joint_type, x, y) {
                    ann.clear(joint_type);
                } else {
                    occupied.set(joint_type, x, y, joint.s);
                }
            }
        }

        self.filter(&mut annotations);
        sort_by_score(&mut annotations);
        annotations
    }

    fn filter(&self, annotations: &mut Vec<Annotation>) {
        for ann in annotations.iter_mut() {
            ann.clear_below(self.keypoint_threshold);
        }
        annotations.retain(|ann| ann.score() >= self.instance_threshold);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Joint;
    use crate::skeleton::Topology;

    fn person(topology: &Topology, v: f32, offset: f32) -> Annotation {
        let mut ann = Annotation::new(topology).with_seed(0, Joint::new(v, 10.0 + offset, 10.0, 4.0));
        ann.fill(1, Joint::new(v, 30.0 + offset, 10.0, 4.0));
        ann
    }

    fn nms() -> KeypointNms {
        KeypointNms::from_config(&DecoderConfig::new())
    }

    #[test]
    fn test_overlapping_annotation_suppressed() {
        let topology = Topology::new(2, vec![[0, 1]]).unwrap();
        let annotations = vec![person(&topology, 0.6, 1.0), person(&topology, 0.9, 0.0)];

        let kept = nms().annotations(annotations);
        assert_eq!(kept.len(), 1);
        assert!((kept[0].joint(0).v - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn test_separate_annotations_kept() {
        let topology = Topology::new(2, vec![[0, 1]]).unwrap();
        let annotations = vec![person(&topology, 0.6, 50.0), person(&topology, 0.9, 0.0)];

        let kept = nms().annotations(annotations);
        assert_eq!(kept.len(), 2);
        assert!(kept[0].score() >= kept[1].score());
        assert_eq!(kept[1].n_filled(), 2);
    }

    #[test]
    fn test_partial_overlap_clears_keypoint() {
        let topology = Topology::new(3, vec![[0, 1], [1, 2]]).unwrap();
        let first = person(&topology, 0.9, 0.0);
        let mut second = Annotation::new(&topology).with_seed(1, Joint::new(0.8, 30.0, 10.0, 4.0));
        second.fill(2, Joint::new(0.8, 60.0, 10.0, 4.0));

        let kept = nms().annotations(vec![first, second]);
        assert_eq!(kept.len(), 2);
        assert!(!kept[1].is_filled(1));
        assert!(kept[1].is_filled(2));
    }

    #[test]
    fn test_thresholds() {
        let topology = Topology::new(2, vec![[0, 1]]).unwrap();
        let mut weak_joint = Annotation::new(&topology).with_seed(0, Joint::new(0.9, 10.0, 10.0, 4.0));
        weak_joint.fill(1, Joint::new(0.1, 30.0, 10.0, 4.0));
        let weak_instance = Annotation::new(&topology).with_seed(0, Joint::new(0.2, 80.0, 80.0, 4.0));

        let kept = nms().annotations(vec![weak_joint, weak_instance]);
        assert_eq!(kept.len(), 1);
        assert!(!kept[0].is_filled(1));

        assert!(nms().annotations(Vec::new()).is_empty());
    }

    #[test]
    fn test_joint_left_of_origin_kept() {
        let topology = Topology::new(2, vec![[0, 1]]).unwrap();
        let mut ann = Annotation::new(&topology).with_seed(0, Joint::new(0.8, 6.0, 10.0, 4.0));
        ann.fill(1, Joint::new(0.8, -0.5, 10.0, 4.0));
        let mut far = Annotation::new(&topology).with_seed(0, Joint::new(0.7, 6.0, -30.0, 4.0));
        far.fill(1, Joint::new(0.7, -40.0, -30.0, 4.0));

        let kept = nms().annotations(vec![ann, far]);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].joint(1), Joint::new(0.8, -0.5, 10.0, 4.0));
        assert_eq!(kept[1].n_filled(), 2);
    }

    #[test]
    fn test_force_complete_keeps_weak_keypoints() {
        let topology = Topology::new(2, vec![[0, 1]]).unwrap();
        let mut ann = Annotation::new(&topology).with_seed(0, Joint::new(0.9, 10.0, 10.0, 4.0));
        ann.fill(1, Joint::new(0.001, 30.0, 10.0, 4.0));

        let nms = KeypointNms::from_config(&DecoderConfig::new().with_force_complete(true));
        let kept = nms.annotations(vec![ann]);
        assert!(kept[0].is_filled(1));
    }
}
