// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Completion passes for joints that greedy growth left empty.

use crate::annotation::{sort_by_score, Annotation, Joint};
use crate::config::{ConnectionMethod, DecoderConfig};
use crate::decoder::connection::{ConnectionEvaluator, ConnectionValue};
use crate::decoder::frontier::{Candidate, Frontier};
use crate::decoder::grow::GreedyGrower;
use crate::fields::CafField;
use crate::skeleton::Topology;
use crate::utils::{CafScored, CifHr, Occupancy};

/// Highest confidence a force-completed joint keeps.
pub const FORCE_COMPLETE_MAX_V: f32 = 0.001;
/// Confidence of a flood-filled joint.
pub const FLOOD_FILL_V: f32 = 1e-5;

/// Connection values that snap to the dense confidence map.
///
/// A permissive connection is only kept when a positive confidence peak lies within
/// the candidate scale and that peak is not claimed by another annotation. The joint
/// moves to the peak.
#[derive(Debug, Clone, Copy)]
pub struct ForceCompleteConnection<'a> {
    evaluator: ConnectionEvaluator<'a>,
    cifhr: &'a CifHr,
    occupancy: &'a Occupancy,
}

impl<'a> ForceCompleteConnection<'a> {
    /// Wrap a permissive evaluator with the peak snap and occupancy check.
    #[must_use]
    pub const fn new(evaluator: ConnectionEvaluator<'a>, cifhr: &'a CifHr, occupancy: &'a Occupancy) -> Self {
        Self {
            evaluator,
            cifhr,
            occupancy,
        }
    }
}

impl ConnectionValue for ForceCompleteConnection<'_> {
    fn connection_value(&self, ann: &Annotation, start: usize, end: usize) -> Joint {
        let candidate = self.evaluator.connection_value(ann, start, end);
        if !candidate.is_found() {
            return Joint::default();
        }

        let Some((x, y, _)) = self.cifhr.peak_near(end, candidate.x, candidate.y, candidate.s.max(1.0))
        else {
            return Joint::default();
        };
        if self.occupancy.get(end, x, y) {
            return Joint::default();
        }

        Joint::new(candidate.v, x, y, candidate.s)
    }
}

/// Fills empty slots of finished annotations from weak associations and the dense
/// confidence map.
#[derive(Debug)]
pub struct ForceCompleter<'a> {
    topology: &'a Topology,
    cifhr: &'a CifHr,
    caf_scored: CafScored,
    connection_method: ConnectionMethod,
}

impl<'a> ForceCompleter<'a> {
    /// Score the association field with the force-complete threshold.
    #[must_use]
    pub fn new(topology: &'a Topology, cifhr: &'a CifHr, caf: &CafField<'_>, config: &DecoderConfig) -> Self {
        let caf_scored = CafScored::new(topology.n_limbs(), config.force_complete_caf_th, config.cif_floor)
            .fill(caf, topology, cifhr);
        Self {
            topology,
            cifhr,
            caf_scored,
            connection_method: config.connection_method,
        }
    }

    /// Complete every annotation once, highest score first.
    ///
    /// Only empty slots are written. Completed joints keep at most
    /// [`FORCE_COMPLETE_MAX_V`] confidence and are claimed in `occupancy` so later
    /// annotations cannot take the same peak.
    ///
    /// Returns the number of completed joints.
    pub fn complete(&self, annotations: &mut [Annotation], occupancy: &mut Occupancy) -> usize {
        sort_by_score(annotations);
        let evaluator = ConnectionEvaluator::permissive(&self.caf_scored, self.topology, self.connection_method);

        let mut completed = 0;
        for ann in annotations.iter_mut() {
            let empty: Vec<usize> = (0..self.topology.n_keypoints())
                .filter(|&joint_type| !ann.is_filled(joint_type))
                .collect();
            if empty.is_empty() {
                continue;
            }

            let connection = ForceCompleteConnection::new(evaluator, self.cifhr, occupancy);
            completed += GreedyGrower::new(self.topology, connection, false).grow(ann);

            for joint_type in empty {
                if !ann.is_filled(joint_type) {
                    continue;
                }
                ann.cap_confidence(joint_type, FORCE_COMPLETE_MAX_V);
                let joint = ann.joint(joint_type);
                occupancy.set(joint_type, joint.x, joint.y, joint.s);
            }
        }
        completed
    }
}

/// Fill every empty slot reachable through the skeleton with the position and scale
/// of its neighbour, at [`FLOOD_FILL_V`] confidence. More confident neighbours go first.
///
/// Returns the number of filled slots.
pub fn flood_fill(ann: &mut Annotation, topology: &Topology) -> usize {
    let mut frontier = Frontier::new();
    for joint_type in 0..topology.n_keypoints() {
        queue_neighbours(&mut frontier, ann, topology, joint_type);
    }

    let mut filled = 0;
    while let Some(entry) = frontier.pop() {
        let Candidate::Resolved(joint) = entry.candidate else {
            continue;
        };
        if ann.fill(entry.end, joint) {
            queue_neighbours(&mut frontier, ann, topology, entry.end);
            filled += 1;
        }
    }
    filled
}

fn queue_neighbours(frontier: &mut Frontier, ann: &Annotation, topology: &Topology, start: usize) {
    let source = ann.joint(start);
    if !source.is_found() {
        return;
    }
    for limb in topology.neighbours(start) {
        if ann.is_filled(limb.other) {
            continue;
        }
        let joint = Joint::new(FLOOD_FILL_V, source.x, source.y, source.s);
        frontier.push_resolved(start, limb.other, limb.limb, source.v, joint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::CifField;
    use ndarray::Array4;

    fn pair() -> Topology {
        Topology::new(2, vec![[0, 1]]).unwrap()
    }

    /// Dense map with a weak peak of joint type 1 at (12, 5).
    fn weak_peak() -> CifHr {
        let mut cif = Array4::zeros((2, 5, 20, 20));
        for j in 0..4 {
            for i in 0..4 {
                cif[[1, 0, j, i]] = 0.3;
                cif[[1, 1, j, i]] = 12.0;
                cif[[1, 2, j, i]] = 5.0;
                cif[[1, 4, j, i]] = 2.0;
            }
        }
        let mut cifhr = CifHr::new(2, (20, 20));
        cifhr.accumulate(&CifField::new(cif.view(), 1), 0.0, 1.0);
        cifhr
    }

    /// Two association vectors from (5, 5) to (12, 5).
    fn weak_caf(c: f32) -> Array4<f32> {
        let mut caf = Array4::zeros((1, 9, 20, 20));
        for i in 0..2 {
            for (channel, value) in [c, 5.0, 5.0, 12.0, 5.0, 1.0, 1.0, 4.0, 4.0].iter().enumerate() {
                caf[[0, channel, 0, i]] = *value;
            }
        }
        caf
    }

    fn complete_with(c: f32, occupancy: &mut Occupancy, ann: Annotation) -> Annotation {
        let topology = pair();
        let cifhr = weak_peak();
        let caf = weak_caf(c);
        let config = DecoderConfig::new().with_force_complete_caf_th(0.3);
        let completer = ForceCompleter::new(&topology, &cifhr, &CafField::new(caf.view(), 1), &config);

        let mut annotations = vec![ann];
        completer.complete(&mut annotations, occupancy);
        annotations.remove(0)
    }

    fn seed() -> Annotation {
        Annotation::new(&pair()).with_seed(0, Joint::new(0.9, 5.0, 5.0, 4.0))
    }

    #[test]
    fn test_gate_is_exclusive() {
        for (c, expect_filled) in [(0.29, false), (0.3, false), (0.31, true)] {
            let mut occupancy = Occupancy::new(2, (20, 20), 2.0, 4.0);
            let ann = complete_with(c, &mut occupancy, seed());
            assert_eq!(ann.is_filled(1), expect_filled, "caf confidence {c}");
        }
    }

    #[test]
    fn test_completed_joint_snaps_and_is_capped() {
        let mut occupancy = Occupancy::new(2, (20, 20), 2.0, 4.0);
        let ann = complete_with(0.8, &mut occupancy, seed());

        let joint = ann.joint(1);
        assert!(joint.v > 0.0 && joint.v <= FORCE_COMPLETE_MAX_V);
        assert_eq!((joint.x, joint.y), (12.0, 5.0));
        assert!(occupancy.get(1, 12.0, 5.0));
        assert_eq!(ann.joint(0), Joint::new(0.9, 5.0, 5.0, 4.0));
    }

    #[test]
    fn test_occupied_peak_rejected() {
        let mut occupancy = Occupancy::new(2, (20, 20), 2.0, 4.0);
        occupancy.set(1, 12.0, 5.0, 4.0);
        let ann = complete_with(0.8, &mut occupancy, seed());
        assert!(!ann.is_filled(1));
    }

    #[test]
    fn test_no_peak_no_joint() {
        let topology = pair();
        let cifhr = CifHr::new(2, (20, 20));
        let caf = weak_caf(0.8);
        let config = DecoderConfig::new();
        let completer = ForceCompleter::new(&topology, &cifhr, &CafField::new(caf.view(), 1), &config);

        let mut occupancy = Occupancy::new(2, (20, 20), 2.0, 4.0);
        let mut annotations = vec![seed()];
        assert_eq!(completer.complete(&mut annotations, &mut occupancy), 0);
        assert!(!annotations[0].is_filled(1));
    }

    #[test]
    fn test_filled_slot_untouched() {
        let mut occupancy = Occupancy::new(2, (20, 20), 2.0, 4.0);
        let mut ann = seed();
        ann.fill(1, Joint::new(0.5, 15.0, 9.0, 3.0));
        let ann = complete_with(0.8, &mut occupancy, ann);
        assert_eq!(ann.joint(1), Joint::new(0.5, 15.0, 9.0, 3.0));
    }

    #[test]
    fn test_flood_fill() {
        let topology = Topology::new(4, vec![[0, 1], [1, 2], [0, 3]]).unwrap();
        let mut ann = Annotation::new(&topology).with_seed(1, Joint::new(0.8, 7.0, 3.0, 2.0));

        assert_eq!(flood_fill(&mut ann, &topology), 3);
        assert_eq!(ann.joint(0), Joint::new(FLOOD_FILL_V, 7.0, 3.0, 2.0));
        assert_eq!(ann.joint(2), Joint::new(FLOOD_FILL_V, 7.0, 3.0, 2.0));
        assert_eq!(ann.joint(3), Joint::new(FLOOD_FILL_V, 7.0, 3.0, 2.0));
        assert_eq!(ann.joint(1).v, 0.8);
    }
}
