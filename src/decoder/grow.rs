// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Lazy best-first growth of one annotation along the skeleton.

use crate::annotation::{Annotation, DecodingStep};
use crate::decoder::connection::ConnectionValue;
use crate::decoder::frontier::{Candidate, Frontier};
use crate::skeleton::Topology;

/// Grows annotations from their filled joints.
///
/// Connection values are only computed for the frontier entry currently on top of the
/// queue. In non-greedy mode the computed candidate is re-queued by its confidence and
/// accepted once it is still on top; in greedy mode it is accepted right away.
#[derive(Debug)]
pub struct GreedyGrower<'a, C> {
    topology: &'a Topology,
    connection: C,
    greedy: bool,
}

impl<'a, C: ConnectionValue> GreedyGrower<'a, C> {
    /// Create a grower.
    #[must_use]
    pub const fn new(topology: &'a Topology, connection: C, greedy: bool) -> Self {
        Self {
            topology,
            connection,
            greedy,
        }
    }

    /// The connection value source.
    #[must_use]
    pub const fn connection(&self) -> &C {
        &self.connection
    }

    /// Fill as many slots of `ann` as the connections allow.
    ///
    /// Growth starts from every filled slot. Filled slots are never overwritten.
    /// Returns the number of slots filled.
    pub fn grow(&self, ann: &mut Annotation) -> usize {
        let mut frontier = Frontier::new();
        for joint_type in 0..self.topology.n_keypoints() {
            frontier.add_from(ann, self.topology, joint_type);
        }

        let mut filled = 0;
        while let Some(entry) = frontier.pop() {
            if ann.is_filled(entry.end) {
                continue;
            }

            let joint = match entry.candidate {
                Candidate::Resolved(joint) => joint,
                Candidate::Unresolved => {
                    let joint = self.connection.connection_value(ann, entry.start, entry.end);
                    if !joint.is_found() {
                        continue;
                    }
                    if !self.greedy {
                        let priority = joint.v * self.topology.confidence_scale(entry.limb);
                        frontier.resolve(&entry, joint, priority);
                        continue;
                    }
                    joint
                }
            };

            if ann.fill(entry.end, joint) {
                ann.record(DecodingStep {
                    start: entry.start,
                    end: entry.end,
                    bound: entry.bound,
                    joint,
                });
                frontier.add_from(ann, self.topology, entry.end);
                filled += 1;
            }
        }

        filled
    }
}
