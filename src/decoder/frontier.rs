// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Best-first frontier of limb candidates for one annotation.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use crate::annotation::{Annotation, Joint};
use crate::skeleton::Topology;

/// State of a frontier candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Candidate {
    /// Only an upper bound on the connection value is known.
    Unresolved,
    /// The connection value has been computed.
    Resolved(Joint),
}

/// A directed limb waiting to be grown.
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    /// Heap key: the bound while unresolved, the scaled confidence once resolved.
    pub priority: f32,
    /// Upper bound the edge was admitted with.
    pub bound: f32,
    /// Joint type grown from.
    pub start: usize,
    /// Joint type to fill.
    pub end: usize,
    /// Limb index.
    pub limb: usize,
    /// Unresolved or resolved candidate.
    pub candidate: Candidate,
    seq: u64,
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrontierEntry {}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrontierEntry {
    /// Higher priority first; among equal priorities the earlier push wins.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Max-priority queue of frontier entries with a directed-edge visited set.
///
/// One frontier lives for the growth of one annotation and is dropped afterwards,
/// so the visited set never leaks across seeds.
#[derive(Debug, Default)]
pub struct Frontier {
    heap: BinaryHeap<FrontierEntry>,
    visited: HashSet<(usize, usize)>,
    next_seq: u64,
}

impl Frontier {
    /// Create an empty frontier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue every limb leaving `start` whose far end is still unfilled and whose
    /// directed edge has not been queued before.
    ///
    /// The bound is `sqrt(v_start)` times the limb confidence scale: a connection
    /// value is the geometric mean of the source confidence and an association
    /// score of at most one.
    ///
    /// Returns the number of queued entries.
    pub fn add_from(&mut self, ann: &Annotation, topology: &Topology, start: usize) -> usize {
        let source = ann.joint(start);
        if !source.is_found() {
            return 0;
        }
        let root = source.v.sqrt();

        let mut added = 0;
        for limb in topology.neighbours(start) {
            if ann.is_filled(limb.other) || !self.visited.insert((start, limb.other)) {
                continue;
            }
            let bound = root * topology.confidence_scale(limb.limb);
            self.push(start, limb.other, limb.limb, bound, bound, Candidate::Unresolved);
            added += 1;
        }
        added
    }

    /// Re-queue a popped entry with its computed candidate.
    pub fn resolve(&mut self, entry: &FrontierEntry, joint: Joint, priority: f32) {
        self.push(
            entry.start,
            entry.end,
            entry.limb,
            entry.bound,
            priority,
            Candidate::Resolved(joint),
        );
    }

    /// Queue an already computed candidate that bypasses the visited set.
    pub fn push_resolved(&mut self, start: usize, end: usize, limb: usize, priority: f32, joint: Joint) {
        self.push(start, end, limb, priority, priority, Candidate::Resolved(joint));
    }

    fn push(
        &mut self,
        start: usize,
        end: usize,
        limb: usize,
        bound: f32,
        priority: f32,
        candidate: Candidate,
    ) {
        self.heap.push(FrontierEntry {
            priority,
            bound,
            start,
            end,
            limb,
            candidate,
            seq: self.next_seq,
        });
        self.next_seq += 1;
    }

    /// Remove the entry with the highest priority.
    pub fn pop(&mut self) -> Option<FrontierEntry> {
        self.heap.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn star() -> Topology {
        Topology::new(4, vec![[0, 1], [2, 0], [0, 3]]).unwrap()
    }

    #[test]
    fn test_add_from_bounds_and_direction() {
        let topology = star();
        let ann = Annotation::new(&topology).with_seed(0, Joint::new(0.64, 5.0, 5.0, 2.0));
        let mut frontier = Frontier::new();

        assert_eq!(frontier.add_from(&ann, &topology, 0), 3);
        assert!(frontier.visited.contains(&(0, 2)));
        assert!(!frontier.visited.contains(&(2, 0)));

        let entry = frontier.pop().unwrap();
        assert_eq!((entry.start, entry.end, entry.limb), (0, 1, 0));
        assert!((entry.bound - 0.8).abs() < 1e-6);
        assert_eq!(entry.candidate, Candidate::Unresolved);
    }

    #[test]
    fn test_add_from_skips_visited_and_filled() {
        let topology = star();
        let mut ann = Annotation::new(&topology).with_seed(0, Joint::new(0.9, 5.0, 5.0, 2.0));
        ann.fill(3, Joint::new(0.5, 9.0, 5.0, 2.0));

        let mut frontier = Frontier::new();
        assert_eq!(frontier.add_from(&ann, &topology, 0), 2);
        assert_eq!(frontier.add_from(&ann, &topology, 0), 0);
        assert_eq!(frontier.heap.len(), 2);

        // unfilled source has nothing to offer
        assert_eq!(frontier.add_from(&ann, &topology, 1), 0);
    }

    #[test]
    fn test_priority_order_and_ties() {
        let topology = star();
        let ann = Annotation::new(&topology).with_seed(0, Joint::new(1.0, 5.0, 5.0, 2.0));
        let mut frontier = Frontier::new();
        frontier.add_from(&ann, &topology, 0);

        // equal bounds pop in insertion order
        let first = frontier.pop().unwrap();
        assert_eq!(first.end, 1);

        frontier.resolve(&first, Joint::new(0.3, 1.0, 1.0, 1.0), 0.3);
        frontier.push_resolved(0, 2, 1, 0.7, Joint::new(0.7, 2.0, 2.0, 1.0));

        let ends: Vec<usize> = std::iter::from_fn(|| frontier.pop()).map(|e| e.end).collect();
        assert_eq!(ends, vec![2, 3, 2, 1]);
        assert!(frontier.pop().is_none());
    }

    #[test]
    fn test_confidence_scale_in_bound() {
        let topology = star().with_confidence_scales(vec![1.0, 0.5, 1.0]).unwrap();
        let ann = Annotation::new(&topology).with_seed(0, Joint::new(1.0, 5.0, 5.0, 2.0));
        let mut frontier = Frontier::new();
        frontier.add_from(&ann, &topology, 0);

        let bounds: Vec<(usize, f32)> = std::iter::from_fn(|| frontier.pop())
            .map(|e| (e.end, e.bound))
            .collect();
        assert_eq!(bounds, vec![(1, 1.0), (3, 1.0), (2, 0.5)]);
    }
}
