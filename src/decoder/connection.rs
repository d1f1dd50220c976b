// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Connection values: where a limb leads from an existing joint, and how confident
//! that guess is.

use crate::annotation::{Annotation, Joint};
use crate::config::{ConnectionMethod, DecoderConfig};
use crate::skeleton::Topology;
use crate::utils::caf_scored::{C, CafEntry, CafScored, S2, X1, X2, Y1, Y2};

/// Computes the candidate joint at the far end of a limb.
///
/// Returning a joint with `v == 0` means no connection.
pub trait ConnectionValue {
    /// Candidate for joint type `end`, grown from the filled joint type `start` of `ann`.
    fn connection_value(&self, ann: &Annotation, start: usize, end: usize) -> Joint;
}

/// Blend the association vectors around `(x, y)` into a target joint.
///
/// Vectors whose source lies within `2 * xy_scale` vote with
/// `exp(-0.5 * d² / (xy_scale / 2)²) * c`. The two best votes are averaged by
/// weight when they agree; a lone or disagreeing best vote keeps half its score.
/// Returns `None` when nothing votes.
///
/// # Arguments
///
/// * `entries` - Directed association vectors of one limb.
/// * `x`, `y` - Source position in image pixels.
/// * `xy_scale` - Source scale in image pixels.
/// * `only_max` - Use the single best vote without blending.
#[must_use]
pub fn grow_connection_blend(
    entries: &[CafEntry],
    x: f32,
    y: f32,
    xy_scale: f32,
    only_max: bool,
) -> Option<Joint> {
    if !(xy_scale > 0.0) {
        return None;
    }
    let sigma_filter = 2.0 * xy_scale;
    let sigma2 = 0.25 * xy_scale * xy_scale;
    let d2_filter = sigma_filter * sigma_filter;

    let mut best: Option<(&CafEntry, f32)> = None;
    let mut second: Option<(&CafEntry, f32)> = None;
    for entry in entries {
        if (entry[X1] - x).abs() > sigma_filter || (entry[Y1] - y).abs() > sigma_filter {
            continue;
        }
        let d2 = (entry[X1] - x).powi(2) + (entry[Y1] - y).powi(2);
        if d2 > d2_filter {
            continue;
        }

        let score = (-0.5 * d2 / sigma2).exp() * entry[C];
        match best {
            Some((_, best_score)) if score < best_score => {
                if second.map_or(true, |(_, second_score)| score > second_score) {
                    second = Some((entry, score));
                }
            }
            _ => {
                second = best;
                best = Some((entry, score));
            }
        }
    }

    let (entry_1, score_1) = best?;
    if !(score_1 > 0.0) {
        return None;
    }
    let joint_1 = |v: f32| Joint::new(v.clamp(0.0, 1.0), entry_1[X2], entry_1[Y2], entry_1[S2]);
    if only_max {
        return Some(joint_1(score_1));
    }

    let Some((entry_2, score_2)) = second else {
        return Some(joint_1(0.5 * score_1));
    };
    if score_2 < 0.01 || score_2 < 0.5 * score_1 {
        return Some(joint_1(0.5 * score_1));
    }
    let blend_d2 = (entry_1[X2] - entry_2[X2]).powi(2) + (entry_1[Y2] - entry_2[Y2]).powi(2);
    if blend_d2 > entry_1[S2].powi(2) / 4.0 {
        return Some(joint_1(0.5 * score_1));
    }

    let total = score_1 + score_2;
    Some(Joint::new(
        (0.5 * total).clamp(0.0, 1.0),
        (score_1 * entry_1[X2] + score_2 * entry_2[X2]) / total,
        (score_1 * entry_1[Y2] + score_2 * entry_2[Y2]) / total,
        (score_1 * entry_1[S2] + score_2 * entry_2[S2]) / total,
    ))
}

/// Connection values from scored association vectors, with threshold gates and
/// optional reverse matching.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionEvaluator<'a> {
    caf_scored: &'a CafScored,
    topology: &'a Topology,
    keypoint_threshold: f32,
    keypoint_threshold_rel: f32,
    reverse_match: bool,
    only_max: bool,
}

impl<'a> ConnectionEvaluator<'a> {
    /// Evaluator with the gates of a decoder configuration.
    #[must_use]
    pub const fn new(caf_scored: &'a CafScored, topology: &'a Topology, config: &DecoderConfig) -> Self {
        Self {
            caf_scored,
            topology,
            keypoint_threshold: config.keypoint_threshold,
            keypoint_threshold_rel: config.keypoint_threshold_rel,
            reverse_match: config.uses_reverse_match(),
            only_max: matches!(config.connection_method, ConnectionMethod::Max),
        }
    }

    /// Evaluator without threshold gates or reverse matching.
    #[must_use]
    pub const fn permissive(
        caf_scored: &'a CafScored,
        topology: &'a Topology,
        connection_method: ConnectionMethod,
    ) -> Self {
        Self {
            caf_scored,
            topology,
            keypoint_threshold: 0.0,
            keypoint_threshold_rel: 0.0,
            reverse_match: false,
            only_max: matches!(connection_method, ConnectionMethod::Max),
        }
    }
}

impl ConnectionValue for ConnectionEvaluator<'_> {
    fn connection_value(&self, ann: &Annotation, start: usize, end: usize) -> Joint {
        let Some(limb) = self.topology.limb_between(start, end) else {
            return Joint::default();
        };
        let source = ann.joint(start);
        if !source.is_found() {
            return Joint::default();
        }

        let (caf_f, caf_b) = self.caf_scored.directed(limb.limb, limb.forward);
        let xy_scale_s = source.s.max(0.0);
        let Some(candidate) =
            grow_connection_blend(caf_f, source.x, source.y, xy_scale_s, self.only_max)
        else {
            return Joint::default();
        };

        let score = (candidate.v * source.v).sqrt().clamp(0.0, 1.0);
        if score < self.keypoint_threshold || score < source.v * self.keypoint_threshold_rel {
            return Joint::default();
        }

        if self.reverse_match {
            let xy_scale_t = candidate.s.max(0.0);
            let Some(reverse) =
                grow_connection_blend(caf_b, candidate.x, candidate.y, xy_scale_t, self.only_max)
            else {
                return Joint::default();
            };
            if (source.x - reverse.x).abs() + (source.y - reverse.y).abs() > xy_scale_s {
                return Joint::default();
            }
        }

        Joint::new(score, candidate.x, candidate.y, candidate.s)
    }
}
