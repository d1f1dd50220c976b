// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Association vectors per limb and direction, rescored with the dense confidence map.

use crate::fields::CafField;
use crate::skeleton::Topology;
use crate::utils::cif_hr::CifHr;

/// One association vector in image pixels: `[c, x1, y1, x2, y2, b1, b2, s1, s2]`.
///
/// For a backward entry the two ends are swapped, so `x1, y1` is always the source.
pub type CafEntry = [f32; 9];

/// Confidence, source position, target position and target scale indices.
pub(crate) const C: usize = 0;
pub(crate) const X1: usize = 1;
pub(crate) const Y1: usize = 2;
pub(crate) const X2: usize = 3;
pub(crate) const Y2: usize = 4;
pub(crate) const S2: usize = 8;

/// Association vectors above a raw confidence threshold, per limb and direction.
#[derive(Debug, Clone)]
pub struct CafScored {
    score_th: f32,
    cif_floor: f32,
    forward: Vec<Vec<CafEntry>>,
    backward: Vec<Vec<CafEntry>>,
}

impl CafScored {
    /// Create an empty store.
    ///
    /// # Arguments
    ///
    /// * `n_limbs` - Number of limbs.
    /// * `score_th` - Raw confidences must exceed this value.
    /// * `cif_floor` - Rescoring floor; `1.0` keeps raw confidences.
    #[must_use]
    pub fn new(n_limbs: usize, score_th: f32, cif_floor: f32) -> Self {
        Self {
            score_th,
            cif_floor,
            forward: vec![Vec::new(); n_limbs],
            backward: vec![Vec::new(); n_limbs],
        }
    }

    /// Collect the association vectors of a CAF field.
    ///
    /// A vector whose raw confidence exceeds the threshold yields a forward entry
    /// rescored with the confidence of the limb's second joint at its target, and a
    /// backward entry rescored with the first joint.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fill(mut self, caf: &CafField<'_>, topology: &Topology, cifhr: &CifHr) -> Self {
        let data = caf.data();
        let stride = caf.stride() as f32;
        let (_, _, height, width) = data.dim();

        for (limb_i, &[j1, j2]) in topology.limbs().iter().enumerate() {
            if limb_i >= self.forward.len() {
                break;
            }
            for j in 0..height {
                for i in 0..width {
                    let c = data[[limb_i, 0, j, i]];
                    if !(c > self.score_th) {
                        continue;
                    }
                    let mut entry = [0.0; 9];
                    entry[C] = c;
                    for channel in 1..9 {
                        entry[channel] = data[[limb_i, channel, j, i]] * stride;
                    }

                    if let Some(forward) = self.rescore(entry, j2, cifhr) {
                        self.forward[limb_i].push(forward);
                    }
                    if let Some(backward) = self.rescore(swap_ends(&entry), j1, cifhr) {
                        self.backward[limb_i].push(backward);
                    }
                }
            }
        }

        self
    }

    fn rescore(&self, mut entry: CafEntry, target: usize, cifhr: &CifHr) -> Option<CafEntry> {
        if self.cif_floor < 1.0 {
            let cifhr_t = cifhr.value_at(target, entry[X2], entry[Y2]);
            entry[C] *= self.cif_floor + (1.0 - self.cif_floor) * cifhr_t;
        }
        (entry[C] > 0.0).then_some(entry)
    }

    /// Entries for walking a limb in one direction, paired with the entries for
    /// walking it back.
    #[must_use]
    pub fn directed(&self, limb: usize, forward: bool) -> (&[CafEntry], &[CafEntry]) {
        let fw = self.forward.get(limb).map(Vec::as_slice).unwrap_or_default();
        let bw = self.backward.get(limb).map(Vec::as_slice).unwrap_or_default();
        if forward {
            (fw, bw)
        } else {
            (bw, fw)
        }
    }

    /// Total number of forward entries.
    #[must_use]
    pub fn n_forward(&self) -> usize {
        self.forward.iter().map(Vec::len).sum()
    }

    /// Total number of backward entries.
    #[must_use]
    pub fn n_backward(&self) -> usize {
        self.backward.iter().map(Vec::len).sum()
    }
}

fn swap_ends(entry: &CafEntry) -> CafEntry {
    [
        entry[0], entry[3], entry[4], entry[1], entry[2], entry[6], entry[5], entry[8], entry[7],
    ]
}
