// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Decoder configuration.
//!
//! This module defines the [`DecoderConfig`] struct, which controls seeding, connection
//! thresholds, reverse matching, the force-complete pass and keypoint NMS. A config is
//! built once, validated by [`crate::CifCaf::new`] and then only read while decoding.

use std::fmt;
use std::str::FromStr;

use crate::error::{DecodeError, Result};
use crate::warn;

/// How candidate associations around a source joint are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionMethod {
    /// Blend the two best association vectors when they agree.
    #[default]
    Blend,
    /// Use only the single best association vector.
    Max,
}

impl ConnectionMethod {
    /// Returns the string representation of the method.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Blend => "blend",
            Self::Max => "max",
        }
    }
}

impl fmt::Display for ConnectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConnectionMethod {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "blend" => Ok(Self::Blend),
            "max" => Ok(Self::Max),
            _ => Err(DecodeError::ConfigError(format!(
                "invalid connection method '{s}', expected one of: blend, max"
            ))),
        }
    }
}

/// Configuration for CIF/CAF decoding.
///
/// Uses a builder pattern for convenient construction.
///
/// # Example
///
/// ```rust
/// use cifcaf_decoder::DecoderConfig;
///
/// let config = DecoderConfig::new()
///     .with_keypoint_threshold(0.2)
///     .with_reverse_match(false)
///     .with_force_complete(true);
/// ```
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Accept a resolved connection as soon as it is computed instead of re-queuing it.
    /// Also disables reverse matching.
    pub greedy: bool,
    /// Absolute minimum confidence of a grown joint.
    pub keypoint_threshold: f32,
    /// Minimum confidence of a grown joint relative to its source joint.
    pub keypoint_threshold_rel: f32,
    /// Check every connection against the backward association field.
    pub reverse_match: bool,
    /// Run the force-complete pass after greedy growth.
    pub force_complete: bool,
    /// Minimum raw association confidence the force-complete pass accepts (exclusive).
    pub force_complete_caf_th: f32,
    /// Minimum rescored confidence of a seed.
    pub seed_threshold: f32,
    /// Minimum raw confidence of a CIF vector to become a seed candidate.
    pub cif_threshold: f32,
    /// Minimum raw confidence of a CAF vector used during growth (exclusive).
    pub caf_threshold: f32,
    /// Floor of the dense-confidence rescoring of association vectors.
    /// A value of `1.0` disables rescoring.
    pub cif_floor: f32,
    /// How nearby association vectors are combined.
    pub connection_method: ConnectionMethod,
    /// Fill joints that are still missing after decoding with a neighbour's position.
    pub flood_fill: bool,
    /// Apply keypoint NMS to the decoded annotations.
    pub nms: bool,
    /// Minimum annotation score kept by NMS.
    pub instance_threshold: f32,
    /// Keypoints below this confidence are zeroed by NMS.
    pub nms_keypoint_threshold: f32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            greedy: false,
            keypoint_threshold: 0.15,
            keypoint_threshold_rel: 0.5,
            reverse_match: true,
            force_complete: false,
            force_complete_caf_th: 0.001,
            seed_threshold: 0.5,
            cif_threshold: 0.1,
            caf_threshold: 0.2,
            cif_floor: 0.1,
            connection_method: ConnectionMethod::Blend,
            flood_fill: false,
            nms: true,
            instance_threshold: 0.15,
            nms_keypoint_threshold: 0.15,
        }
    }
}

impl DecoderConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable greedy acceptance.
    #[must_use]
    pub const fn with_greedy(mut self, greedy: bool) -> Self {
        self.greedy = greedy;
        self
    }

    /// Set the absolute keypoint threshold.
    ///
    /// # Arguments
    ///
    /// * `threshold` - The minimum confidence of a grown joint (0.0 to 1.0).
    #[must_use]
    pub const fn with_keypoint_threshold(mut self, threshold: f32) -> Self {
        self.keypoint_threshold = threshold;
        self
    }

    /// Set the keypoint threshold relative to the source joint confidence.
    #[must_use]
    pub const fn with_keypoint_threshold_rel(mut self, threshold: f32) -> Self {
        self.keypoint_threshold_rel = threshold;
        self
    }

    /// Enable or disable reverse matching.
    #[must_use]
    pub const fn with_reverse_match(mut self, reverse_match: bool) -> Self {
        self.reverse_match = reverse_match;
        self
    }

    /// Enable or disable the force-complete pass.
    #[must_use]
    pub const fn with_force_complete(mut self, force_complete: bool) -> Self {
        self.force_complete = force_complete;
        self
    }

    /// Set the association threshold used by the force-complete pass.
    #[must_use]
    pub const fn with_force_complete_caf_th(mut self, threshold: f32) -> Self {
        self.force_complete_caf_th = threshold;
        self
    }

    /// Set the seed threshold.
    #[must_use]
    pub const fn with_seed_threshold(mut self, threshold: f32) -> Self {
        self.seed_threshold = threshold;
        self
    }

    /// Set the raw CIF confidence threshold for seed candidates.
    #[must_use]
    pub const fn with_cif_threshold(mut self, threshold: f32) -> Self {
        self.cif_threshold = threshold;
        self
    }

    /// Set the raw CAF confidence threshold used during growth.
    #[must_use]
    pub const fn with_caf_threshold(mut self, threshold: f32) -> Self {
        self.caf_threshold = threshold;
        self
    }

    /// Set the rescoring floor. `1.0` disables rescoring with the dense confidence map.
    #[must_use]
    pub const fn with_cif_floor(mut self, floor: f32) -> Self {
        self.cif_floor = floor;
        self
    }

    /// Set the connection method.
    #[must_use]
    pub const fn with_connection_method(mut self, method: ConnectionMethod) -> Self {
        self.connection_method = method;
        self
    }

    /// Enable or disable flood fill of missing joints.
    #[must_use]
    pub const fn with_flood_fill(mut self, flood_fill: bool) -> Self {
        self.flood_fill = flood_fill;
        self
    }

    /// Enable or disable keypoint NMS.
    #[must_use]
    pub const fn with_nms(mut self, nms: bool) -> Self {
        self.nms = nms;
        self
    }

    /// Set the minimum annotation score kept by NMS.
    #[must_use]
    pub const fn with_instance_threshold(mut self, threshold: f32) -> Self {
        self.instance_threshold = threshold;
        self
    }

    /// Set the keypoint threshold applied by NMS.
    #[must_use]
    pub const fn with_nms_keypoint_threshold(mut self, threshold: f32) -> Self {
        self.nms_keypoint_threshold = threshold;
        self
    }

    /// Whether connections are checked against the backward field.
    #[must_use]
    pub const fn uses_reverse_match(&self) -> bool {
        self.reverse_match && !self.greedy
    }

    /// Keypoint threshold NMS applies. Force-completed joints carry a tiny
    /// confidence, so NMS must not prune them.
    #[must_use]
    pub const fn effective_nms_keypoint_threshold(&self) -> f32 {
        if self.force_complete {
            0.0
        } else {
            self.nms_keypoint_threshold
        }
    }

    /// Check all thresholds and return the configuration ready for decoding.
    ///
    /// If the seed threshold is below the keypoint threshold, the keypoint threshold is
    /// lowered to the seed threshold.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::ConfigError`] if a threshold is outside `[0, 1]` or not finite.
    pub fn validated(mut self) -> Result<Self> {
        let thresholds = [
            ("keypoint_threshold", self.keypoint_threshold),
            ("keypoint_threshold_rel", self.keypoint_threshold_rel),
            ("force_complete_caf_th", self.force_complete_caf_th),
            ("seed_threshold", self.seed_threshold),
            ("cif_threshold", self.cif_threshold),
            ("caf_threshold", self.caf_threshold),
            ("cif_floor", self.cif_floor),
            ("instance_threshold", self.instance_threshold),
            ("nms_keypoint_threshold", self.nms_keypoint_threshold),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(DecodeError::ConfigError(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        if self.seed_threshold < self.keypoint_threshold {
            warn!(
                "consistency: decreasing keypoint threshold to seed threshold of {}",
                self.seed_threshold
            );
            self.keypoint_threshold = self.seed_threshold;
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = DecoderConfig::default();
        assert!((config.keypoint_threshold - 0.15).abs() < f32::EPSILON);
        assert!((config.keypoint_threshold_rel - 0.5).abs() < f32::EPSILON);
        assert!((config.force_complete_caf_th - 0.001).abs() < f32::EPSILON);
        assert!(config.reverse_match);
        assert!(!config.force_complete);
        assert!(!config.greedy);
    }

    #[test]
    fn test_config_builder() {
        let config = DecoderConfig::new()
            .with_keypoint_threshold(0.3)
            .with_keypoint_threshold_rel(0.2)
            .with_reverse_match(false)
            .with_force_complete(true)
            .with_force_complete_caf_th(0.05)
            .with_connection_method(ConnectionMethod::Max);

        assert!((config.keypoint_threshold - 0.3).abs() < f32::EPSILON);
        assert!((config.keypoint_threshold_rel - 0.2).abs() < f32::EPSILON);
        assert!(!config.reverse_match);
        assert!(config.force_complete);
        assert!((config.force_complete_caf_th - 0.05).abs() < f32::EPSILON);
        assert_eq!(config.connection_method, ConnectionMethod::Max);
    }

    #[test]
    fn test_greedy_disables_reverse_match() {
        let config = DecoderConfig::new().with_reverse_match(true);
        assert!(config.uses_reverse_match());
        assert!(!config.with_greedy(true).uses_reverse_match());
    }

    #[test]
    fn test_force_complete_relaxes_nms() {
        let config = DecoderConfig::new();
        assert!((config.effective_nms_keypoint_threshold() - 0.15).abs() < f32::EPSILON);
        let config = config.with_force_complete(true);
        assert!(config.effective_nms_keypoint_threshold().abs() < f32::EPSILON);
    }

    #[test]
    fn test_validated_rejects_out_of_range() {
        let err = DecoderConfig::new()
            .with_keypoint_threshold(1.5)
            .validated()
            .unwrap_err();
        assert!(matches!(err, DecodeError::ConfigError(_)));

        let err = DecoderConfig::new()
            .with_cif_floor(f32::NAN)
            .validated()
            .unwrap_err();
        assert!(err.to_string().contains("cif_floor"));
    }

    #[test]
    fn test_validated_lowers_keypoint_threshold() {
        let config = DecoderConfig::new()
            .with_seed_threshold(0.2)
            .with_keypoint_threshold(0.4)
            .validated()
            .unwrap();
        assert!((config.keypoint_threshold - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_connection_method_from_str() {
        assert_eq!("blend".parse::<ConnectionMethod>().unwrap(), ConnectionMethod::Blend);
        assert_eq!("MAX".parse::<ConnectionMethod>().unwrap(), ConnectionMethod::Max);
        assert!("mean".parse::<ConnectionMethod>().is_err());
        assert_eq!(ConnectionMethod::Blend.to_string(), "blend");
    }
}
