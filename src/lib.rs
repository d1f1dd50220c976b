// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

#![cfg_attr(docsrs, feature(doc_cfg))]

//! # CIF/CAF Pose Decoder
//!
//! Decodes the composite intensity field (CIF) and composite association field (CAF)
//! of a bottom-up pose network into skeletons. The network itself is out of scope: the
//! decoder takes two `ndarray` views and returns annotations.
//!
//! ## Features
//!
//! - **Lazy best-first growth** - Connection values are computed only for the frontier
//!   entry on top of the queue
//! - **Reverse matching** - Every connection can be checked against the backward field
//! - **Occupancy suppression** - One skeleton per person, no duplicate seeds
//! - **Force complete** - Weak joints recovered from the dense confidence map
//! - **Keypoint NMS** - Overlapping keypoints of lower-scoring skeletons removed
//!
//! ## Quick Start
//!
//! ```rust
//! use cifcaf_decoder::{CifCaf, CifField, CafField, DecoderConfig};
//! use ndarray::Array4;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let decoder = CifCaf::coco_person(DecoderConfig::new().with_force_complete(true))?;
//!
//!     // network output at stride 8 for a 257x257 image
//!     let cif = Array4::<f32>::zeros((17, 5, 33, 33));
//!     let caf = Array4::<f32>::zeros((19, 9, 33, 33));
//!
//!     let annotations = decoder.call(&CifField::new(cif.view(), 8), &CafField::new(caf.view(), 8))?;
//!     for ann in &annotations {
//!         println!("score {:.3}, {} joints", ann.score(), ann.n_filled());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Custom Configuration
//!
//! ```rust
//! use cifcaf_decoder::{ConnectionMethod, DecoderConfig};
//!
//! let config = DecoderConfig::new()
//!     .with_seed_threshold(0.3)          // Minimum seed confidence
//!     .with_keypoint_threshold(0.15)     // Minimum grown joint confidence
//!     .with_reverse_match(true)          // Check connections both ways
//!     .with_connection_method(ConnectionMethod::Blend);
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`decoder`] | [`CifCaf`] decoder, connection values, frontier, growth and completion |
//! | [`annotation`] | Output types ([`Annotation`], [`Joint`]) and the flat row format |
//! | [`skeleton`] | Skeleton [`Topology`] and the COCO person skeleton |
//! | [`fields`] | Borrowed network fields ([`CifField`], [`CafField`]) |
//! | [`config`] | [`DecoderConfig`] for thresholds and passes |
//! | [`utils`] | Dense confidence map, seeds, scored associations, occupancy grid |
//! | [`error`] | Error types ([`DecodeError`], [`Result`]) |
//!
//! ## License
//!
//! This project is licensed under [AGPL-3.0](https://github.com/ultralytics/inference/blob/main/LICENSE).

// Modules
pub mod logging;

pub mod annotation;
pub mod config;
pub mod decoder;
pub mod error;
pub mod fields;
pub mod skeleton;
pub mod utils;

// Re-export main types for convenience
pub use annotation::{annotations_to_array, Annotation, DecodingStep, Joint, ROW_WIDTH};
pub use config::{ConnectionMethod, DecoderConfig};
pub use decoder::CifCaf;
pub use error::{DecodeError, Result};
pub use fields::{CafField, CifField};
pub use skeleton::{Topology, COCO_KEYPOINTS, COCO_PERSON_SKELETON};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "cifcaf-decoder");
    }
}
