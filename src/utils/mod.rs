// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Field processing helpers shared by the decoder passes.

pub mod caf_scored;
pub mod cif_hr;
pub mod cif_seeds;
pub mod occupancy;

pub use caf_scored::{CafEntry, CafScored};
pub use cif_hr::CifHr;
pub use cif_seeds::{CifSeeds, Seed};
pub use occupancy::Occupancy;
