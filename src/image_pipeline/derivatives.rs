//! Derivatives module
//!
//! Orchestrates the production of access and preservation copies for a
//! source image: classification, codec calls, verification and sidecar
//! extraction, with scratch space scoped to each run.

pub mod config;
mod generator;
pub mod set;


pub use config::{
    DerivativeFilenames, GeneratorConfig, GeneratorConfigBuilder, JpgDerivativeOptions, TiffDerivativeOptions,
};
pub use generator::DerivativeFilesGenerator;
pub use set::{DerivativeKind, DerivativeSet};
