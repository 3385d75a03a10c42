//! Content-addressed layer packaging

pub mod prepare;

pub use prepare::{prepare_layers, LayerArtifact};
