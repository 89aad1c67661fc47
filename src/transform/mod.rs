//! Auxiliary preview/commit workflows that feed results back into a session

pub mod color_remap;
pub mod crop;

pub use color_remap::ColorRemap;
pub use crop::CropToSize;
