//! Pure domain types with minimal dependencies
//!
//! This module contains core types used throughout the application.
//! Types here know nothing about transport or the command shell.

pub mod crop;
pub mod geometry;
pub mod history;
pub mod palette;
pub mod raster;
pub mod selection;
pub mod style;

pub use crop::*;
pub use geometry::*;
pub use history::*;
pub use palette::*;
pub use raster::*;
pub use selection::*;
pub use style::*;
