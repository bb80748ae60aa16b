//! Product I/O: MUSCATE metadata parsing, raster access and the driver.

pub mod metadata;
pub mod product;
pub mod raster;

pub use metadata::{parse_metadata, MuscateMetadata};
pub use product::Sentinel2;
pub use raster::TargetGrid;
