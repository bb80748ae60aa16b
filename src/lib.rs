//! s2theia: a reader for Sentinel-2 Level-2A surface reflectance products
//! distributed by Theia (MUSCATE processing chain).
//!
//! The crate opens a product directory, parses its MUSCATE descriptor and
//! exposes:
//!
//! - composited reads of reflectance bands, quality masks and atmospheric
//!   layers onto a caller-chosen grid and CRS ([`io::product::Sentinel2`]);
//! - reconstruction of solar and per-detector viewing angle rasters from the
//!   5 km control grids shipped in the descriptor ([`core::angles`]);
//! - analytic MGRS tile geometry ([`core::mgrs`]);
//! - tile/relative-orbit coverage queries over the embedded Theia catalog
//!   ([`core::orbits`]);
//! - Gaussian PSF kernel synthesis from on-board MTF measurements
//!   ([`core::psf`]).
//!
//! All georeferenced raster work goes through GDAL; arrays are `ndarray`
//! types in `(layer, row, col)` order.

pub mod core;
pub mod io;
pub mod types;

pub use crate::core::{
    compose::{compose, ComposeSource},
    mgrs::{tile_bbox, tile_crs, tile_transform},
    orbits::{find_tile_orbit_pairs, get_theia_tiles},
    psf::generate_psf_kernel,
};
pub use crate::io::product::Sentinel2;
pub use crate::types::{
    Band, BandType, BoundingBox, Composite, GeoTransform, Mask, ReadParams, Res, Resampling,
    S2Error, S2Result, Satellite, Sentinel2Dataset, TileOrbitCoverage, Window,
};
