//! Core algorithms: tile geometry, tile/orbit matching, angle grid
//! reconstruction, band compositing and PSF synthesis.

pub mod angles;
pub mod compose;
pub mod geometry;
pub mod mgrs;
pub mod orbits;
pub mod psf;

pub use angles::{reconstruct_incidence, reconstruct_solar, AngleGrid, AngleGridPair, DetectorAngleGrids};
pub use compose::{compose, ComposeSource};
pub use orbits::{find_tile_orbit_pairs, get_theia_tiles};
pub use psf::generate_psf_kernel;
