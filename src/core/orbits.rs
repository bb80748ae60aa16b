//! Tile/orbit matching against the static reference catalogs.
//!
//! Two read-only catalogs are embedded in the crate and parsed lazily on
//! first use: the Theia MGRS tile list and the Sentinel-2 relative-orbit
//! swath footprints (EPSG:4326 rings). Coverage fractions are computed in the
//! catalog frame; over a single tile the projection distortion of the ratio
//! is negligible against the caller-side thresholds.

use crate::core::geometry::{intersection_area, ring_area, Ring};
use crate::core::mgrs;
use crate::io::raster;
use crate::types::{BoundingBox, S2Error, S2Result, TileOrbitCoverage};
use std::collections::BTreeSet;
use std::sync::OnceLock;

const THEIA_TILES_DATA: &str = include_str!("../../data/theia_tiles.txt");
const ORBIT_SWATHS_DATA: &str = include_str!("../../data/s2_relative_orbits.csv");

#[derive(Debug)]
struct OrbitSwath {
    relative_orbit_number: u16,
    ring: Ring,
}

#[derive(Debug)]
struct TileFootprint {
    id: String,
    /// Densified footprint in EPSG:4326.
    ring: Ring,
    area: f64,
}

static THEIA_TILES: OnceLock<Vec<String>> = OnceLock::new();
static ORBIT_SWATHS: OnceLock<Vec<OrbitSwath>> = OnceLock::new();
static TILE_FOOTPRINTS: OnceLock<Vec<TileFootprint>> = OnceLock::new();

fn catalog_error(reason: impl ToString) -> S2Error {
    S2Error::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        reason.to_string(),
    ))
}

/// The complete, deduplicated set of Theia-distributed MGRS tile identifiers.
pub fn get_theia_tiles() -> &'static [String] {
    THEIA_TILES.get_or_init(|| {
        let mut seen = BTreeSet::new();
        THEIA_TILES_DATA
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .filter(|l| seen.insert(l.to_string()))
            .map(str::to_string)
            .collect()
    })
}

fn orbit_swaths() -> S2Result<&'static [OrbitSwath]> {
    if let Some(swaths) = ORBIT_SWATHS.get() {
        return Ok(swaths);
    }
    let mut swaths = Vec::new();
    for line in ORBIT_SWATHS_DATA.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (orbit, coords) = line
            .split_once(';')
            .ok_or_else(|| catalog_error(format!("bad swath record: {line}")))?;
        let relative_orbit_number: u16 = orbit
            .trim()
            .parse()
            .map_err(|_| catalog_error(format!("bad orbit number: {orbit}")))?;
        let values: Vec<f64> = coords
            .split_whitespace()
            .map(|v| {
                v.parse()
                    .map_err(|_| catalog_error(format!("bad swath coordinate: {v}")))
            })
            .collect::<S2Result<_>>()?;
        if values.len() < 6 || values.len() % 2 != 0 {
            return Err(catalog_error(format!("bad swath ring: {line}")));
        }
        let ring: Ring = values.chunks_exact(2).map(|c| [c[0], c[1]]).collect();
        swaths.push(OrbitSwath {
            relative_orbit_number,
            ring,
        });
    }
    Ok(ORBIT_SWATHS.get_or_init(|| swaths))
}

fn tile_footprints() -> S2Result<&'static [TileFootprint]> {
    if let Some(footprints) = TILE_FOOTPRINTS.get() {
        return Ok(footprints);
    }
    log::debug!("Building lon/lat footprints for {} tiles", get_theia_tiles().len());
    let mut footprints = Vec::with_capacity(get_theia_tiles().len());
    for tile_id in get_theia_tiles() {
        let bbox = mgrs::tile_bbox(tile_id, None)?;
        let crs = mgrs::tile_crs(tile_id)?;
        let ring = raster::transform_ring(&raster::densified_ring(&bbox, 4), &crs, "epsg:4326")?;
        let area = ring_area(&ring);
        footprints.push(TileFootprint {
            id: tile_id.clone(),
            ring,
            area,
        });
    }
    Ok(TILE_FOOTPRINTS.get_or_init(|| footprints))
}

/// Find every (tile, relative orbit) pair whose swath crosses the area of
/// interest, with the fraction of each tile covered by the swath.
///
/// The AOI is reprojected into the catalog frame; every catalog tile that
/// intersects it is matched against every swath footprint. Orbits with zero
/// intersection are omitted; ties in coverage are left to the caller to
/// resolve.
pub fn find_tile_orbit_pairs(
    bounds: &BoundingBox,
    crs: &str,
) -> S2Result<Vec<TileOrbitCoverage>> {
    let aoi = raster::transform_ring(&raster::densified_ring(bounds, 10), crs, "epsg:4326")?;
    let swaths = orbit_swaths()?;
    let mut pairs = Vec::new();
    for tile in tile_footprints()? {
        if intersection_area(&tile.ring, &aoi) <= 0.0 {
            continue;
        }
        for swath in swaths {
            let covered = intersection_area(&tile.ring, &swath.ring);
            if covered > 0.0 {
                pairs.push(TileOrbitCoverage {
                    tile_id: tile.id.clone(),
                    relative_orbit_number: swath.relative_orbit_number,
                    tile_coverage: covered / tile.area,
                });
            }
        }
    }
    log::debug!("Matched {} tile/orbit pairs", pairs.len());
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theia_tiles_are_valid_mgrs() {
        for tile in get_theia_tiles() {
            assert!(
                mgrs::tile_bbox(tile, None).is_ok(),
                "tile {tile} has no derivable footprint"
            );
        }
    }

    #[test]
    fn test_swath_catalog_parses() {
        let swaths = orbit_swaths().unwrap();
        assert!(!swaths.is_empty());
        for swath in swaths {
            assert!(swath.relative_orbit_number >= 1);
            assert!(swath.relative_orbit_number <= 143);
            assert!(ring_area(&swath.ring) > 0.0);
        }
    }
}
