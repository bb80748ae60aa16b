//! MGRS tile geometry for the Sentinel-2 tiling grid.
//!
//! Tile footprints are derived analytically from the tile identifier: UTM
//! zone and hemisphere from the leading digits and latitude band, the 100 km
//! square corner from the column/row letters. Sentinel-2 tiles are anchored
//! at the square's easting base with their north edge 20 m above the next
//! northing line, spanning 109.8 km (10980 px at 10 m, 5490 px at 20 m).

use crate::io::raster;
use crate::types::{BoundingBox, GeoTransform, Res, S2Error, S2Result};
use regex::Regex;
use std::sync::OnceLock;

/// Tile side length in meters.
pub const TILE_SIDE: f64 = 109_800.0;

/// Offset from the 100 km square northing base to the tile's north edge.
const NORTH_ANCHOR: f64 = 100_020.0;

const ROW_LETTERS: &str = "ABCDEFGHJKLMNPQRSTUV";
const BAND_LETTERS: &str = "CDEFGHJKLMNPQRSTUVWX";
const COLUMN_SETS: [&str; 3] = ["ABCDEFGH", "JKLMNPQR", "STUVWXYZ"];

static TILE_RE: OnceLock<Regex> = OnceLock::new();

fn tile_regex() -> &'static Regex {
    TILE_RE.get_or_init(|| {
        Regex::new(r"^([0-9]{2})([C-HJ-NP-X])([A-HJ-NP-Z])([A-HJ-NP-V])$")
            .expect("tile id regex is valid")
    })
}

struct TileId {
    zone: u32,
    band: char,
    column: char,
    row: char,
}

fn parse_tile(tile_id: &str) -> S2Result<TileId> {
    let caps = tile_regex()
        .captures(tile_id)
        .ok_or_else(|| S2Error::UnknownTile(tile_id.to_string()))?;
    let zone: u32 = caps[1]
        .parse()
        .map_err(|_| S2Error::UnknownTile(tile_id.to_string()))?;
    if zone == 0 || zone > 60 {
        return Err(S2Error::UnknownTile(tile_id.to_string()));
    }
    let band = caps[2].chars().next().unwrap_or('?');
    let column = caps[3].chars().next().unwrap_or('?');
    let row = caps[4].chars().next().unwrap_or('?');
    Ok(TileId {
        zone,
        band,
        column,
        row,
    })
}

/// Meridian arc length from the equator on WGS84, scaled by the UTM k0.
fn utm_northing(lat_deg: f64) -> f64 {
    const A: f64 = 6_378_137.0;
    const F: f64 = 1.0 / 298.257_223_563;
    const K0: f64 = 0.9996;
    let e2 = F * (2.0 - F);
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    let phi = lat_deg.to_radians();
    let m = A
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin());
    if lat_deg >= 0.0 {
        K0 * m
    } else {
        10_000_000.0 + K0 * m
    }
}

fn band_index(band: char) -> S2Result<usize> {
    BAND_LETTERS
        .find(band)
        .ok_or_else(|| S2Error::UnknownTile(band.to_string()))
}

/// Upper-left corner of the tile in its native UTM CRS.
fn tile_upper_left(id: &TileId, tile_id: &str) -> S2Result<(f64, f64)> {
    // Column letter -> easting base. The three 8-letter sets cycle with the
    // zone number; a letter outside the zone's set is not a valid square.
    let set = COLUMN_SETS[((id.zone - 1) % 3) as usize];
    let col_pos = set
        .find(id.column)
        .ok_or_else(|| S2Error::UnknownTile(tile_id.to_string()))?;
    let easting = 100_000.0 * (col_pos as f64 + 1.0);

    // Row letter -> northing base, on a 2,000,000 m cycle with a five-letter
    // shift in even zones, resolved against the latitude band.
    let row_pos = ROW_LETTERS
        .find(id.row)
        .ok_or_else(|| S2Error::UnknownTile(tile_id.to_string()))? as i64;
    let shift = if id.zone % 2 == 0 { 5 } else { 0 };
    let base = 100_000.0 * ((row_pos - shift).rem_euclid(20) as f64);

    let lat_min = -80.0 + 8.0 * band_index(id.band)? as f64;
    let band_floor = utm_northing(lat_min);
    // Squares whose top edge reaches into the band belong to it; allow one
    // full square of slack below the band floor.
    let target = band_floor - 110_000.0;
    let cycles = ((target - base) / 2_000_000.0).ceil().max(0.0);
    let northing = base + 2_000_000.0 * cycles;

    Ok((easting, northing + NORTH_ANCHOR))
}

/// Native projected CRS of a tile, as a lowercase `epsg:xxxxx` string.
pub fn tile_crs(tile_id: &str) -> S2Result<String> {
    let id = parse_tile(tile_id)?;
    let epsg = if id.band >= 'N' {
        32600 + id.zone
    } else {
        32700 + id.zone
    };
    Ok(format!("epsg:{epsg}"))
}

/// Axis-aligned bounding box of a tile, optionally reprojected.
///
/// With `target_crs = None` the box is returned in the tile's native UTM CRS.
/// Otherwise the footprint edges are densified, reprojected, and the envelope
/// of the result is returned.
pub fn tile_bbox(tile_id: &str, target_crs: Option<&str>) -> S2Result<BoundingBox> {
    let id = parse_tile(tile_id)?;
    let (ulx, uly) = tile_upper_left(&id, tile_id)?;
    let native = BoundingBox::new(ulx, uly - TILE_SIDE, ulx + TILE_SIDE, uly);
    let native_crs = tile_crs(tile_id)?;
    match target_crs {
        None => Ok(native),
        Some(crs) if crs.eq_ignore_ascii_case(&native_crs) => Ok(native),
        Some(crs) => raster::transform_bounds(&native, &native_crs, crs, 21),
    }
}

/// Affine transform of the tile raster at the given resolution.
///
/// The pixel size is exactly the native ground sampling distance; every other
/// component relies on this to stay aligned with the angle rasters.
pub fn tile_transform(tile_id: &str, res: Res) -> S2Result<GeoTransform> {
    let id = parse_tile(tile_id)?;
    let (ulx, uly) = tile_upper_left(&id, tile_id)?;
    Ok(GeoTransform {
        top_left_x: ulx,
        pixel_width: res.value(),
        rotation_x: 0.0,
        top_left_y: uly,
        rotation_y: 0.0,
        pixel_height: -res.value(),
    })
}
