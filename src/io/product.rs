//! Theia/MUSCATE Sentinel-2 L2A product driver.
//!
//! A [`Sentinel2`] is built once from a product directory and is immutable
//! afterwards; every read opens its own raster handles and releases them on
//! return.

use crate::core::angles::{reconstruct_incidence, reconstruct_solar};
use crate::core::compose::{self, ComposeSource};
use crate::core::{mgrs, orbits, psf};
use crate::io::metadata::{self, MuscateMetadata};
use crate::types::{
    Band, BandType, BoundingBox, Composite, GeoTransform, Mask, ReadParams, Res, S2Error,
    S2Result, Satellite, Sentinel2Dataset, TileOrbitCoverage, Window,
};
use chrono::{Datelike, NaiveDate, NaiveTime};
use gdal::raster::GdalType;
use ndarray::{Array2, Array3, Axis};
use num_traits::Float;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_regex() -> &'static Regex {
    NAME_RE.get_or_init(|| {
        Regex::new(
            r"^(SENTINEL2[AB])_([0-9]{8})-([0-9]{6})-([0-9]{3})_(L2A)_T([0-9]{2}[C-HJ-NP-X][A-HJ-NP-Z][A-HJ-NP-V])_([A-Z0-9]+)_V([0-9]+-[0-9]+)$",
        )
        .expect("product name regex is valid")
    })
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedName {
    pub satellite: Satellite,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub tile: String,
}

pub(crate) fn parse_product_name(name: &str) -> S2Result<ParsedName> {
    let caps = name_regex()
        .captures(name)
        .ok_or_else(|| S2Error::MalformedProduct(format!("unexpected directory name: {name}")))?;
    let satellite = match &caps[1] {
        "SENTINEL2A" => Satellite::S2A,
        _ => Satellite::S2B,
    };
    let date = NaiveDate::parse_from_str(&caps[2], "%Y%m%d")
        .map_err(|e| S2Error::MalformedProduct(format!("bad acquisition date: {e}")))?;
    let time = NaiveTime::parse_from_str(&caps[3], "%H%M%S")
        .map_err(|e| S2Error::MalformedProduct(format!("bad acquisition time: {e}")))?;
    Ok(ParsedName {
        satellite,
        date,
        time,
        tile: caps[6].to_string(),
    })
}

/// A Sentinel-2 L2A product, parsed once from its directory.
#[derive(Debug)]
pub struct Sentinel2 {
    product_dir: PathBuf,
    product_name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub satellite: Satellite,
    pub tile: String,
    pub cloud_cover: u8,
    pub relative_orbit_number: u16,
    /// Native CRS as a lowercase `epsg:xxxxx` string.
    pub crs: String,
    /// Tile extent in the native CRS.
    pub bounds: BoundingBox,
    /// Tile transform at 10 m.
    pub transform: GeoTransform,
    metadata: MuscateMetadata,
}

impl Sentinel2 {
    /// Open a product directory and parse its name and metadata descriptor.
    pub fn new<P: AsRef<Path>>(product_dir: P) -> S2Result<Self> {
        let product_dir = product_dir.as_ref().to_path_buf();
        let product_name = product_dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                S2Error::MalformedProduct(format!(
                    "cannot extract product name from {}",
                    product_dir.display()
                ))
            })?
            .to_string();
        let parsed = parse_product_name(&product_name)?;
        log::info!("Opening product {product_name}");

        let descriptor = product_dir.join(format!("{product_name}_MTD_ALL.xml"));
        let xml = std::fs::read_to_string(&descriptor).map_err(|e| {
            S2Error::MalformedProduct(format!(
                "missing metadata descriptor {}: {e}",
                descriptor.display()
            ))
        })?;
        let metadata = metadata::parse_metadata(&xml)?;
        let cloud_cover = metadata.cloud_percent().ok_or_else(|| {
            S2Error::MalformedProduct("descriptor carries no CloudPercent index".to_string())
        })?.round() as u8;
        let relative_orbit_number = metadata.product_characteristics.orbit_number.value;

        let crs = mgrs::tile_crs(&parsed.tile)?;
        let bounds = mgrs::tile_bbox(&parsed.tile, None)?;
        let transform = mgrs::tile_transform(&parsed.tile, Res::R1)?;

        Ok(Self {
            product_dir,
            product_name,
            date: parsed.date,
            time: parsed.time,
            satellite: parsed.satellite,
            tile: parsed.tile,
            cloud_cover,
            relative_orbit_number,
            crs,
            bounds,
            transform,
            metadata,
        })
    }

    pub fn product_dir(&self) -> &Path {
        &self.product_dir
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    pub fn day_of_year(&self) -> u32 {
        self.date.ordinal()
    }

    fn band_path(&self, band: Band, band_type: BandType) -> PathBuf {
        self.product_dir
            .join(format!("{}_{}_{}.tif", self.product_name, band_type.code(), band.code()))
    }

    fn mask_path(&self, mask: Mask, res: Res) -> PathBuf {
        self.product_dir.join("MASKS").join(format!(
            "{}_{}_{}.tif",
            self.product_name,
            mask.code(),
            res.code()
        ))
    }

    fn atmos_path(&self, res: Res) -> PathBuf {
        self.product_dir
            .join(format!("{}_ATB_{}.tif", self.product_name, res.code()))
    }

    fn compose_source(&self, params: &ReadParams) -> ComposeSource {
        ComposeSource {
            tile: self.tile.clone(),
            native_crs: self.crs.clone(),
            tile_bounds: self.bounds,
            bands: params
                .bands
                .iter()
                .map(|b| (*b, self.band_path(*b, params.band_type)))
                .collect(),
            masks: params
                .masks
                .iter()
                .map(|m| (*m, self.mask_path(*m, params.res)))
                .collect(),
            atmos: params.read_atmos.then(|| self.atmos_path(params.res)),
        }
    }

    /// Read bands, masks and optional atmospheric layers as numeric stacks.
    pub fn read_as_numpy<T: GdalType + Float>(
        &self,
        params: &ReadParams,
    ) -> S2Result<Composite<T>> {
        compose::compose(&self.compose_source(params), params)
    }

    /// Read the same stacks as a labeled dataset keyed by band code.
    pub fn read_as_xarray<T: GdalType + Float>(
        &self,
        params: &ReadParams,
    ) -> S2Result<Sentinel2Dataset<T>> {
        let composite = self.read_as_numpy::<T>(params)?;
        let mut variables = BTreeMap::new();
        for (i, band) in params.bands.iter().enumerate() {
            let layer: Array3<T> = composite
                .bands
                .index_axis(Axis(0), i)
                .to_owned()
                .insert_axis(Axis(0));
            variables.insert(band.code().to_string(), layer);
        }
        if let Some(atmos) = &composite.atmos {
            for (i, name) in ["WCV", "AOT"].iter().enumerate() {
                let layer: Array3<T> =
                    atmos.index_axis(Axis(0), i).to_owned().insert_axis(Axis(0));
                variables.insert(name.to_string(), layer);
            }
        }
        let mut attrs = BTreeMap::new();
        attrs.insert("tile".to_string(), self.tile.clone());
        attrs.insert("type".to_string(), params.band_type.code().to_string());
        attrs.insert("crs".to_string(), composite.crs.clone());
        Ok(Sentinel2Dataset {
            variables,
            t: vec![self.date.and_time(self.time)],
            x: composite.xcoords,
            y: composite.ycoords,
            attrs,
        })
    }

    /// Convert target bounds to a pixel window on the tile grid at `res`.
    fn window_from_bounds(&self, bounds: &BoundingBox, res: Res) -> S2Result<Window> {
        let step = res.value();
        let col_off = (bounds.left - self.bounds.left) / step;
        let row_off = (self.bounds.top - bounds.top) / step;
        let width = bounds.width() / step;
        let height = bounds.height() / step;
        let full = res.tile_size() as f64;
        if col_off.round() < 0.0
            || row_off.round() < 0.0
            || width.round() < 1.0
            || height.round() < 1.0
            || col_off.round() + width.round() > full
            || row_off.round() + height.round() > full
        {
            return Err(S2Error::OutOfBounds(format!("{bounds:?}")));
        }
        Ok(Window::new(
            col_off.round() as usize,
            row_off.round() as usize,
            width.round() as usize,
            height.round() as usize,
        ))
    }

    /// Reconstruct the solar zenith/azimuth rasters at `res`.
    pub fn read_solar_angles_as_numpy(
        &self,
        res: Res,
        bounds: Option<&BoundingBox>,
    ) -> S2Result<(Array2<f32>, Array2<f32>)> {
        let window = bounds
            .map(|bb| self.window_from_bounds(bb, res))
            .transpose()?;
        reconstruct_solar(&self.metadata.solar_grids()?, res, window.as_ref())
    }

    /// Reconstruct the per-detector viewing incidence rasters of one band,
    /// split by detector parity.
    pub fn read_incidence_angles_as_numpy(
        &self,
        band: Band,
        res: Res,
        bounds: Option<&BoundingBox>,
    ) -> S2Result<(Array2<f32>, Array2<f32>, Array2<f32>, Array2<f32>)> {
        let window = bounds
            .map(|bb| self.window_from_bounds(bb, res))
            .transpose()?;
        let detectors = self.metadata.incidence_grids(band)?;
        reconstruct_incidence(&detectors, res, window.as_ref())
    }

    /// Per-band PSF kernels; see [`crate::core::psf::generate_psf_kernel`].
    pub fn generate_psf_kernel(bands: &[Band], half_kernel_width: usize) -> Array3<f32> {
        psf::generate_psf_kernel(bands, half_kernel_width)
    }

    /// The Theia tile catalog; see [`crate::core::orbits::get_theia_tiles`].
    pub fn get_theia_tiles() -> &'static [String] {
        orbits::get_theia_tiles()
    }

    /// Tile/orbit coverage; see
    /// [`crate::core::orbits::find_tile_orbit_pairs`].
    pub fn find_tile_orbit_pairs(
        bounds: &BoundingBox,
        crs: &str,
    ) -> S2Result<Vec<TileOrbitCoverage>> {
        orbits::find_tile_orbit_pairs(bounds, crs)
    }
}
