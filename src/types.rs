use chrono::NaiveDateTime;
use ndarray::{Array1, Array3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Spectral bands of the Sentinel-2 MSI instrument carried by L2A products.
///
/// Only the reflectance bands distributed by Theia are listed; B1, B9 and B10
/// are consumed by the atmospheric correction and never reach the L2A user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Band {
    B2,
    B3,
    B4,
    B5,
    B6,
    B7,
    B8,
    B8A,
    B11,
    B12,
}

impl Band {
    /// Native ground sampling distance class of the band.
    pub fn native_res(&self) -> Res {
        match self {
            Band::B2 | Band::B3 | Band::B4 | Band::B8 => Res::R1,
            _ => Res::R2,
        }
    }

    /// File-name token used in Theia product rasters (e.g. `FRE_B8A.tif`).
    pub fn code(&self) -> &'static str {
        match self {
            Band::B2 => "B2",
            Band::B3 => "B3",
            Band::B4 => "B4",
            Band::B5 => "B5",
            Band::B6 => "B6",
            Band::B7 => "B7",
            Band::B8 => "B8",
            Band::B8A => "B8A",
            Band::B11 => "B11",
            Band::B12 => "B12",
        }
    }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Reflectance bands natively sampled at 10 m.
pub const GROUP_10M: [Band; 4] = [Band::B2, Band::B3, Band::B4, Band::B8];

/// Reflectance bands natively sampled at 20 m.
pub const GROUP_20M: [Band; 6] = [
    Band::B5,
    Band::B6,
    Band::B7,
    Band::B8A,
    Band::B11,
    Band::B12,
];

/// Reflectance product variant distributed by Theia.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BandType {
    /// Flat reflectance (slope-corrected surface reflectance).
    Fre,
    /// Surface reflectance without slope correction.
    Sre,
}

impl BandType {
    pub fn code(&self) -> &'static str {
        match self {
            BandType::Fre => "FRE",
            BandType::Sre => "SRE",
        }
    }
}

impl std::fmt::Display for BandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Per-pixel quality mask layers shipped in the `MASKS/` directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mask {
    /// Cloud mask.
    Clm,
    /// Saturation mask.
    Sat,
    /// Edge (out of swath) mask.
    Edg,
}

impl Mask {
    pub fn code(&self) -> &'static str {
        match self {
            Mask::Clm => "CLM",
            Mask::Sat => "SAT",
            Mask::Edg => "EDG",
        }
    }
}

impl std::fmt::Display for Mask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// All quality masks, in file-layout order.
pub const ALL_MASKS: [Mask; 3] = [Mask::Clm, Mask::Sat, Mask::Edg];

/// Native resolution classes of the product file layout.
///
/// These select a discrete grid; arbitrary target resolutions are reached by
/// resampling after the nearest native grid has been chosen as source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Res {
    /// 10 m grid, 10980 x 10980 pixels per tile.
    R1,
    /// 20 m grid, 5490 x 5490 pixels per tile.
    R2,
}

impl Res {
    /// Ground sampling distance in meters.
    pub fn value(&self) -> f64 {
        match self {
            Res::R1 => 10.0,
            Res::R2 => 20.0,
        }
    }

    /// Tile raster side length in pixels at this resolution.
    pub fn tile_size(&self) -> usize {
        match self {
            Res::R1 => 10980,
            Res::R2 => 5490,
        }
    }

    /// File-name token used by mask and atmospheric rasters.
    pub fn code(&self) -> &'static str {
        match self {
            Res::R1 => "R1",
            Res::R2 => "R2",
        }
    }
}

/// Sentinel-2 platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Satellite {
    S2A,
    S2B,
}

impl Satellite {
    /// Directory-name token of the platform.
    pub fn code(&self) -> &'static str {
        match self {
            Satellite::S2A => "SENTINEL2A",
            Satellite::S2B => "SENTINEL2B",
        }
    }
}

impl std::fmt::Display for Satellite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Axis-aligned bounding box in projected CRS units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl BoundingBox {
    pub fn new(left: f64, bottom: f64, right: f64, top: f64) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
        }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    /// True if the two boxes share a region of non-zero area.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.bottom < other.top
            && other.bottom < self.top
    }
}

/// Geospatial transformation parameters (north-up, no rotation).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// GDAL-ordered coefficient array.
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }
}

/// Pixel region of a tile raster at a given resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub col_off: usize,
    pub row_off: usize,
    pub width: usize,
    pub height: usize,
}

impl Window {
    pub fn new(col_off: usize, row_off: usize, width: usize, height: usize) -> Self {
        Self {
            col_off,
            row_off,
            width,
            height,
        }
    }
}

/// Resampling algorithms supported by the raster access layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resampling {
    Nearest,
    Bilinear,
    Cubic,
    CubicSpline,
    Lanczos,
    Average,
}

/// Coverage of one MGRS tile by one relative-orbit swath.
#[derive(Debug, Clone, PartialEq)]
pub struct TileOrbitCoverage {
    pub tile_id: String,
    pub relative_orbit_number: u16,
    /// Fraction of the tile area covered by the swath, in (0, 1].
    pub tile_coverage: f64,
}

/// Parameters of a composited read, validated per call and never persisted.
#[derive(Debug, Clone)]
pub struct ReadParams {
    /// Reflectance bands to stack, in output order.
    pub bands: Vec<Band>,
    /// Reflectance product variant to read.
    pub band_type: BandType,
    /// Quality masks to stack alongside the bands.
    pub masks: Vec<Mask>,
    /// Append the water-vapour and aerosol layers.
    pub read_atmos: bool,
    /// Native grid used as read source for masks and atmospheric layers.
    pub res: Res,
    /// Denominator applied to raw digital numbers.
    pub scale: f64,
    /// Target CRS; `None` keeps the tile's native CRS.
    pub crs: Option<String>,
    /// Target ground sampling distance in CRS units.
    pub resolution: f64,
    /// Value written to pixels outside the valid footprint.
    pub no_data_value: f64,
    /// Target region; `None` reads the full tile extent.
    pub bounds: Option<BoundingBox>,
    /// Resampling algorithm for reflectance bands.
    pub algorithm: Resampling,
}

impl Default for ReadParams {
    fn default() -> Self {
        Self {
            bands: GROUP_10M.to_vec(),
            band_type: BandType::Fre,
            masks: ALL_MASKS.to_vec(),
            read_atmos: false,
            res: Res::R1,
            scale: 10000.0,
            crs: None,
            resolution: 10.0,
            no_data_value: f64::NAN,
            bounds: None,
            algorithm: Resampling::Cubic,
        }
    }
}

/// Co-registered output of a composited read.
///
/// All stacks share the same `(layers, height, width)` grid; coordinate
/// vectors hold pixel centers in output CRS units.
#[derive(Debug, Clone)]
pub struct Composite<T> {
    pub bands: Array3<T>,
    pub masks: Array3<u8>,
    /// `Some` with two layers (WCV then AOT) when atmospheric data was read.
    pub atmos: Option<Array3<T>>,
    pub xcoords: Array1<f64>,
    pub ycoords: Array1<f64>,
    pub crs: String,
}

/// Thin labeled wrapper over [`Composite`], one variable per band with a
/// singleton time coordinate.
#[derive(Debug, Clone)]
pub struct Sentinel2Dataset<T> {
    /// Band code (or "WCV"/"AOT") to `(t, y, x)` array.
    pub variables: BTreeMap<String, Array3<T>>,
    pub t: Vec<NaiveDateTime>,
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    pub attrs: BTreeMap<String, String>,
}

/// Error types for the Sentinel-2 driver.
#[derive(Debug, thiserror::Error)]
pub enum S2Error {
    #[error("unknown MGRS tile identifier: {0}")]
    UnknownTile(String),

    #[error("malformed product: {0}")]
    MalformedProduct(String),

    #[error("unsupported resolution: {0}")]
    UnsupportedResolution(String),

    #[error("invalid CRS '{crs}': {reason}")]
    InvalidCrs { crs: String, reason: String },

    #[error("requested region is outside the tile extent: {0}")]
    OutOfBounds(String),

    #[error("failed to read {}: {reason}", path.display())]
    SourceRead { path: PathBuf, reason: String },

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for driver operations.
pub type S2Result<T> = Result<T, S2Error>;
