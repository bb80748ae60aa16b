//! Low-level raster and geodesy access on top of GDAL.
//!
//! Every public read here is handle-scoped: datasets are opened, used and
//! dropped within one call. Cropping, resampling and reprojection are done in
//! a single pass through `GDALReprojectImage` into an in-memory dataset laid
//! out on the caller's target grid.

use crate::core::geometry::Ring;
use crate::types::{BoundingBox, Resampling, S2Error, S2Result};
use gdal::raster::{Buffer, GdalType};
use gdal::spatial_ref::{CoordTransform, SpatialRef};
use gdal::{Dataset, DriverManager};
use ndarray::Array2;
use num_traits::NumCast;
use std::path::Path;

/// Output grid of a composited read: bounds, resolution and pixel shape in
/// one CRS.
#[derive(Debug, Clone)]
pub struct TargetGrid {
    pub bounds: BoundingBox,
    pub resolution: f64,
    pub width: usize,
    pub height: usize,
}

impl TargetGrid {
    pub fn geo_transform(&self) -> [f64; 6] {
        [
            self.bounds.left,
            self.resolution,
            0.0,
            self.bounds.top,
            0.0,
            -self.resolution,
        ]
    }
}

/// Parse a user CRS string ("epsg:32631", WKT, proj4...) into a `SpatialRef`
/// with traditional GIS (x, y) axis order.
pub fn spatial_ref(crs: &str) -> S2Result<SpatialRef> {
    let sref = SpatialRef::from_definition(crs).map_err(|e| S2Error::InvalidCrs {
        crs: crs.to_string(),
        reason: e.to_string(),
    })?;
    sref.set_axis_mapping_strategy(gdal_sys::OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER);
    Ok(sref)
}

/// Reproject ring vertices between two CRS.
pub fn transform_ring(ring: &[[f64; 2]], src_crs: &str, dst_crs: &str) -> S2Result<Ring> {
    let src = spatial_ref(src_crs)?;
    let dst = spatial_ref(dst_crs)?;
    let transform = CoordTransform::new(&src, &dst)?;
    let mut xs: Vec<f64> = ring.iter().map(|p| p[0]).collect();
    let mut ys: Vec<f64> = ring.iter().map(|p| p[1]).collect();
    let mut zs = vec![0.0; ring.len()];
    transform.transform_coords(&mut xs, &mut ys, &mut zs)?;
    Ok(xs.into_iter().zip(ys).map(|(x, y)| [x, y]).collect())
}

/// Ring of a bounding box with `densify` extra vertices per edge.
pub fn densified_ring(bb: &BoundingBox, densify: usize) -> Ring {
    let n = densify + 1;
    let mut ring = Ring::with_capacity(4 * n);
    let corners = [
        [bb.left, bb.bottom],
        [bb.right, bb.bottom],
        [bb.right, bb.top],
        [bb.left, bb.top],
    ];
    for i in 0..4 {
        let [x0, y0] = corners[i];
        let [x1, y1] = corners[(i + 1) % 4];
        for k in 0..n {
            let t = k as f64 / n as f64;
            ring.push([x0 + t * (x1 - x0), y0 + t * (y1 - y0)]);
        }
    }
    ring
}

/// Envelope of a bounding box reprojected between two CRS.
///
/// Edges are densified before the transform so curved projected edges do not
/// clip the envelope.
pub fn transform_bounds(
    bb: &BoundingBox,
    src_crs: &str,
    dst_crs: &str,
    densify: usize,
) -> S2Result<BoundingBox> {
    let ring = transform_ring(&densified_ring(bb, densify), src_crs, dst_crs)?;
    Ok(crate::core::geometry::ring_envelope(&ring))
}

fn resample_alg(alg: Resampling) -> gdal_sys::GDALResampleAlg::Type {
    use gdal_sys::GDALResampleAlg;
    match alg {
        Resampling::Nearest => GDALResampleAlg::GRA_NearestNeighbour,
        Resampling::Bilinear => GDALResampleAlg::GRA_Bilinear,
        Resampling::Cubic => GDALResampleAlg::GRA_Cubic,
        Resampling::CubicSpline => GDALResampleAlg::GRA_CubicSpline,
        Resampling::Lanczos => GDALResampleAlg::GRA_Lanczos,
        Resampling::Average => GDALResampleAlg::GRA_Average,
    }
}

fn source_read_error(path: &Path, reason: impl ToString) -> S2Error {
    S2Error::SourceRead {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Read every band of `path` warped onto `grid` in `dst_crs`.
///
/// Returns one array per source band plus the source no-data value. Pixels
/// outside the source extent are left at `fill` (the source no-data value
/// when `fill` is `None`).
pub fn warp_to_grid<T: GdalType + NumCast + Copy>(
    path: &Path,
    grid: &TargetGrid,
    dst_crs: &str,
    alg: Resampling,
    fill: Option<f64>,
) -> S2Result<(Vec<Array2<T>>, Option<f64>)> {
    log::debug!(
        "Warping {} onto {}x{} grid at {} in {}",
        path.display(),
        grid.width,
        grid.height,
        grid.resolution,
        dst_crs
    );

    let src = Dataset::open(path).map_err(|e| source_read_error(path, e))?;
    let band_count = src.raster_count();
    if band_count < 1 {
        return Err(source_read_error(path, "no raster bands"));
    }
    let src_no_data = src
        .rasterband(1)
        .map_err(|e| source_read_error(path, e))?
        .no_data_value();
    let fill_value = fill.or(src_no_data).unwrap_or(0.0);

    let driver = DriverManager::get_driver_by_name("MEM")?;
    let mut dst = driver.create_with_band_type::<T, _>(
        "",
        grid.width as isize,
        grid.height as isize,
        band_count,
    )?;
    dst.set_geo_transform(&grid.geo_transform())?;
    dst.set_spatial_ref(&spatial_ref(dst_crs)?)?;

    let fill_cast: T = NumCast::from(fill_value)
        .ok_or_else(|| source_read_error(path, "fill value not representable in output type"))?;
    for i in 1..=band_count {
        let mut band = dst.rasterband(i)?;
        let buffer = Buffer::new(
            (grid.width, grid.height),
            vec![fill_cast; grid.width * grid.height],
        );
        band.write((0, 0), (grid.width, grid.height), &buffer)?;
        if let Some(nd) = src_no_data {
            band.set_no_data_value(Some(nd))?;
        }
    }

    let err = unsafe {
        gdal_sys::GDALReprojectImage(
            src.c_dataset(),
            std::ptr::null(),
            dst.c_dataset(),
            std::ptr::null(),
            resample_alg(alg),
            0.0,
            0.0,
            None,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
        )
    };
    if err != gdal_sys::CPLErr::CE_None {
        return Err(source_read_error(path, "GDALReprojectImage failed"));
    }

    let mut layers = Vec::with_capacity(band_count as usize);
    for i in 1..=band_count {
        let band = dst.rasterband(i)?;
        let data = band
            .read_as::<T>((0, 0), (grid.width, grid.height), (grid.width, grid.height), None)
            .map_err(|e| source_read_error(path, e))?;
        let arr = Array2::from_shape_vec((grid.height, grid.width), data.data)
            .map_err(|e| source_read_error(path, e))?;
        layers.push(arr);
    }
    Ok((layers, src_no_data))
}
