//! Multi-resolution band compositing onto a single target grid.
//!
//! Bands live in per-resolution source files; masks and atmospheric layers in
//! their own rasters. Everything is warped onto one caller-defined grid so
//! the stacks stay co-registered with each other and with the reconstructed
//! angle rasters.

use crate::io::raster::{self, TargetGrid};
use crate::types::{
    Band, BoundingBox, Composite, Mask, ReadParams, Resampling, S2Error, S2Result,
};
use gdal::raster::GdalType;
use ndarray::{Array1, Array2, Array3, Axis};
use num_traits::Float;
use std::path::PathBuf;

/// Scale denominators of the two atmospheric layers (WCV, AOT).
const ATMOS_SCALES: [f64; 2] = [20.0, 200.0];

/// Resolved source files and tile geometry of one composited read.
#[derive(Debug, Clone)]
pub struct ComposeSource {
    pub tile: String,
    pub native_crs: String,
    /// Tile extent in the native CRS.
    pub tile_bounds: BoundingBox,
    pub bands: Vec<(Band, PathBuf)>,
    pub masks: Vec<(Mask, PathBuf)>,
    /// Two-layer atmospheric raster (WCV, AOT), when requested.
    pub atmos: Option<PathBuf>,
}

/// Resolve the output grid and CRS of a read request.
///
/// The output shape is `ceil(extent / resolution)` per axis, anchored at the
/// upper-left corner of the requested bounds (or of the tile extent expressed
/// in the output CRS when no bounds are given).
pub fn compute_target_grid(
    source: &ComposeSource,
    params: &ReadParams,
) -> S2Result<(TargetGrid, String)> {
    let output_crs = params
        .crs
        .clone()
        .unwrap_or_else(|| source.native_crs.clone());
    // Validate early so a bad CRS fails before any file is touched.
    raster::spatial_ref(&output_crs)?;

    if !(params.resolution > 0.0) {
        return Err(S2Error::UnsupportedResolution(format!(
            "target resolution {} must be positive",
            params.resolution
        )));
    }

    let tile_bounds_out = if output_crs.eq_ignore_ascii_case(&source.native_crs) {
        source.tile_bounds
    } else {
        raster::transform_bounds(&source.tile_bounds, &source.native_crs, &output_crs, 21)?
    };
    let bounds = params.bounds.unwrap_or(tile_bounds_out);
    if !bounds.intersects(&tile_bounds_out) {
        return Err(S2Error::OutOfBounds(format!("{bounds:?}")));
    }

    let width = (bounds.width() / params.resolution).ceil() as usize;
    let height = (bounds.height() / params.resolution).ceil() as usize;
    if width == 0 || height == 0 {
        return Err(S2Error::OutOfBounds(format!("{bounds:?}")));
    }
    Ok((
        TargetGrid {
            bounds,
            resolution: params.resolution,
            width,
            height,
        },
        output_crs,
    ))
}

fn pixel_centers(grid: &TargetGrid) -> (Array1<f64>, Array1<f64>) {
    let xcoords = Array1::from_shape_fn(grid.width, |j| {
        grid.bounds.left + (j as f64 + 0.5) * grid.resolution
    });
    let ycoords = Array1::from_shape_fn(grid.height, |i| {
        grid.bounds.top - (i as f64 + 0.5) * grid.resolution
    });
    (xcoords, ycoords)
}

fn cast<T: Float>(value: f64) -> T {
    T::from(value).unwrap_or_else(T::nan)
}

/// Replace no-data pixels and bring digital numbers to physical units.
fn scale_layer<T: GdalType + Float>(
    layer: &mut Array2<T>,
    src_no_data: Option<f64>,
    no_data_value: f64,
    scale: f64,
) {
    let out_no_data: T = cast(no_data_value);
    let denom: T = cast(scale);
    for v in layer.iter_mut() {
        if src_no_data.map_or(false, |nd| v.to_f64() == Some(nd)) {
            *v = out_no_data;
        } else {
            *v = *v / denom;
        }
    }
}

/// Read and stack bands, masks and atmospheric layers on one grid.
pub fn compose<T: GdalType + Float>(
    source: &ComposeSource,
    params: &ReadParams,
) -> S2Result<Composite<T>> {
    let (grid, output_crs) = compute_target_grid(source, params)?;
    log::info!(
        "Compositing {} bands / {} masks of tile {} onto {}x{} @ {} in {}",
        source.bands.len(),
        source.masks.len(),
        source.tile,
        grid.width,
        grid.height,
        grid.resolution,
        output_crs
    );
    let (xcoords, ycoords) = pixel_centers(&grid);

    let mut bands = Array3::from_elem(
        (source.bands.len(), grid.height, grid.width),
        cast::<T>(params.no_data_value),
    );
    for (i, (band, path)) in source.bands.iter().enumerate() {
        log::debug!("Reading band {} from {}", band, path.display());
        let (layers, src_no_data) =
            raster::warp_to_grid::<T>(path, &grid, &output_crs, params.algorithm, None)?;
        let mut layer = layers.into_iter().next().ok_or_else(|| S2Error::SourceRead {
            path: path.clone(),
            reason: "no raster band".to_string(),
        })?;
        scale_layer(&mut layer, src_no_data, params.no_data_value, params.scale);
        bands.index_axis_mut(Axis(0), i).assign(&layer);
    }

    let mut masks: Array3<u8> = Array3::zeros((source.masks.len(), grid.height, grid.width));
    for (i, (mask, path)) in source.masks.iter().enumerate() {
        log::debug!("Reading mask {} from {}", mask, path.display());
        // Nearest neighbour keeps the discrete mask semantics whatever the
        // native storage resolution.
        let (layers, _) =
            raster::warp_to_grid::<u8>(path, &grid, &output_crs, Resampling::Nearest, Some(0.0))?;
        let layer = layers.into_iter().next().ok_or_else(|| S2Error::SourceRead {
            path: path.clone(),
            reason: "no raster band".to_string(),
        })?;
        masks.index_axis_mut(Axis(0), i).assign(&layer);
    }

    let atmos = match &source.atmos {
        None => None,
        Some(path) => {
            log::debug!("Reading atmospheric layers from {}", path.display());
            let (layers, src_no_data) =
                raster::warp_to_grid::<T>(path, &grid, &output_crs, params.algorithm, None)?;
            if layers.len() < 2 {
                return Err(S2Error::SourceRead {
                    path: path.clone(),
                    reason: format!("expected 2 atmospheric layers, found {}", layers.len()),
                });
            }
            let mut stack = Array3::from_elem(
                (2, grid.height, grid.width),
                cast::<T>(params.no_data_value),
            );
            for (i, mut layer) in layers.into_iter().take(2).enumerate() {
                scale_layer(&mut layer, src_no_data, params.no_data_value, ATMOS_SCALES[i]);
                stack.index_axis_mut(Axis(0), i).assign(&layer);
            }
            Some(stack)
        }
    };

    Ok(Composite {
        bands,
        masks,
        atmos,
        xcoords,
        ycoords,
        crs: output_crs,
    })
}
