//! Dense angle raster reconstruction from sparse per-detector grids.
//!
//! Viewing and solar angles ship as coarse control-point grids (23x23 points
//! at a 5 km step, NaN outside each detector's footprint). Reconstruction
//! interpolates them bilinearly at output pixel centers expressed in absolute
//! tile pixel coordinates, so a windowed read is exactly the corresponding
//! slice of a full read: both paths evaluate the same function at the same
//! sample points.

use crate::types::{Res, S2Error, S2Result, Window};
use ndarray::Array2;

/// One sparse control-point grid in degrees, NaN outside its footprint.
#[derive(Debug, Clone)]
pub struct AngleGrid {
    pub values: Array2<f32>,
    /// Control point column spacing in meters.
    pub col_step: f64,
    /// Control point row spacing in meters.
    pub row_step: f64,
}

/// Zenith/azimuth grid pair sharing one footprint.
#[derive(Debug, Clone)]
pub struct AngleGridPair {
    pub zenith: AngleGrid,
    pub azimuth: AngleGrid,
}

/// Viewing incidence grids of a single detector.
#[derive(Debug, Clone)]
pub struct DetectorAngleGrids {
    pub detector_id: u8,
    pub grids: AngleGridPair,
}

fn check_window(window: Option<&Window>, full: usize) -> S2Result<Window> {
    let win = window
        .copied()
        .unwrap_or_else(|| Window::new(0, 0, full, full));
    if win.col_off + win.width > full || win.row_off + win.height > full {
        return Err(S2Error::OutOfBounds(format!(
            "window {win:?} exceeds the {full}x{full} tile raster"
        )));
    }
    Ok(win)
}

/// Reconstruct one dense raster from a sparse grid.
///
/// The output covers the full tile raster at `res`, or `window` if given.
/// Control points are anchored at multiples of the grid step from the tile
/// upper-left corner; output samples are taken at pixel centers.
pub fn reconstruct_grid(
    grid: &AngleGrid,
    res: Res,
    window: Option<&Window>,
) -> S2Result<Array2<f32>> {
    let step = res.value();
    if grid.col_step <= 0.0 || grid.row_step <= 0.0 {
        return Err(S2Error::UnsupportedResolution(format!(
            "bad control grid step {}x{}",
            grid.col_step, grid.row_step
        )));
    }
    if grid.col_step % step != 0.0 || grid.row_step % step != 0.0 {
        return Err(S2Error::UnsupportedResolution(format!(
            "control grid step {}x{} is not a multiple of {} m",
            grid.col_step, grid.row_step, step
        )));
    }
    let (rows, cols) = grid.values.dim();
    if rows < 2 || cols < 2 {
        return Err(S2Error::UnsupportedResolution(format!(
            "control grid {rows}x{cols} is too small to interpolate"
        )));
    }

    let full = res.tile_size();
    let win = check_window(window, full)?;
    let mut out = Array2::from_elem((win.height, win.width), f32::NAN);

    for i in 0..win.height {
        // Position of the pixel center in control-grid coordinates.
        let gy = ((win.row_off + i) as f64 + 0.5) * step / grid.row_step;
        let r0 = (gy.floor() as usize).min(rows - 2);
        let fy = gy - r0 as f64;
        for j in 0..win.width {
            let gx = ((win.col_off + j) as f64 + 0.5) * step / grid.col_step;
            let c0 = (gx.floor() as usize).min(cols - 2);
            let fx = gx - c0 as f64;

            let v00 = grid.values[[r0, c0]] as f64;
            let v01 = grid.values[[r0, c0 + 1]] as f64;
            let v10 = grid.values[[r0 + 1, c0]] as f64;
            let v11 = grid.values[[r0 + 1, c0 + 1]] as f64;
            // NaN corners propagate through the blend.
            let value = (1.0 - fy) * ((1.0 - fx) * v00 + fx * v01)
                + fy * ((1.0 - fx) * v10 + fx * v11);
            out[[i, j]] = value as f32;
        }
    }
    Ok(out)
}

/// Reconstruct the solar zenith/azimuth rasters.
pub fn reconstruct_solar(
    solar: &AngleGridPair,
    res: Res,
    window: Option<&Window>,
) -> S2Result<(Array2<f32>, Array2<f32>)> {
    let zenith = reconstruct_grid(&solar.zenith, res, window)?;
    let azimuth = reconstruct_grid(&solar.azimuth, res, window)?;
    Ok((zenith, azimuth))
}

fn mosaic_into(dst: &mut Array2<f32>, src: &Array2<f32>) {
    // Detector footprints only meet at seams; a later non-NaN value wins.
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        if !s.is_nan() {
            *d = *s;
        }
    }
}

/// Reconstruct the viewing incidence rasters, split by detector parity.
///
/// Returns `(even_zenith, odd_zenith, even_azimuth, odd_azimuth)`. Each
/// parity is the mosaic of its detectors' reconstructed grids; within a tile
/// the two variants overlap only at detector seams.
pub fn reconstruct_incidence(
    detectors: &[DetectorAngleGrids],
    res: Res,
    window: Option<&Window>,
) -> S2Result<(Array2<f32>, Array2<f32>, Array2<f32>, Array2<f32>)> {
    let full = res.tile_size();
    let win = check_window(window, full)?;
    let shape = (win.height, win.width);
    let mut even_zenith = Array2::from_elem(shape, f32::NAN);
    let mut odd_zenith = Array2::from_elem(shape, f32::NAN);
    let mut even_azimuth = Array2::from_elem(shape, f32::NAN);
    let mut odd_azimuth = Array2::from_elem(shape, f32::NAN);

    for detector in detectors {
        let zenith = reconstruct_grid(&detector.grids.zenith, res, window)?;
        let azimuth = reconstruct_grid(&detector.grids.azimuth, res, window)?;
        if detector.detector_id % 2 == 0 {
            mosaic_into(&mut even_zenith, &zenith);
            mosaic_into(&mut even_azimuth, &azimuth);
        } else {
            mosaic_into(&mut odd_zenith, &zenith);
            mosaic_into(&mut odd_azimuth, &azimuth);
        }
    }
    Ok((even_zenith, odd_zenith, even_azimuth, odd_azimuth))
}
