//! Per-band point-spread-function kernel synthesis.
//!
//! Each band's PSF is modeled as an isotropic Gaussian whose width is derived
//! from the band's modulation transfer function at the Nyquist frequency of
//! its native grid: MTF(f) = exp(-2 pi^2 sigma^2 f^2) at f = 1/(2r) gives
//! sigma = r * sqrt(-2 ln MTF_N) / pi. Kernels are sampled on the common
//! 10 m grid so cross-resolution band degradation can be simulated on one
//! raster.

use crate::types::Band;
use ndarray::Array3;

/// Sampling step of the synthesized kernels, in meters.
const KERNEL_STEP: f64 = 10.0;

/// System MTF at the Nyquist frequency of the band's native grid.
fn mtf_at_nyquist(band: Band) -> f64 {
    match band {
        Band::B2 => 0.304,
        Band::B3 => 0.276,
        Band::B4 => 0.233,
        Band::B8 => 0.222,
        Band::B5 => 0.254,
        Band::B6 => 0.261,
        Band::B7 => 0.263,
        Band::B8A => 0.269,
        Band::B11 => 0.272,
        Band::B12 => 0.233,
    }
}

/// Gaussian sigma of the band PSF in meters.
fn psf_sigma(band: Band) -> f64 {
    let r = band.native_res().value();
    r * (-2.0 * mtf_at_nyquist(band).ln()).sqrt() / std::f64::consts::PI
}

/// Generate one blur kernel per band, stacked as
/// `(bands, 2*half_kernel_width+1, 2*half_kernel_width+1)`.
///
/// Kernels are sampled at 10 m steps and normalized to unit sum; bands with a
/// coarser native grid yield wider kernels. Pure and deterministic.
pub fn generate_psf_kernel(bands: &[Band], half_kernel_width: usize) -> Array3<f32> {
    let size = 2 * half_kernel_width + 1;
    let mut kernels = Array3::zeros((bands.len(), size, size));
    for (b, band) in bands.iter().enumerate() {
        let sigma = psf_sigma(*band);
        let mut sum = 0.0;
        for i in 0..size {
            let dy = (i as f64 - half_kernel_width as f64) * KERNEL_STEP;
            for j in 0..size {
                let dx = (j as f64 - half_kernel_width as f64) * KERNEL_STEP;
                let value = (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp();
                kernels[[b, i, j]] = value as f32;
                sum += value;
            }
        }
        for i in 0..size {
            for j in 0..size {
                kernels[[b, i, j]] /= sum as f32;
            }
        }
    }
    kernels
}
