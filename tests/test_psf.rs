use ndarray::Axis;
use s2theia::types::{Band, GROUP_10M, GROUP_20M};
use s2theia::Sentinel2;

fn all_bands() -> Vec<Band> {
    GROUP_10M.iter().chain(GROUP_20M.iter()).copied().collect()
}

#[test]
fn test_kernel_stack_shape() {
    let kernels = Sentinel2::generate_psf_kernel(&all_bands(), 5);
    assert_eq!(kernels.dim(), (10, 11, 11));
}

#[test]
fn test_kernels_are_normalized() {
    let kernels = Sentinel2::generate_psf_kernel(&all_bands(), 5);
    for b in 0..10 {
        let sum: f32 = kernels.index_axis(Axis(0), b).sum();
        assert!((sum - 1.0).abs() < 1e-6, "band {b} kernel sums to {sum}");
    }
}

#[test]
fn test_kernel_peak_at_center() {
    let kernels = Sentinel2::generate_psf_kernel(&all_bands(), 5);
    for b in 0..10 {
        let k = kernels.index_axis(Axis(0), b);
        let center = k[[5, 5]];
        for v in k.iter() {
            assert!(*v <= center);
        }
    }
}

#[test]
fn test_wider_psf_for_20m_bands() {
    // 20 m bands spread more energy off-center than 10 m bands when both are
    // sampled on the 10 m kernel grid.
    let kernels = Sentinel2::generate_psf_kernel(&[Band::B2, Band::B5], 5);
    assert!(kernels[[0, 5, 5]] > kernels[[1, 5, 5]]);
    assert!(kernels[[0, 5, 0]] < kernels[[1, 5, 0]]);
}
