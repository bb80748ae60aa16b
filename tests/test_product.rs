use gdal::raster::{Buffer, GdalType};
use gdal::spatial_ref::SpatialRef;
use gdal::DriverManager;
use s2theia::types::{Band, BoundingBox, ReadParams, Res, Resampling, S2Error};
use s2theia::Sentinel2;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PRODUCT_NAME: &str = "SENTINEL2B_20230219-105857-687_L2A_T31TCJ_C_V3-1";

// Coarse rasters carrying the full 31TCJ georeferencing; the reader has to
// bring them onto the requested grid itself. R2-native sources get half the
// pixels, mirroring the 10 m / 20 m file layout of a real product.
const FIXTURE_SIZE: usize = 100;
const FIXTURE_TRANSFORM: [f64; 6] = [300_000.0, 1098.0, 0.0, 4_900_020.0, 0.0, -1098.0];
const FIXTURE_SIZE_R2: usize = 50;
const FIXTURE_TRANSFORM_R2: [f64; 6] = [300_000.0, 2196.0, 0.0, 4_900_020.0, 0.0, -2196.0];

fn constant_grid_xml(value: f64) -> String {
    let row = vec![format!("{value}"); 23].join(" ");
    let values: String = (0..23).map(|_| format!("<VALUES>{row}</VALUES>")).collect();
    format!(
        "<COL_STEP unit=\"m\">5000</COL_STEP><ROW_STEP unit=\"m\">5000</ROW_STEP>\
         <Values_List>{values}</Values_List>"
    )
}

fn write_descriptor(product_dir: &Path) {
    let solar_zen = constant_grid_xml(32.5);
    let solar_az = constant_grid_xml(154.1);
    let det1_zen = constant_grid_xml(5.2);
    let det1_az = constant_grid_xml(105.0);
    let det2_zen = constant_grid_xml(7.4);
    let det2_az = constant_grid_xml(107.0);
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Muscate_Metadata_Document>
  <Product_Characteristics>
    <PLATFORM>SENTINEL2B</PLATFORM>
    <ORBIT_NUMBER type="Orbit">51</ORBIT_NUMBER>
  </Product_Characteristics>
  <Quality_Informations>
    <QUALITY_INDEX name="CloudPercent">11</QUALITY_INDEX>
    <QUALITY_INDEX name="SnowPercent">0</QUALITY_INDEX>
  </Quality_Informations>
  <Geometric_Informations>
    <Sun_Angles_Grids>
      <Zenith>{solar_zen}</Zenith>
      <Azimuth>{solar_az}</Azimuth>
    </Sun_Angles_Grids>
    <Viewing_Incidence_Angles_Grids_List>
      <Band_Viewing_Incidence_Angles band_id="B2">
        <Detector detector_id="1">
          <Zenith>{det1_zen}</Zenith>
          <Azimuth>{det1_az}</Azimuth>
        </Detector>
        <Detector detector_id="2">
          <Zenith>{det2_zen}</Zenith>
          <Azimuth>{det2_az}</Azimuth>
        </Detector>
      </Band_Viewing_Incidence_Angles>
    </Viewing_Incidence_Angles_Grids_List>
  </Geometric_Informations>
</Muscate_Metadata_Document>"#
    );
    std::fs::write(product_dir.join(format!("{PRODUCT_NAME}_MTD_ALL.xml")), xml).unwrap();
}

fn write_raster<T: GdalType + Copy>(
    path: &Path,
    size: usize,
    transform: &[f64; 6],
    layers: &[Vec<T>],
    no_data: Option<f64>,
) {
    let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
    let mut dataset = driver
        .create_with_band_type::<T, _>(path, size as isize, size as isize, layers.len() as isize)
        .unwrap();
    dataset.set_geo_transform(transform).unwrap();
    dataset
        .set_spatial_ref(&SpatialRef::from_epsg(32631).unwrap())
        .unwrap();
    for (i, data) in layers.iter().enumerate() {
        let mut band = dataset.rasterband(i as isize + 1).unwrap();
        let buffer = Buffer::new((size, size), data.clone());
        band.write((0, 0), (size, size), &buffer).unwrap();
        if let Some(nd) = no_data {
            band.set_no_data_value(Some(nd)).unwrap();
        }
    }
}

fn make_product() -> (TempDir, PathBuf) {
    let _ = env_logger::builder().is_test(true).try_init();
    let tmp = TempDir::new().unwrap();
    let product_dir = tmp.path().join(PRODUCT_NAME);
    std::fs::create_dir(&product_dir).unwrap();
    std::fs::create_dir(product_dir.join("MASKS")).unwrap();
    write_descriptor(&product_dir);

    let n = FIXTURE_SIZE * FIXTURE_SIZE;
    let dn = vec![5000i16; n];
    for band in ["B2", "B3"] {
        write_raster(
            &product_dir.join(format!("{PRODUCT_NAME}_FRE_{band}.tif")),
            FIXTURE_SIZE,
            &FIXTURE_TRANSFORM,
            &[dn.clone()],
            Some(-10000.0),
        );
    }
    // B4 is entirely no-data.
    write_raster(
        &product_dir.join(format!("{PRODUCT_NAME}_FRE_B4.tif")),
        FIXTURE_SIZE,
        &FIXTURE_TRANSFORM,
        &[vec![-10000i16; n]],
        Some(-10000.0),
    );
    for (mask, value) in [("CLM", 1u8), ("SAT", 2u8), ("EDG", 0u8)] {
        write_raster(
            &product_dir.join(format!("MASKS/{PRODUCT_NAME}_{mask}_R1.tif")),
            FIXTURE_SIZE,
            &FIXTURE_TRANSFORM,
            &[vec![value; n]],
            None,
        );
    }
    // WCV in 1/20 g/cm2, AOT in 1/200 units.
    write_raster(
        &product_dir.join(format!("{PRODUCT_NAME}_ATB_R1.tif")),
        FIXTURE_SIZE,
        &FIXTURE_TRANSFORM,
        &[vec![600i16; n], vec![400i16; n]],
        Some(-10000.0),
    );

    // 20 m-native sources on their own coarser grid.
    let n2 = FIXTURE_SIZE_R2 * FIXTURE_SIZE_R2;
    write_raster(
        &product_dir.join(format!("{PRODUCT_NAME}_FRE_B5.tif")),
        FIXTURE_SIZE_R2,
        &FIXTURE_TRANSFORM_R2,
        &[vec![5000i16; n2]],
        Some(-10000.0),
    );
    for (mask, value) in [("CLM", 4u8), ("SAT", 8u8), ("EDG", 1u8)] {
        write_raster(
            &product_dir.join(format!("MASKS/{PRODUCT_NAME}_{mask}_R2.tif")),
            FIXTURE_SIZE_R2,
            &FIXTURE_TRANSFORM_R2,
            &[vec![value; n2]],
            None,
        );
    }
    write_raster(
        &product_dir.join(format!("{PRODUCT_NAME}_ATB_R2.tif")),
        FIXTURE_SIZE_R2,
        &FIXTURE_TRANSFORM_R2,
        &[vec![900i16; n2], vec![600i16; n2]],
        Some(-10000.0),
    );
    (tmp, product_dir)
}

fn window_params(bands: &[Band]) -> ReadParams {
    ReadParams {
        bands: bands.to_vec(),
        bounds: Some(BoundingBox::new(350_000.0, 4_850_000.0, 352_000.0, 4_851_000.0)),
        algorithm: Resampling::Nearest,
        ..ReadParams::default()
    }
}

#[test]
fn test_product_fields() {
    let (_tmp, dir) = make_product();
    let product = Sentinel2::new(&dir).unwrap();
    assert_eq!(product.product_name(), PRODUCT_NAME);
    assert_eq!(product.tile, "31TCJ");
    assert_eq!(product.satellite.code(), "SENTINEL2B");
    assert_eq!(product.year(), 2023);
    assert_eq!(product.day_of_year(), 50);
    assert_eq!(product.cloud_cover, 11);
    assert_eq!(product.relative_orbit_number, 51);
    assert_eq!(product.crs, "epsg:32631");
    assert_eq!(
        product.bounds,
        BoundingBox::new(300_000.0, 4_790_220.0, 409_800.0, 4_900_020.0)
    );
}

#[test]
fn test_read_window_values() {
    let (_tmp, dir) = make_product();
    let product = Sentinel2::new(&dir).unwrap();
    let mut params = window_params(&[Band::B2, Band::B3]);
    params.read_atmos = true;

    let composite = product.read_as_numpy::<f32>(&params).unwrap();
    assert_eq!(composite.bands.dim(), (2, 100, 200));
    assert_eq!(composite.masks.dim(), (3, 100, 200));
    assert_eq!(composite.crs, "epsg:32631");

    for v in composite.bands.iter() {
        assert!((v - 0.5).abs() < 1e-6, "reflectance {v}");
    }
    for (i, expected) in [1u8, 2, 0].iter().enumerate() {
        assert!(composite
            .masks
            .index_axis(ndarray::Axis(0), i)
            .iter()
            .all(|m| m == expected));
    }

    let atmos = composite.atmos.unwrap();
    assert_eq!(atmos.dim(), (2, 100, 200));
    for v in atmos.index_axis(ndarray::Axis(0), 0).iter() {
        assert!((v - 30.0).abs() < 1e-4, "water vapour {v}");
    }
    for v in atmos.index_axis(ndarray::Axis(0), 1).iter() {
        assert!((v - 2.0).abs() < 1e-4, "aerosol {v}");
    }

    // Pixel centers of the requested grid, x ascending and y descending.
    assert!((composite.xcoords[0] - 350_005.0).abs() < 1e-6);
    assert!((composite.xcoords[199] - 351_995.0).abs() < 1e-6);
    assert!((composite.ycoords[0] - 4_850_995.0).abs() < 1e-6);
    assert!((composite.ycoords[99] - 4_850_005.0).abs() < 1e-6);
}

#[test]
fn test_no_data_becomes_nan() {
    let (_tmp, dir) = make_product();
    let product = Sentinel2::new(&dir).unwrap();
    let composite = product
        .read_as_numpy::<f32>(&window_params(&[Band::B4]))
        .unwrap();
    assert!(composite.bands.iter().all(|v| v.is_nan()));
}

#[test]
fn test_mixed_native_resolutions_on_one_grid() {
    let (_tmp, dir) = make_product();
    let product = Sentinel2::new(&dir).unwrap();

    // B2 is stored at 10 m, B5 at 20 m; both land on the same 10 m grid.
    let composite = product
        .read_as_numpy::<f32>(&window_params(&[Band::B2, Band::B5]))
        .unwrap();
    assert_eq!(composite.bands.dim(), (2, 100, 200));
    for v in composite.bands.iter() {
        assert!((v - 0.5).abs() < 1e-6, "reflectance {v}");
    }
}

#[test]
fn test_r2_sources_on_10m_grid() {
    let (_tmp, dir) = make_product();
    let product = Sentinel2::new(&dir).unwrap();
    let mut params = window_params(&[Band::B5]);
    params.res = Res::R2;
    params.read_atmos = true;

    // Masks and atmospheric layers come from the R2 files but are still
    // delivered on the requested 10 m grid.
    let composite = product.read_as_numpy::<f32>(&params).unwrap();
    assert_eq!(composite.bands.dim(), (1, 100, 200));
    assert_eq!(composite.masks.dim(), (3, 100, 200));
    for (i, expected) in [4u8, 8, 1].iter().enumerate() {
        assert!(composite
            .masks
            .index_axis(ndarray::Axis(0), i)
            .iter()
            .all(|m| m == expected));
    }

    let atmos = composite.atmos.unwrap();
    assert_eq!(atmos.dim(), (2, 100, 200));
    for v in atmos.index_axis(ndarray::Axis(0), 0).iter() {
        assert!((v - 45.0).abs() < 1e-4, "water vapour {v}");
    }
    for v in atmos.index_axis(ndarray::Axis(0), 1).iter() {
        assert!((v - 3.0).abs() < 1e-4, "aerosol {v}");
    }
}

#[test]
fn test_reprojected_read() {
    let (_tmp, dir) = make_product();
    let product = Sentinel2::new(&dir).unwrap();

    // A Lambert-93 box well inside the tile, around lon 1.22 / lat 43.47.
    let mut params = window_params(&[Band::B2]);
    params.crs = Some("epsg:2154".to_string());
    params.bounds = Some(BoundingBox::new(555_000.0, 6_265_000.0, 557_000.0, 6_266_000.0));

    let composite = product.read_as_numpy::<f32>(&params).unwrap();
    assert_eq!(composite.crs, "epsg:2154");
    assert_eq!(composite.bands.dim(), (1, 100, 200));
    assert_eq!(composite.masks.dim(), (3, 100, 200));
    for v in composite.bands.iter() {
        assert!((v - 0.5).abs() < 1e-6, "reflectance {v}");
    }
    for (i, expected) in [1u8, 2, 0].iter().enumerate() {
        assert!(composite
            .masks
            .index_axis(ndarray::Axis(0), i)
            .iter()
            .all(|m| m == expected));
    }
    assert!((composite.xcoords[0] - 555_005.0).abs() < 1e-6);
    assert!((composite.ycoords[0] - 6_265_995.0).abs() < 1e-6);
}

#[test]
fn test_read_as_xarray_variables() {
    let (_tmp, dir) = make_product();
    let product = Sentinel2::new(&dir).unwrap();
    let mut params = window_params(&[Band::B2, Band::B3]);
    params.read_atmos = true;

    let ds = product.read_as_xarray::<f32>(&params).unwrap();
    let keys: Vec<&str> = ds.variables.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["AOT", "B2", "B3", "WCV"]);
    assert_eq!(ds.variables["B2"].dim(), (1, 100, 200));
    assert_eq!(ds.t.len(), 1);
    assert_eq!(ds.t[0].format("%Y-%m-%d %H:%M:%S").to_string(), "2023-02-19 10:58:57");
    assert_eq!(ds.attrs["tile"], "31TCJ");
    assert_eq!(ds.attrs["type"], "FRE");
    assert_eq!(ds.attrs["crs"], "epsg:32631");
}

#[test]
fn test_solar_angles_windowed() {
    let (_tmp, dir) = make_product();
    let product = Sentinel2::new(&dir).unwrap();
    let bounds = BoundingBox::new(300_000.0, 4_899_020.0, 301_000.0, 4_900_020.0);

    let (zenith, azimuth) = product
        .read_solar_angles_as_numpy(Res::R1, Some(&bounds))
        .unwrap();
    assert_eq!(zenith.dim(), (100, 100));
    assert!(zenith.iter().all(|v| (v - 32.5).abs() < 1e-4));
    assert!(azimuth.iter().all(|v| (v - 154.1).abs() < 1e-4));

    let (zenith20, _) = product
        .read_solar_angles_as_numpy(Res::R2, Some(&bounds))
        .unwrap();
    assert_eq!(zenith20.dim(), (50, 50));
}

#[test]
fn test_incidence_angles_by_parity() {
    let (_tmp, dir) = make_product();
    let product = Sentinel2::new(&dir).unwrap();
    let bounds = BoundingBox::new(300_000.0, 4_899_020.0, 301_000.0, 4_900_020.0);

    let (even_zen, odd_zen, even_az, odd_az) = product
        .read_incidence_angles_as_numpy(Band::B2, Res::R1, Some(&bounds))
        .unwrap();
    assert_eq!(even_zen.dim(), (100, 100));
    // Detector 2 feeds the even mosaic, detector 1 the odd one.
    assert!(even_zen.iter().all(|v| (v - 7.4).abs() < 1e-4));
    assert!(odd_zen.iter().all(|v| (v - 5.2).abs() < 1e-4));
    assert!(even_az.iter().all(|v| (v - 107.0).abs() < 1e-4));
    assert!(odd_az.iter().all(|v| (v - 105.0).abs() < 1e-4));

    assert!(matches!(
        product.read_incidence_angles_as_numpy(Band::B11, Res::R1, None),
        Err(S2Error::MalformedProduct(_))
    ));
}

#[test]
fn test_out_of_bounds_requests() {
    let (_tmp, dir) = make_product();
    let product = Sentinel2::new(&dir).unwrap();

    let outside = BoundingBox::new(0.0, 0.0, 1000.0, 1000.0);
    let mut params = ReadParams::default();
    params.bounds = Some(outside);
    assert!(matches!(
        product.read_as_numpy::<f32>(&params),
        Err(S2Error::OutOfBounds(_))
    ));

    let west_of_tile = BoundingBox::new(290_000.0, 4_850_000.0, 301_000.0, 4_851_000.0);
    assert!(matches!(
        product.read_solar_angles_as_numpy(Res::R1, Some(&west_of_tile)),
        Err(S2Error::OutOfBounds(_))
    ));
}

#[test]
fn test_bad_product_directories() {
    let tmp = TempDir::new().unwrap();
    let bogus = tmp.path().join("not_a_product");
    std::fs::create_dir(&bogus).unwrap();
    assert!(matches!(
        Sentinel2::new(&bogus),
        Err(S2Error::MalformedProduct(_))
    ));

    // Well-formed name, missing descriptor.
    let orphan = tmp.path().join(PRODUCT_NAME);
    std::fs::create_dir(&orphan).unwrap();
    assert!(matches!(
        Sentinel2::new(&orphan),
        Err(S2Error::MalformedProduct(_))
    ));

    // Well-formed name, descriptor that does not parse.
    let name = "SENTINEL2A_20230301-104907-120_L2A_T31TCJ_C_V3-1";
    let broken = tmp.path().join(name);
    std::fs::create_dir(&broken).unwrap();
    std::fs::write(
        broken.join(format!("{name}_MTD_ALL.xml")),
        "<Muscate_Metadata_Document><Product_Chara",
    )
    .unwrap();
    assert!(matches!(
        Sentinel2::new(&broken),
        Err(S2Error::MalformedProduct(_))
    ));
}
