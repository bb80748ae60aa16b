//! MUSCATE metadata descriptor (`*_MTD_ALL.xml`) parsing.
//!
//! Only the fields the driver consumes are modeled: product characteristics
//! (platform, orbit number), quality indices (cloud percent) and the
//! geometric angle grids (solar, and viewing incidence per band and
//! detector).

use crate::core::angles::{AngleGrid, AngleGridPair, DetectorAngleGrids};
use crate::types::{Band, S2Error, S2Result};
use ndarray::Array2;
use quick_xml::de::from_str;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct MuscateMetadata {
    #[serde(rename = "Product_Characteristics")]
    pub product_characteristics: ProductCharacteristics,
    #[serde(rename = "Quality_Informations", default)]
    pub quality_informations: Option<QualityInformations>,
    #[serde(rename = "Geometric_Informations")]
    pub geometric_informations: GeometricInformations,
}

#[derive(Debug, Deserialize)]
pub struct ProductCharacteristics {
    #[serde(rename = "PLATFORM")]
    pub platform: String,
    #[serde(rename = "ORBIT_NUMBER")]
    pub orbit_number: OrbitNumber,
}

#[derive(Debug, Deserialize)]
pub struct OrbitNumber {
    #[serde(rename = "@type", default)]
    pub kind: Option<String>,
    #[serde(rename = "$text")]
    pub value: u16,
}

#[derive(Debug, Deserialize)]
pub struct QualityInformations {
    #[serde(rename = "QUALITY_INDEX", default)]
    pub indices: Vec<QualityIndex>,
}

#[derive(Debug, Deserialize)]
pub struct QualityIndex {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "$text")]
    pub value: f64,
}

#[derive(Debug, Deserialize)]
pub struct GeometricInformations {
    #[serde(rename = "Sun_Angles_Grids")]
    pub sun_angles: AngleGridsXml,
    #[serde(rename = "Viewing_Incidence_Angles_Grids_List")]
    pub viewing_angles: ViewingGridsList,
}

#[derive(Debug, Deserialize)]
pub struct AngleGridsXml {
    #[serde(rename = "Zenith")]
    pub zenith: GridXml,
    #[serde(rename = "Azimuth")]
    pub azimuth: GridXml,
}

#[derive(Debug, Deserialize)]
pub struct GridXml {
    #[serde(rename = "COL_STEP")]
    pub col_step: StepXml,
    #[serde(rename = "ROW_STEP")]
    pub row_step: StepXml,
    #[serde(rename = "Values_List")]
    pub values_list: ValuesList,
}

#[derive(Debug, Deserialize)]
pub struct StepXml {
    #[serde(rename = "@unit", default)]
    pub unit: Option<String>,
    #[serde(rename = "$text")]
    pub value: f64,
}

#[derive(Debug, Deserialize)]
pub struct ValuesList {
    #[serde(rename = "VALUES", default)]
    pub rows: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ViewingGridsList {
    #[serde(rename = "Band_Viewing_Incidence_Angles", default)]
    pub bands: Vec<BandViewingXml>,
}

#[derive(Debug, Deserialize)]
pub struct BandViewingXml {
    #[serde(rename = "@band_id")]
    pub band_id: String,
    #[serde(rename = "Detector", default)]
    pub detectors: Vec<DetectorXml>,
}

#[derive(Debug, Deserialize)]
pub struct DetectorXml {
    #[serde(rename = "@detector_id")]
    pub detector_id: u8,
    #[serde(rename = "Zenith")]
    pub zenith: GridXml,
    #[serde(rename = "Azimuth")]
    pub azimuth: GridXml,
}

/// Parse a MUSCATE metadata descriptor.
pub fn parse_metadata(xml: &str) -> S2Result<MuscateMetadata> {
    from_str::<MuscateMetadata>(xml)
        .map_err(|e| S2Error::MalformedProduct(format!("failed to parse metadata descriptor: {e}")))
}

fn grid_from_xml(grid: &GridXml) -> S2Result<AngleGrid> {
    let mut rows: Vec<Vec<f32>> = Vec::with_capacity(grid.values_list.rows.len());
    for row in &grid.values_list.rows {
        let values: Vec<f32> = row
            .split_whitespace()
            .map(|v| {
                // The float parser accepts the "NaN" tokens marking cells
                // outside the detector footprint.
                v.parse::<f32>()
                    .map_err(|_| S2Error::MalformedProduct(format!("bad angle value: {v}")))
            })
            .collect::<S2Result<_>>()?;
        rows.push(values);
    }
    let height = rows.len();
    let width = rows.first().map_or(0, Vec::len);
    if height < 2 || width < 2 || rows.iter().any(|r| r.len() != width) {
        return Err(S2Error::MalformedProduct(format!(
            "inconsistent angle grid shape {height}x{width}"
        )));
    }
    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    let values = Array2::from_shape_vec((height, width), flat)
        .map_err(|e| S2Error::MalformedProduct(e.to_string()))?;
    Ok(AngleGrid {
        values,
        col_step: grid.col_step.value,
        row_step: grid.row_step.value,
    })
}

impl MuscateMetadata {
    /// Cloud cover percentage, when the descriptor carries it.
    pub fn cloud_percent(&self) -> Option<f64> {
        self.quality_informations
            .as_ref()?
            .indices
            .iter()
            .find(|q| q.name == "CloudPercent")
            .map(|q| q.value)
    }

    /// Solar angle control grids.
    pub fn solar_grids(&self) -> S2Result<AngleGridPair> {
        Ok(AngleGridPair {
            zenith: grid_from_xml(&self.geometric_informations.sun_angles.zenith)?,
            azimuth: grid_from_xml(&self.geometric_informations.sun_angles.azimuth)?,
        })
    }

    /// Viewing incidence control grids of one band, one entry per detector.
    pub fn incidence_grids(&self, band: Band) -> S2Result<Vec<DetectorAngleGrids>> {
        let entry = self
            .geometric_informations
            .viewing_angles
            .bands
            .iter()
            .find(|b| b.band_id == band.code())
            .ok_or_else(|| {
                S2Error::MalformedProduct(format!(
                    "no viewing incidence angle grids for band {band}"
                ))
            })?;
        entry
            .detectors
            .iter()
            .map(|d| {
                Ok(DetectorAngleGrids {
                    detector_id: d.detector_id,
                    grids: AngleGridPair {
                        zenith: grid_from_xml(&d.zenith)?,
                        azimuth: grid_from_xml(&d.azimuth)?,
                    },
                })
            })
            .collect()
    }
}
