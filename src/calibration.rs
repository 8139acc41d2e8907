//! Extrinsic camera calibration loaded once at startup.
//!
//! The calibration file is JSON with a 3×3 rotation `R` and a translation
//! `t`. `t` is accepted either flat (`[x, y, z]`) or as a column
//! (`[[x], [y], [z]]`).

use crate::{Error, Result};
use log::info;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Rotation determinant below which `R` is treated as singular
const SINGULAR_DETERMINANT: f32 = 1e-6;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TranslationRecord {
    Flat([f32; 3]),
    Column([[f32; 1]; 3]),
}

impl TranslationRecord {
    fn into_array(self) -> [f32; 3] {
        match self {
            Self::Flat(t) => t,
            Self::Column([[x], [y], [z]]) => [x, y, z],
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExtrinsicsRecord {
    #[serde(rename = "R")]
    rotation: [[f32; 3]; 3],
    #[serde(rename = "t")]
    translation: TranslationRecord,
}

#[derive(Debug, Serialize)]
struct ExtrinsicsOut {
    #[serde(rename = "R")]
    rotation: [[f32; 3]; 3],
    #[serde(rename = "t")]
    translation: [f32; 3],
}

/// Camera extrinsics: rotation `R` and translation `t`
#[derive(Debug, Clone, PartialEq)]
pub struct Extrinsics {
    rotation: Matrix3<f32>,
    translation: Vector3<f32>,
    rotation_inv: Matrix3<f32>,
}

impl Extrinsics {
    /// Build extrinsics, failing if `rotation` is not invertible
    pub fn new(rotation: Matrix3<f32>, translation: Vector3<f32>) -> Result<Self> {
        let det = rotation.determinant();
        if !det.is_finite() || det.abs() < SINGULAR_DETERMINANT {
            return Err(Error::CalibrationError(format!(
                "Rotation matrix is singular (det = {det})"
            )));
        }
        let rotation_inv = rotation
            .try_inverse()
            .ok_or_else(|| Error::CalibrationError("Rotation matrix is not invertible".to_string()))?;

        Ok(Self {
            rotation,
            translation,
            rotation_inv,
        })
    }

    /// Identity rotation, zero translation
    #[must_use]
    pub fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
            rotation_inv: Matrix3::identity(),
        }
    }

    /// Parse extrinsics from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        let record: ExtrinsicsRecord = serde_json::from_str(content)
            .map_err(|e| Error::CalibrationError(format!("Failed to parse extrinsics: {e}")))?;

        let r = record.rotation;
        let rotation = Matrix3::new(
            r[0][0], r[0][1], r[0][2], //
            r[1][0], r[1][1], r[1][2], //
            r[2][0], r[2][1], r[2][2],
        );
        let translation = Vector3::from(record.translation.into_array());

        Self::new(rotation, translation)
    }

    /// Load extrinsics from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading extrinsics from: {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| {
            Error::CalibrationError(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    /// Serialize to JSON with a flat translation
    pub fn to_json(&self) -> Result<String> {
        let mut rotation = [[0.0f32; 3]; 3];
        for (i, row) in rotation.iter_mut().enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = self.rotation[(i, j)];
            }
        }
        let out = ExtrinsicsOut {
            rotation,
            translation: [self.translation.x, self.translation.y, self.translation.z],
        };
        serde_json::to_string_pretty(&out)
            .map_err(|e| Error::CalibrationError(format!("Failed to serialize extrinsics: {e}")))
    }

    /// Rotation matrix `R`
    #[must_use]
    pub fn rotation(&self) -> &Matrix3<f32> {
        &self.rotation
    }

    /// Translation vector `t`
    #[must_use]
    pub fn translation(&self) -> &Vector3<f32> {
        &self.translation
    }

    /// `R⁻¹ · (p − t)`: camera space to world space
    #[must_use]
    pub fn camera_to_world(&self, point: &Vector3<f32>) -> Vector3<f32> {
        self.rotation_inv * (point - self.translation)
    }

    /// `R · p + t`: world space back to camera space
    #[must_use]
    pub fn world_to_camera(&self, point: &Vector3<f32>) -> Vector3<f32> {
        self.rotation * point + self.translation
    }
}
