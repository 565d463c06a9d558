use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Error, Result, anyhow};
use qrcode::QrCode;
use tracing::warn;
use uuid::Uuid;

/// Filename the provider displays to recipients of the gap message.
pub const GAP_CARE_UPLOAD_FILENAME: &str = "gap-care.png";

/// Ordered field names the gap template substitutes, matching the
/// comma-joined registry projection position by position.
pub const GAP_FIELD_KEYS: [&str; 20] = [
    "anc_date",
    "gestational_age",
    "height_in_cm",
    "weight_in_kg",
    "muac_in_cm",
    "systolic_bp",
    "diastolic_bp",
    "uterine_f_height",
    "fetal_presentati",
    "fetal_heart_rate",
    "tetanus_t_imm_st",
    "given_tt_injecti",
    "given_ifa_tablet",
    "has_proteinuria",
    "hb_level_result",
    "glucose_140_mgdl",
    "has_thalasemia",
    "has_syphilis",
    "has_hbsag",
    "has_hiv",
];

/// The parsed gap projection for one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct GapCareValues {
    values: Vec<String>,
}

impl GapCareValues {
    /// Splits the raw comma-joined projection into the fixed field set.
    /// Surplus trailing fields are dropped; fewer than 20 is a malformed row.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let mut values: Vec<String> = raw.split(',').map(|v| v.trim().to_string()).collect();

        if values.len() < GAP_FIELD_KEYS.len() {
            return Err(anyhow!(
                "Malformed gap projection: expected {} fields, got {}",
                GAP_FIELD_KEYS.len(),
                values.len()
            ));
        }
        values.truncate(GAP_FIELD_KEYS.len());

        Ok(Self { values })
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &str)> {
        GAP_FIELD_KEYS
            .iter()
            .copied()
            .zip(self.values.iter().map(String::as_str))
    }

    /// The string encoded into the QR image: the ordered field values as a
    /// JSON array.
    pub fn to_qr_payload(&self) -> Result<String, Error> {
        serde_json::to_string(&self.values)
            .map_err(|e| anyhow!("Failed to serialize QR payload: {}", e))
    }
}

/// One rendered QR image on disk. The path is unique to its candidate, so
/// parallel gap dispatches never overwrite each other's image, and the file
/// is removed when the artifact drops.
pub struct QrArtifact {
    path: PathBuf,
}

impl QrArtifact {
    pub fn render(
        directory: &Path,
        event_id: i64,
        payload: &str,
        width: u32,
        height: u32,
    ) -> Result<Self, Error> {
        fs::create_dir_all(directory).map_err(|e| {
            anyhow!(
                "Failed to create QR directory {}: {}",
                directory.display(),
                e
            )
        })?;

        let path = directory.join(format!("gap-care-{}-{}.png", event_id, Uuid::new_v4()));

        let code = QrCode::new(payload.as_bytes())
            .map_err(|e| anyhow!("Failed to encode QR payload: {}", e))?;

        let image = code
            .render::<image::Luma<u8>>()
            .min_dimensions(width, height)
            .build();

        image
            .save(&path)
            .map_err(|e| anyhow!("Failed to write QR image {}: {}", path.display(), e))?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_bytes(&self) -> Result<Vec<u8>, Error> {
        fs::read(&self.path)
            .map_err(|e| anyhow!("Failed to read QR image {}: {}", self.path.display(), e))
    }
}

impl Drop for QrArtifact {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove QR image");
        }
    }
}
