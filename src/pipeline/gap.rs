use anyhow::{Error, Result};
use tracing::warn;

use crate::{
    clients::qontak::QontakClient,
    models::{broadcast::Parameters, candidate::Candidate, outcome::ProviderOutcome},
    pipeline::{
        PipelineSettings,
        qr::{GAP_CARE_UPLOAD_FILENAME, GapCareValues, QrArtifact},
    },
};

/// Parameters for the gap message: the mother's name followed by the 20
/// visit fields, with a QR image header when the attachment sub-pipeline
/// succeeds.
///
/// A malformed gap projection fails the candidate before any dispatch. An
/// attachment failure does not: the message is sent text-only.
pub async fn build_parameters(
    candidate: &Candidate,
    gap_values: &str,
    qontak: &QontakClient,
    settings: &PipelineSettings,
) -> Result<Parameters, Error> {
    let values = GapCareValues::parse(gap_values)?;

    let mut parameters = Parameters::default();
    parameters.push_body("full_name", candidate.full_name.clone());
    for (key, value) in values.fields() {
        parameters.push_body(key, value);
    }

    if let Some((url, filename)) = attach_qr(candidate, &values, qontak, settings).await {
        parameters.set_image_header(url, filename);
    }

    Ok(parameters)
}

/// Renders the visit fields into a QR image, uploads it, and returns the
/// hosted url/filename pair. Every failure path degrades to `None`.
async fn attach_qr(
    candidate: &Candidate,
    values: &GapCareValues,
    qontak: &QontakClient,
    settings: &PipelineSettings,
) -> Option<(String, String)> {
    let payload = match values.to_qr_payload() {
        Ok(payload) => payload,
        Err(e) => {
            warn!(
                event_id = candidate.event_id,
                full_name = %candidate.full_name,
                error = %e,
                "QR payload serialization failed, sending gap message without attachment"
            );
            return None;
        }
    };

    let artifact = match QrArtifact::render(
        &settings.qr_code_directory,
        candidate.event_id,
        &payload,
        settings.qr_code_width,
        settings.qr_code_height,
    ) {
        Ok(artifact) => artifact,
        Err(e) => {
            warn!(
                event_id = candidate.event_id,
                full_name = %candidate.full_name,
                error = %e,
                "QR render failed, sending gap message without attachment"
            );
            return None;
        }
    };

    let bytes = match artifact.read_bytes() {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(
                event_id = candidate.event_id,
                full_name = %candidate.full_name,
                error = %e,
                "QR image unreadable, sending gap message without attachment"
            );
            return None;
        }
    };

    match qontak.upload_file(GAP_CARE_UPLOAD_FILENAME, bytes).await {
        ProviderOutcome::Success(Some(file)) => {
            Some((file.url, GAP_CARE_UPLOAD_FILENAME.to_string()))
        }
        ProviderOutcome::Success(None) => {
            warn!(
                event_id = candidate.event_id,
                full_name = %candidate.full_name,
                "QR upload returned no file reference, sending gap message without attachment"
            );
            None
        }
        ProviderOutcome::Rejected(error) => {
            warn!(
                event_id = candidate.event_id,
                full_name = %candidate.full_name,
                error = %error,
                "QR upload rejected, sending gap message without attachment"
            );
            None
        }
        ProviderOutcome::Unknown(reason) => {
            warn!(
                event_id = candidate.event_id,
                full_name = %candidate.full_name,
                reason,
                "QR upload failed, sending gap message without attachment"
            );
            None
        }
    }
}
