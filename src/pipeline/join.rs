use crate::{
    models::{broadcast::Parameters, candidate::Candidate},
    pipeline::PipelineSettings,
};

/// Parameters for the enrollment greeting: the mother's name and the
/// district health office it is sent on behalf of.
pub fn build_parameters(candidate: &Candidate, settings: &PipelineSettings) -> Parameters {
    let mut parameters = Parameters::default();
    parameters.push_body("full_name", candidate.full_name.clone());
    parameters.push_body("dho", settings.district_health_office_name.clone());
    parameters
}
