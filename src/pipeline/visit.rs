use crate::models::{broadcast::Parameters, candidate::Candidate};

/// Parameters for the visit reminder: the mother's name and the number of
/// the visit she is being reminded of, one past her latest recorded visit.
pub fn build_parameters(candidate: &Candidate, latest_visit_number: i64) -> Parameters {
    let mut parameters = Parameters::default();
    parameters.push_body("full_name", candidate.full_name.clone());
    parameters.push_body("visit_number", (latest_visit_number + 1).to_string());
    parameters
}
