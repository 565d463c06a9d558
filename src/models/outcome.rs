use std::fmt::{Display, Formatter, Result};

use serde::{Deserialize, Serialize};

use crate::models::broadcast::ProviderError;

/// Classification of one candidate's dispatch attempt.
///
/// `Rejected` is a structured provider-side refusal (including 401/422
/// bodies); `Unknown` covers transport failures, timeouts and empty or
/// unparseable responses. Both count as failures, but are logged apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DispatchOutcome {
    Delivered,
    Rejected(ProviderError),
    Unknown(String),
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered)
    }
}

impl Display for DispatchOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            DispatchOutcome::Delivered => write!(f, "delivered"),
            DispatchOutcome::Rejected(error) => write!(f, "rejected ({})", error),
            DispatchOutcome::Unknown(reason) => write!(f, "unknown ({})", reason),
        }
    }
}

/// Raw result of one provider call, before domain mapping. `Success` carries
/// the response payload when the provider returned one.
#[derive(Debug, Clone)]
pub enum ProviderOutcome<T> {
    Success(Option<T>),
    Rejected(ProviderError),
    Unknown(String),
}

impl<T> From<ProviderOutcome<T>> for DispatchOutcome {
    fn from(outcome: ProviderOutcome<T>) -> Self {
        match outcome {
            ProviderOutcome::Success(_) => DispatchOutcome::Delivered,
            ProviderOutcome::Rejected(error) => DispatchOutcome::Rejected(error),
            ProviderOutcome::Unknown(reason) => DispatchOutcome::Unknown(reason),
        }
    }
}
