use std::time::Duration;

use thiserror::Error;

use crate::state_machine::Step;

#[derive(Debug, Error)]
pub enum PublisherError {
    #[error("Request not found: {0}")]
    RequestNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A step adapter gave up without producing an outcome.
///
/// Outcomes carry the failures collaborators report; a `StepError` is the
/// unexpected case and ends the request as a system error.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("step {step} needs metadata `{key}`")]
    MissingMetadata { step: Step, key: &'static str },

    #[error("step {step} got unusable metadata `{key}`: {value:?}")]
    InvalidMetadata {
        step: Step,
        key: &'static str,
        value: String,
    },

    #[error("step {step} does not apply to this request")]
    NotApplicable { step: Step },

    #[error("step {step} exceeded its deadline of {limit:?}")]
    TimedOut { step: Step, limit: Duration },

    #[error("step {step} panicked")]
    Panicked { step: Step },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_error_display() {
        let err = StepError::MissingMetadata {
            step: Step::TrInstall,
            key: "shortname",
        };
        assert_eq!(err.to_string(), "step tr-install needs metadata `shortname`");

        let err = StepError::TimedOut {
            step: Step::Specberus,
            limit: Duration::from_secs(300),
        };
        assert_eq!(err.to_string(), "step specberus exceeded its deadline of 300s");

        let err = StepError::TimedOut {
            step: Step::Specberus,
            limit: Duration::from_millis(50),
        };
        assert_eq!(err.to_string(), "step specberus exceeded its deadline of 50ms");

        let err = StepError::InvalidMetadata {
            step: Step::TrInstall,
            key: "shortname",
            value: "../x".into(),
        };
        assert_eq!(
            err.to_string(),
            "step tr-install got unusable metadata `shortname`: \"../x\""
        );
    }

    #[test]
    fn errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PublisherError>();
        assert_send_sync::<StepError>();
    }
}
