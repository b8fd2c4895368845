use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a single pipeline step.
///
/// A step moves `""` → `pending` → one of `ok`, `failure` or `error` and never
/// leaves a settled status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Not yet scheduled. Serialized as the empty string.
    #[default]
    #[serde(rename = "")]
    Unstarted,
    Pending,
    Ok,
    Failure,
    Error,
}

impl JobStatus {
    /// Whether the step has reached one of its three final statuses.
    pub fn is_settled(self) -> bool {
        matches!(self, JobStatus::Ok | JobStatus::Failure | JobStatus::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Unstarted => "",
            JobStatus::Pending => "pending",
            JobStatus::Ok => "ok",
            JobStatus::Failure => "failure",
            JobStatus::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One error reported by a step.
///
/// Collaborators report either a bare message or a structured rule
/// violation. Both shapes survive a JSON round trip unchanged: `Simple`
/// serializes as a string, `Structured` as an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobError {
    Simple(String),
    Structured {
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rule: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl JobError {
    pub fn simple(message: impl Into<String>) -> Self {
        JobError::Simple(message.into())
    }

    pub fn structured(
        key: impl Into<String>,
        rule: Option<String>,
        message: Option<String>,
    ) -> Self {
        JobError::Structured {
            key: key.into(),
            rule,
            message,
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobError::Simple(msg) => f.write_str(msg),
            JobError::Structured { key, rule, message } => {
                write!(f, "{key}")?;
                if let Some(rule) = rule {
                    write!(f, " [{rule}]")?;
                }
                if let Some(message) = message {
                    write!(f, ": {message}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for JobError {
    fn from(msg: &str) -> Self {
        JobError::Simple(msg.to_string())
    }
}

impl From<String> for JobError {
    fn from(msg: String) -> Self {
        JobError::Simple(msg)
    }
}

/// Immutable status and error record for one step.
///
/// Updates never touch the receiver; `with_status` and `with_errors` return
/// a fresh value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    #[serde(default)]
    status: JobStatus,
    #[serde(default)]
    errors: Vec<JobError>,
}

impl Job {
    pub fn new(status: JobStatus, errors: Vec<JobError>) -> Self {
        Self { status, errors }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn errors(&self) -> &[JobError] {
        &self.errors
    }

    #[must_use]
    pub fn with_status(&self, status: JobStatus) -> Self {
        Self {
            status,
            errors: self.errors.clone(),
        }
    }

    #[must_use]
    pub fn with_errors(&self, errors: Vec<JobError>) -> Self {
        Self {
            status: self.status,
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_defaults_to_unstarted_without_errors() {
        let job = Job::default();
        assert_eq!(job.status(), JobStatus::Unstarted);
        assert!(job.errors().is_empty());
    }

    #[test]
    fn with_status_leaves_receiver_untouched() {
        let job = Job::new(JobStatus::Unstarted, vec!["kept".into()]);
        let updated = job.with_status(JobStatus::Pending);

        assert_eq!(job.status(), JobStatus::Unstarted);
        assert_eq!(updated.status(), JobStatus::Pending);
        assert_eq!(updated.errors(), job.errors());
    }

    #[test]
    fn with_errors_replaces_the_whole_list() {
        let job = Job::new(JobStatus::Failure, vec!["old".into()]);
        let updated = job.with_errors(vec!["new".into()]);

        assert_eq!(job.errors(), &[JobError::simple("old")]);
        assert_eq!(updated.errors(), &[JobError::simple("new")]);
        assert_eq!(updated.status(), JobStatus::Failure);
    }

    #[test]
    fn status_serializes_as_reference_strings() {
        let json = serde_json::to_string(&[
            JobStatus::Unstarted,
            JobStatus::Pending,
            JobStatus::Ok,
            JobStatus::Failure,
            JobStatus::Error,
        ])
        .unwrap();
        assert_eq!(json, r#"["","pending","ok","failure","error"]"#);
    }

    #[test]
    fn unknown_status_is_rejected() {
        let result: Result<Job, _> = serde_json::from_str(r#"{"status":"done","errors":[]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn non_sequence_errors_are_rejected() {
        let result: Result<Job, _> = serde_json::from_str(r#"{"status":"ok","errors":"oops"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn job_errors_keep_both_shapes() {
        let value = serde_json::json!({
            "status": "failure",
            "errors": [
                "bad markup",
                {"key": "title", "rule": "docTitle", "message": "missing"},
                {"key": "sotd"}
            ]
        });
        let job: Job = serde_json::from_value(value.clone()).unwrap();

        assert_eq!(job.errors()[0], JobError::simple("bad markup"));
        assert_eq!(
            job.errors()[1],
            JobError::structured("title", Some("docTitle".into()), Some("missing".into()))
        );
        assert_eq!(job.errors()[2], JobError::structured("sotd", None, None));
        assert_eq!(serde_json::to_value(&job).unwrap(), value);
    }

    #[test]
    fn job_error_display() {
        assert_eq!(JobError::simple("boom").to_string(), "boom");
        let structured =
            JobError::structured("title", Some("docTitle".into()), Some("missing".into()));
        assert_eq!(structured.to_string(), "title [docTitle]: missing");
        assert_eq!(JobError::structured("sotd", None, None).to_string(), "sotd");
    }

    #[test]
    fn settled_statuses() {
        assert!(!JobStatus::Unstarted.is_settled());
        assert!(!JobStatus::Pending.is_settled());
        assert!(JobStatus::Ok.is_settled());
        assert!(JobStatus::Failure.is_settled());
        assert!(JobStatus::Error.is_settled());
    }
}
