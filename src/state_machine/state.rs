use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::history::History;
use super::job::{Job, JobError, JobStatus};
use super::step::Step;

/// Metadata extracted by validation and read by later steps.
pub type Metadata = serde_json::Map<String, Value>;

/// Overall status of a publication request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// In progress, or not started yet. Serialized as the empty string.
    #[default]
    #[serde(rename = "")]
    Unstarted,
    Success,
    Failure,
    Error,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Unstarted)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Unstarted => write!(f, ""),
            RequestStatus::Success => write!(f, "success"),
            RequestStatus::Failure => write!(f, "failure"),
            RequestStatus::Error => write!(f, "error"),
        }
    }
}

/// Immutable snapshot of one request's progress.
///
/// This is the value the driving loop hands from tick to tick and the shape
/// pollers and the state store see:
/// `{status, jobs: {step: {status, errors}}, history: [{time, fact}], metadata}`.
/// Every updater borrows the receiver and returns a new snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestState {
    #[serde(default)]
    status: RequestStatus,
    #[serde(default)]
    jobs: BTreeMap<Step, Job>,
    #[serde(default)]
    history: History,
    #[serde(default)]
    metadata: Metadata,
}

/// True once the request reached `success`, `failure` or `error`.
pub fn is_terminal(state: &RequestState) -> bool {
    state.status.is_terminal()
}

impl RequestState {
    /// Fresh state with one unstarted job per step.
    pub fn new(steps: &[Step]) -> Self {
        Self {
            jobs: steps.iter().map(|step| (*step, Job::default())).collect(),
            ..Self::default()
        }
    }

    pub fn from_parts(
        status: RequestStatus,
        jobs: BTreeMap<Step, Job>,
        history: History,
        metadata: Metadata,
    ) -> Self {
        Self {
            status,
            jobs,
            history,
            metadata,
        }
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn jobs(&self) -> &BTreeMap<Step, Job> {
        &self.jobs
    }

    pub fn job(&self, step: Step) -> Option<&Job> {
        self.jobs.get(&step)
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Configured steps in execution order.
    pub fn steps(&self) -> impl Iterator<Item = Step> + '_ {
        self.jobs.keys().copied()
    }

    pub fn is_terminal(&self) -> bool {
        is_terminal(self)
    }

    /// The first step that has not settled `ok`, with its job.
    pub fn current_step(&self) -> Option<(Step, &Job)> {
        self.jobs
            .iter()
            .find(|(_, job)| job.status() != JobStatus::Ok)
            .map(|(step, job)| (*step, job))
    }

    /// The step that runs last for this request.
    pub fn last_step(&self) -> Option<Step> {
        self.jobs.keys().next_back().copied()
    }

    #[must_use]
    pub fn with_status(&self, status: RequestStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_jobs(&self, jobs: BTreeMap<Step, Job>) -> Self {
        Self {
            jobs,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_history(&self, history: History) -> Self {
        Self {
            history,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_metadata(&self, metadata: Metadata) -> Self {
        Self {
            metadata,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn add_to_history(&self, fact: impl Into<String>) -> Self {
        self.with_history(self.history.add(fact))
    }

    #[must_use]
    pub fn add_to_metadata(&self, key: impl Into<String>, value: Value) -> Self {
        let mut metadata = self.metadata.clone();
        metadata.insert(key.into(), value);
        self.with_metadata(metadata)
    }

    /// Merge every entry of `extra` over the current metadata.
    #[must_use]
    pub fn merge_metadata(&self, extra: Metadata) -> Self {
        let mut metadata = self.metadata.clone();
        metadata.extend(extra);
        self.with_metadata(metadata)
    }

    /// Reports whether `step` is configured and still has an empty status.
    ///
    /// The name reads inverted: a configured step that has NOT been
    /// scheduled yet answers `true`, and so does nothing else. Callers rely
    /// on this exact truth table; unconfigured steps answer `false`.
    pub fn has_job_started(&self, step: Step) -> bool {
        match self.jobs.get(&step) {
            Some(job) => job.status() == JobStatus::Unstarted,
            None => false,
        }
    }

    /// Replace the status of `step`. Unconfigured steps leave the state as is.
    #[must_use]
    pub fn set_job_status(&self, step: Step, status: JobStatus) -> Self {
        self.replace_job(step, |job| job.with_status(status))
    }

    /// Replace the errors of `step`. Unconfigured steps leave the state as is.
    #[must_use]
    pub fn set_job_errors(&self, step: Step, errors: Vec<JobError>) -> Self {
        self.replace_job(step, |job| job.with_errors(errors))
    }

    fn replace_job(&self, step: Step, update: impl FnOnce(&Job) -> Job) -> Self {
        let Some(job) = self.jobs.get(&step) else {
            return self.clone();
        };
        let mut jobs = self.jobs.clone();
        jobs.insert(step, update(job));
        self.with_jobs(jobs)
    }
}
