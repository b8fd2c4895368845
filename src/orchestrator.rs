use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::StepError;
use crate::request::{PublicationRequest, RequestKind};
use crate::services::{
    CollaboratorError, Collaborators, DOCUMENT_NAME, DocumentSource, PublishResponse,
};
use crate::state_machine::{
    JobError, JobStatus, Metadata, RequestState, RequestStatus, Step, is_terminal,
};

/// History fact recorded when a step rejects instead of settling.
pub const SYSTEM_ERROR_FACT: &str = "a system error occurred";

/// Settled result of one step, as reported by its adapter.
///
/// `errors` is non-empty exactly when the status is not `ok`; the
/// constructors keep it that way.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    step: Step,
    status: JobStatus,
    errors: Vec<JobError>,
    history: Option<String>,
    metadata: Option<Metadata>,
}

impl StepOutcome {
    pub fn ok(step: Step) -> Self {
        Self::settled(step, JobStatus::Ok, Vec::new())
    }

    pub fn failure(step: Step, errors: Vec<JobError>) -> Self {
        Self::settled(step, JobStatus::Failure, non_empty(errors, step))
    }

    pub fn error(step: Step, errors: Vec<JobError>) -> Self {
        Self::settled(step, JobStatus::Error, non_empty(errors, step))
    }

    fn settled(step: Step, status: JobStatus, errors: Vec<JobError>) -> Self {
        Self {
            step,
            status,
            errors,
            history: None,
            metadata: None,
        }
    }

    #[must_use]
    pub fn with_history(mut self, fact: impl Into<String>) -> Self {
        self.history = Some(fact.into());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn errors(&self) -> &[JobError] {
        &self.errors
    }
}

fn non_empty(errors: Vec<JobError>, step: Step) -> Vec<JobError> {
    if errors.is_empty() {
        vec![JobError::simple(format!("{step} did not succeed"))]
    } else {
        errors
    }
}

/// Fold a step's result into a new state.
///
/// A settled outcome writes the job status, appends its errors, records its
/// history fact and merges its metadata. `failure` and `error` end the
/// request; `ok` on the last step makes it a success. A `StepError` ends the
/// request as a generic system error.
pub fn run_step(state: &RequestState, result: Result<StepOutcome, StepError>) -> RequestState {
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(error = %err, "step rejected without an outcome");
            return state
                .with_status(RequestStatus::Error)
                .add_to_history(SYSTEM_ERROR_FACT);
        }
    };

    let step = outcome.step;
    let mut next = state.set_job_status(step, outcome.status);
    if !outcome.errors.is_empty() {
        let mut errors = next
            .job(step)
            .map(|job| job.errors().to_vec())
            .unwrap_or_default();
        errors.extend(outcome.errors);
        next = next.set_job_errors(step, errors);
    }
    if let Some(fact) = outcome.history {
        next = next.add_to_history(fact);
    }
    if let Some(metadata) = outcome.metadata {
        next = next.merge_metadata(metadata);
    }

    match outcome.status {
        JobStatus::Failure => next.with_status(RequestStatus::Failure),
        JobStatus::Error => next.with_status(RequestStatus::Error),
        JobStatus::Ok if next.last_step() == Some(step) => next.with_status(RequestStatus::Success),
        _ => next,
    }
}

/// Drive `initial` with `step` until `is_terminal` holds.
///
/// Every produced state is passed to `on_each_state` before the next tick.
/// The initial state is not reported. A state that is already terminal is
/// returned as is.
pub async fn iterate<S, F, Fut, T, E>(
    mut step: F,
    is_terminal: T,
    mut on_each_state: E,
    initial: S,
) -> S
where
    F: FnMut(S) -> Fut,
    Fut: Future<Output = S>,
    T: Fn(&S) -> bool,
    E: FnMut(&S),
{
    let mut state = initial;
    while !is_terminal(&state) {
        state = step(state).await;
        on_each_state(&state);
    }
    state
}

/// Whether a request URL is covered by the source a token was issued for.
///
/// The `http:`/`https:` scheme is ignored on both sides. The URL matches
/// when it equals the source or lies below it on a path boundary.
pub fn source_matches(url: &str, source: &str) -> bool {
    let url = strip_scheme(url);
    let source = strip_scheme(source);
    if source.is_empty() {
        return false;
    }
    if url == source {
        return true;
    }
    url.starts_with(source) && (source.ends_with('/') || url[source.len()..].starts_with('/'))
}

fn strip_scheme(url: &str) -> &str {
    let url = url.trim();
    for scheme in ["https:", "http:"] {
        if url
            .get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
        {
            return &url[scheme.len()..];
        }
    }
    url
}

/// Drives one publication request through its steps.
pub struct Orchestrator {
    request: PublicationRequest,
    temp_location: PathBuf,
    published_location: PathBuf,
    steps: Vec<Step>,
    collaborators: Arc<dyn Collaborators>,
    step_timeout: Option<Duration>,
}

impl Orchestrator {
    pub fn new(
        request: PublicationRequest,
        temp_location: PathBuf,
        published_location: PathBuf,
        collaborators: Arc<dyn Collaborators>,
    ) -> Self {
        let steps = request.steps();
        Self {
            request,
            temp_location,
            published_location,
            steps,
            collaborators,
            step_timeout: None,
        }
    }

    /// Bound every external call; a step that overruns rejects.
    #[must_use]
    pub fn with_step_timeout(mut self, step_timeout: Option<Duration>) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    pub fn request(&self) -> &PublicationRequest {
        &self.request
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Fresh state with one unstarted job per configured step.
    pub fn initial_state(&self) -> RequestState {
        RequestState::new(&self.steps)
    }

    /// Advance `state` by one tick.
    ///
    /// Either schedules the next unstarted step (no I/O) or runs the pending
    /// step and folds its result. Never fails: every problem ends up in the
    /// returned state. Terminal states come back unchanged.
    pub async fn next(&self, state: &RequestState) -> RequestState {
        if state.is_terminal() {
            return state.clone();
        }
        let Some((step, job)) = state.current_step() else {
            return state.with_status(RequestStatus::Success);
        };

        match job.status() {
            JobStatus::Unstarted => {
                debug!(%step, "scheduling step");
                state.set_job_status(step, JobStatus::Pending)
            }
            JobStatus::Pending => {
                let result = self.execute(step, state).await;
                let next = run_step(state, result);
                info!(
                    %step,
                    job = %next.job(step).map(|job| job.status()).unwrap_or_default(),
                    request = %next.status(),
                    "step settled"
                );
                next
            }
            JobStatus::Failure => state.with_status(RequestStatus::Failure),
            JobStatus::Error => state.with_status(RequestStatus::Error),
            // current_step never yields a step that settled ok.
            JobStatus::Ok => state.clone(),
        }
    }

    /// Run [`next`](Self::next) until the request is terminal.
    pub async fn drive<F>(&self, initial: RequestState, on_each_state: F) -> RequestState
    where
        F: FnMut(&RequestState),
    {
        iterate(
            move |state| self.next_owned(state),
            is_terminal,
            on_each_state,
            initial,
        )
        .await
    }

    async fn next_owned(&self, state: RequestState) -> RequestState {
        self.next(&state).await
    }

    // A panicking collaborator settles the tick like any other rejection.
    async fn execute(&self, step: Step, state: &RequestState) -> Result<StepOutcome, StepError> {
        let work = AssertUnwindSafe(self.dispatch(step, state)).catch_unwind();
        let caught = match self.step_timeout {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(caught) => caught,
                Err(_) => return Err(StepError::TimedOut { step, limit }),
            },
            None => work.await,
        };
        caught.unwrap_or(Err(StepError::Panicked { step }))
    }

    async fn dispatch(&self, step: Step, state: &RequestState) -> Result<StepOutcome, StepError> {
        match step {
            Step::RetrieveResources => self.retrieve_resources().await,
            Step::TokenChecker => self.token_checker().await,
            Step::UserChecker => self.user_checker().await,
            Step::Specberus => self.specberus().await,
            Step::ThirdPartyChecker => self.third_party_checker().await,
            Step::Publish => self.publish(state).await,
            Step::TrInstall => self.tr_install(state).await,
            Step::UpdateTrShortlink => self.update_tr_shortlink(state).await,
        }
    }

    fn document(&self) -> PathBuf {
        self.temp_location.join(DOCUMENT_NAME)
    }

    async fn retrieve_resources(&self) -> Result<StepOutcome, StepError> {
        let step = Step::RetrieveResources;
        let source = match &self.request.kind {
            RequestKind::Url { url, .. } => DocumentSource::Url(url.clone()),
            RequestKind::Tar { archive, .. } => DocumentSource::Archive(archive.clone()),
        };
        match self
            .collaborators
            .retrieve(&source, &self.temp_location)
            .await
        {
            Ok(()) => Ok(StepOutcome::ok(step)
                .with_history(format!("The document has been retrieved from {source}"))),
            Err(err) => Ok(collaborator_error(
                step,
                err,
                "The document could not be retrieved",
            )),
        }
    }

    async fn token_checker(&self) -> Result<StepOutcome, StepError> {
        let step = Step::TokenChecker;
        let RequestKind::Url { url, token } = &self.request.kind else {
            return Err(StepError::NotApplicable { step });
        };
        let Some(token) = token else {
            return Ok(StepOutcome::failure(step, vec!["no token provided".into()])
                .with_history("No token was provided"));
        };

        match self.collaborators.lookup_token(token).await {
            Ok(None) => Ok(StepOutcome::failure(step, vec!["token not found".into()])
                .with_history("The token is not valid")),
            Ok(Some(record)) if source_matches(url, &record.source) => {
                Ok(StepOutcome::ok(step).with_history(format!("The token is valid for {url}")))
            }
            Ok(Some(record)) => Ok(StepOutcome::failure(
                step,
                vec![JobError::simple(format!(
                    "token registered for {} does not cover {url}",
                    record.source
                ))],
            )
            .with_history(format!("The token is not associated with {url}"))),
            Err(err) => Ok(collaborator_error(step, err, "The token could not be checked")),
        }
    }

    async fn user_checker(&self) -> Result<StepOutcome, StepError> {
        let step = Step::UserChecker;
        let RequestKind::Tar { user, .. } = &self.request.kind else {
            return Err(StepError::NotApplicable { step });
        };
        let Some(user) = user else {
            return Ok(StepOutcome::failure(step, vec!["no user provided".into()])
                .with_history("No user was provided"));
        };

        match self.collaborators.is_deliverer(user).await {
            Ok(true) => {
                Ok(StepOutcome::ok(step).with_history(format!("User {user} is a deliverer")))
            }
            Ok(false) => Ok(StepOutcome::failure(
                step,
                vec![JobError::simple(format!(
                    "user {user} is not a member of the deliverer group"
                ))],
            )
            .with_history(format!("User {user} is not a deliverer"))),
            Err(err) => Ok(collaborator_error(step, err, "The user could not be checked")),
        }
    }

    async fn specberus(&self) -> Result<StepOutcome, StepError> {
        let step = Step::Specberus;
        match self.collaborators.validate(&self.document()).await {
            Ok(report) if report.errors.is_empty() => Ok(StepOutcome::ok(step)
                .with_history("The document passed the publication rules")
                .with_metadata(report.metadata)),
            Ok(report) => {
                let count = report.errors.len();
                Ok(StepOutcome::failure(step, report.errors)
                    .with_history(format!("The document failed {count} publication rule(s)")))
            }
            Err(err) => Ok(collaborator_error(
                step,
                err,
                "The validator could not check the document",
            )),
        }
    }

    async fn third_party_checker(&self) -> Result<StepOutcome, StepError> {
        let step = Step::ThirdPartyChecker;
        match self
            .collaborators
            .third_party_resources(&self.document())
            .await
        {
            Ok(found) if found.is_empty() => {
                Ok(StepOutcome::ok(step).with_history("No third-party resources were found"))
            }
            Ok(found) => {
                let count = found.len();
                Ok(StepOutcome::failure(step, found.into_iter().map(JobError::from).collect())
                    .with_history(format!("The document uses {count} third-party resource(s)")))
            }
            Err(err) => Ok(collaborator_error(
                step,
                err,
                "Third-party resources could not be checked",
            )),
        }
    }

    async fn publish(&self, state: &RequestState) -> Result<StepOutcome, StepError> {
        let step = Step::Publish;
        match self.collaborators.publish(state.metadata()).await {
            Ok(PublishResponse::Accepted) => {
                Ok(StepOutcome::ok(step).with_history("The document has been published"))
            }
            Ok(PublishResponse::Rejected(errors)) => Ok(StepOutcome::failure(step, errors)
                .with_history("The publication backend rejected the metadata")),
            Err(err) => Ok(collaborator_error(
                step,
                err,
                "The publication backend could not be reached",
            )),
        }
    }

    async fn tr_install(&self, state: &RequestState) -> Result<StepOutcome, StepError> {
        let step = Step::TrInstall;
        let shortname = checked_shortname(state, step)?;
        let destination = self.published_location.join(shortname);
        match self
            .collaborators
            .install(&self.temp_location, &destination)
            .await
        {
            Ok(()) => Ok(StepOutcome::ok(step).with_history(format!(
                "The document has been installed at {}",
                destination.display()
            ))),
            Err(err) => Ok(collaborator_error(step, err, "The document could not be installed")),
        }
    }

    async fn update_tr_shortlink(&self, state: &RequestState) -> Result<StepOutcome, StepError> {
        let step = Step::UpdateTrShortlink;
        let shortname = checked_shortname(state, step)?;
        let version = metadata_str(state, step, "thisVersion")?;
        match self.collaborators.update_shortlink(shortname, version).await {
            Ok(()) => Ok(StepOutcome::ok(step).with_history(format!(
                "The shortlink for {shortname} now points to {version}"
            ))),
            Err(err) => Ok(collaborator_error(step, err, "The shortlink could not be updated")),
        }
    }
}

fn collaborator_error(step: Step, err: CollaboratorError, fact: &str) -> StepOutcome {
    warn!(%step, error = %err, "collaborator reported an error");
    StepOutcome::error(step, vec![JobError::simple(err.to_string())]).with_history(fact)
}

fn metadata_str<'a>(
    state: &'a RequestState,
    step: Step,
    key: &'static str,
) -> Result<&'a str, StepError> {
    state
        .metadata()
        .get(key)
        .and_then(Value::as_str)
        .ok_or(StepError::MissingMetadata { step, key })
}

/// The `shortname` metadata, which must be a single plain path segment.
fn checked_shortname(state: &RequestState, step: Step) -> Result<&str, StepError> {
    let value = metadata_str(state, step, "shortname")?;
    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !value.contains(['/', '\\']) => Ok(value),
        _ => Err(StepError::InvalidMetadata {
            step,
            key: "shortname",
            value: value.to_string(),
        }),
    }
}
