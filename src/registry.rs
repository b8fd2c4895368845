//! In-flight requests by ID, plus the persisted terminal states.
//!
//! Each request gets a random UUID at intake. While it runs, its latest
//! state lives in memory. Once terminal, the state is written to
//! `<state_dir>/<id>.json` and dropped from memory.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use tracing::debug;
use uuid::Uuid;

use crate::error::PublisherError;
use crate::state_machine::RequestState;

pub struct Registry {
    inflight: RwLock<HashMap<String, RequestState>>,
    state_dir: PathBuf,
}

impl Registry {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            inflight: RwLock::new(HashMap::new()),
            state_dir: state_dir.into(),
        }
    }

    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Record the latest state of an in-flight request.
    pub fn insert(&self, id: &str, state: RequestState) {
        self.inflight
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), state);
    }

    /// Swap in the state produced by a tick; returns the state it replaced.
    pub fn replace(&self, id: &str, state: RequestState) -> Option<RequestState> {
        self.inflight
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), state)
    }

    pub fn in_flight(&self, id: &str) -> Option<RequestState> {
        self.inflight
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn in_flight_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .inflight
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Latest known state: in memory first, then on disk.
    pub async fn get(&self, id: &str) -> Result<RequestState, PublisherError> {
        match self.in_flight(id) {
            Some(state) => Ok(state),
            None => self.load(id).await,
        }
    }

    /// Persist a terminal state and forget the in-memory copy.
    pub async fn finish(&self, id: &str, state: &RequestState) -> Result<PathBuf, PublisherError> {
        let path = self.path_for(id)?;
        tokio::fs::create_dir_all(&self.state_dir).await?;
        let json = serde_json::to_string_pretty(state)?;
        tokio::fs::write(&path, json).await?;
        debug!(id, path = %path.display(), "request state persisted");

        self.inflight
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        Ok(path)
    }

    /// Read a persisted state back.
    pub async fn load(&self, id: &str) -> Result<RequestState, PublisherError> {
        let path = self.path_for(id)?;
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(PublisherError::RequestNotFound(id.to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_str(&json)?)
    }

    // IDs come from outside, so only UUIDs are ever turned into paths.
    fn path_for(&self, id: &str) -> Result<PathBuf, PublisherError> {
        let uuid =
            Uuid::parse_str(id).map_err(|_| PublisherError::RequestNotFound(id.to_string()))?;
        Ok(self.state_dir.join(format!("{uuid}.json")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::{JobStatus, RequestStatus, Step};

    fn finished_state() -> RequestState {
        RequestState::new(&[Step::RetrieveResources])
            .set_job_status(Step::RetrieveResources, JobStatus::Ok)
            .add_to_history("The document has been retrieved")
            .with_status(RequestStatus::Success)
    }

    #[test]
    fn ids_are_unique_uuids() {
        let a = Registry::new_id();
        let b = Registry::new_id();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[tokio::test]
    async fn in_flight_state_is_served_from_memory() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path());
        let id = Registry::new_id();
        let state = RequestState::new(&[Step::Specberus]);

        registry.insert(&id, state.clone());

        assert_eq!(registry.in_flight(&id), Some(state.clone()));
        assert_eq!(registry.get(&id).await.unwrap(), state);
        assert_eq!(registry.in_flight_ids(), vec![id.clone()]);

        let scheduled = state.set_job_status(Step::Specberus, JobStatus::Pending);
        assert_eq!(registry.replace(&id, scheduled.clone()), Some(state));
        assert_eq!(registry.in_flight(&id), Some(scheduled));
    }

    #[tokio::test]
    async fn finish_persists_and_forgets() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path().join("states"));
        let id = Registry::new_id();
        let state = finished_state();
        registry.insert(&id, state.clone());

        let path = registry.finish(&id, &state).await.unwrap();

        assert!(path.exists());
        assert!(registry.in_flight(&id).is_none());
        assert_eq!(registry.get(&id).await.unwrap(), state);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path());

        let err = registry.get(&Registry::new_id()).await.unwrap_err();
        assert!(matches!(err, PublisherError::RequestNotFound(_)));
    }

    #[tokio::test]
    async fn non_uuid_ids_never_touch_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path());

        let err = registry.load("../../etc/passwd").await.unwrap_err();
        assert!(matches!(err, PublisherError::RequestNotFound(_)));
        assert!(registry.finish("not-a-uuid", &finished_state()).await.is_err());
    }

    #[tokio::test]
    async fn corrupt_state_file_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path());
        let id = Registry::new_id();
        std::fs::write(dir.path().join(format!("{id}.json")), "{not json").unwrap();

        let err = registry.load(&id).await.unwrap_err();
        assert!(matches!(err, PublisherError::Json(_)));
    }
}
