//! External collaborators behind the pipeline steps.
//!
//! The orchestrator only ever talks to [`Collaborators`]. [`Services`] is the
//! production implementation: remote services over HTTP and local work on
//! the filesystem and with subprocesses.

pub mod client;
pub mod error;
pub mod local;
pub mod types;

use std::path::Path;

use async_trait::async_trait;

use crate::config::PublisherConfig;
pub use client::{BackendClient, DOCUMENT_NAME, Endpoints};
pub use error::CollaboratorError;
pub use types::{DocumentSource, PublishResponse, TokenRecord, ValidationReport};

use crate::state_machine::Metadata;

/// One asynchronous operation per pipeline step.
///
/// Implementations are shared by every in-flight request, so they must not
/// keep per-request mutable state.
#[async_trait]
pub trait Collaborators: Send + Sync {
    /// Put the document and its resources under `dest`.
    async fn retrieve(
        &self,
        source: &DocumentSource,
        dest: &Path,
    ) -> Result<(), CollaboratorError>;

    /// Look a token up. `None` means the token is unknown.
    async fn lookup_token(&self, token: &str) -> Result<Option<TokenRecord>, CollaboratorError>;

    /// Whether `user` belongs to the deliverer group.
    async fn is_deliverer(&self, user: &str) -> Result<bool, CollaboratorError>;

    /// Check the document against the publication rules.
    async fn validate(&self, document: &Path) -> Result<ValidationReport, CollaboratorError>;

    /// Disallowed external resources referenced by the document.
    async fn third_party_resources(
        &self,
        document: &Path,
    ) -> Result<Vec<String>, CollaboratorError>;

    /// Hand the metadata to the publication backend.
    async fn publish(&self, metadata: &Metadata) -> Result<PublishResponse, CollaboratorError>;

    /// Install the retrieved tree at its permanent location.
    async fn install(&self, from: &Path, to: &Path) -> Result<(), CollaboratorError>;

    /// Point the shortlink of `shortname` at `version`.
    async fn update_shortlink(
        &self,
        shortname: &str,
        version: &str,
    ) -> Result<(), CollaboratorError>;
}

pub struct Services {
    client: BackendClient,
    deliverers: Vec<String>,
    allowed_resource_hosts: Vec<String>,
    shortlink_command: Vec<String>,
}

impl Services {
    pub fn new(
        client: BackendClient,
        deliverers: Vec<String>,
        allowed_resource_hosts: Vec<String>,
        shortlink_command: Vec<String>,
    ) -> Self {
        Self {
            client,
            deliverers,
            allowed_resource_hosts,
            shortlink_command,
        }
    }

    pub fn from_config(config: &PublisherConfig) -> Result<Self, CollaboratorError> {
        let client = BackendClient::new(
            Endpoints {
                token: config.token_endpoint.clone(),
                specberus: config.specberus_endpoint.clone(),
                publish: config.publish_endpoint.clone(),
            },
            (!config.api_key.is_empty()).then(|| config.api_key.clone()),
            config.fetch_timeout(),
        )?;
        Ok(Self::new(
            client,
            config.deliverers.clone(),
            config.allowed_resource_hosts.clone(),
            config.shortlink_command.clone(),
        ))
    }
}

#[async_trait]
impl Collaborators for Services {
    async fn retrieve(
        &self,
        source: &DocumentSource,
        dest: &Path,
    ) -> Result<(), CollaboratorError> {
        match source {
            DocumentSource::Url(url) => self.client.fetch_document(url, dest).await,
            DocumentSource::Archive(archive) => local::unpack_archive(archive, dest).await,
        }
    }

    async fn lookup_token(&self, token: &str) -> Result<Option<TokenRecord>, CollaboratorError> {
        self.client.lookup_token(token).await
    }

    async fn is_deliverer(&self, user: &str) -> Result<bool, CollaboratorError> {
        Ok(self.deliverers.iter().any(|member| member == user))
    }

    async fn validate(&self, document: &Path) -> Result<ValidationReport, CollaboratorError> {
        let html = tokio::fs::read_to_string(document).await?;
        self.client.validate(html).await
    }

    async fn third_party_resources(
        &self,
        document: &Path,
    ) -> Result<Vec<String>, CollaboratorError> {
        let html = tokio::fs::read_to_string(document).await?;
        Ok(local::find_third_party_resources(
            &html,
            &self.allowed_resource_hosts,
        ))
    }

    async fn publish(&self, metadata: &Metadata) -> Result<PublishResponse, CollaboratorError> {
        self.client.publish(metadata).await
    }

    async fn install(&self, from: &Path, to: &Path) -> Result<(), CollaboratorError> {
        local::copy_tree(from, to).await
    }

    async fn update_shortlink(
        &self,
        shortname: &str,
        version: &str,
    ) -> Result<(), CollaboratorError> {
        local::run_shortlink_command(&self.shortlink_command, shortname, version).await
    }
}
