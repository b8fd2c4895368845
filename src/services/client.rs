//! Cliente HTTP para os serviços remotos do pipeline.
//!
//! O [`BackendClient`] obtém documentos, consulta o serviço de tokens,
//! submete documentos ao validador e envia metadados ao backend de
//! publicação. Cada endpoint é configurável para permitir testes com
//! servidores simulados.

use std::path::Path;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};

use super::error::CollaboratorError;
use super::types::{PublishRejection, PublishResponse, TokenRecord, ValidationReport};
use crate::state_machine::Metadata;

/// Nome do ficheiro principal do documento dentro da pasta temporária.
pub const DOCUMENT_NAME: &str = "Overview.html";

/// Endpoints dos serviços remotos. Um endpoint vazio significa "não configurado".
#[derive(Debug, Clone, Default)]
pub struct Endpoints {
    pub token: String,
    pub specberus: String,
    pub publish: String,
}

pub struct BackendClient {
    client: Client,
    endpoints: Endpoints,
    api_key: Option<String>,
}

impl BackendClient {
    pub fn new(
        endpoints: Endpoints,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoints,
            api_key,
        })
    }

    /// Descarrega `url` e grava o corpo em `dest/Overview.html`.
    pub async fn fetch_document(&self, url: &str, dest: &Path) -> Result<(), CollaboratorError> {
        let response = self.client.get(url).send().await?;
        let response = ensure_success(response).await?;
        let body = response.bytes().await?;

        tokio::fs::create_dir_all(dest).await?;
        tokio::fs::write(dest.join(DOCUMENT_NAME), &body).await?;
        Ok(())
    }

    /// Consulta o token. `Ok(None)` quando o serviço não o conhece (HTTP 404).
    pub async fn lookup_token(
        &self,
        token: &str,
    ) -> Result<Option<TokenRecord>, CollaboratorError> {
        let endpoint = configured(&self.endpoints.token, "token")?;
        let response = self
            .client
            .get(endpoint)
            .query(&[("token", token)])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response).await?;
        Ok(Some(response.json::<TokenRecord>().await?))
    }

    /// Submete o HTML ao validador e devolve as violações e os metadados.
    pub async fn validate(&self, html: String) -> Result<ValidationReport, CollaboratorError> {
        let endpoint = configured(&self.endpoints.specberus, "specberus")?;
        let response = self
            .client
            .post(endpoint)
            .header("content-type", "text/html; charset=utf-8")
            .body(html)
            .send()
            .await?;

        let response = ensure_success(response).await?;
        Ok(response.json::<ValidationReport>().await?)
    }

    /// Envia os metadados ao backend de publicação.
    ///
    /// HTTP 201 significa aceite e HTTP 400 rejeitado com erros por campo;
    /// qualquer outro status é tratado como falha do serviço.
    pub async fn publish(&self, metadata: &Metadata) -> Result<PublishResponse, CollaboratorError> {
        let endpoint = configured(&self.endpoints.publish, "publish")?;
        let mut request = self.client.post(endpoint).json(metadata);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;

        match response.status() {
            StatusCode::CREATED => Ok(PublishResponse::Accepted),
            StatusCode::BAD_REQUEST => {
                let rejection = response.json::<PublishRejection>().await?;
                Ok(PublishResponse::Rejected(rejection.errors))
            }
            _ => Err(unexpected(response).await),
        }
    }
}

fn configured<'a>(endpoint: &'a str, name: &str) -> Result<&'a str, CollaboratorError> {
    if endpoint.is_empty() {
        Err(CollaboratorError::fault(format!(
            "{name} endpoint is not configured"
        )))
    } else {
        Ok(endpoint)
    }
}

async fn ensure_success(response: Response) -> Result<Response, CollaboratorError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(unexpected(response).await)
    }
}

async fn unexpected(response: Response) -> CollaboratorError {
    let status = response.status().as_u16();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    CollaboratorError::UnexpectedResponse { status, message }
}
