//! Tipos de dados trocados com os colaboradores externos.
//!
//! As structs com `Serialize`/`Deserialize` seguem o formato JSON dos
//! serviços de tokens, de validação (Specberus) e de publicação.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::state_machine::{JobError, Metadata};

/// Origem do documento a publicar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// Documento obtido por HTTP a partir de um URL.
    Url(String),
    /// Arquivo tar carregado pelo utilizador.
    Archive(PathBuf),
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentSource::Url(url) => write!(f, "{url}"),
            DocumentSource::Archive(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Registo de um token conhecido pelo serviço de tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Prefixo de URL para o qual o token foi emitido.
    pub source: String,
}

/// Resposta do validador: regras violadas e metadados extraídos.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Violações de regras de publicação. Vazio quando o documento passa.
    #[serde(default)]
    pub errors: Vec<JobError>,
    /// Metadados do documento (título, shortname, thisVersion, ...).
    #[serde(default)]
    pub metadata: Metadata,
}

/// Decisão do backend de publicação.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishResponse {
    /// HTTP 201: metadados aceites.
    Accepted,
    /// HTTP 400: metadados rejeitados, com os erros por campo.
    Rejected(Vec<JobError>),
}

/// Corpo de uma rejeição HTTP 400 do backend de publicação.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct PublishRejection {
    #[serde(default)]
    pub errors: Vec<JobError>,
}
