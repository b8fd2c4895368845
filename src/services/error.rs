//! Tipos de erro para os colaboradores externos do pipeline.
//!
//! Define [`CollaboratorError`], que cobre falhas internas relatadas pelos
//! serviços, respostas HTTP inesperadas e erros de rede ou de disco. Os
//! adaptadores de etapa convertem qualquer uma destas variantes num
//! resultado `error` normalizado.

use thiserror::Error;

/// Erros que um colaborador pode relatar ao executar a sua operação.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// O colaborador executou mas encontrou uma falha interna descritível
    /// (ex.: comando terminou com código diferente de zero, serviço não configurado).
    #[error("{0}")]
    Fault(String),

    /// O serviço respondeu com um status HTTP não previsto pelo contrato.
    #[error("unexpected response (status {status}): {message}")]
    UnexpectedResponse { status: u16, message: String },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Falha de leitura ou escrita no sistema de ficheiros.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollaboratorError {
    pub fn fault(message: impl Into<String>) -> Self {
        CollaboratorError::Fault(message.into())
    }
}
