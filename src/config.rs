//! Configuração do publicador carregada a partir de `publisher.toml`.
//!
//! A struct [`PublisherConfig`] contém todos os parâmetros configuráveis:
//! caminhos de trabalho, endpoints dos serviços, comando de shortlink e
//! prazos. Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `PUBLISHER_API_KEY` tem precedência sobre o arquivo.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Nome do arquivo de configuração procurado no diretório atual.
pub const CONFIG_FILE: &str = "publisher.toml";

/// Configuração de nível superior carregada de `publisher.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Arquivo onde cada fato do histórico é anexado.
    pub history_log: PathBuf,

    /// Raiz dos diretórios temporários, um por pedido.
    pub temp_location: PathBuf,

    /// Raiz onde os documentos publicados são instalados.
    pub published_location: PathBuf,

    /// Diretório onde os estados terminais são persistidos em JSON.
    pub state_dir: PathBuf,

    /// Endpoint do serviço de tokens.
    pub token_endpoint: String,

    /// Endpoint do validador (Specberus).
    pub specberus_endpoint: String,

    /// Endpoint do backend de publicação.
    pub publish_endpoint: String,

    /// Credencial do backend de publicação.
    pub api_key: String,

    /// Membros do grupo de entregadores autorizados a enviar arquivos tar.
    pub deliverers: Vec<String>,

    /// Hosts cujos recursos não contam como recursos de terceiros.
    pub allowed_resource_hosts: Vec<String>,

    /// Comando de atualização do shortlink, com `{shortname}` e `{version}`.
    pub shortlink_command: Vec<String>,

    /// Prazo por etapa em segundos; 0 desativa.
    pub step_timeout_secs: u64,

    /// Timeout do cliente HTTP em segundos.
    pub fetch_timeout_secs: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            history_log: PathBuf::from("history.log"),
            temp_location: std::env::temp_dir().join("trpublish"),
            published_location: PathBuf::from("published"),
            state_dir: PathBuf::from("states"),
            token_endpoint: String::new(),
            specberus_endpoint: String::new(),
            publish_endpoint: String::new(),
            api_key: String::new(),
            deliverers: Vec::new(),
            allowed_resource_hosts: vec!["www.w3.org".to_string()],
            shortlink_command: Vec::new(),
            step_timeout_secs: 300,
            fetch_timeout_secs: 60,
        }
    }
}

impl PublisherConfig {
    /// Carrega a configuração de `publisher.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        let path = Path::new(CONFIG_FILE);
        let config = if path.exists() {
            Self::parse_file(path)?
        } else {
            Self::default()
        };
        Ok(config.with_env_overrides())
    }

    /// Carrega a configuração de um caminho explícito, que tem de existir.
    pub fn load_from(path: &Path) -> Result<Self> {
        Ok(Self::parse_file(path)?.with_env_overrides())
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = toml::from_str::<PublisherConfig>(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    // Variável de ambiente tem precedência sobre o arquivo para a credencial.
    fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var("PUBLISHER_API_KEY") {
            if !key.is_empty() {
                self.api_key = key;
            }
        }
        self
    }

    /// Prazo por etapa, ou `None` quando desativado.
    pub fn step_timeout(&self) -> Option<Duration> {
        (self.step_timeout_secs > 0).then(|| Duration::from_secs(self.step_timeout_secs))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = PublisherConfig::default();
        assert_eq!(config.history_log, PathBuf::from("history.log"));
        assert_eq!(config.state_dir, PathBuf::from("states"));
        assert_eq!(config.allowed_resource_hosts, vec!["www.w3.org"]);
        assert_eq!(config.step_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(60));
        assert!(config.shortlink_command.is_empty());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            publish_endpoint = "https://api.example.org/publish"
            deliverers = ["alice", "bob"]
            shortlink_command = ["update-tr-shortlink", "{shortname}", "{version}"]
            step_timeout_secs = 0
        "#;
        let config: PublisherConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.publish_endpoint, "https://api.example.org/publish");
        assert_eq!(config.deliverers, vec!["alice", "bob"]);
        assert_eq!(config.shortlink_command.len(), 3);
        assert_eq!(config.step_timeout(), None);
        assert_eq!(config.fetch_timeout_secs, 60);
        assert_eq!(config.published_location, PathBuf::from("published"));
    }

    #[test]
    fn load_from_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "state_dir = \"/var/lib/trpublish\"\n").unwrap();

        let config = PublisherConfig::load_from(&path).unwrap();
        assert_eq!(config.state_dir, PathBuf::from("/var/lib/trpublish"));
    }

    #[test]
    fn load_from_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(PublisherConfig::load_from(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn invalid_toml_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "step_timeout_secs = \"soon\"\n").unwrap();
        assert!(PublisherConfig::load_from(&path).is_err());
    }
}
