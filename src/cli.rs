//! Interface de linha de comando do publicador baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (publish-url,
//! publish-tar, status) e flags globais (--config, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::request::PublicationRequest;

/// Publicador de relatórios técnicos: obtém, verifica e publica documentos.
#[derive(Debug, Parser)]
#[command(name = "trpublish", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho para o arquivo de configuração (padrão: ./publisher.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Publica um documento obtido a partir de um URL.
    PublishUrl {
        /// URL do documento.
        url: String,

        /// Token que autoriza a publicação deste URL.
        #[arg(long)]
        token: Option<String>,

        /// Executa só as verificações, sem publicar.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Publica um documento enviado como arquivo tar.
    PublishTar {
        /// Caminho do arquivo tar.
        archive: PathBuf,

        /// Utilizador autenticado que enviou o arquivo.
        #[arg(long)]
        user: Option<String>,

        /// Executa só as verificações, sem publicar.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Mostra o estado persistido de um pedido.
    Status {
        /// Identificador do pedido.
        id: String,
    },
}

impl Command {
    /// Pedido de publicação correspondente, ou `None` para `status`.
    pub fn publication_request(&self) -> Option<PublicationRequest> {
        match self {
            Command::PublishUrl {
                url,
                token,
                dry_run,
            } => Some(PublicationRequest::url(url.clone(), token.clone()).dry_run(*dry_run)),
            Command::PublishTar {
                archive,
                user,
                dry_run,
            } => Some(PublicationRequest::tar(archive.clone(), user.clone()).dry_run(*dry_run)),
            Command::Status { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    use crate::request::RequestKind;

    #[test]
    fn cli_parses_publish_url() {
        let cli = Cli::parse_from([
            "trpublish",
            "publish-url",
            "https://example.org/spec/",
            "--token",
            "secret",
        ]);
        let request = cli.command.publication_request().unwrap();
        assert_eq!(
            request.kind,
            RequestKind::Url {
                url: "https://example.org/spec/".into(),
                token: Some("secret".into()),
            }
        );
        assert!(!request.dry_run);
    }

    #[test]
    fn cli_parses_publish_tar_dry_run() {
        let cli = Cli::parse_from([
            "trpublish",
            "publish-tar",
            "/tmp/spec.tar",
            "--user",
            "alice",
            "--dry-run",
        ]);
        let request = cli.command.publication_request().unwrap();
        assert!(request.dry_run);
        assert!(matches!(request.kind, RequestKind::Tar { user: Some(ref u), .. } if u == "alice"));
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "trpublish",
            "--config",
            "/etc/trpublish.toml",
            "--verbose",
            "status",
            "0d7f3c5e-4a51-4c43-9a6e-52f1f0f6a1b2",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/trpublish.toml")));
        match cli.command {
            Command::Status { ref id } => assert_eq!(id, "0d7f3c5e-4a51-4c43-9a6e-52f1f0f6a1b2"),
            _ => panic!("expected Status command"),
        }
        assert!(cli.command.publication_request().is_none());
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
