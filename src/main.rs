use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use trpublish::cli::{Cli, Command};
use trpublish::config::PublisherConfig;
use trpublish::orchestrator::Orchestrator;
use trpublish::registry::Registry;
use trpublish::services::Services;
use trpublish::state_machine::{FileSink, RequestState, RequestStatus};
use trpublish::ui::{self, RequestProgress};

// Upper bound on flushing queued history lines at exit.
const HISTORY_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "trpublish=debug" } else { "trpublish=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => PublisherConfig::load_from(path)?,
        None => PublisherConfig::load()?,
    };
    let registry = Registry::new(config.state_dir.clone());

    if let Command::Status { id } = &cli.command {
        let state = registry
            .get(id)
            .await
            .with_context(|| format!("failed to read request {id}"))?;
        ui::print_state(id, &state);
        return Ok(exit_code(state.status()));
    }
    let Some(request) = cli.command.publication_request() else {
        return Ok(ExitCode::SUCCESS);
    };

    let services = Services::from_config(&config).context("failed to build HTTP client")?;
    let id = Registry::new_id();
    let orchestrator = Orchestrator::new(
        request,
        config.temp_location.join(&id),
        config.published_location.clone(),
        Arc::new(services),
    )
    .with_step_timeout(config.step_timeout());
    info!(
        %id,
        source = %orchestrator.request().kind,
        dry_run = orchestrator.request().dry_run,
        "publication request accepted"
    );

    let (sink, writer) = FileSink::spawn(config.history_log.clone());
    let status = {
        let initial = orchestrator.initial_state();
        let initial = initial.with_history(initial.history().with_sink(Arc::new(sink)));
        let last = publish(&id, &orchestrator, &registry, initial).await;

        let persisted = registry.finish(&id, &last).await;
        match persisted {
            Ok(path) => info!(%id, path = %path.display(), "request state saved"),
            Err(err) => warn!(%id, error = %err, "failed to save request state"),
        }
        last.status()
    };

    // Every state holding the sink is gone, so the writer drains and stops.
    if tokio::time::timeout(HISTORY_FLUSH_TIMEOUT, writer).await.is_err() {
        warn!(path = %config.history_log.display(), "history log did not flush in time");
    }
    Ok(exit_code(status))
}

async fn publish(
    id: &str,
    orchestrator: &Orchestrator,
    registry: &Registry,
    initial: RequestState,
) -> RequestState {
    println!("Request {id}");
    let progress = RequestProgress::start(id, &orchestrator.request().kind.to_string());
    registry.insert(id, initial.clone());

    let last = orchestrator
        .drive(initial, |state| {
            registry.replace(id, state.clone());
            progress.update(state);
        })
        .await;

    progress.complete(&last);
    last
}

fn exit_code(status: RequestStatus) -> ExitCode {
    match status {
        RequestStatus::Success => ExitCode::SUCCESS,
        RequestStatus::Failure => ExitCode::from(1),
        RequestStatus::Error | RequestStatus::Unstarted => ExitCode::from(2),
    }
}
