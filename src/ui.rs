//! Interface de terminal do publicador: spinner e saída colorida.
//!
//! Usa `indicatif` para o spinner de progresso e `console` para as cores.
//! O [`RequestProgress`] acompanha visualmente um pedido de publicação.

use std::cell::Cell;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::state_machine::{JobStatus, RequestState, RequestStatus};

/// Indicador visual de progresso de um pedido no terminal.
///
/// Mostra a etapa em curso durante o processamento e, no fim, o resultado
/// em verde (sucesso), vermelho (falha) ou amarelo (erro de sistema).
pub struct RequestProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
    // Quantos fatos do histórico já foram impressos.
    printed: Cell<usize>,
}

impl RequestProgress {
    /// Inicia o spinner com o identificador e a origem do pedido.
    pub fn start(id: &str, source: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("{id}: {source}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow().bold(),
            dim: Style::new().dim(),
            printed: Cell::new(0),
        }
    }

    /// Atualiza a mensagem do spinner para a etapa atual e imprime os
    /// fatos do histórico ainda não mostrados.
    pub fn update(&self, state: &RequestState) {
        if let Some((step, job)) = state.current_step() {
            self.pb.set_message(format!("{step}: {}", job.status()));
        }
        let facts = state.history().facts();
        for fact in facts.iter().skip(self.printed.get()) {
            self.pb
                .println(format!("  {} {}", self.dim.apply_to("·"), fact.fact));
        }
        self.printed.set(facts.len());
    }

    /// Finaliza o spinner e exibe o resultado final do pedido.
    pub fn complete(&self, state: &RequestState) {
        self.pb.finish_and_clear();
        match state.status() {
            RequestStatus::Success => {
                println!("  {} Publication succeeded", self.green.apply_to("✓"));
            }
            RequestStatus::Failure => {
                let step = failed_step(state).unwrap_or_else(|| "unknown step".into());
                println!("  {} Publication failed at {step}", self.red.apply_to("✗"));
            }
            RequestStatus::Error => {
                println!("  {} A system error occurred", self.yellow.apply_to("!"));
            }
            RequestStatus::Unstarted => {
                println!("  {} Publication did not finish", self.yellow.apply_to("?"));
            }
        }
    }
}

fn failed_step(state: &RequestState) -> Option<String> {
    state
        .jobs()
        .iter()
        .find(|(_, job)| matches!(job.status(), JobStatus::Failure | JobStatus::Error))
        .map(|(step, _)| step.to_string())
}

/// Imprime o estado do pedido formatado em JSON com estilo colorido.
pub fn print_state(id: &str, state: &RequestState) {
    let style = match state.status() {
        RequestStatus::Success => Style::new().green(),
        RequestStatus::Failure => Style::new().red(),
        _ => Style::new().yellow(),
    };
    println!("{}", style.apply_to(format!("─── Request {id} ───")));
    println!("{}", serde_json::to_string_pretty(state).unwrap_or_default());
}
