use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    basename, render::CITATION_SEPARATOR, Action, AnswerView, Completion, FormState, HttpBackend,
    ImageFile, Reply, TutorSession,
};
use shared::{
    domain::{Language, Mode},
    protocol::RetrievedChunk,
};
use tokio::{
    sync::{oneshot, watch},
    task::JoinHandle,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, Settings};

const SNIPPET_CHARS: usize = 400;

#[derive(Parser, Debug)]
#[command(name = "tutor", about = "Ask the EE tutor backend questions, extract text from scans, inspect its config")]
struct Cli {
    /// Backend base URL; overrides tutor.toml and the environment.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long, default_value = "tutor.toml")]
    config: PathBuf,
    #[arg(long)]
    timeout_secs: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask a question, optionally with a worked solution to check.
    Ask(AskArgs),
    /// Extract text from a scanned image.
    Ocr { images: Vec<PathBuf> },
    /// Show the backend's active configuration.
    Config,
    Health,
    /// Ask the backend to reload its index.
    Reindex,
    /// Show the chunks the backend would cite for a query.
    Retrieve {
        query: String,
        #[arg(long)]
        top_k: Option<String>,
    },
    /// Ask a question and fetch the config at the same time.
    Batch(AskArgs),
}

#[derive(clap::Args, Debug)]
struct AskArgs {
    #[arg(default_value = "")]
    question: String,
    #[arg(long, default_value = "")]
    solution: String,
    #[arg(long)]
    language: Option<Language>,
    #[arg(long)]
    show_steps: bool,
    #[arg(long)]
    mode: Option<Mode>,
    /// Number of sources to retrieve; non-numeric values fall back to 5.
    #[arg(long)]
    top_k: Option<String>,
}

impl AskArgs {
    fn into_form(self, settings: &Settings) -> FormState {
        FormState {
            question: self.question,
            solution: self.solution,
            language: self.language.unwrap_or(settings.language),
            show_steps: self.show_steps,
            mode: self.mode.unwrap_or_default(),
            top_k: self.top_k.or_else(|| settings.default_top_k.clone()),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings(&cli.config);
    if let Some(server_url) = cli.server_url {
        settings.base_url = server_url;
    }
    if let Some(timeout_secs) = cli.timeout_secs {
        settings.request_timeout_secs = timeout_secs;
    }
    settings.validate()?;

    let backend = HttpBackend::with_timeout(
        &settings.base_url,
        Duration::from_secs(settings.request_timeout_secs),
    )
    .context("failed to build backend client")?;
    info!(base_url = %backend.base_url(), "using tutor backend");

    let session = TutorSession::new(Arc::new(backend));
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let mirror = mirror_status(session.status().subscribe(), shutdown_rx);

    let outcome = run(&session, &settings, cli.command).await;

    let _ = shutdown_tx.send(());
    let _ = mirror.await;
    outcome
}

async fn run(session: &TutorSession, settings: &Settings, command: Command) -> Result<ExitCode> {
    match command {
        Command::Ask(args) => {
            let completion = session
                .dispatch(Action::Ask(args.into_form(settings)))
                .await
                .context("ask task aborted")?;
            print_answer(&session.answer().get());
            Ok(exit_code(&completion))
        }
        Command::Ocr { images } => {
            let mut files = Vec::with_capacity(images.len());
            for path in &images {
                files.push(ImageFile::from_path(path).await?);
            }
            let completion = session
                .dispatch(Action::ExtractText(files))
                .await
                .context("ocr task aborted")?;
            println!("{}", session.extracted_text().get());
            Ok(exit_code(&completion))
        }
        Command::Config => {
            let completion = session
                .dispatch(Action::FetchConfig)
                .await
                .context("config task aborted")?;
            println!("{}", session.config_text().get());
            Ok(exit_code(&completion))
        }
        Command::Health => Ok(print_reply("health", session.health().await, |health| {
            println!("backend status: {}", health.status)
        })),
        Command::Reindex => Ok(print_reply("reindex", session.reindex().await, |reindex| {
            println!("index {}", reindex.status)
        })),
        Command::Retrieve { query, top_k } => {
            let top_k = top_k.or_else(|| settings.default_top_k.clone());
            match session.retrieve(&query, top_k.as_deref()).await {
                Ok(reply) => Ok(print_reply("retrieve", reply, |found| {
                    for chunk in &found.results {
                        println!("{}", chunk_heading(chunk));
                        println!("  {}", snippet(&chunk.text));
                    }
                })),
                Err(err) => {
                    eprintln!("{err}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Batch(args) => {
            let ask = session.dispatch(Action::Ask(args.into_form(settings)));
            let config = session.dispatch(Action::FetchConfig);
            let (ask, config) = tokio::join!(ask, config);
            let ask = ask.context("ask task aborted")?;
            let config = config.context("config task aborted")?;

            print_answer(&session.answer().get());
            println!();
            println!("{}", session.config_text().get());
            if ask == Completion::Rendered && config == Completion::Rendered {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

/// Echoes status changes to stderr until shutdown, then flushes the last unseen value.
fn mirror_status(
    mut status: watch::Receiver<String>,
    mut shutdown: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    print_status(&status.borrow_and_update());
                }
                _ = &mut shutdown => {
                    if status.has_changed().unwrap_or(false) {
                        print_status(&status.borrow_and_update());
                    }
                    break;
                }
            }
        }
    })
}

fn print_status(message: &str) {
    if !message.is_empty() {
        eprintln!("[status] {message}");
    }
}

fn print_answer(view: &AnswerView) {
    if !view.answer.is_empty() {
        println!("{}", view.answer);
    }
    if !view.error.is_empty() {
        println!("warning: {}", view.error);
    }
    if !view.citations.is_empty() {
        println!();
        println!("Sources:");
        for citation in &view.citations {
            println!("  - {citation}");
        }
    }
}

fn print_reply<T>(operation: &str, reply: Reply<T>, on_success: impl FnOnce(&T)) -> ExitCode {
    match reply {
        Reply::Success(value) => {
            on_success(&value);
            ExitCode::SUCCESS
        }
        Reply::ProtocolFailure { status, detail } => {
            eprintln!(
                "{operation} failed with HTTP {status}{}",
                detail.map(|d| format!(": {d}")).unwrap_or_default()
            );
            ExitCode::FAILURE
        }
        Reply::TransportFailure(message) => {
            eprintln!("{operation} failed: {message}");
            ExitCode::FAILURE
        }
    }
}

fn exit_code(completion: &Completion) -> ExitCode {
    match completion {
        Completion::Rendered => ExitCode::SUCCESS,
        Completion::Rejected(_) | Completion::Failed => ExitCode::FAILURE,
    }
}

fn chunk_heading(chunk: &RetrievedChunk) -> String {
    format!(
        "[{}{CITATION_SEPARATOR}{}] {}",
        basename(&chunk.source),
        chunk.page,
        chunk.title
    )
}

fn snippet(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
