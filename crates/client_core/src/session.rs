use std::sync::Arc;

use shared::protocol::{HealthResponse, ReindexResponse, RetrieveResponse};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::{
    controller::{AskController, Completion, ExtractTextController, FetchConfigController},
    error::ValidationError,
    render::AnswerView,
    request::{build_retrieve_request, Endpoint, FormState, ImageFile},
    status::{Slot, StatusChannel},
    transport::{classify_by_body, Backend, BackendCall, Reply},
};

/// A single user gesture. Each one is handled by exactly one controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Ask(FormState),
    ExtractText(Vec<ImageFile>),
    FetchConfig,
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Action::Ask(_) => "ask",
            Action::ExtractText(_) => "extract_text",
            Action::FetchConfig => "fetch_config",
        }
    }
}

pub struct TutorSession {
    backend: Arc<dyn Backend>,
    status: StatusChannel,
    ask: Arc<AskController>,
    extract_text: Arc<ExtractTextController>,
    fetch_config: Arc<FetchConfigController>,
}

impl TutorSession {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self::with_status(backend, StatusChannel::new())
    }

    pub fn with_status(backend: Arc<dyn Backend>, status: StatusChannel) -> Self {
        Self {
            ask: Arc::new(AskController::new(backend.clone(), status.clone())),
            extract_text: Arc::new(ExtractTextController::new(
                backend.clone(),
                status.clone(),
            )),
            fetch_config: Arc::new(FetchConfigController::new(
                backend.clone(),
                status.clone(),
            )),
            backend,
            status,
        }
    }

    pub fn status(&self) -> &StatusChannel {
        &self.status
    }

    pub fn answer(&self) -> &Slot<AnswerView> {
        self.ask.output()
    }

    pub fn extracted_text(&self) -> &Slot<String> {
        self.extract_text.output()
    }

    pub fn config_text(&self) -> &Slot<String> {
        self.fetch_config.output()
    }

    /// Starts the controller for `action` on the current runtime without waiting for it.
    /// Earlier dispatches are neither cancelled nor awaited.
    pub fn dispatch(&self, action: Action) -> JoinHandle<Completion> {
        debug!(action = action.name(), "dispatching action");
        match action {
            Action::Ask(form) => {
                let ask = Arc::clone(&self.ask);
                tokio::spawn(async move { ask.run(&form).await })
            }
            Action::ExtractText(files) => {
                let extract_text = Arc::clone(&self.extract_text);
                tokio::spawn(async move { extract_text.run(&files).await })
            }
            Action::FetchConfig => {
                let fetch_config = Arc::clone(&self.fetch_config);
                tokio::spawn(async move { fetch_config.run().await })
            }
        }
    }

    pub async fn health(&self) -> Reply<HealthResponse> {
        classify_by_body(self.backend.send(BackendCall::empty(Endpoint::Health)).await)
    }

    pub async fn reindex(&self) -> Reply<ReindexResponse> {
        classify_by_body(self.backend.send(BackendCall::empty(Endpoint::Reindex)).await)
    }

    pub async fn retrieve(
        &self,
        query: &str,
        top_k: Option<&str>,
    ) -> Result<Reply<RetrieveResponse>, ValidationError> {
        let request = build_retrieve_request(query, top_k)?;
        let result = match BackendCall::json(Endpoint::Retrieve, &request) {
            Ok(call) => self.backend.send(call).await,
            Err(err) => Err(err),
        };
        Ok(classify_by_body(result))
    }
}
