use std::sync::Arc;

use shared::protocol::{ChatResponse, ConfigResponse, OcrResponse};
use tracing::{debug, info, warn};

use crate::{
    error::ValidationError,
    render::{
        failure_message, render_chat, render_config, render_ocr, AnswerView,
        CONFIG_FAILURE_PREFIX, CONFIG_GENERIC_FAILURE, OCR_FAILURE_PREFIX, OCR_GENERIC_FAILURE,
    },
    request::{build_chat_request, build_ocr_request, Endpoint, FormState, ImageFile},
    status::{Slot, StatusChannel},
    transport::{
        classify_by_body, classify_by_failure_body, classify_by_status, Backend, BackendCall, Reply,
    },
};

pub const THINKING: &str = "Thinking...";
pub const ASK_FAILED: &str = "Error. Check backend logs.";
pub const EXTRACTING: &str = "Extracting text...";
pub const OCR_FAILED: &str = "OCR failed.";
pub const LOADING_CONFIG: &str = "Loading config...";
pub const CONFIG_FAILED: &str = "Config load failed.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Validating,
    InFlight,
    Rendering,
}

/// How a single controller run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Validation failed; nothing was sent.
    Rejected(ValidationError),
    Rendered,
    Failed,
}

fn enter(controller: &'static str, phase: Phase) {
    debug!(controller, ?phase, "controller phase");
}

pub struct AskController {
    backend: Arc<dyn Backend>,
    status: StatusChannel,
    output: Slot<AnswerView>,
}

impl AskController {
    pub fn new(backend: Arc<dyn Backend>, status: StatusChannel) -> Self {
        Self {
            backend,
            status,
            output: Slot::default(),
        }
    }

    pub fn output(&self) -> &Slot<AnswerView> {
        &self.output
    }

    pub async fn run(&self, form: &FormState) -> Completion {
        enter("ask", Phase::Validating);
        let request = match build_chat_request(form) {
            Ok(request) => request,
            Err(err) => {
                self.status.set(err.to_string());
                enter("ask", Phase::Idle);
                return Completion::Rejected(err);
            }
        };

        self.status.set(THINKING);
        self.output.set(AnswerView::default());

        enter("ask", Phase::InFlight);
        let result = match BackendCall::json(Endpoint::Chat, &request) {
            Ok(call) => self.backend.send(call).await,
            Err(err) => Err(err),
        };
        let reply = classify_by_status::<ChatResponse>(result);

        enter("ask", Phase::Rendering);
        let completion = match reply {
            Reply::Success(response) => {
                let view = render_chat(&response);
                info!(
                    citations = view.citations.len(),
                    warning = !view.error.is_empty(),
                    "answer rendered"
                );
                self.output.set(view);
                self.status.clear();
                Completion::Rendered
            }
            Reply::ProtocolFailure { status, detail } => {
                warn!(status, detail = detail.as_deref().unwrap_or(""), "chat request failed");
                self.status.set(ASK_FAILED);
                Completion::Failed
            }
            Reply::TransportFailure(error) => {
                warn!(%error, "chat request did not complete");
                self.status.set(ASK_FAILED);
                Completion::Failed
            }
        };
        enter("ask", Phase::Idle);
        completion
    }
}

pub struct ExtractTextController {
    backend: Arc<dyn Backend>,
    status: StatusChannel,
    output: Slot<String>,
}

impl ExtractTextController {
    pub fn new(backend: Arc<dyn Backend>, status: StatusChannel) -> Self {
        Self {
            backend,
            status,
            output: Slot::default(),
        }
    }

    pub fn output(&self) -> &Slot<String> {
        &self.output
    }

    pub async fn run(&self, files: &[ImageFile]) -> Completion {
        enter("extract_text", Phase::Validating);
        let request = match build_ocr_request(files) {
            Ok(request) => request,
            Err(err) => {
                self.output.set(err.to_string());
                enter("extract_text", Phase::Idle);
                return Completion::Rejected(err);
            }
        };

        self.status.set(EXTRACTING);
        self.output.set(String::new());

        enter("extract_text", Phase::InFlight);
        let call = BackendCall::image(Endpoint::Ocr, request.image);
        let reply = classify_by_body::<OcrResponse>(self.backend.send(call).await);

        enter("extract_text", Phase::Rendering);
        let completion = match reply {
            Reply::Success(response) => {
                self.output.set(render_ocr(&response));
                self.status.clear();
                Completion::Rendered
            }
            failure => {
                let message =
                    failure_message(OCR_FAILURE_PREFIX, failure.failure_detail(), OCR_GENERIC_FAILURE);
                warn!(%message, "ocr request failed");
                self.output.set(message);
                self.status.set(OCR_FAILED);
                Completion::Failed
            }
        };
        enter("extract_text", Phase::Idle);
        completion
    }
}

pub struct FetchConfigController {
    backend: Arc<dyn Backend>,
    status: StatusChannel,
    output: Slot<String>,
}

impl FetchConfigController {
    pub fn new(backend: Arc<dyn Backend>, status: StatusChannel) -> Self {
        Self {
            backend,
            status,
            output: Slot::default(),
        }
    }

    pub fn output(&self) -> &Slot<String> {
        &self.output
    }

    pub async fn run(&self) -> Completion {
        // No request body, so nothing to validate.
        self.status.set(LOADING_CONFIG);
        self.output.set(String::new());

        enter("fetch_config", Phase::InFlight);
        let reply = classify_by_failure_body::<ConfigResponse>(
            self.backend.send(BackendCall::empty(Endpoint::Config)).await,
        );

        enter("fetch_config", Phase::Rendering);
        let completion = match reply {
            Reply::Success(config) => {
                debug!(keys = config.len(), "config rendered");
                self.output.set(render_config(&config));
                self.status.clear();
                Completion::Rendered
            }
            failure => {
                let message = failure_message(
                    CONFIG_FAILURE_PREFIX,
                    failure.failure_detail(),
                    CONFIG_GENERIC_FAILURE,
                );
                warn!(%message, "config request failed");
                self.output.set(message);
                self.status.set(CONFIG_FAILED);
                Completion::Failed
            }
        };
        enter("fetch_config", Phase::Idle);
        completion
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
