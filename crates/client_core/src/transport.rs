use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client};
use serde::{de::DeserializeOwned, Serialize};
use shared::error::ErrorBody;
use tracing::debug;
use url::Url;

use crate::{
    error::TransportError,
    request::{Endpoint, ImageFile, OCR_FIELD},
};

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Image(ImageFile),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendCall {
    pub endpoint: Endpoint,
    pub body: RequestBody,
}

impl BackendCall {
    pub fn empty(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            body: RequestBody::Empty,
        }
    }

    pub fn json<T: Serialize>(endpoint: Endpoint, payload: &T) -> Result<Self, TransportError> {
        let value = serde_json::to_value(payload).map_err(|source| TransportError::Encode {
            endpoint: endpoint.name(),
            source,
        })?;
        Ok(Self {
            endpoint,
            body: RequestBody::Json(value),
        })
    }

    pub fn image(endpoint: Endpoint, image: ImageFile) -> Self {
        Self {
            endpoint,
            body: RequestBody::Image(image),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawReply {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn send(&self, call: BackendCall) -> Result<RawReply, TransportError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply<T> {
    Success(T),
    ProtocolFailure { status: u16, detail: Option<String> },
    TransportFailure(String),
}

impl<T> Reply<T> {
    pub fn failure_detail(&self) -> Option<&str> {
        match self {
            Reply::Success(_) => None,
            Reply::ProtocolFailure { detail, .. } => detail.as_deref(),
            Reply::TransportFailure(message) => Some(message.as_str()),
        }
    }
}

/// Status is checked before the body is read; failing replies carry no detail.
pub fn classify_by_status<T: DeserializeOwned>(
    result: Result<RawReply, TransportError>,
) -> Reply<T> {
    let reply = match result {
        Ok(reply) => reply,
        Err(err) => return Reply::TransportFailure(err.to_string()),
    };
    if !reply.is_success() {
        return Reply::ProtocolFailure {
            status: reply.status,
            detail: None,
        };
    }
    parse_success(reply)
}

/// The body is inspected regardless of status. A non-empty `error` field wins over both the
/// payload and the status code.
pub fn classify_by_body<T: DeserializeOwned>(
    result: Result<RawReply, TransportError>,
) -> Reply<T> {
    classify_with_error_field(result, true)
}

/// Like [`classify_by_body`], but a 2xx body is opaque: an `error` key in it is payload.
pub fn classify_by_failure_body<T: DeserializeOwned>(
    result: Result<RawReply, TransportError>,
) -> Reply<T> {
    classify_with_error_field(result, false)
}

fn classify_with_error_field<T: DeserializeOwned>(
    result: Result<RawReply, TransportError>,
    error_wins_on_success: bool,
) -> Reply<T> {
    let reply = match result {
        Ok(reply) => reply,
        Err(err) => return Reply::TransportFailure(err.to_string()),
    };
    if error_wins_on_success || !reply.is_success() {
        if let Some(detail) = ErrorBody::detail_from_slice(&reply.body) {
            return Reply::ProtocolFailure {
                status: reply.status,
                detail: Some(detail),
            };
        }
    }
    if !reply.is_success() {
        return Reply::ProtocolFailure {
            status: reply.status,
            detail: None,
        };
    }
    parse_success(reply)
}

fn parse_success<T: DeserializeOwned>(reply: RawReply) -> Reply<T> {
    match serde_json::from_slice(&reply.body) {
        Ok(parsed) => Reply::Success(parsed),
        Err(err) => Reply::ProtocolFailure {
            status: reply.status,
            detail: Some(format!("malformed response body: {err}")),
        },
    }
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| TransportError::Http {
                endpoint: "client",
                source,
            })?;
        Self::with_client(http, base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self, TransportError> {
        let mut base_url = Url::parse(base_url).map_err(|source| TransportError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoint_url(&self, endpoint: Endpoint) -> Result<Url, TransportError> {
        let relative = endpoint.path().trim_start_matches('/');
        self.base_url
            .join(relative)
            .map_err(|source| TransportError::InvalidUrl {
                url: format!("{}{relative}", self.base_url),
                source,
            })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn send(&self, call: BackendCall) -> Result<RawReply, TransportError> {
        let endpoint = call.endpoint;
        let url = self.endpoint_url(endpoint)?;
        let http_error = |source| TransportError::Http {
            endpoint: endpoint.name(),
            source,
        };

        let builder = self.http.request(endpoint.method(), url);
        let builder = match call.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Image(image) => {
                let mut part = multipart::Part::bytes(image.bytes).file_name(image.file_name);
                if let Some(mime_type) = image.mime_type.as_deref() {
                    part = part.mime_str(mime_type).map_err(http_error)?;
                }
                builder.multipart(multipart::Form::new().part(OCR_FIELD, part))
            }
        };

        let response = builder.send().await.map_err(|err| {
            debug!(endpoint = endpoint.name(), error = %err, "backend request did not complete");
            http_error(err)
        })?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(http_error)?.to_vec();
        debug!(
            endpoint = endpoint.name(),
            status,
            bytes = body.len(),
            "backend replied"
        );
        Ok(RawReply { status, body })
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
