use super::*;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use shared::{
    domain::{Language, Mode},
    protocol::{ChatRequest, ChatResponse, ConfigResponse, OcrResponse},
};
use std::sync::Arc;
use tokio::{
    net::TcpListener,
    sync::{oneshot, Mutex},
};

#[derive(Debug)]
struct UploadedPart {
    field: String,
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

#[derive(Clone)]
struct ServerState {
    chat_tx: Arc<Mutex<Option<oneshot::Sender<ChatRequest>>>>,
    upload_tx: Arc<Mutex<Option<oneshot::Sender<UploadedPart>>>>,
}

async fn handle_chat(
    State(state): State<ServerState>,
    Json(payload): Json<ChatRequest>,
) -> Json<serde_json::Value> {
    if let Some(tx) = state.chat_tx.lock().await.take() {
        let _ = tx.send(payload);
    }
    Json(json!({
        "answer": "V = IR",
        "sources": [{"source": "C:\\pdfs\\ohm.pdf", "page": 2, "title": "ohm", "chunk_id": "ohm-p2-c1"}],
        "error": null
    }))
}

async fn handle_ocr(
    State(state): State<ServerState>,
    mut multipart: Multipart,
) -> (StatusCode, Json<serde_json::Value>) {
    let Ok(Some(field)) = multipart.next_field().await else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "missing image"})),
        );
    };
    let part = UploadedPart {
        field: field.name().unwrap_or_default().to_string(),
        file_name: field.file_name().map(str::to_string),
        content_type: field.content_type().map(str::to_string),
        bytes: field.bytes().await.map(|b| b.to_vec()).unwrap_or_default(),
    };
    if let Some(tx) = state.upload_tx.lock().await.take() {
        let _ = tx.send(part);
    }
    (StatusCode::OK, Json(json!({"text": "R1 = 10 ohm"})))
}

async fn handle_config() -> Json<serde_json::Value> {
    Json(json!({"llm_provider": "ollama", "top_k": 5}))
}

async fn handle_broken_config() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "config file unreadable"})),
    )
}

struct TestServer {
    base_url: String,
    chat_rx: oneshot::Receiver<ChatRequest>,
    upload_rx: oneshot::Receiver<UploadedPart>,
}

async fn spawn_backend_server(prefix: &str) -> anyhow::Result<TestServer> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (chat_tx, chat_rx) = oneshot::channel();
    let (upload_tx, upload_rx) = oneshot::channel();
    let state = ServerState {
        chat_tx: Arc::new(Mutex::new(Some(chat_tx))),
        upload_tx: Arc::new(Mutex::new(Some(upload_tx))),
    };
    let api = Router::new()
        .route("/api/chat", post(handle_chat))
        .route("/api/ocr", post(handle_ocr))
        .route("/api/config", get(handle_config))
        .route("/api/broken", get(handle_broken_config))
        .with_state(state);
    let app = if prefix.is_empty() {
        api
    } else {
        Router::new().nest(prefix, api)
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(TestServer {
        base_url: format!("http://{addr}{prefix}"),
        chat_rx,
        upload_rx,
    })
}

#[test]
fn endpoint_urls_keep_base_path_prefix() {
    let backend = HttpBackend::new("http://tutor.local:8000/ee").expect("backend");
    assert_eq!(
        backend.endpoint_url(Endpoint::Chat).expect("url").as_str(),
        "http://tutor.local:8000/ee/api/chat"
    );

    let backend = HttpBackend::new("http://tutor.local:8000/").expect("backend");
    assert_eq!(
        backend.endpoint_url(Endpoint::Config).expect("url").as_str(),
        "http://tutor.local:8000/api/config"
    );
}

#[test]
fn invalid_base_url_is_rejected() {
    let err = HttpBackend::new("not a url").expect_err("must fail");
    assert!(matches!(err, TransportError::InvalidUrl { .. }));
}

#[tokio::test]
async fn chat_posts_json_payload() {
    let server = spawn_backend_server("").await.expect("spawn server");
    let backend = HttpBackend::new(&server.base_url).expect("backend");
    let request = ChatRequest {
        query: "What is Ohm's law?".into(),
        solution: String::new(),
        language: Language::En,
        show_steps: false,
        mode: Mode::Answer,
        top_k: 5,
    };

    let call = BackendCall::json(Endpoint::Chat, &request).expect("encode");
    let reply = classify_by_status::<ChatResponse>(backend.send(call).await);

    let received = server.chat_rx.await.expect("payload");
    assert_eq!(received, request);
    let Reply::Success(response) = reply else {
        panic!("expected a successful reply");
    };
    assert_eq!(response.answer.as_deref(), Some("V = IR"));
    assert_eq!(response.sources.len(), 1);
    assert_eq!(response.error, None);
}

#[tokio::test]
async fn ocr_uploads_image_field_as_multipart() {
    let server = spawn_backend_server("/tutor").await.expect("spawn server");
    let backend = HttpBackend::new(&server.base_url).expect("backend");
    let image = ImageFile::new("scan.png", Some("image/png".into()), b"png-bytes".to_vec());

    let reply =
        classify_by_body::<OcrResponse>(backend.send(BackendCall::image(Endpoint::Ocr, image)).await);

    let part = server.upload_rx.await.expect("upload");
    assert_eq!(part.field, "image");
    assert_eq!(part.file_name.as_deref(), Some("scan.png"));
    assert_eq!(part.content_type.as_deref(), Some("image/png"));
    assert_eq!(part.bytes, b"png-bytes");
    assert_eq!(
        reply,
        Reply::Success(OcrResponse {
            text: Some("R1 = 10 ohm".into()),
            error: None,
        })
    );
}

#[tokio::test]
async fn config_get_returns_raw_mapping() {
    let server = spawn_backend_server("").await.expect("spawn server");
    let backend = HttpBackend::new(&server.base_url).expect("backend");

    let reply = classify_by_failure_body::<ConfigResponse>(
        backend.send(BackendCall::empty(Endpoint::Config)).await,
    );
    let Reply::Success(config) = reply else {
        panic!("expected a successful reply");
    };
    assert_eq!(config.get("llm_provider"), Some(&json!("ollama")));
    assert_eq!(config.get("top_k"), Some(&json!(5)));
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let backend = HttpBackend::new(&format!("http://{addr}")).expect("backend");
    let err = backend
        .send(BackendCall::empty(Endpoint::Config))
        .await
        .expect_err("must fail");
    assert!(matches!(err, TransportError::Http { endpoint: "config", .. }));
}

#[test]
fn status_classification_ignores_failing_bodies() {
    let reply = classify_by_status::<ChatResponse>(Ok(RawReply::new(
        502,
        br#"{"error":"upstream down"}"#.to_vec(),
    )));
    assert_eq!(
        reply,
        Reply::ProtocolFailure {
            status: 502,
            detail: None
        }
    );
}

#[test]
fn body_classification_surfaces_error_field() {
    let reply = classify_by_body::<OcrResponse>(Ok(RawReply::new(
        400,
        br#"{"error":"unsupported image"}"#.to_vec(),
    )));
    assert_eq!(reply.failure_detail(), Some("unsupported image"));

    let reply = classify_by_body::<OcrResponse>(Ok(RawReply::new(
        200,
        br#"{"text":"partial","error":"tesseract missing"}"#.to_vec(),
    )));
    assert_eq!(reply.failure_detail(), Some("tesseract missing"));

    let reply = classify_by_body::<OcrResponse>(Ok(RawReply::new(500, b"oops".to_vec())));
    assert_eq!(
        reply,
        Reply::ProtocolFailure {
            status: 500,
            detail: None
        }
    );
}

#[test]
fn failure_body_classification_reads_error_only_on_failing_status() {
    let reply = classify_by_failure_body::<ConfigResponse>(Ok(RawReply::new(
        200,
        br#"{"mode":"fast","error":"none"}"#.to_vec(),
    )));
    let Reply::Success(config) = reply else {
        panic!("expected a successful reply");
    };
    assert_eq!(config.get("error"), Some(&json!("none")));

    let reply = classify_by_failure_body::<ConfigResponse>(Ok(RawReply::new(
        503,
        br#"{"error":"index not loaded"}"#.to_vec(),
    )));
    assert_eq!(reply.failure_detail(), Some("index not loaded"));
}

#[test]
fn malformed_success_body_is_a_failure_with_detail() {
    let reply = classify_by_body::<ConfigResponse>(Ok(RawReply::new(200, b"[1, 2]".to_vec())));
    let detail = reply.failure_detail().expect("detail");
    assert!(detail.starts_with("malformed response body"), "{detail}");
}

#[tokio::test]
async fn failing_config_body_detail_reaches_the_reply() {
    let server = spawn_backend_server("").await.expect("spawn server");
    let backend = HttpBackend::new(&server.base_url).expect("backend");
    let url = backend
        .base_url()
        .join("api/broken")
        .expect("url");
    let response = reqwest::get(url).await.expect("request");
    let status = response.status().as_u16();
    let body = response.bytes().await.expect("body").to_vec();

    let reply = classify_by_failure_body::<ConfigResponse>(Ok(RawReply { status, body }));
    assert_eq!(
        reply,
        Reply::ProtocolFailure {
            status: 500,
            detail: Some("config file unreadable".into())
        }
    );
}
