use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use onemin_proxy::{build_router, AppState, ProxyConfig, SharedLogger};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use wiremock::matchers::{any, body_partial_json, header as header_eq, header_regex, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "test-key";

fn app_with(server_uri: &str, fallback: Option<&str>) -> Router {
    let mut config = ProxyConfig::default();
    config.upstream.base_url = server_uri.to_string();
    config.upstream.asset_base_url = format!("{server_uri}/files");

    build_router(Arc::new(AppState {
        config,
        http: reqwest::Client::new(),
        logger: SharedLogger::in_memory(),
        fallback_api_key: fallback.map(String::from),
        shutdown: CancellationToken::new(),
    }))
}

fn app(server: &MockServer) -> Router {
    app_with(&server.uri(), None)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {KEY}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {KEY}"))
        .body(Body::empty())
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn record(items: Value) -> Value {
    json!({ "aiRecord": { "aiRecordDetail": { "resultObject": items } } })
}

// ---------------------------------------------------------------------------
// Routing and auth
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health_needs_no_key() {
    let server = MockServer::start().await;
    let response = app(&server)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
        "nosniff"
    );
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["endpoints"]["openai"]
        .as_array()
        .unwrap()
        .contains(&json!("/v1/chat/completions")));
}

#[tokio::test]
async fn test_missing_key_is_rejected_before_upstream() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "hi"}]}).to_string(),
        ))
        .unwrap();
    let response = app(&server).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "authentication_error");
}

#[tokio::test]
async fn test_fallback_key_from_environment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/conversations"))
        .and(header_eq("API-KEY", "env-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"conversations": []})))
        .expect(1)
        .mount(&server)
        .await;

    let response = app_with(&server.uri(), Some("env-key"))
        .oneshot(
            Request::builder()
                .uri("/api/conversations")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"conversations": []}));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let server = MockServer::start().await;
    let response = app(&server)
        .oneshot(Request::builder().uri("/v2/nothing").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "Endpoint GET /v2/nothing not found");
    assert_eq!(body["error"]["type"], "invalid_request_error");
}

// ---------------------------------------------------------------------------
// Models and unsupported endpoints
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_models_list_and_retrieve() {
    let server = MockServer::start().await;
    let app = app(&server);

    let list = body_json(app.clone().oneshot(get("/v1/models")).await.unwrap()).await;
    assert_eq!(list["object"], "list");
    let ids: Vec<&str> = list["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m["id"].as_str())
        .collect();
    assert!(ids.contains(&"gpt-4o"));
    assert!(ids.contains(&"dall-e-3"));

    let found = app.clone().oneshot(get("/v1/models/gpt-4o")).await.unwrap();
    assert_eq!(found.status(), StatusCode::OK);
    assert_eq!(body_json(found).await["id"], "gpt-4o");

    let missing = app.oneshot(get("/v1/models/no-such-model")).await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(missing).await["error"]["type"], "not_found_error");
}

#[tokio::test]
async fn test_unsupported_endpoints_are_501() {
    let server = MockServer::start().await;
    let app = app(&server);

    for uri in ["/v1/embeddings", "/v1/images/edits"] {
        let response = app.clone().oneshot(post_json(uri, json!({}))).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED, "{uri}");
        assert_eq!(body_json(response).await["error"]["type"], "not_implemented");
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_chat_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/features"))
        .and(header_eq("API-KEY", KEY))
        .and(body_partial_json(json!({
            "type": "CHAT_WITH_AI",
            "model": "gpt-4o",
            "promptObject": { "isMixed": false, "webSearch": false },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(record(json!(["Hi ", "there"]))))
        .expect(1)
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(post_json(
            "/v1/chat/completions",
            json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": "Be brief."},
                    {"role": "user", "content": "Hello"}
                ]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["model"], "gpt-4o");
    assert!(body["id"].as_str().unwrap().starts_with("chatcmpl-"));
    assert_eq!(body["choices"][0]["message"]["role"], "assistant");
    assert_eq!(body["choices"][0]["message"]["content"], "Hi there");
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
}

#[tokio::test]
async fn test_chat_completion_stream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/features"))
        .and(query_param("isStreaming", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Hello from upstream"))
        .expect(1)
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(post_json(
            "/v1/chat/completions",
            json!({
                "model": "gpt-4o",
                "stream": true,
                "messages": [{"role": "user", "content": "Hello"}]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let text = String::from_utf8(body_bytes(response).await).unwrap();
    let payloads: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .collect();
    assert_eq!(payloads.last(), Some(&"[DONE]"));

    let chunks: Vec<Value> = payloads[..payloads.len() - 1]
        .iter()
        .map(|p| serde_json::from_str(p).unwrap())
        .collect();
    assert_eq!(chunks[0]["object"], "chat.completion.chunk");
    assert_eq!(chunks[0]["choices"][0]["delta"]["role"], "assistant");
    let content: String = chunks
        .iter()
        .filter_map(|c| c["choices"][0]["delta"]["content"].as_str())
        .collect();
    assert_eq!(content, "Hello from upstream");

    let last = chunks.last().unwrap();
    assert_eq!(last["choices"][0]["finish_reason"], "stop");
    assert!(chunks.iter().all(|c| c["id"] == chunks[0]["id"]));
}

#[tokio::test]
async fn test_upstream_error_is_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/features"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(post_json(
            "/v1/chat/completions",
            json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "hi"}]}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "api_error");
    assert!(body["error"]["message"].as_str().unwrap().contains("slow down"));
}

#[tokio::test]
async fn test_validation_errors() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let app = app(&server);

    let empty = app
        .clone()
        .oneshot(post_json(
            "/v1/chat/completions",
            json!({"model": "gpt-4o", "messages": []}),
        ))
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
    let body = body_json(empty).await;
    assert_eq!(body["error"]["type"], "invalid_request_error");
    assert!(body["error"]["details"].to_string().contains("messages"));

    let malformed = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/chat/completions")
                .header(header::AUTHORIZATION, format!("Bearer {KEY}"))
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(malformed).await["error"]["details"]["body"].is_string());
}

// ---------------------------------------------------------------------------
// Images and audio
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_image_generation_returns_asset_urls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/features"))
        .and(body_partial_json(json!({
            "type": "IMAGE_GENERATOR",
            "model": "dall-e-3",
            "promptObject": { "prompt": "a red fox", "num_outputs": 1, "aspect_ratio": "1:1" },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(record(json!([
            "images/fox.png",
            "https://cdn.example.com/fox2.png"
        ]))))
        .expect(1)
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(post_json(
            "/v1/images/generations",
            json!({"model": "dall-e-3", "prompt": "a red fox"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(
        body["data"][0]["url"],
        format!("{}/files/images/fox.png", server.uri())
    );
    assert_eq!(body["data"][1]["url"], "https://cdn.example.com/fox2.png");
}

#[tokio::test]
async fn test_speech_streams_generated_audio() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/features"))
        .and(body_partial_json(json!({ "type": "TEXT_TO_SPEECH" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(record(json!(["speech/out.mp3"]))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/speech/out.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xFB, 0x90, 0x00]))
        .expect(1)
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(post_json(
            "/v1/audio/speech",
            json!({"model": "tts-1", "input": "Hello", "voice": "alloy"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "audio/mpeg");
    assert_eq!(body_bytes(response).await, vec![0xFF, 0xFB, 0x90, 0x00]);
}

#[tokio::test]
async fn test_speech_without_audio_is_500() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/features"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(post_json("/v1/audio/speech", json!({"input": "Hello"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"]["message"], "No audio generated");
}

#[tokio::test]
async fn test_transcription_from_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/features"))
        .and(body_partial_json(json!({ "type": "SPEECH_TO_TEXT" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "hello world"})))
        .expect(2)
        .mount(&server)
        .await;
    let app = app(&server);

    let json_response = app
        .clone()
        .oneshot(post_json(
            "/v1/audio/transcriptions",
            json!({"file": "https://example.com/a.mp3"}),
        ))
        .await
        .unwrap();
    assert_eq!(json_response.status(), StatusCode::OK);
    assert_eq!(body_json(json_response).await, json!({"text": "hello world"}));

    let text_response = app
        .oneshot(post_json(
            "/v1/audio/transcriptions",
            json!({"file": "https://example.com/a.mp3", "response_format": "text"}),
        ))
        .await
        .unwrap();
    assert_eq!(body_bytes(text_response).await, b"hello world");
}

#[tokio::test]
async fn test_transcription_requires_a_file() {
    let server = MockServer::start().await;
    let response = app(&server)
        .oneshot(post_json("/v1/audio/transcriptions", json!({"model": "whisper-1"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"]["details"]
        .to_string()
        .contains("file"));
}

// ---------------------------------------------------------------------------
// Native routes
// ---------------------------------------------------------------------------

const BOUNDARY: &str = "X-ONEMIN-TEST-BOUNDARY";

fn multipart_upload(uri: &str, field: &str, filename: &str, mime: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {mime}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {KEY}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_asset_upload_is_forwarded_as_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/assets"))
        .and(header_eq("API-KEY", KEY))
        .and(header_regex("content-type", "^multipart/form-data"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"fileContent": {"path": "assets/cat.png"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(multipart_upload("/api/assets", "file", "cat.png", "image/png", b"\x89PNG"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["fileContent"]["path"],
        "assets/cat.png"
    );
}

#[tokio::test]
async fn test_asset_upload_without_file_is_400() {
    let server = MockServer::start().await;
    let response = app(&server)
        .oneshot(multipart_upload("/api/assets", "other", "cat.png", "image/png", b"\x89PNG"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_native_conversation_by_id() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/conversations/conv-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"deleted": true})))
        .expect(1)
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/conversations/conv-42")
                .header(header::AUTHORIZATION, format!("Bearer {KEY}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"deleted": true}));
}

#[tokio::test]
async fn test_native_image_route_returns_raw_envelope() {
    let server = MockServer::start().await;
    let envelope = record(json!(["images/cutout.png"]));
    Mock::given(method("POST"))
        .and(path("/api/features"))
        .and(body_partial_json(json!({
            "type": "BACKGROUND_REMOVER",
            "promptObject": { "imageUrl": "images/cat.png", "outputFormat": "png" },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(post_json(
            "/api/image/remove-background",
            json!({
                "model": "background-remover",
                "imageUrl": "images/cat.png",
                "extra": { "outputFormat": "png" }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, envelope);
}

#[tokio::test]
async fn test_native_feature_stream_passes_bytes_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/features"))
        .and(query_param("isStreaming", "true"))
        .and(body_partial_json(json!({ "type": "CHAT_WITH_AI" })))
        .respond_with(ResponseTemplate::new(200).set_body_string("raw upstream text"))
        .expect(1)
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(post_json(
            "/api/features/stream",
            json!({
                "type": "CHAT_WITH_AI",
                "model": "gpt-4o",
                "promptObject": { "prompt": "hi" }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );
    assert_eq!(body_bytes(response).await, b"raw upstream text");
}

// ---------------------------------------------------------------------------
// Multipart audio
// ---------------------------------------------------------------------------

const CLIP: &[u8] = b"ID3\x03\x00clip";

async fn mount_upload(server: &MockServer, envelope: Value) {
    Mock::given(method("POST"))
        .and(path("/api/assets"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_multipart_translation_uploads_then_forces_english() {
    let server = MockServer::start().await;
    mount_upload(&server, json!({"asset": {"key": "k/1.mp3"}})).await;
    Mock::given(method("POST"))
        .and(path("/api/features"))
        .and(body_partial_json(json!({
            "type": "SPEECH_TO_TEXT",
            "promptObject": { "audioUrl": "k/1.mp3", "language": "en" },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "hola"})))
        .expect(1)
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(multipart_upload(
            "/v1/audio/translations",
            "file",
            "clip.mp3",
            "audio/mpeg",
            CLIP,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"text": "hola"}));
}

#[tokio::test]
async fn test_multipart_transcription_prefers_file_content_path() {
    let server = MockServer::start().await;
    mount_upload(
        &server,
        json!({"fileContent": {"path": "uploads/2.mp3"}, "asset": {"key": "k/2.mp3"}}),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/features"))
        .and(body_partial_json(json!({
            "type": "SPEECH_TO_TEXT",
            "promptObject": { "audioUrl": "uploads/2.mp3" },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "hello"})))
        .expect(1)
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(multipart_upload(
            "/v1/audio/transcriptions",
            "file",
            "clip.mp3",
            "audio/mpeg",
            CLIP,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"text": "hello"}));
}

#[tokio::test]
async fn test_multipart_transcription_without_asset_reference_is_500() {
    let server = MockServer::start().await;
    mount_upload(&server, json!({"asset": {}})).await;
    Mock::given(method("POST"))
        .and(path("/api/features"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "unused"})))
        .expect(0)
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(multipart_upload(
            "/v1/audio/transcriptions",
            "file",
            "clip.mp3",
            "audio/mpeg",
            CLIP,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "server_error");
    assert_eq!(body["error"]["message"], "Uploaded asset has no usable reference");
}
