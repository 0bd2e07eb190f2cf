//! Providers against a local HTTP server speaking each wire format.

use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use scopeforge_core::{GenerationOptions, TextGenerator};
use scopeforge_providers::{GeminiClient, OpenAICompatibleClient, ProviderRouter};

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn chat_completions(Json(body): Json<Value>) -> Json<Value> {
    let prompt = body["messages"][1]["content"].as_str().unwrap_or_default();
    Json(json!({
        "choices": [{"message": {"role": "assistant", "content": format!("echo: {}", prompt)}}],
        "usage": {"total_tokens": 12}
    }))
}

async fn generate_content(Path(call): Path<String>, Json(body): Json<Value>) -> Json<Value> {
    let tokens = &body["generationConfig"]["maxOutputTokens"];
    Json(json!({
        "candidates": [{"content": {"role": "model", "parts": [
            {"text": format!("{} ", call)},
            {"text": format!("max={}", tokens)}
        ]}}]
    }))
}

async fn unavailable() -> (StatusCode, &'static str) {
    (StatusCode::SERVICE_UNAVAILABLE, "overloaded")
}

#[tokio::test]
async fn openai_compatible_round_trip() {
    let base = serve(Router::new().route("/v1/chat/completions", post(chat_completions))).await;
    let client = OpenAICompatibleClient::new("Local", Some("sk-test".into()), format!("{}/v1", base), "qwen");

    let text = client
        .generate("scope this project", GenerationOptions::new())
        .await
        .unwrap();
    assert_eq!(text, "echo: scope this project");
}

#[tokio::test]
async fn gemini_joins_candidate_parts() {
    let base = serve(Router::new().route("/v1beta/models/:call", post(generate_content))).await;
    let client = GeminiClient::new("g-test".into(), "gemini-1.5-flash")
        .with_base_url(format!("{}/v1beta", base));

    let text = client
        .generate("hi", GenerationOptions::new().with_max_tokens(64))
        .await
        .unwrap();
    assert_eq!(text, "gemini-1.5-flash:generateContent max=64");
}

#[tokio::test]
async fn router_skips_a_failing_endpoint() {
    let base = serve(
        Router::new()
            .route("/down/chat/completions", post(unavailable))
            .route("/up/chat/completions", post(chat_completions)),
    )
    .await;

    let down: Arc<dyn TextGenerator> =
        Arc::new(OpenAICompatibleClient::new("Down", None, format!("{}/down", base), "m"));
    let up: Arc<dyn TextGenerator> =
        Arc::new(OpenAICompatibleClient::new("Up", None, format!("{}/up", base), "m"));
    let router = ProviderRouter::from_generators(vec![("down".into(), down), ("up".into(), up)]).unwrap();

    let text = router.generate("ping", GenerationOptions::new()).await.unwrap();
    assert_eq!(text, "echo: ping");
}

#[tokio::test]
async fn api_errors_carry_status_and_body() {
    let base = serve(Router::new().route("/chat/completions", post(unavailable))).await;
    let client = OpenAICompatibleClient::new("Flaky", None, base, "m");

    let err = client
        .generate("ping", GenerationOptions::new())
        .await
        .unwrap_err()
        .to_string();
    assert!(err.contains("503"));
    assert!(err.contains("overloaded"));
}

#[test]
fn config_file_is_read_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("llm.json");
    std::fs::write(
        &path,
        r#"{"default": "local", "providers": {"local": {"type": "openai_compatible", "base_url": "http://127.0.0.1:1/v1", "model": "m"}}}"#,
    )
    .unwrap();

    let config = ProviderRouter::read_config(&path).unwrap();
    assert_eq!(config.default.as_deref(), Some("local"));
    let router = ProviderRouter::from_config(config, &|_: &str| -> Option<String> { None }).unwrap();
    assert_eq!(router.provider_names(), vec!["local"]);

    std::fs::write(&path, "{not json").unwrap();
    assert!(ProviderRouter::read_config(&path).is_err());
}
