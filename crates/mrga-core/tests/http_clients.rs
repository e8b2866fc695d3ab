//! Catalog client and chat transport against a local axum server.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{stream, StreamExt};
use mrga_core::chat::ChatConsumer;
use mrga_core::reveal::RevealPace;
use mrga_core::{CatalogClient, ChatTransport, HttpChatTransport};
use mrga_proto::error::StreamTransportError;
use mrga_proto::protocol::{ChatRequest, Provider};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn streamed(chunks: Vec<&'static str>) -> Response {
    let body = Body::from_stream(stream::iter(
        chunks.into_iter().map(Ok::<_, std::io::Error>),
    ));
    (StatusCode::OK, body).into_response()
}

#[tokio::test]
async fn test_catalog_fetch_decodes_stations() {
    let app = Router::new().route(
        "/api/radio-stations",
        get(|| async {
            Json(json!([
                {
                    "id": 7,
                    "name": "Radio Paradise",
                    "description": null,
                    "country": "USA",
                    "city": "Paradise",
                    "genre": "Eclectic",
                    "language": "English",
                    "stream_url": "https://stream.radioparadise.com/mp3-128",
                    "website": null,
                    "image_url": null,
                    "frequency": null,
                    "tags": null,
                    "is_ai_generated": false
                }
            ]))
        }),
    );
    let base = serve(app).await;

    let stations = CatalogClient::new(reqwest::Client::new(), &base).fetch().await;
    assert_eq!(stations.len(), 1);
    assert_eq!(stations[0].id, 7);
    assert_eq!(stations[0].name, "Radio Paradise");
    assert!(stations[0].tags.is_empty());
}

#[tokio::test]
async fn test_catalog_falls_back_on_error_status() {
    let app = Router::new().route(
        "/api/radio-stations",
        get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let base = serve(app).await;
    let client = CatalogClient::new(reqwest::Client::new(), &base);

    assert!(client.try_fetch().await.is_err());
    let names: Vec<String> = client.fetch().await.iter().map(|s| s.name.clone()).collect();
    assert_eq!(names, vec!["BBC Radio 1", "KEXP 90.3 FM"]);
}

#[tokio::test]
async fn test_catalog_falls_back_on_bad_json() {
    let app = Router::new().route("/api/radio-stations", get(|| async { "not json" }));
    let base = serve(app).await;
    let stations = CatalogClient::new(reqwest::Client::new(), &base).fetch().await;
    assert_eq!(stations.len(), 2);
}

#[tokio::test]
async fn test_catalog_falls_back_when_unreachable() {
    // Bind then drop to get a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = CatalogClient::new(reqwest::Client::new(), &format!("http://{}", addr));
    assert_eq!(client.fetch().await.len(), 2);
}

#[tokio::test]
async fn test_transport_streams_body_and_sends_provider() {
    let seen: Arc<Mutex<Option<ChatRequest>>> = Arc::default();
    let app = Router::new()
        .route(
            "/api/ai/chat-stream",
            post(
                |State(seen): State<Arc<Mutex<Option<ChatRequest>>>>,
                 Json(req): Json<ChatRequest>| async move {
                    *seen.lock().await = Some(req);
                    streamed(vec!["Hello ", "world"])
                },
            ),
        )
        .with_state(seen.clone());
    let base = serve(app).await;

    let transport = HttpChatTransport::new(reqwest::Client::new(), &format!("{}/", base));
    assert_eq!(transport.endpoint(), format!("{}/api/ai/chat-stream", base));

    let mut stream = transport.open("lofi beats", Provider::OpenAi).await.unwrap();
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        body.extend(chunk.unwrap());
    }
    assert_eq!(String::from_utf8(body).unwrap(), "Hello world");

    let req = seen.lock().await.clone().unwrap();
    assert_eq!(req.prompt, "lofi beats");
    assert_eq!(req.provider, Provider::OpenAi);
}

#[tokio::test]
async fn test_transport_non_success_status() {
    let app = Router::new().route(
        "/api/ai/chat-stream",
        post(|| async { StatusCode::SERVICE_UNAVAILABLE }),
    );
    let base = serve(app).await;
    let transport = HttpChatTransport::new(reqwest::Client::new(), &base);

    match transport.open("hi", Provider::DeepSeek).await {
        Err(StreamTransportError::Status(code)) => assert_eq!(code, 503),
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("expected an error status"),
    }
}

#[tokio::test]
async fn test_consumer_over_http_matches_catalog() {
    let app = Router::new().route(
        "/api/ai/chat-stream",
        post(|| async {
            streamed(vec![
                "Hello ",
                "world RECOMMENDED_STATIONS: BBC Radio 1, KEXP",
            ])
        }),
    );
    let base = serve(app).await;
    let catalog: Vec<_> = mrga_proto::fallback::fallback_stations()
        .into_iter()
        .map(Arc::new)
        .collect();

    let transport = Arc::new(HttpChatTransport::new(reqwest::Client::new(), &base));
    let pace = RevealPace {
        step_chars: 64,
        interval: std::time::Duration::from_millis(1),
    };
    let mut chat = ChatConsumer::new(transport, Provider::DeepSeek, pace);
    chat.submit("surprise me");
    while chat.is_streaming() {
        chat.pump(&catalog).await;
    }

    assert_eq!(chat.messages().last().unwrap().text, "Hello world");
    let names: Vec<&str> = chat.recommended().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["BBC Radio 1", "KEXP 90.3 FM"]);
}
