//! Local control API for the browser front-end.
//!
//! Handlers only forward a `SessionEvent` to the core; state is read back from
//! the snapshot published by the core.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use mrga_core::session::{SessionSnapshot, StateManager};
use mrga_core::SessionEvent;
use mrga_proto::protocol::{FilterCriteria, Provider};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// Origins of the front-end dev servers.
const ALLOWED_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://localhost:5173"];

#[derive(Clone)]
struct HttpState {
    state_manager: Arc<StateManager>,
    event_tx: mpsc::Sender<SessionEvent>,
}

#[derive(Debug, Deserialize)]
struct ChatBody {
    prompt: String,
    #[serde(default)]
    provider: Option<Provider>,
}

pub fn router(state_manager: Arc<StateManager>, event_tx: mpsc::Sender<SessionEvent>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(ALLOWED_ORIGINS.map(HeaderValue::from_static))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/play/:id", post(play_station))
        .route("/api/toggle", post(toggle))
        .route("/api/retry", post(retry))
        .route("/api/volume/:volume", post(set_volume))
        .route("/api/mute/:on", post(set_muted))
        .route("/api/close", post(close))
        .route("/api/chat", post(chat))
        .route("/api/recommendations/clear", post(clear_recommendations))
        .route("/api/filter", post(set_filter))
        .route("/api/more", post(load_more))
        .route("/api/marker-visible", post(marker_visible))
        .route("/api/catalog/reload", post(reload_catalog))
        .layer(cors)
        .with_state(HttpState {
            state_manager,
            event_tx,
        })
}

pub fn start_server(
    bind_address: String,
    port: u16,
    state_manager: Arc<StateManager>,
    event_tx: mpsc::Sender<SessionEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(state_manager, event_tx);

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

async fn forward(state: &HttpState, event: SessionEvent) -> StatusCode {
    if state.event_tx.send(event).await.is_err() {
        error!("HTTP API: session loop is gone");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::ACCEPTED
}

async fn get_state(State(state): State<HttpState>) -> Result<Json<SessionSnapshot>, StatusCode> {
    state
        .state_manager
        .get_state()
        .await
        .map(Json)
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)
}

async fn play_station(State(state): State<HttpState>, Path(id): Path<u64>) -> StatusCode {
    info!("HTTP API: Play station {}", id);
    forward(&state, SessionEvent::Select(id)).await
}

async fn toggle(State(state): State<HttpState>) -> StatusCode {
    forward(&state, SessionEvent::TogglePlayPause).await
}

async fn retry(State(state): State<HttpState>) -> StatusCode {
    info!("HTTP API: Retry");
    forward(&state, SessionEvent::Retry).await
}

async fn set_volume(State(state): State<HttpState>, Path(volume): Path<i32>) -> StatusCode {
    let volume = volume.clamp(0, 100) as u8;
    forward(&state, SessionEvent::SetVolume(volume)).await
}

async fn set_muted(State(state): State<HttpState>, Path(on): Path<bool>) -> StatusCode {
    forward(&state, SessionEvent::SetMuted(on)).await
}

async fn close(State(state): State<HttpState>) -> StatusCode {
    info!("HTTP API: Close player");
    forward(&state, SessionEvent::ClosePlayer).await
}

async fn chat(State(state): State<HttpState>, Json(body): Json<ChatBody>) -> StatusCode {
    if let Some(provider) = body.provider {
        let status = forward(&state, SessionEvent::SetProvider(provider)).await;
        if status != StatusCode::ACCEPTED {
            return status;
        }
    }
    forward(&state, SessionEvent::Submit { prompt: body.prompt }).await
}

async fn clear_recommendations(State(state): State<HttpState>) -> StatusCode {
    forward(&state, SessionEvent::ClearRecommendations).await
}

async fn set_filter(
    State(state): State<HttpState>,
    Json(criteria): Json<FilterCriteria>,
) -> StatusCode {
    forward(&state, SessionEvent::SetFilter(criteria)).await
}

async fn load_more(State(state): State<HttpState>) -> StatusCode {
    forward(&state, SessionEvent::LoadMore).await
}

async fn marker_visible(State(state): State<HttpState>) -> StatusCode {
    forward(&state, SessionEvent::MarkerVisible).await
}

async fn reload_catalog(State(state): State<HttpState>) -> StatusCode {
    info!("HTTP API: Reload catalog");
    forward(&state, SessionEvent::ReloadCatalog).await
}
