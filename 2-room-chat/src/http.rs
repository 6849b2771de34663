use std::future::Future;

use anyhow::Result;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use room_hub::{HubHandle, HubStats, RoomSummary};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Read-only reporting routes over the hub's room table.
pub fn router(hub: HubHandle) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/rooms", get(list_rooms))
        .route("/rooms/:id", get(show_room))
        .route("/stats", get(stats))
        .layer(TraceLayer::new_for_http())
        .with_state(hub)
}

pub async fn serve<F>(listener: TcpListener, hub: HubHandle, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(hub))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn list_rooms(State(hub): State<HubHandle>) -> Json<Vec<RoomSummary>> {
    Json(hub.rooms().await)
}

async fn show_room(State(hub): State<HubHandle>, Path(id): Path<String>) -> Response {
    match hub.room(&id).await {
        Some(room) => Json(room).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "room not found" })),
        )
            .into_response(),
    }
}

async fn stats(State(hub): State<HubHandle>) -> Json<HubStats> {
    Json(hub.stats().await)
}
