//! Operator-facing JSON façade.
//!
//! | Route                   | Body                          |
//! |-------------------------|-------------------------------|
//! | `GET  /ping`            |                               |
//! | `GET  /v1/cluster`      |                               |
//! | `POST /v1/presentation` | partial presentation settings |
//! | `POST /v1/announcement` | announcement                  |
//!
//! Malformed JSON is answered with `400` before anything reaches the
//! coordinator.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tracing::info;
use tw_core::{Announcement, PresentationSettingsPatch};

use super::{AppError, AppState};

pub fn admin_router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/v1/cluster", get(cluster))
        .route("/v1/presentation", post(presentation))
        .route("/v1/announcement", post(announcement))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn ping() -> Json<Value> {
    Json(json!({ "message": "pong" }))
}

async fn cluster(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "cluster": state.coordinator.cluster() }))
}

async fn presentation(
    State(state): State<AppState>,
    payload: Result<Json<PresentationSettingsPatch>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(patch) = payload?;
    info!("[admin] presentation update");
    let settings = state.coordinator.update_presentation_settings(patch)?;
    Ok(Json(json!({ "done": true, "results": settings })))
}

async fn announcement(
    State(state): State<AppState>,
    payload: Result<Json<Announcement>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(announcement) = payload?;
    let announcement = state.coordinator.announce(announcement)?;
    Ok(Json(json!({ "done": true, "results": announcement })))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::net::TcpListener;
    use tw_core::PresentationSettings;
    use tw_core::supervisor::ShutdownSignal;
    use tw_core::ws::KeepAlive;

    use super::*;
    use crate::coordinator::{Coordinator, CoordinatorConfig};
    use crate::server::serve;

    async fn start() -> (String, AppState) {
        let shutdown = ShutdownSignal::new();
        let state = AppState {
            coordinator: Arc::new(Coordinator::new(CoordinatorConfig::default(), PresentationSettings::default())),
            source: None,
            keepalive: KeepAlive::default(),
            shutdown: shutdown.clone(),
        };
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(serve(listener, admin_router(state.clone()), "admin", shutdown));
        (base, state)
    }

    #[tokio::test]
    async fn ping_and_cluster() {
        let (base, _state) = start().await;
        let pong: Value = reqwest::get(format!("{base}/ping")).await.unwrap().json().await.unwrap();
        assert_eq!(pong["message"], "pong");

        let body: Value = reqwest::get(format!("{base}/v1/cluster")).await.unwrap().json().await.unwrap();
        assert_eq!(body["cluster"]["settings"]["ticker_box_width"], 1300);
    }

    #[tokio::test]
    async fn presentation_patch_is_merged() {
        let (base, state) = start().await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/v1/presentation"))
            .json(&json!({ "scroll_speed": 8 }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(state.coordinator.settings().scroll_speed, 8);
        assert_eq!(state.coordinator.settings().ticker_box_width, 1300);
    }

    #[tokio::test]
    async fn malformed_json_is_400() {
        let (base, state) = start().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/v1/presentation"))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "BAD_REQUEST");

        let resp = client
            .post(format!("{base}/v1/presentation"))
            .json(&json!({ "ticker_box_width": 0 }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        assert_eq!(state.coordinator.settings(), PresentationSettings::default());
    }

    #[tokio::test]
    async fn announcement_is_stamped() {
        let (base, _state) = start().await;
        let body: Value = reqwest::Client::new()
            .post(format!("{base}/v1/announcement"))
            .json(&json!({ "message": "hello", "lifespan_ms": 3000, "kind": "success" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["done"], true);
        assert!(body["results"]["show_at_timestamp_ms"].as_i64().unwrap() > 0);
    }
}
