//! Follower-facing RPC server.
//!
//! | Call                 | HTTP                              |
//! |----------------------|-----------------------------------|
//! | Join (stream)        | `GET    /rpc/join` (websocket)    |
//! | GetTickers           | `GET    /rpc/tickers`             |
//! | GetCluster           | `GET    /rpc/cluster`             |
//! | UpdateScreen         | `PUT    /rpc/screen`              |
//! | RemoveScreen         | `DELETE /rpc/screen/{uuid}`       |
//! | Announce             | `POST   /rpc/announce`            |
//! | UpdatePresentation   | `POST   /rpc/presentation`        |
//! | AddTicker            | `POST   /rpc/tickers/{symbol}`    |
//! | RemoveTicker         | `DELETE /rpc/tickers/{symbol}`    |
//!
//! On the join websocket the first client text frame is the joining
//! [`Screen`]; every server text frame after that is one [`Update`]. The
//! leader pings on [`KeepAlive::ping_interval`] and drops a screen it has
//! heard nothing from (pongs included) for [`KeepAlive::idle_timeout`].
//!
//! Close codes: `1000` removed by an operator, `1001` leader shutting down,
//! `1002` bad handshake, `1008` join refused, `1013` update queue overflow.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use tw_core::supervisor::ShutdownSignal;
use tw_core::ws::KeepAlive;
use tw_core::{Announcement, PresentationSettings, PresentationSettingsPatch, Screen, ScreenCluster, Ticker, Update};

use super::{AppError, AppState};
use uuid::Uuid;

use crate::coordinator::{Coordinator, Departure};
use crate::feed::ReferenceSource;

/// How long a new websocket may take to introduce its screen.
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

pub fn rpc_router(state: AppState) -> Router {
    Router::new()
        .route("/rpc/join", get(join))
        .route("/rpc/tickers", get(tickers))
        .route("/rpc/cluster", get(cluster))
        .route("/rpc/screen", put(update_screen))
        .route("/rpc/screen/{uuid}", delete(remove_screen))
        .route("/rpc/announce", post(announce))
        .route("/rpc/presentation", post(update_presentation))
        .route("/rpc/tickers/{symbol}", post(add_ticker).delete(remove_ticker))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn tickers(State(state): State<AppState>) -> Json<Vec<Ticker>> {
    Json(state.coordinator.tickers())
}

async fn cluster(State(state): State<AppState>) -> Json<ScreenCluster> {
    Json(state.coordinator.cluster())
}

async fn update_screen(
    State(state): State<AppState>,
    payload: Result<Json<Screen>, JsonRejection>,
) -> Result<Json<Screen>, AppError> {
    let Json(screen) = payload?;
    Ok(Json(state.coordinator.update_screen(screen)?))
}

async fn remove_screen(State(state): State<AppState>, Path(uuid): Path<Uuid>) -> Result<Json<Screen>, AppError> {
    Ok(Json(state.coordinator.leave(uuid)?))
}

async fn announce(
    State(state): State<AppState>,
    payload: Result<Json<Announcement>, JsonRejection>,
) -> Result<Json<Announcement>, AppError> {
    let Json(announcement) = payload?;
    Ok(Json(state.coordinator.announce(announcement)?))
}

async fn update_presentation(
    State(state): State<AppState>,
    payload: Result<Json<PresentationSettingsPatch>, JsonRejection>,
) -> Result<Json<PresentationSettings>, AppError> {
    let Json(patch) = payload?;
    Ok(Json(state.coordinator.update_presentation_settings(patch)?))
}

async fn add_ticker(State(state): State<AppState>, Path(symbol): Path<String>) -> Result<Json<Ticker>, AppError> {
    let ticker = state.coordinator.add_ticker(Ticker::new(symbol))?;
    if let Some(source) = state.source.clone() {
        tokio::spawn(load_reference(state.coordinator.clone(), source, ticker.symbol.clone()));
    }
    Ok(Json(ticker))
}

async fn remove_ticker(State(state): State<AppState>, Path(symbol): Path<String>) -> Result<Json<Ticker>, AppError> {
    Ok(Json(state.coordinator.remove_ticker(&symbol)?))
}

/// Fill in reference data for a ticker added at runtime.
async fn load_reference(coordinator: Arc<Coordinator>, source: Arc<dyn ReferenceSource>, symbol: String) {
    match source.load_ticker(&symbol).await {
        Ok(reference) => {
            if let Err(e) = coordinator.refresh_ticker(&reference) {
                debug!("[rpc] {symbol}: {e}");
            }
        }
        Err(e) => warn!("[rpc] reference data for {symbol} failed: {e}"),
    }
}

// ---------------------------------------------------------------------------
// Join stream
// ---------------------------------------------------------------------------

async fn join(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_screen(socket, state.coordinator, state.keepalive, state.shutdown))
}

async fn serve_screen(
    mut socket: WebSocket,
    coordinator: Arc<Coordinator>,
    keepalive: KeepAlive,
    shutdown: ShutdownSignal,
) {
    let screen = match read_screen(&mut socket).await {
        Ok(screen) => screen,
        Err(reason) => {
            warn!("[rpc] join rejected: {reason}");
            close(socket, close_code::PROTOCOL, reason).await;
            return;
        }
    };

    let mut subscription = match coordinator.join(screen) {
        Ok(sub) => sub,
        Err(e) => {
            warn!("[rpc] join rejected: {e}");
            close(socket, close_code::POLICY, e.to_string()).await;
            return;
        }
    };
    let uuid = subscription.uuid();
    let mut ping = keepalive.ticker();
    let mut liveness = keepalive.liveness();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                close(socket, close_code::AWAY, "leader shutting down".into()).await;
                return;
            }

            update = subscription.recv() => {
                let Some(update) = update else {
                    let (code, reason) = match subscription.departure() {
                        Some(Departure::Overflow) => (close_code::AGAIN, "update queue overflow"),
                        Some(Departure::Removed) | None => (close_code::NORMAL, "removed from cluster"),
                    };
                    info!("[rpc] screen {uuid} dropped by leader: {reason}");
                    close(socket, code, reason.into()).await;
                    return;
                };
                if let Err(e) = send_update(&mut socket, &update).await {
                    debug!("[rpc] screen {uuid} send failed: {e}");
                    break;
                }
            }

            _ = ping.tick() => {
                if let Err(e) = socket.send(Message::Ping(Vec::new().into())).await {
                    debug!("[rpc] screen {uuid} ping failed: {e}");
                    break;
                }
            }

            _ = liveness.expired() => {
                warn!("[rpc] screen {uuid} silent for {:?}, dropping", liveness.idle_timeout());
                break;
            }

            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!("[rpc] screen {uuid} read error: {e}");
                    break;
                }
                Some(Ok(_)) => liveness.touch(),
            },
        }
    }
    // Dropping the subscription removes the screen.
}

async fn read_screen(socket: &mut WebSocket) -> Result<Screen, String> {
    let first = tokio::time::timeout(JOIN_TIMEOUT, socket.recv())
        .await
        .map_err(|_| "no screen sent".to_string())?;
    match first {
        Some(Ok(Message::Text(text))) => serde_json::from_str(text.as_str()).map_err(|e| format!("bad screen: {e}")),
        Some(Ok(_)) => Err("expected a text frame".into()),
        Some(Err(e)) => Err(e.to_string()),
        None => Err("closed before join".into()),
    }
}

async fn send_update(socket: &mut WebSocket, update: &Update) -> anyhow::Result<()> {
    let text = serde_json::to_string(update)?;
    socket.send(Message::Text(text.into())).await?;
    Ok(())
}

async fn close(mut socket: WebSocket, code: u16, reason: String) {
    let frame = CloseFrame { code, reason: reason.into() };
    if let Err(e) = socket.send(Message::Close(Some(frame))).await {
        error!("[rpc] close failed: {e}");
    }
}
