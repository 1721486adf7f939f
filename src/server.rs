//! Local gateway server: the embedded front-end bundle plus the WebSocket
//! control channel, on one listening address.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::lifecycle::ShutdownHandle;

static FRONTEND_BUNDLE: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/web");

/// State shared across handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Compose tool path handed to control-channel collaborators.
    pub compose_tool: Arc<PathBuf>,
    /// Base URL for remotely hosted demo-app compose definitions.
    pub store_url: Arc<str>,
}

impl GatewayState {
    pub fn new(compose_tool: PathBuf, store_url: &str) -> Self {
        Self {
            compose_tool: Arc::new(compose_tool),
            store_url: Arc::from(store_url),
        }
    }
}

/// Control message envelope; the payload protocol is owned by the front-end
/// collaborators.
#[derive(Debug, Deserialize)]
struct ControlMessage {
    command: String,
    #[serde(default)]
    #[allow(dead_code)]
    arguments: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ControlAck<'a> {
    command: &'a str,
    status: &'a str,
}

/// Build the gateway router: `/ws` for the control channel, everything else
/// served from the embedded bundle.
pub fn router(state: GatewayState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws_handler))
        .fallback(get(static_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until shutdown is requested. Bind failure is fatal.
pub async fn serve(addr: SocketAddr, state: GatewayState, shutdown: ShutdownHandle) -> Result<()> {
    if FRONTEND_BUNDLE.entries().is_empty() {
        anyhow::bail!("no files to serve for web interface");
    }

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    info!("listening on http://{addr} (control channel at /ws)");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("running server")?;

    Ok(())
}

async fn static_handler(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');
    let path = if path.is_empty() { "index.html" } else { path };

    match FRONTEND_BUNDLE.get_file(path) {
        Some(file) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                [(header::CONTENT_TYPE, mime.to_string())],
                file.contents(),
            )
                .into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// WebSocket upgrade handler for `/ws`.
async fn ws_handler(State(state): State<GatewayState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: GatewayState) {
    let (mut sender, mut receiver) = socket.split();
    debug!(
        "control channel open (compose tool: {}, store: {})",
        state.compose_tool.display(),
        state.store_url
    );

    while let Some(message) = receiver.next().await {
        let message = match message {
            Ok(message) => message,
            Err(err) => {
                debug!("control channel read error: {err}");
                break;
            }
        };

        match message {
            Message::Text(text) => {
                let ack = match serde_json::from_str::<ControlMessage>(text.as_str()) {
                    Ok(control) => {
                        debug!("control command: {}", control.command);
                        serde_json::to_string(&ControlAck {
                            command: &control.command,
                            status: "accepted",
                        })
                    }
                    Err(err) => {
                        warn!("unparseable control message: {err}");
                        serde_json::to_string(&ControlAck {
                            command: "",
                            status: "error",
                        })
                    }
                };

                if let Ok(ack) = ack {
                    if sender.send(Message::Text(ack.into())).await.is_err() {
                        break;
                    }
                }
            }
            Message::Ping(data) => {
                if sender.send(Message::Pong(data)).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            Message::Binary(_) | Message::Pong(_) => {}
        }
    }

    debug!("control channel closed");
}
