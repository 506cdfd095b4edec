//! HTTP 라우터와 WebSocket 연결 처리

use crate::config::Config;
use crate::error::RelayError;
use crate::handlers;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::HeaderValue,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// 라우터 설정
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS 설정. `*` 가 있으면 모든 출처 허용
fn cors_layer(config: &Config) -> CorsLayer {
    let origin = if config.cors_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn index_handler() -> &'static str {
    "Server is running"
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "server": "codespace-sync-rs",
        "rooms": state.registry.room_count(),
        "connections": state.registry.connection_count(),
        "timestamp": SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // 연결 처리
    let connection_id = handlers::handle_connection(&state, tx.clone());

    // 송신 태스크
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::error!(error = %e, "Failed to encode server message"),
            }
        }
    });

    // 수신 처리
    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                handle_text(&state, &connection_id, &tx, &text);
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "WebSocket receive error");
                break;
            }
            _ => {}
        }
    }

    // 연결 해제
    handlers::handle_disconnect(&state, &connection_id);
    send_task.abort();
}

/// 텍스트 프레임 하나를 해석해 처리
pub fn handle_text(
    state: &AppState,
    connection_id: &str,
    sender: &mpsc::UnboundedSender<ServerMessage>,
    text: &str,
) {
    let result = serde_json::from_str::<ClientMessage>(text)
        .map_err(RelayError::from)
        .and_then(|msg| handle_client_message(state, connection_id, sender, msg));

    if let Err(e) = result {
        handlers::reject(sender, connection_id, &e);
    }
}

fn handle_client_message(
    state: &AppState,
    connection_id: &str,
    sender: &mpsc::UnboundedSender<ServerMessage>,
    msg: ClientMessage,
) -> Result<(), RelayError> {
    match msg {
        ClientMessage::Heartbeat => {
            handlers::handle_heartbeat(sender);
            Ok(())
        }
        ClientMessage::Join { room_id, username } => {
            handlers::handle_join(state, connection_id, &room_id, &username)
        }
        ClientMessage::CodeChange { room_id, code } => {
            handlers::handle_code_change(state, connection_id, &room_id, code)
        }
        // 클라이언트가 보낸 username은 무시하고 레지스트리의 이름을 쓴다
        ClientMessage::CursorChange { room_id, position, .. } => {
            handlers::handle_cursor_change(state, connection_id, &room_id, position)
        }
        ClientMessage::LanguageChange { room_id, language } => {
            handlers::handle_language_change(state, connection_id, &room_id, language)
        }
    }
}
