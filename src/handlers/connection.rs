//! 연결 핸들러

use crate::error::RelayError;
use crate::protocol::ServerMessage;
use crate::state::{AppState, UNKNOWN_USERNAME};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// 새 연결 처리
pub fn handle_connection(state: &AppState, sender: UnboundedSender<ServerMessage>) -> String {
    let connection_id = Uuid::new_v4().to_string();

    state.registry.register(&connection_id, sender.clone());

    let _ = sender.send(ServerMessage::Connected {
        connection_id: connection_id.clone(),
    });

    tracing::info!(connection_id = %connection_id, "New connection established");
    connection_id
}

/// 연결 해제 처리. 참여했던 모든 방의 다른 참여자에게 알린 뒤 매핑을 지운다.
pub fn handle_disconnect(state: &AppState, connection_id: &str) {
    let rooms = state.registry.rooms_of(connection_id);
    let username = state
        .registry
        .username(connection_id)
        .unwrap_or_else(|| UNKNOWN_USERNAME.to_string());

    for room_id in &rooms {
        crate::handlers::room::leave_room_internal(state, connection_id, room_id, &username);
    }

    state.registry.unregister(connection_id);
    tracing::info!(connection_id = %connection_id, rooms = rooms.len(), "Connection closed");
}

/// Heartbeat 처리
pub fn handle_heartbeat(sender: &UnboundedSender<ServerMessage>) {
    let _ = sender.send(ServerMessage::HeartbeatAck);
}

/// 거부 사유를 송신자에게만 전달
pub fn reject(sender: &UnboundedSender<ServerMessage>, connection_id: &str, error: &RelayError) {
    tracing::warn!(
        connection_id = %connection_id,
        code = error.code(),
        error = %error,
        "Rejected client message"
    );
    let _ = sender.send(ServerMessage::Error {
        code: error.code().to_string(),
        message: error.to_string(),
    });
}
