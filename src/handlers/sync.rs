//! 문서/커서/언어 동기화 중계 핸들러

use super::room::{broadcast, validate_room_id, Audience};
use crate::error::RelayError;
use crate::protocol::{CursorPosition, ServerMessage};
use crate::state::{AppState, Room, UNKNOWN_USERNAME};
use dashmap::mapref::one::RefMut;

/// 코드 변경 처리
pub fn handle_code_change(
    state: &AppState,
    connection_id: &str,
    room_id: &str,
    code: String,
) -> Result<(), RelayError> {
    let mut room = member_room(state, connection_id, room_id)?;
    room.state.code = Some(code.clone());

    let delivered = broadcast(
        &state.registry,
        &room,
        Audience::RoomExcept(connection_id),
        ServerMessage::CodeChange { code },
    );

    tracing::debug!(
        from = %connection_id,
        room_id = %room.id,
        delivered = delivered,
        "Relayed code change"
    );
    Ok(())
}

/// 커서 이동 처리 (저장하지 않음)
pub fn handle_cursor_change(
    state: &AppState,
    connection_id: &str,
    room_id: &str,
    position: CursorPosition,
) -> Result<(), RelayError> {
    let room = member_room(state, connection_id, room_id)?;
    let username = state
        .registry
        .username(connection_id)
        .unwrap_or_else(|| UNKNOWN_USERNAME.to_string());

    let delivered = broadcast(
        &state.registry,
        &room,
        Audience::RoomExcept(connection_id),
        ServerMessage::CursorChange {
            connection_id: connection_id.to_string(),
            position,
            username,
        },
    );

    tracing::debug!(
        from = %connection_id,
        room_id = %room.id,
        delivered = delivered,
        "Relayed cursor change"
    );
    Ok(())
}

/// 언어 변경 처리
pub fn handle_language_change(
    state: &AppState,
    connection_id: &str,
    room_id: &str,
    language: String,
) -> Result<(), RelayError> {
    let mut room = member_room(state, connection_id, room_id)?;
    room.state.language = Some(language.clone());

    let delivered = broadcast(
        &state.registry,
        &room,
        Audience::RoomExcept(connection_id),
        ServerMessage::LanguageChange { language },
    );

    tracing::info!(
        from = %connection_id,
        room_id = %room.id,
        delivered = delivered,
        "Relayed language change"
    );
    Ok(())
}

/// 송신자가 참여 중인 방만 잡는다
fn member_room<'a>(
    state: &'a AppState,
    connection_id: &str,
    room_id: &str,
) -> Result<RefMut<'a, String, Room>, RelayError> {
    let room_id = validate_room_id(room_id, state.config.room.max_id_len)?;
    match state.registry.room_mut(&room_id) {
        Some(room) if room.contains(connection_id) => Ok(room),
        _ => Err(RelayError::NotInRoom { room_id }),
    }
}
