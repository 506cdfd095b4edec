//! 방 관리 핸들러

use crate::error::RelayError;
use crate::protocol::ServerMessage;
use crate::state::{AppState, Room, RoomRegistry, UNKNOWN_USERNAME};
use std::time::{Duration, Instant};

/// 브로드캐스트 대상
#[derive(Debug, Clone, Copy)]
pub enum Audience<'a> {
    /// 방 전체 (송신자 포함)
    Room,
    /// 송신자를 제외한 방 참여자
    RoomExcept(&'a str),
}

/// 방 참여 처리
pub fn handle_join(
    state: &AppState,
    connection_id: &str,
    room_id: &str,
    username: &str,
) -> Result<(), RelayError> {
    let room_id = validate_room_id(room_id, state.config.room.max_id_len)?;
    let username = match username.trim() {
        "" => UNKNOWN_USERNAME,
        name => name,
    };

    if !state.registry.record_join(connection_id, &room_id, username) {
        return Err(RelayError::UnknownConnection {
            connection_id: connection_id.to_string(),
        });
    }

    // 방 엔트리를 잡은 채로 상태 전송과 참여자 목록 브로드캐스트까지 끝낸다
    let mut room = state.registry.room_entry(&room_id);
    room.add_member(connection_id);

    if !room.state.is_empty() {
        state.registry.send_to(
            connection_id,
            ServerMessage::Sync {
                code: room.state.code.clone(),
                language: room.state.language.clone(),
            },
        );
        tracing::debug!(connection_id = %connection_id, room_id = %room_id, "Sent room state");
    }

    let clients = state.registry.presence_of(&room);
    let user_count = clients.len();
    broadcast(
        &state.registry,
        &room,
        Audience::Room,
        ServerMessage::Joined {
            clients,
            username: username.to_string(),
            connection_id: connection_id.to_string(),
        },
    );

    tracing::info!(
        connection_id = %connection_id,
        room_id = %room_id,
        username = %username,
        user_count = user_count,
        "User joined room"
    );
    Ok(())
}

/// 방 나가기 내부 로직 (연결 해제 시에만 호출)
pub fn leave_room_internal(state: &AppState, connection_id: &str, room_id: &str, username: &str) {
    let Some(mut room) = state.registry.room_mut(room_id) else {
        return;
    };

    broadcast(
        &state.registry,
        &room,
        Audience::RoomExcept(connection_id),
        ServerMessage::Disconnected {
            connection_id: connection_id.to_string(),
            username: username.to_string(),
        },
    );
    room.remove_member(connection_id);

    tracing::info!(
        connection_id = %connection_id,
        room_id = %room_id,
        remaining = room.members.len(),
        "User left room"
    );
}

/// 방에 메시지 브로드캐스트. 전달된 연결 수를 돌려준다.
pub fn broadcast(
    registry: &RoomRegistry,
    room: &Room,
    audience: Audience<'_>,
    message: ServerMessage,
) -> usize {
    let mut delivered = 0;
    for member in &room.members {
        if let Audience::RoomExcept(except) = audience {
            if member == except {
                continue;
            }
        }
        if registry.send_to(member, message.clone()) {
            delivered += 1;
        }
    }
    delivered
}

/// 방 ID 정규화 및 검증
pub fn validate_room_id(room_id: &str, max_len: usize) -> Result<String, RelayError> {
    let room_id = room_id.trim();
    if room_id.is_empty() {
        return Err(RelayError::InvalidRoomId { reason: "empty" });
    }
    if room_id.chars().count() > max_len {
        return Err(RelayError::InvalidRoomId { reason: "too long" });
    }
    Ok(room_id.to_string())
}

/// 오래 비어 있던 방 정리
pub fn cleanup_idle_rooms(state: &AppState) {
    let timeout = Duration::from_millis(state.config.room.idle_timeout_ms);
    let evicted = state.registry.evict_idle_rooms(Instant::now(), timeout);

    for room_id in &evicted {
        tracing::info!(room_id = %room_id, "Cleaned up idle room");
    }
    if !evicted.is_empty() {
        tracing::info!(deleted_rooms = evicted.len(), "Cleanup completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::handlers::test_helpers::{connect, drain, test_state};
    use crate::handlers::{handle_code_change, handle_disconnect, handle_language_change};
    use crate::protocol::ClientInfo;

    fn info(id: &str, username: &str) -> ClientInfo {
        ClientInfo {
            connection_id: id.to_string(),
            username: username.to_string(),
        }
    }

    #[test]
    fn join_refreshes_membership_for_every_member() {
        let state = test_state();
        let (a, mut rx_a) = connect(&state);
        let (b, mut rx_b) = connect(&state);

        handle_join(&state, &a, "r1", "alice").unwrap();
        assert_eq!(
            drain(&mut rx_a),
            vec![ServerMessage::Joined {
                clients: vec![info(&a, "alice")],
                username: "alice".into(),
                connection_id: a.clone(),
            }]
        );

        handle_join(&state, &b, "r1", "bob").unwrap();
        let expected = ServerMessage::Joined {
            clients: vec![info(&a, "alice"), info(&b, "bob")],
            username: "bob".into(),
            connection_id: b.clone(),
        };
        assert_eq!(drain(&mut rx_a), vec![expected.clone()]);
        assert_eq!(drain(&mut rx_b), vec![expected]);
    }

    #[test]
    fn late_joiner_gets_sync_before_joined() {
        let state = test_state();
        let (a, mut rx_a) = connect(&state);
        let (b, mut rx_b) = connect(&state);

        handle_join(&state, &a, "r1", "alice").unwrap();
        handle_code_change(&state, &a, "r1", "print(1)".into()).unwrap();
        drain(&mut rx_a);

        handle_join(&state, &b, "r1", "bob").unwrap();
        let received = drain(&mut rx_b);

        assert_eq!(
            received[0],
            ServerMessage::Sync {
                code: Some("print(1)".into()),
                language: None,
            }
        );
        assert!(matches!(received[1], ServerMessage::Joined { .. }));
    }

    #[test]
    fn join_to_fresh_room_sends_no_sync() {
        let state = test_state();
        let (a, mut rx_a) = connect(&state);
        handle_join(&state, &a, "fresh", "alice").unwrap();

        let received = drain(&mut rx_a);
        assert_eq!(received.len(), 1);
        assert!(matches!(received[0], ServerMessage::Joined { .. }));
    }

    #[test]
    fn sync_carries_last_write_of_each_field() {
        let state = test_state();
        let (a, _rx_a) = connect(&state);
        let (b, mut rx_b) = connect(&state);
        handle_join(&state, &a, "r1", "alice").unwrap();

        for i in 1..=5 {
            handle_code_change(&state, &a, "r1", format!("v{i}")).unwrap();
        }
        handle_language_change(&state, &a, "r1", "python".into()).unwrap();

        handle_join(&state, &b, "r1", "bob").unwrap();
        assert_eq!(
            drain(&mut rx_b)[0],
            ServerMessage::Sync {
                code: Some("v5".into()),
                language: Some("python".into()),
            }
        );
    }

    #[test]
    fn membership_converges_after_joins_and_disconnects() {
        let state = test_state();
        let (a, _rx_a) = connect(&state);
        let (b, mut rx_b) = connect(&state);
        let (c, mut rx_c) = connect(&state);

        handle_join(&state, &a, "r1", "alice").unwrap();
        handle_join(&state, &b, "r1", "bob").unwrap();
        handle_disconnect(&state, &a);
        handle_join(&state, &c, "r1", "carol").unwrap();

        let last_b = drain(&mut rx_b).pop().unwrap();
        let last_c = drain(&mut rx_c).pop().unwrap();
        let expected = vec![info(&b, "bob"), info(&c, "carol")];
        for last in [last_b, last_c] {
            match last {
                ServerMessage::Joined { clients, .. } => assert_eq!(clients, expected),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(state.registry.presence("r1"), expected);
    }

    #[test]
    fn rejoin_updates_username() {
        let state = test_state();
        let (a, mut rx_a) = connect(&state);
        handle_join(&state, &a, "r1", "alice").unwrap();
        handle_join(&state, &a, "r1", "alicia").unwrap();

        match drain(&mut rx_a).pop().unwrap() {
            ServerMessage::Joined { clients, .. } => {
                assert_eq!(clients, vec![info(&a, "alicia")]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn blank_username_renders_as_unknown() {
        let state = test_state();
        let (a, _rx_a) = connect(&state);
        handle_join(&state, &a, "r1", "   ").unwrap();
        assert_eq!(state.registry.presence("r1")[0].username, UNKNOWN_USERNAME);
    }

    #[test]
    fn invalid_room_ids_are_rejected() {
        let mut config = Config::default();
        config.room.max_id_len = 4;
        let state = AppState::new(config);
        let (a, _rx_a) = connect(&state);

        assert!(matches!(
            handle_join(&state, &a, "  ", "alice"),
            Err(RelayError::InvalidRoomId { .. })
        ));
        assert!(matches!(
            handle_join(&state, &a, "room-5", "alice"),
            Err(RelayError::InvalidRoomId { .. })
        ));
        assert_eq!(state.registry.room_count(), 0);

        handle_join(&state, &a, " r1 ", "alice").unwrap();
        assert_eq!(state.registry.presence("r1").len(), 1);
    }

    #[test]
    fn join_from_unregistered_connection_fails() {
        let state = test_state();
        assert!(matches!(
            handle_join(&state, "ghost", "r1", "alice"),
            Err(RelayError::UnknownConnection { .. })
        ));
        assert_eq!(state.registry.room_count(), 0);
    }

    #[test]
    fn state_survives_empty_room_until_cleanup() {
        let mut config = Config::default();
        config.room.idle_timeout_ms = 0;
        let state = AppState::new(config);
        let (a, _rx_a) = connect(&state);
        handle_join(&state, &a, "r1", "alice").unwrap();
        handle_code_change(&state, &a, "r1", "kept".into()).unwrap();
        handle_disconnect(&state, &a);

        assert_eq!(
            state.registry.room_state("r1").unwrap().code.as_deref(),
            Some("kept")
        );

        std::thread::sleep(Duration::from_millis(5));
        cleanup_idle_rooms(&state);
        assert!(state.registry.room_state("r1").is_none());
    }
}
