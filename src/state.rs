//! 애플리케이션 상태 관리
//!
//! 방 엔트리(`rooms`)는 상태 변경과 브로드캐스트가 끝날 때까지 잡혀 있으므로
//! 같은 방의 이벤트는 도착 순서대로 반영된다. 잠금 순서는 항상
//! rooms → connections 이며, connections 엔트리를 잡은 채로 rooms에 접근하지 않는다.

use crate::config::Config;
use crate::protocol::{ClientInfo, ServerMessage};
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;

/// 사용자 이름이 기록되지 않은 연결의 표시 이름
pub const UNKNOWN_USERNAME: &str = "Unknown";

/// 전역 애플리케이션 상태
pub struct AppState {
    pub registry: RoomRegistry,
    /// 설정
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            registry: RoomRegistry::new(),
            config: Arc::new(config),
        }
    }
}

/// 방별 마지막 문서 상태
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomState {
    pub code: Option<String>,
    pub language: Option<String>,
}

impl RoomState {
    pub fn is_empty(&self) -> bool {
        self.code.is_none() && self.language.is_none()
    }
}

/// 방 정보
pub struct Room {
    pub id: String,
    /// 참여 순서대로 정렬된 연결 ID
    pub members: Vec<String>,
    pub state: RoomState,
    pub created_at: Instant,
    /// 마지막 참여자가 나간 시각
    pub emptied_at: Option<Instant>,
}

impl Room {
    pub fn new(id: String) -> Self {
        Self {
            id,
            members: Vec::new(),
            state: RoomState::default(),
            created_at: Instant::now(),
            emptied_at: None,
        }
    }

    pub fn contains(&self, connection_id: &str) -> bool {
        self.members.iter().any(|m| m == connection_id)
    }

    pub fn add_member(&mut self, connection_id: &str) {
        if !self.contains(connection_id) {
            self.members.push(connection_id.to_string());
        }
        self.emptied_at = None;
    }

    pub fn remove_member(&mut self, connection_id: &str) {
        self.members.retain(|m| m != connection_id);
        if self.members.is_empty() {
            self.emptied_at = Some(Instant::now());
        }
    }

    fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        self.emptied_at
            .is_some_and(|at| now.duration_since(at) > timeout)
    }
}

/// 연결 세션 정보
pub struct Connection {
    pub id: String,
    pub username: Option<String>,
    pub rooms: HashSet<String>,
    pub sender: UnboundedSender<ServerMessage>,
    pub connected_at: Instant,
}

/// 방/연결 레지스트리. 중계 핸들러만 변경한다.
pub struct RoomRegistry {
    rooms: DashMap<String, Room>,
    connections: DashMap<String, Connection>,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            connections: DashMap::new(),
        }
    }

    /// 새 연결 등록
    pub fn register(&self, connection_id: &str, sender: UnboundedSender<ServerMessage>) {
        self.connections.insert(
            connection_id.to_string(),
            Connection {
                id: connection_id.to_string(),
                username: None,
                rooms: HashSet::new(),
                sender,
                connected_at: Instant::now(),
            },
        );
    }

    /// 연결 제거. 제거된 세션을 돌려준다.
    pub fn unregister(&self, connection_id: &str) -> Option<Connection> {
        self.connections
            .remove(connection_id)
            .map(|(_, connection)| connection)
    }

    pub fn is_connected(&self, connection_id: &str) -> bool {
        self.connections.contains_key(connection_id)
    }

    /// 연결의 사용자 이름과 참여 방 기록
    pub fn record_join(&self, connection_id: &str, room_id: &str, username: &str) -> bool {
        match self.connections.get_mut(connection_id) {
            Some(mut connection) => {
                connection.username = Some(username.to_string());
                connection.rooms.insert(room_id.to_string());
                true
            }
            None => false,
        }
    }

    pub fn username(&self, connection_id: &str) -> Option<String> {
        self.connections
            .get(connection_id)
            .and_then(|c| c.username.clone())
    }

    pub fn rooms_of(&self, connection_id: &str) -> Vec<String> {
        let mut rooms: Vec<String> = self
            .connections
            .get(connection_id)
            .map(|c| c.rooms.iter().cloned().collect())
            .unwrap_or_default();
        rooms.sort();
        rooms
    }

    /// 방이 없으면 생성해서 잡는다
    pub fn room_entry(&self, room_id: &str) -> RefMut<'_, String, Room> {
        self.rooms.entry(room_id.to_string()).or_insert_with(|| {
            tracing::info!(room_id = %room_id, "Room created");
            Room::new(room_id.to_string())
        })
    }

    /// 이미 존재하는 방만 잡는다
    pub fn room_mut(&self, room_id: &str) -> Option<RefMut<'_, String, Room>> {
        self.rooms.get_mut(room_id)
    }

    /// 방 참여자 목록 (참여 순서)
    pub fn presence_of(&self, room: &Room) -> Vec<ClientInfo> {
        room.members
            .iter()
            .map(|connection_id| ClientInfo {
                connection_id: connection_id.clone(),
                username: self
                    .username(connection_id)
                    .unwrap_or_else(|| UNKNOWN_USERNAME.to_string()),
            })
            .collect()
    }

    /// 방 X에 누가 있는가
    pub fn presence(&self, room_id: &str) -> Vec<ClientInfo> {
        match self.rooms.get(room_id) {
            Some(room) => self.presence_of(&room),
            None => Vec::new(),
        }
    }

    pub fn room_state(&self, room_id: &str) -> Option<RoomState> {
        self.rooms.get(room_id).map(|room| room.state.clone())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// 특정 연결에게 메시지 전송
    pub fn send_to(&self, connection_id: &str, message: ServerMessage) -> bool {
        match self.connections.get(connection_id) {
            Some(connection) => connection.sender.send(message).is_ok(),
            None => false,
        }
    }

    /// 일정 시간 이상 비어 있던 방 제거. 제거된 방 ID를 돌려준다.
    pub fn evict_idle_rooms(&self, now: Instant, timeout: Duration) -> Vec<String> {
        let mut evicted = Vec::new();
        self.rooms.retain(|room_id, room| {
            if room.is_idle(now, timeout) {
                evicted.push(room_id.clone());
                false
            } else {
                true
            }
        });
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn registry_with(ids: &[&str]) -> RoomRegistry {
        let registry = RoomRegistry::new();
        for id in ids {
            let (tx, _rx) = mpsc::unbounded_channel();
            registry.register(id, tx);
        }
        registry
    }

    #[test]
    fn presence_is_derived_in_join_order() {
        let registry = registry_with(&["a", "b"]);
        registry.record_join("b", "r1", "bob");
        registry.record_join("a", "r1", "alice");
        {
            let mut room = registry.room_entry("r1");
            room.add_member("b");
            room.add_member("a");
            room.add_member("b");
        }

        let presence = registry.presence("r1");
        let names: Vec<_> = presence.iter().map(|c| c.username.as_str()).collect();
        assert_eq!(names, vec!["bob", "alice"]);
    }

    #[test]
    fn member_without_username_is_unknown() {
        let registry = registry_with(&["a"]);
        {
            let mut room = registry.room_entry("r1");
            room.add_member("a");
        }
        assert_eq!(registry.presence("r1")[0].username, UNKNOWN_USERNAME);
    }

    #[test]
    fn presence_of_missing_room_is_empty() {
        let registry = RoomRegistry::new();
        assert!(registry.presence("nowhere").is_empty());
        assert!(registry.room_state("nowhere").is_none());
    }

    #[test]
    fn empty_room_is_evicted_only_after_timeout() {
        let registry = registry_with(&["a"]);
        {
            let mut room = registry.room_entry("r1");
            room.add_member("a");
            room.state.code = Some("x".into());
            room.remove_member("a");
        }
        registry.room_entry("busy");
        let timeout = Duration::from_secs(60);

        assert!(registry.evict_idle_rooms(Instant::now(), timeout).is_empty());
        assert_eq!(registry.room_count(), 2);

        let later = Instant::now() + Duration::from_secs(61);
        assert_eq!(registry.evict_idle_rooms(later, timeout), vec!["r1".to_string()]);
        assert_eq!(registry.room_count(), 1);
    }

    #[test]
    fn rejoin_clears_empty_stamp() {
        let registry = registry_with(&["a"]);
        let mut room = registry.room_entry("r1");
        room.add_member("a");
        room.remove_member("a");
        assert!(room.emptied_at.is_some());

        room.add_member("a");
        assert!(room.emptied_at.is_none());
    }

    #[test]
    fn unregister_drops_username() {
        let registry = registry_with(&["a"]);
        registry.record_join("a", "r1", "alice");
        let removed = registry.unregister("a").unwrap();

        assert_eq!(removed.username.as_deref(), Some("alice"));
        assert!(removed.rooms.contains("r1"));
        assert!(registry.username("a").is_none());
        assert!(!registry.is_connected("a"));
    }
}
