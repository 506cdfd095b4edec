//! 클라이언트-서버 메시지 프로토콜 정의
//!
//! 모든 프레임은 `{"event": "...", "data": {...}}` 형태의 JSON 텍스트이며,
//! 필드 이름은 camelCase를 사용한다.

use serde::{Deserialize, Serialize};

/// 문서 내 커서 위치 (1부터 시작하는 줄/열)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CursorPosition {
    pub line: u32,
    pub column: u32,
}

impl CursorPosition {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// 방 참여자 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub connection_id: String,
    pub username: String,
}

/// 클라이언트 → 서버 메시지
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    // Connection
    Heartbeat,

    // Room Management
    Join {
        room_id: String,
        #[serde(default)]
        username: String,
    },

    // Room Sync
    CodeChange {
        room_id: String,
        code: String,
    },
    CursorChange {
        room_id: String,
        position: CursorPosition,
        #[serde(default)]
        username: String,
    },
    LanguageChange {
        room_id: String,
        language: String,
    },
}

impl ClientMessage {
    /// 메시지가 대상으로 하는 방 ID
    pub fn room_id(&self) -> Option<&str> {
        match self {
            ClientMessage::Heartbeat => None,
            ClientMessage::Join { room_id, .. }
            | ClientMessage::CodeChange { room_id, .. }
            | ClientMessage::CursorChange { room_id, .. }
            | ClientMessage::LanguageChange { room_id, .. } => Some(room_id),
        }
    }
}

/// 서버 → 클라이언트 메시지
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    // Connection
    Connected {
        connection_id: String,
    },
    HeartbeatAck,
    Error {
        code: String,
        message: String,
    },

    // Room Events
    Sync {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    Joined {
        clients: Vec<ClientInfo>,
        username: String,
        connection_id: String,
    },
    Disconnected {
        connection_id: String,
        username: String,
    },

    // Room Sync
    CodeChange {
        code: String,
    },
    CursorChange {
        connection_id: String,
        position: CursorPosition,
        username: String,
    },
    LanguageChange {
        language: String,
    },
}
