//! 에러 타입 정의

use thiserror::Error;

/// 중계 처리 중 발생한 거부 사유. 송신자에게 `error` 이벤트로만 전달된다.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("malformed message: {0}")]
    MalformedMessage(#[from] serde_json::Error),

    #[error("invalid room id: {reason}")]
    InvalidRoomId { reason: &'static str },

    #[error("connection is not a member of room {room_id}")]
    NotInRoom { room_id: String },

    #[error("unknown connection {connection_id}")]
    UnknownConnection { connection_id: String },
}

impl RelayError {
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::MalformedMessage(_) => "malformed_message",
            RelayError::InvalidRoomId { .. } => "invalid_room_id",
            RelayError::NotInRoom { .. } => "not_in_room",
            RelayError::UnknownConnection { .. } => "unknown_connection",
        }
    }
}

/// 실시간 채널 전송 오류
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("connection attempt timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// 세션 시작 전 연결 실패
#[derive(Debug, Error)]
pub enum ConnectivityError {
    #[error("failed to connect to server after {attempts} attempts")]
    Unreachable { attempts: u32 },

    #[error("realtime channel handshake failed: {0}")]
    Handshake(#[from] TransportError),
}

/// 외부 코드 실행 서비스 오류
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("execution request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("nothing to run")]
    EmptySource,
}

impl ExecutionError {
    /// 사용자에게 보여줄 일반 메시지
    pub fn user_message(&self) -> &'static str {
        "An error occured while running the code."
    }
}
