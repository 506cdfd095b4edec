//! Codespace 실시간 방 동기화
//!
//! 서버 쪽 방 레지스트리와 브로드캐스트 중계, 클라이언트 쪽 연결 감시자와
//! 동기화 조정기를 제공한다.

pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod languages;
pub mod protocol;
pub mod server;
pub mod state;
