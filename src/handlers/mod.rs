//! 핸들러 모듈

pub mod connection;
pub mod room;
pub mod sync;

pub use connection::*;
pub use room::*;
pub use sync::*;

#[cfg(test)]
pub(crate) mod test_helpers {
    use crate::config::Config;
    use crate::protocol::ServerMessage;
    use crate::state::AppState;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    pub fn test_state() -> AppState {
        AppState::new(Config::default())
    }

    /// 연결을 만들고 `connected` 인사 메시지는 버린다
    pub fn connect(state: &AppState) -> (String, UnboundedReceiver<ServerMessage>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = super::handle_connection(state, tx);
        assert!(matches!(rx.try_recv(), Ok(ServerMessage::Connected { .. })));
        (id, rx)
    }

    pub fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }
}
