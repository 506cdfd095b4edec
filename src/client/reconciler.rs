//! 클라이언트 동기화 조정기
//!
//! 중계 이벤트를 받아 로컬 문서, 언어, 원격 커서를 맞추고 로컬 변경은
//! 디바운스해서 내보낸다. 원격 반영으로 생긴 변경 알림은 다시 내보내지 않는다.

use super::debounce::Debouncer;
use super::presence::{CursorState, OverlaySurface, PresenceOverlay};
use crate::languages;
use crate::protocol::{ClientInfo, ClientMessage, CursorPosition, ServerMessage};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// 텍스트 선택 영역
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start: CursorPosition,
    pub end: CursorPosition,
}

impl Selection {
    pub fn caret(position: CursorPosition) -> Self {
        Self {
            start: position,
            end: position,
        }
    }
}

/// 알림을 기다리는 프로그램적 쓰기 보관 상한
const MAX_PENDING_ECHOES: usize = 16;

/// 문서 렌더링 위젯
pub trait EditorSurface {
    fn text(&self) -> String;
    fn set_text(&mut self, text: &str);
    fn selection(&self) -> Selection;
    fn set_selection(&mut self, selection: Selection);
    fn set_language(&mut self, language: &str);
}

/// 출력 디바운스 간격
#[derive(Debug, Clone, Copy)]
pub struct SyncTimings {
    pub code_quiet: Duration,
    pub cursor_quiet: Duration,
}

impl Default for SyncTimings {
    fn default() -> Self {
        Self {
            code_quiet: Duration::from_millis(300),
            cursor_quiet: Duration::from_millis(100),
        }
    }
}

/// 화면에 알릴 방 이벤트
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomNotice {
    Joined { username: String },
    Left { username: String },
    Rejected { code: String, message: String },
}

pub struct SyncReconciler<E: EditorSurface, S: OverlaySurface> {
    room_id: String,
    username: String,
    local_connection_id: Option<String>,
    language: String,
    editor: E,
    overlay: PresenceOverlay<S>,
    cursors: HashMap<String, CursorState>,
    roster: Vec<ClientInfo>,
    outbound: UnboundedSender<ClientMessage>,
    code_emitter: Debouncer<String>,
    cursor_emitter: Debouncer<CursorPosition>,
    applying_remote: bool,
    /// 아직 변경 알림이 오지 않은 프로그램적 쓰기 (쓴 순서)
    echoes: VecDeque<String>,
    torn_down: bool,
}

impl<E: EditorSurface, S: OverlaySurface> SyncReconciler<E, S> {
    pub fn new(
        room_id: impl Into<String>,
        username: impl Into<String>,
        outbound: UnboundedSender<ClientMessage>,
        editor: E,
        surface: S,
        timings: SyncTimings,
    ) -> Self {
        let room_id = room_id.into();
        let username = username.into();

        let code_emitter = {
            let tx = outbound.clone();
            let room_id = room_id.clone();
            Debouncer::new(timings.code_quiet, move |code: String| {
                let _ = tx.send(ClientMessage::CodeChange {
                    room_id: room_id.clone(),
                    code,
                });
            })
        };
        let cursor_emitter = {
            let tx = outbound.clone();
            let room_id = room_id.clone();
            let username = username.clone();
            Debouncer::new(timings.cursor_quiet, move |position: CursorPosition| {
                let _ = tx.send(ClientMessage::CursorChange {
                    room_id: room_id.clone(),
                    position,
                    username: username.clone(),
                });
            })
        };

        Self {
            room_id,
            username,
            local_connection_id: None,
            language: languages::DEFAULT_LANGUAGE.to_string(),
            editor,
            overlay: PresenceOverlay::new(surface),
            cursors: HashMap::new(),
            roster: Vec::new(),
            outbound,
            code_emitter,
            cursor_emitter,
            applying_remote: false,
            echoes: VecDeque::new(),
            torn_down: false,
        }
    }

    /// 연결마다 가장 먼저 보낼 참여 메시지
    pub fn join_message(&self) -> ClientMessage {
        ClientMessage::Join {
            room_id: self.room_id.clone(),
            username: self.username.clone(),
        }
    }

    /// 서버 메시지 하나 처리
    pub fn handle(&mut self, message: ServerMessage) -> Option<RoomNotice> {
        if self.torn_down {
            return None;
        }

        match message {
            ServerMessage::Connected { connection_id } => {
                if self.local_connection_id.is_some() {
                    // 재연결: 끊긴 동안 놓친 퇴장 이벤트가 있을 수 있다
                    self.cursors.clear();
                    self.overlay.clear();
                }
                tracing::debug!(connection_id = %connection_id, "Local connection id assigned");
                self.local_connection_id = Some(connection_id);
                None
            }
            ServerMessage::HeartbeatAck => None,
            ServerMessage::Error { code, message } => {
                tracing::warn!(code = %code, message = %message, "Relay rejected message");
                Some(RoomNotice::Rejected { code, message })
            }
            ServerMessage::Sync { code, language } => {
                if let Some(code) = code {
                    self.apply_remote_code(&code);
                }
                if let Some(language) = language {
                    self.apply_remote_language(&language);
                }
                None
            }
            ServerMessage::Joined {
                clients,
                username,
                connection_id,
            } => {
                self.cursors
                    .retain(|id, _| clients.iter().any(|c| &c.connection_id == id));
                self.overlay.reconcile(&self.cursors);
                self.roster = clients;

                if self.local_connection_id.as_deref() == Some(connection_id.as_str()) {
                    None
                } else {
                    Some(RoomNotice::Joined { username })
                }
            }
            ServerMessage::Disconnected {
                connection_id,
                username,
            } => {
                self.on_remote_disconnect(&connection_id, &username);
                Some(RoomNotice::Left { username })
            }
            ServerMessage::CodeChange { code } => {
                self.apply_remote_code(&code);
                None
            }
            ServerMessage::CursorChange {
                connection_id,
                position,
                username,
            } => {
                self.on_remote_cursor(&connection_id, position, &username);
                None
            }
            ServerMessage::LanguageChange { language } => {
                self.apply_remote_language(&language);
                None
            }
        }
    }

    /// 원격 코드 반영. 로컬 선택 영역은 유지한다.
    pub fn apply_remote_code(&mut self, code: &str) {
        if self.torn_down || self.editor.text() == code {
            return;
        }
        self.write_programmatic(code);
    }

    fn write_programmatic(&mut self, text: &str) {
        let selection = self.editor.selection();
        self.applying_remote = true;
        if self.echoes.len() == MAX_PENDING_ECHOES {
            self.echoes.pop_front();
        }
        self.echoes.push_back(text.to_string());
        self.editor.set_text(text);
        self.editor.set_selection(selection);
        self.applying_remote = false;
    }

    /// 에디터 변경 알림
    pub fn on_local_change(&mut self, text: String) {
        if self.torn_down || self.applying_remote {
            return;
        }
        if let Some(index) = self.echoes.iter().position(|echo| *echo == text) {
            self.echoes.drain(..=index);
            return;
        }
        // 실제 편집 알림 이전의 쓰기 알림은 이미 모두 도착했다
        self.echoes.clear();
        self.code_emitter.schedule(text);
    }

    pub fn on_cursor_move(&mut self, position: CursorPosition) {
        if self.torn_down || self.applying_remote {
            return;
        }
        self.cursor_emitter.schedule(position);
    }

    pub fn on_selection_change(&mut self, selection: Selection) {
        self.on_cursor_move(selection.start);
    }

    /// 로컬 언어 선택. 손대지 않은 버퍼는 새 언어의 시작 코드로 바꾼다 (전송하지 않음).
    pub fn set_local_language(&mut self, language: &str) {
        if self.torn_down {
            return;
        }
        self.apply_remote_language(language);

        if languages::is_untouched(&self.editor.text()) {
            if let Some(snippet) = languages::snippet_for(language) {
                self.write_programmatic(snippet);
            }
        }

        let _ = self.outbound.send(ClientMessage::LanguageChange {
            room_id: self.room_id.clone(),
            language: language.to_string(),
        });
    }

    fn apply_remote_language(&mut self, language: &str) {
        self.language = language.to_string();
        self.editor.set_language(language);
    }

    pub fn on_remote_cursor(&mut self, connection_id: &str, position: CursorPosition, username: &str) {
        if self.torn_down || self.local_connection_id.as_deref() == Some(connection_id) {
            return;
        }

        let color = self.overlay.color_for(connection_id);
        self.cursors.insert(
            connection_id.to_string(),
            CursorState {
                position,
                username: username.to_string(),
                color,
            },
        );
        self.overlay.reconcile(&self.cursors);
    }

    pub fn on_remote_disconnect(&mut self, connection_id: &str, username: &str) {
        if self.torn_down {
            return;
        }
        self.cursors.remove(connection_id);
        self.overlay.dispose(connection_id, username);
        self.overlay.reconcile(&self.cursors);
        self.roster.retain(|c| c.connection_id != connection_id);
    }

    /// 디바운스 취소, 장식/스타일 제거, 맵 비우기. 이후 이벤트는 무시된다.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.code_emitter.cancel();
        self.cursor_emitter.cancel();
        self.overlay.clear();
        self.cursors.clear();
        self.roster.clear();
        self.echoes.clear();
        self.torn_down = true;
        tracing::debug!(room_id = %self.room_id, "Sync reconciler torn down");
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn local_connection_id(&self) -> Option<&str> {
        self.local_connection_id.as_deref()
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn roster(&self) -> &[ClientInfo] {
        &self.roster
    }

    pub fn cursors(&self) -> &HashMap<String, CursorState> {
        &self.cursors
    }

    pub fn overlay(&self) -> &PresenceOverlay<S> {
        &self.overlay
    }

    pub fn editor(&self) -> &E {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut E {
        &mut self.editor
    }
}

impl<E: EditorSurface, S: OverlaySurface> Drop for SyncReconciler<E, S> {
    fn drop(&mut self) {
        self.teardown();
    }
}
