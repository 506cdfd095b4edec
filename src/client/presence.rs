//! 원격 사용자 커서 오버레이
//!
//! 연결 ID마다 색을 한 번 배정하고, 커서 상태가 바뀔 때마다 이전 장식을 모두
//! 지운 뒤 현재 상태로 다시 그린다. 실제 렌더링은 [`OverlaySurface`] 뒤에 있다.

use crate::protocol::CursorPosition;
use std::collections::{HashMap, HashSet};

/// 원격 커서 색상표
pub const PALETTE: [&str; 15] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FECA57", "#FF9FF3", "#54A0FF", "#5F27CD",
    "#00D2D3", "#FF9F43", "#10AC84", "#EE5A24", "#0984E3", "#A29BFE", "#FD79A8",
];

/// 원격 사용자 한 명의 커서 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorState {
    pub position: CursorPosition,
    pub username: String,
    pub color: &'static str,
}

/// 사용자 이름별 스타일 자원
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorStyle {
    pub key: String,
    pub class_name: String,
    pub label: String,
    pub color: &'static str,
}

impl CursorStyle {
    pub fn for_user(username: &str, color: &'static str) -> Self {
        let slug = slug(username);
        Self {
            key: style_key(username),
            class_name: format!("remote-cursor-{slug}"),
            label: username.to_string(),
            color,
        }
    }
}

pub fn style_key(username: &str) -> String {
    format!("cursor-style-{}", slug(username))
}

/// 공백 구간마다 `-` 하나로 치환
fn slug(username: &str) -> String {
    let mut out = String::with_capacity(username.len());
    let mut in_space = false;
    for ch in username.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push('-');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

/// 커서 장식을 그리는 쪽
pub trait OverlaySurface {
    type Decoration;

    fn create_decoration(&mut self, cursor: &CursorState, style: &CursorStyle) -> Self::Decoration;
    fn dispose_decoration(&mut self, decoration: Self::Decoration);
    fn insert_style(&mut self, style: &CursorStyle);
    fn remove_style(&mut self, key: &str);
}

pub struct PresenceOverlay<S: OverlaySurface> {
    surface: S,
    colors: HashMap<String, &'static str>,
    decorations: HashMap<String, S::Decoration>,
    styles: HashSet<String>,
}

impl<S: OverlaySurface> PresenceOverlay<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            colors: HashMap::new(),
            decorations: HashMap::new(),
            styles: HashSet::new(),
        }
    }

    /// 처음 보는 연결이면 현재 배정 수로 색상표를 순환해 배정한다
    pub fn color_for(&mut self, connection_id: &str) -> &'static str {
        let next = PALETTE[self.colors.len() % PALETTE.len()];
        *self
            .colors
            .entry(connection_id.to_string())
            .or_insert(next)
    }

    /// 모든 장식을 지우고 현재 커서 맵으로 다시 그린다
    pub fn reconcile(&mut self, cursors: &HashMap<String, CursorState>) {
        for (_, decoration) in self.decorations.drain() {
            self.surface.dispose_decoration(decoration);
        }

        for (connection_id, cursor) in cursors {
            let style = CursorStyle::for_user(&cursor.username, cursor.color);
            let decoration = self.surface.create_decoration(cursor, &style);
            self.decorations.insert(connection_id.clone(), decoration);

            if self.styles.insert(style.key.clone()) {
                self.surface.insert_style(&style);
            }
        }
    }

    /// 연결 해제된 사용자의 장식, 스타일, 색 배정 제거
    pub fn dispose(&mut self, connection_id: &str, username: &str) {
        if let Some(decoration) = self.decorations.remove(connection_id) {
            self.surface.dispose_decoration(decoration);
        }
        let key = style_key(username);
        if self.styles.remove(&key) {
            self.surface.remove_style(&key);
        }
        self.colors.remove(connection_id);
    }

    /// 모든 자원 해제
    pub fn clear(&mut self) {
        for (_, decoration) in self.decorations.drain() {
            self.surface.dispose_decoration(decoration);
        }
        for key in self.styles.drain() {
            self.surface.remove_style(&key);
        }
        self.colors.clear();
    }

    pub fn has_decoration(&self, connection_id: &str) -> bool {
        self.decorations.contains_key(connection_id)
    }

    pub fn decoration_count(&self) -> usize {
        self.decorations.len()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}
