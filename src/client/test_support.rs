//! 테스트용 에디터/오버레이 구현

use super::presence::{CursorState, CursorStyle, OverlaySurface};
use super::reconciler::{EditorSurface, Selection};
use crate::protocol::CursorPosition;
use std::collections::HashMap;

#[derive(Default)]
pub struct RecordingSurface {
    next_id: u64,
    pub created: usize,
    pub live: HashMap<u64, CursorState>,
    pub styles: HashMap<String, CursorStyle>,
}

impl OverlaySurface for RecordingSurface {
    type Decoration = u64;

    fn create_decoration(&mut self, cursor: &CursorState, _style: &CursorStyle) -> u64 {
        self.next_id += 1;
        self.created += 1;
        self.live.insert(self.next_id, cursor.clone());
        self.next_id
    }

    fn dispose_decoration(&mut self, decoration: u64) {
        self.live.remove(&decoration);
    }

    fn insert_style(&mut self, style: &CursorStyle) {
        self.styles.insert(style.key.clone(), style.clone());
    }

    fn remove_style(&mut self, key: &str) {
        self.styles.remove(key);
    }
}

pub struct MemoryEditor {
    pub text: String,
    pub selection: Selection,
    pub language: String,
    pub writes: usize,
}

impl MemoryEditor {
    pub fn with_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            selection: Selection::caret(CursorPosition::new(1, 1)),
            language: crate::languages::DEFAULT_LANGUAGE.to_string(),
            writes: 0,
        }
    }
}

impl EditorSurface for MemoryEditor {
    fn text(&self) -> String {
        self.text.clone()
    }

    fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.writes += 1;
        // 실제 에디터처럼 전체 교체 시 커서가 맨 앞으로 간다
        self.selection = Selection::caret(CursorPosition::new(1, 1));
    }

    fn selection(&self) -> Selection {
        self.selection
    }

    fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
    }

    fn set_language(&mut self, language: &str) {
        self.language = language.to_string();
    }
}
