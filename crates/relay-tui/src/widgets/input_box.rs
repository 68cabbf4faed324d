//! Prompt input widget

use crate::input::Action;
use crate::theme::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};
use unicode_width::UnicodeWidthChar;

/// Single-line prompt input with recall of earlier prompts
#[derive(Debug, Default)]
pub struct InputBox {
    chars: Vec<char>,
    /// Cursor position as a char index
    cursor: usize,
    /// Display columns hidden to the left
    scroll: usize,
    placeholder: String,
    focused: bool,
    /// Previously submitted prompts, oldest first
    recall: Vec<String>,
    /// Position while browsing `recall`
    recall_pos: Option<usize>,
}

impl InputBox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    pub fn content(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn set_content(&mut self, content: &str) {
        self.chars = content.chars().collect();
        self.cursor = self.chars.len();
    }

    pub fn clear(&mut self) {
        self.chars.clear();
        self.cursor = 0;
        self.scroll = 0;
        self.recall_pos = None;
    }

    /// Take the current prompt, remembering it for recall
    pub fn take(&mut self) -> String {
        let content = self.content();
        if !content.trim().is_empty() && self.recall.last() != Some(&content) {
            self.recall.push(content.clone());
        }
        self.clear();
        content
    }

    /// Handle an editing action; returns whether it was consumed
    pub fn handle_action(&mut self, action: &Action, width: u16) -> bool {
        let handled = match action {
            Action::Char(c) => {
                self.insert(*c);
                true
            }
            Action::Paste(text) => {
                for c in text.chars() {
                    match c {
                        '\r' => {}
                        '\n' => self.insert(' '),
                        c => self.insert(c),
                    }
                }
                true
            }
            Action::Backspace if self.cursor > 0 => {
                self.cursor -= 1;
                self.chars.remove(self.cursor);
                true
            }
            Action::Delete if self.cursor < self.chars.len() => {
                self.chars.remove(self.cursor);
                true
            }
            Action::Left if self.cursor > 0 => {
                self.cursor -= 1;
                true
            }
            Action::Right if self.cursor < self.chars.len() => {
                self.cursor += 1;
                true
            }
            Action::Home => {
                self.cursor = 0;
                true
            }
            Action::End => {
                self.cursor = self.chars.len();
                true
            }
            Action::ClearLine => {
                self.clear();
                true
            }
            Action::DeleteWord => {
                let end = self.cursor;
                while self.cursor > 0 && self.chars[self.cursor - 1] == ' ' {
                    self.cursor -= 1;
                }
                while self.cursor > 0 && self.chars[self.cursor - 1] != ' ' {
                    self.cursor -= 1;
                }
                self.chars.drain(self.cursor..end);
                true
            }
            Action::Up => self.recall_older(),
            Action::Down => self.recall_newer(),
            _ => false,
        };
        if handled {
            self.update_scroll(width as usize);
        }
        handled
    }

    fn insert(&mut self, c: char) {
        self.chars.insert(self.cursor, c);
        self.cursor += 1;
    }

    fn recall_older(&mut self) -> bool {
        if self.recall.is_empty() {
            return false;
        }
        let pos = match self.recall_pos {
            Some(0) => 0,
            Some(p) => p - 1,
            None => self.recall.len() - 1,
        };
        self.recall_pos = Some(pos);
        let prompt = self.recall[pos].clone();
        self.set_content(&prompt);
        true
    }

    fn recall_newer(&mut self) -> bool {
        let Some(pos) = self.recall_pos else {
            return false;
        };
        if pos + 1 < self.recall.len() {
            self.recall_pos = Some(pos + 1);
            let prompt = self.recall[pos + 1].clone();
            self.set_content(&prompt);
        } else {
            self.recall_pos = None;
            self.chars.clear();
            self.cursor = 0;
        }
        true
    }

    fn width_before_cursor(&self) -> usize {
        self.chars[..self.cursor]
            .iter()
            .map(|c| c.width().unwrap_or(0))
            .sum()
    }

    fn update_scroll(&mut self, width: usize) {
        let visible = width.saturating_sub(3);
        let cursor = self.width_before_cursor();
        if cursor < self.scroll {
            self.scroll = cursor;
        } else if visible > 0 && cursor >= self.scroll + visible {
            self.scroll = cursor + 1 - visible;
        }
    }

    /// Render the input box
    pub fn render(&self, area: Rect, buf: &mut Buffer, theme: &Theme) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(if self.focused {
                theme.accent_style()
            } else {
                theme.border_style()
            });
        let inner = block.inner(area);
        block.render(area, buf);

        if self.chars.is_empty() {
            let mut spans = Vec::new();
            if self.focused {
                spans.push(Span::styled(" ", theme.accent_style().add_modifier(Modifier::REVERSED)));
            }
            spans.push(Span::styled(self.placeholder.clone(), theme.dim_style()));
            Paragraph::new(Line::from(spans)).render(inner, buf);
            return;
        }

        let mut skipped = 0;
        let mut before = String::new();
        let mut after = String::new();
        let mut at_cursor = String::from(" ");
        for (i, c) in self.chars.iter().enumerate() {
            let w = c.width().unwrap_or(0);
            if skipped < self.scroll {
                skipped += w;
                continue;
            }
            match i.cmp(&self.cursor) {
                std::cmp::Ordering::Less => before.push(*c),
                std::cmp::Ordering::Equal => at_cursor = c.to_string(),
                std::cmp::Ordering::Greater => after.push(*c),
            }
        }

        let cursor_style = if self.focused {
            theme.base_style().add_modifier(Modifier::REVERSED)
        } else {
            theme.base_style()
        };
        let line = Line::from(vec![
            Span::styled(before, theme.base_style()),
            Span::styled(at_cursor, cursor_style),
            Span::styled(after, theme.base_style()),
        ]);
        Paragraph::new(line).render(inner, buf);
    }
}
