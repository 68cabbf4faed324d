//! Message list widget for displaying the chat history

use crate::theme::Theme;
use crate::widgets::markdown::render_markdown;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

/// Who a chat entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
    /// Local notices (command output); never persisted
    System,
    /// Local error notices; never persisted
    Error,
}

impl Speaker {
    /// Fixed avatar shown next to each entry
    pub fn avatar(&self) -> &'static str {
        match self {
            Speaker::User => "👤",
            Speaker::Assistant => "🤖",
            Speaker::System => "ℹ️",
            Speaker::Error => "⚠️",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Speaker::User => "You",
            Speaker::Assistant => "Assistant",
            Speaker::System => "relay",
            Speaker::Error => "Error",
        }
    }
}

/// A single entry in the chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub speaker: Speaker,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::System,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Error,
            content: content.into(),
        }
    }

    /// Lay the entry out as lines for the given width
    pub fn lines(&self, theme: &Theme, width: usize) -> Vec<Line<'static>> {
        let header_style = match self.speaker {
            Speaker::User => theme.user_style(),
            Speaker::Assistant => theme.assistant_style(),
            Speaker::System => theme.dim_style(),
            Speaker::Error => theme.error_style(),
        };
        let mut lines = vec![Line::from(Span::styled(
            format!("{} {}", self.speaker.avatar(), self.speaker.label()),
            header_style,
        ))];

        let content_width = width.saturating_sub(3).max(1);
        if self.speaker == Speaker::Assistant {
            for line in render_markdown(&self.content, theme, content_width) {
                let mut spans = vec![Span::raw("   ")];
                spans.extend(line.spans);
                lines.push(Line::from(spans));
            }
        } else {
            let style = match self.speaker {
                Speaker::Error => theme.error_style(),
                Speaker::System => theme.dim_style(),
                _ => theme.base_style(),
            };
            for line in textwrap::wrap(&self.content, content_width) {
                lines.push(Line::from(Span::styled(format!("   {}", line), style)));
            }
        }

        lines.push(Line::default());
        lines
    }
}

/// Widget for displaying a list of chat messages
pub struct MessageList<'a> {
    messages: &'a [ChatMessage],
    theme: &'a Theme,
    scroll: usize,
}

impl<'a> MessageList<'a> {
    pub fn new(messages: &'a [ChatMessage], theme: &'a Theme) -> Self {
        Self {
            messages,
            theme,
            scroll: 0,
        }
    }

    /// Skip this many laid-out lines from the top
    pub fn scroll(mut self, scroll: usize) -> Self {
        self.scroll = scroll;
        self
    }
}

impl Widget for MessageList<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        let width = area.width as usize;
        let visible: Vec<Line> = self
            .messages
            .iter()
            .flat_map(|m| m.lines(self.theme, width))
            .skip(self.scroll)
            .take(area.height as usize)
            .collect();

        Paragraph::new(visible).render(area, buf);
    }
}

/// Total laid-out height of the messages at this width
pub fn content_height(messages: &[ChatMessage], theme: &Theme, width: usize) -> usize {
    messages.iter().map(|m| m.lines(theme, width).len()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_avatars_are_fixed_per_role() {
        assert_eq!(Speaker::User.avatar(), "👤");
        assert_eq!(Speaker::Assistant.avatar(), "🤖");
    }

    #[test]
    fn test_user_message_layout() {
        let theme = Theme::dark();
        let lines = ChatMessage::user("Hello").lines(&theme, 40);
        let rendered: Vec<String> = lines.iter().map(text).collect();
        assert_eq!(rendered, vec!["👤 You", "   Hello", ""]);
    }

    #[test]
    fn test_assistant_message_renders_markdown() {
        let theme = Theme::dark();
        let lines = ChatMessage::assistant("- up\n- down").lines(&theme, 40);
        let rendered: Vec<String> = lines.iter().map(text).collect();
        assert_eq!(rendered, vec!["🤖 Assistant", "   • up", "   • down", ""]);
    }

    #[test]
    fn test_long_user_message_wraps() {
        let theme = Theme::dark();
        let message = ChatMessage::user("one two three four five six");
        let lines = message.lines(&theme, 13);
        assert!(lines.len() > 3);
        assert_eq!(
            content_height(&[message.clone(), message], &theme, 13),
            lines.len() * 2
        );
    }

    #[test]
    fn test_render_respects_scroll() {
        let theme = Theme::dark();
        let messages = vec![ChatMessage::user("first"), ChatMessage::user("second")];
        let area = Rect::new(0, 0, 20, 2);
        let mut buf = Buffer::empty(area);
        MessageList::new(&messages, &theme)
            .scroll(3)
            .render(area, &mut buf);

        let row: String = (0..20).map(|x| buf[(x, 1)].symbol().to_string()).collect();
        assert!(row.contains("second"));
    }
}
