//! Animated status spinner shown while a run is pending

use crate::theme::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};
use std::time::{Duration, Instant};

const FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const FRAME_DURATION: Duration = Duration::from_millis(80);

/// Spinner with a status label and elapsed time
pub struct Spinner<'a> {
    label: &'a str,
    theme: &'a Theme,
    started: Instant,
}

impl<'a> Spinner<'a> {
    pub fn new(label: &'a str, theme: &'a Theme, started: Instant) -> Self {
        Self {
            label,
            theme,
            started,
        }
    }

    fn frame(elapsed: Duration) -> &'static str {
        let index = (elapsed.as_millis() / FRAME_DURATION.as_millis()) as usize;
        FRAMES[index % FRAMES.len()]
    }
}

impl Widget for Spinner<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width < 3 || area.height == 0 {
            return;
        }

        let elapsed = self.started.elapsed();
        let line = Line::from(vec![
            Span::styled(
                format!("{} {}", Self::frame(elapsed), self.label),
                self.theme.accent_style(),
            ),
            Span::styled(
                format!("  {}s · Esc to cancel", elapsed.as_secs()),
                self.theme.dim_style(),
            ),
        ]);
        Paragraph::new(line).render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_cycle() {
        assert_eq!(Spinner::frame(Duration::ZERO), "⠋");
        assert_eq!(Spinner::frame(Duration::from_millis(85)), "⠙");
        assert_eq!(Spinner::frame(FRAME_DURATION * FRAMES.len() as u32), "⠋");
    }

    #[test]
    fn test_render_shows_label() {
        let theme = Theme::dark();
        let area = Rect::new(0, 0, 40, 1);
        let mut buf = Buffer::empty(area);
        Spinner::new("in_progress", &theme, Instant::now()).render(area, &mut buf);

        let row: String = (0..40).map(|x| buf[(x, 0)].symbol().to_string()).collect();
        assert!(row.contains("in_progress"));
    }
}
