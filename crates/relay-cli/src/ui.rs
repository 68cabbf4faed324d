//! TUI implementation for relay

use crossterm::{
    event::{
        DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
        Event, EventStream, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};
use relay_agent::{Interaction, InteractionEvent, Reply, ResourceManifest, Session};
use relay_ai::{Message, ThreadId};
use relay_tui::{
    Theme,
    input::{Action, key_to_action},
    widgets::{ChatMessage, InputBox, MessageList, Spinner, message_list::content_height},
};
use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use crate::commands::{self, CommandResult, execute_command};
use crate::config::Settings;

type Term = Terminal<CrosstermBackend<Stdout>>;

/// What the event loop should do after an idle key press
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Submit(String),
    Command(String),
    ClearHistory,
    NewThread,
    Quit,
}

/// TUI application state
pub struct TuiState {
    /// Rendered chat entries
    messages: Vec<ChatMessage>,
    input: InputBox,
    /// Current scroll position; `usize::MAX` means "stick to the bottom"
    scroll: usize,
    /// Set while a run is pending
    pending_since: Option<Instant>,
    status: String,
    theme: Theme,
    title: String,
    thread: Option<ThreadId>,
}

impl TuiState {
    pub fn new(settings: &Settings, session: &Session) -> Self {
        let mut input = InputBox::new().with_placeholder(settings.placeholder.clone());
        input.set_focused(true);

        let mut state = Self {
            messages: Vec::new(),
            input,
            scroll: 0,
            pending_since: None,
            status: "Ready".to_string(),
            theme: Theme::by_name(&settings.theme),
            title: settings.title.clone(),
            thread: session.thread().cloned(),
        };
        state.load_history(session.history());
        state
    }

    fn load_history(&mut self, history: &[Message]) {
        self.messages = history
            .iter()
            .map(|m| {
                if m.is_user() {
                    ChatMessage::user(&m.content)
                } else {
                    ChatMessage::assistant(&m.content)
                }
            })
            .collect();
        self.scroll_to_bottom();
    }

    fn scroll_to_bottom(&mut self) {
        // Resolved during render once the content height is known
        self.scroll = usize::MAX;
    }

    fn show_system_message(&mut self, content: &str) {
        self.messages.push(ChatMessage::system(content));
        self.scroll_to_bottom();
    }

    fn show_error(&mut self, content: &str) {
        self.messages.push(ChatMessage::error(content));
        self.scroll_to_bottom();
    }

    fn scroll_mouse(&mut self, kind: MouseEventKind) {
        match kind {
            MouseEventKind::ScrollUp => self.scroll = self.scroll.saturating_sub(3),
            MouseEventKind::ScrollDown => self.scroll = self.scroll.saturating_add(3),
            _ => {}
        }
    }

    fn begin_pending(&mut self) {
        self.pending_since = Some(Instant::now());
        self.status = "Thinking...".to_string();
    }

    /// Handle interaction events while a run is pending
    fn handle_event(&mut self, event: InteractionEvent) {
        match event {
            InteractionEvent::ThreadCreated { thread_id } => {
                self.thread = Some(thread_id);
            }
            InteractionEvent::RunStarted { .. } => {
                self.status = "Run started".to_string();
            }
            InteractionEvent::RunStatus { status, .. } => {
                self.status = format!("Assistant is working ({})", status);
            }
            InteractionEvent::ImageSaved { path } => {
                tracing::debug!(path = %path.display(), "chart saved");
            }
            // The outcome of `ask` is rendered in `finish`
            InteractionEvent::Submitted { .. }
            | InteractionEvent::Reply { .. }
            | InteractionEvent::Error { .. } => {}
        }
    }

    fn finish(&mut self, outcome: relay_agent::Result<Reply>) {
        self.pending_since = None;
        match outcome {
            Ok(reply) => {
                self.messages
                    .push(ChatMessage::assistant(reply.message.content));
                self.status = "Ready".to_string();
            }
            Err(e) if e.is_cancelled() => {
                self.show_system_message("Cancelled.");
                self.status = "Cancelled".to_string();
            }
            Err(e) => {
                self.show_error(&e.to_string());
                self.status = "Error".to_string();
            }
        }
        self.scroll_to_bottom();
    }

    /// Handle a key while no run is pending
    fn handle_action(&mut self, action: Action, width: u16) -> Flow {
        match action {
            Action::Submit => {
                let content = self.input.take();
                let content = content.trim();
                if content.is_empty() {
                    Flow::Continue
                } else if content.starts_with('/') {
                    Flow::Command(content.to_string())
                } else {
                    self.messages.push(ChatMessage::user(content));
                    self.scroll_to_bottom();
                    Flow::Submit(content.to_string())
                }
            }
            Action::Quit | Action::Eof | Action::Interrupt => Flow::Quit,
            // Esc only cancels runs; when idle it just drops the draft
            Action::Escape => {
                self.input.clear();
                Flow::Continue
            }
            Action::ClearHistory => Flow::ClearHistory,
            Action::NewThread => Flow::NewThread,
            Action::PageUp => {
                self.scroll = self.scroll.saturating_sub(10);
                Flow::Continue
            }
            Action::PageDown => {
                self.scroll = self.scroll.saturating_add(10);
                Flow::Continue
            }
            action => {
                self.input.handle_action(&action, width);
                Flow::Continue
            }
        }
    }

    /// Render the UI
    pub fn render(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),    // Messages
                Constraint::Length(1), // Status
                Constraint::Length(3), // Input
            ])
            .split(frame.area());

        self.render_messages(frame, chunks[0]);
        self.render_status(frame, chunks[1]);
        self.input
            .render(chunks[2], frame.buffer_mut(), &self.theme);
    }

    fn render_messages(&mut self, frame: &mut Frame, area: Rect) {
        let thread = self
            .thread
            .as_ref()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "new thread".to_string());
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border_style())
            .title(Span::styled(format!(" {} ", self.title), self.theme.accent_bold()))
            .title(Span::styled(format!(" {} ", thread), self.theme.dim_style()));

        let inner = block.inner(area);
        frame.render_widget(block, area);

        if inner.height == 0 {
            return;
        }
        if self.messages.is_empty() {
            frame.render_widget(self.welcome(), inner);
            return;
        }

        let width = inner.width.saturating_sub(1) as usize;
        let height = content_height(&self.messages, &self.theme, width);
        let max_scroll = height.saturating_sub(inner.height as usize);
        self.scroll = self.scroll.min(max_scroll);

        let list_area = Rect {
            width: inner.width.saturating_sub(1),
            ..inner
        };
        frame.render_widget(
            MessageList::new(&self.messages, &self.theme).scroll(self.scroll),
            list_area,
        );

        if height > inner.height as usize {
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"))
                .track_symbol(Some("│"))
                .thumb_symbol("█");
            let mut scrollbar_state = ScrollbarState::new(max_scroll).position(self.scroll);
            frame.render_stateful_widget(scrollbar, inner, &mut scrollbar_state);
        }
    }

    fn welcome(&self) -> Paragraph<'static> {
        let key = |k: &str, what: &str| {
            Line::from(vec![
                Span::styled(format!("    {:<10}", k), self.theme.accent_style()),
                Span::styled(what.to_string(), self.theme.base_style()),
            ])
        };
        Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(
                format!("  🤖 {}", self.title),
                self.theme.accent_bold(),
            )),
            Line::from(Span::styled(
                "  Ask questions about your dataset; charts are saved alongside the history.",
                self.theme.dim_style(),
            )),
            Line::from(""),
            Line::from(Span::styled("  Keybindings", self.theme.user_style())),
            Line::from(""),
            key("Enter", "Send question"),
            key("Ctrl+L", "Clear chat history"),
            key("Ctrl+N", "Start a new thread"),
            key("Esc", "Cancel a pending run"),
            key("Ctrl+C", "Quit"),
            key("PgUp/Dn", "Scroll history"),
            Line::from(""),
            Line::from(Span::styled(
                "  Type /help for commands.",
                self.theme.dim_style(),
            )),
        ])
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        if let Some(started) = self.pending_since {
            frame.render_widget(Spinner::new(&self.status, &self.theme, started), area);
            return;
        }

        let left = self.status.as_str();
        let right = "Ctrl+L: clear │ Ctrl+N: new thread │ Ctrl+C: quit";
        let available = area.width as usize;
        let used = left.chars().count() + right.chars().count();

        let line = if used + 2 <= available {
            Line::from(vec![
                Span::styled(left.to_string(), self.theme.dim_style()),
                Span::raw(" ".repeat(available - used)),
                Span::styled(right, self.theme.dim_style()),
            ])
        } else {
            Line::from(Span::styled(left.to_string(), self.theme.dim_style()))
        };
        frame.render_widget(Paragraph::new(line), area);
    }
}

/// Run the TUI application
pub async fn run_tui(
    session: &mut Session,
    interaction: &Interaction,
    manifest: &ResourceManifest,
    settings: &Settings,
) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableBracketedPaste
    )?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = event_loop(&mut terminal, session, interaction, manifest, settings).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableBracketedPaste
    )?;
    terminal.show_cursor()?;

    result
}

async fn event_loop(
    terminal: &mut Term,
    session: &mut Session,
    interaction: &Interaction,
    manifest: &ResourceManifest,
    settings: &Settings,
) -> anyhow::Result<()> {
    let mut state = TuiState::new(settings, session);
    let mut events = interaction.subscribe();
    let handle = interaction.handle();
    let mut event_stream = EventStream::new();

    // Tick interval for animations (80ms for smooth spinner)
    let mut tick_interval = tokio::time::interval(Duration::from_millis(80));

    let mut pending_prompt: Option<String> = None;

    loop {
        if let Some(content) = pending_prompt.take() {
            state.begin_pending();
            let mut quit_requested = false;

            let outcome = {
                let mut ask = std::pin::pin!(interaction.ask(session, &content));
                loop {
                    terminal.draw(|frame| state.render(frame))?;
                    let width = terminal.size()?.width;

                    tokio::select! {
                        biased;

                        result = &mut ask => break result,

                        event = events.recv() => {
                            if let Ok(event) = event {
                                state.handle_event(event);
                            }
                        }

                        // Input keeps working while the run is polled
                        event = event_stream.next() => {
                            match event {
                                Some(Ok(Event::Key(key))) => match key_to_action(key) {
                                    Action::Interrupt | Action::Escape => {
                                        handle.abort();
                                        state.status = "Cancelling...".to_string();
                                    }
                                    Action::Quit | Action::Eof => {
                                        handle.abort();
                                        quit_requested = true;
                                    }
                                    Action::ClearHistory | Action::NewThread | Action::Submit => {
                                        state.status = "Busy - wait for the reply or press Esc".to_string();
                                    }
                                    Action::PageUp => state.scroll = state.scroll.saturating_sub(10),
                                    Action::PageDown => state.scroll = state.scroll.saturating_add(10),
                                    action => {
                                        state.input.handle_action(&action, width);
                                    }
                                },
                                Some(Ok(Event::Paste(text))) => {
                                    state.input.handle_action(&Action::Paste(text), width);
                                }
                                Some(Ok(Event::Mouse(mouse))) => state.scroll_mouse(mouse.kind),
                                Some(Ok(_)) => {}
                                Some(Err(_)) | None => {
                                    handle.abort();
                                    quit_requested = true;
                                }
                            }
                        }

                        _ = tick_interval.tick() => {}
                    }
                }
            };

            while let Ok(event) = events.try_recv() {
                state.handle_event(event);
            }
            state.finish(outcome);

            if quit_requested {
                return Ok(());
            }
            continue;
        }

        terminal.draw(|frame| state.render(frame))?;
        let width = terminal.size()?.width;

        let flow = tokio::select! {
            event = event_stream.next() => {
                match event {
                    Some(Ok(Event::Key(key))) => state.handle_action(key_to_action(key), width),
                    Some(Ok(Event::Paste(text))) => state.handle_action(Action::Paste(text), width),
                    Some(Ok(Event::Mouse(mouse))) => {
                        state.scroll_mouse(mouse.kind);
                        Flow::Continue
                    }
                    Some(Ok(_)) => Flow::Continue,
                    Some(Err(e)) => return Err(anyhow::anyhow!("Event error: {}", e)),
                    None => Flow::Quit,
                }
            }

            _ = tick_interval.tick() => Flow::Continue,
        };

        match flow {
            Flow::Continue => {}
            Flow::Submit(content) => pending_prompt = Some(content),
            Flow::Command(input) => match execute_command(&input, session, manifest) {
                Some(CommandResult::Message(msg)) => state.show_system_message(&msg),
                Some(CommandResult::ClearHistory) => clear_history(&mut state, session),
                Some(CommandResult::NewThread) => {
                    new_thread(&mut state, session, interaction).await
                }
                Some(CommandResult::Exit) => return Ok(()),
                Some(CommandResult::Unknown(cmd)) => state.show_system_message(&format!(
                    "Unknown command: /{}\nType /help for available commands.",
                    cmd
                )),
                None => {}
            },
            Flow::ClearHistory => clear_history(&mut state, session),
            Flow::NewThread => new_thread(&mut state, session, interaction).await,
            Flow::Quit => return Ok(()),
        }
    }
}

fn clear_history(state: &mut TuiState, session: &mut Session) {
    match commands::clear_history(session) {
        Ok(notice) => {
            state.load_history(session.history());
            state.status = notice;
        }
        Err(e) => state.show_error(&format!("Failed to clear history: {}", e)),
    }
}

async fn new_thread(state: &mut TuiState, session: &mut Session, interaction: &Interaction) {
    match commands::new_thread(session, interaction.controller()).await {
        Ok(notice) => {
            state.thread = session.thread().cloned();
            state.show_system_message(&notice);
            state.status = "Ready".to_string();
        }
        Err(e) => state.show_error(&format!("Failed to start a new thread: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Overrides};
    use relay_agent::MemoryStore;
    use ratatui::backend::TestBackend;

    fn settings() -> Settings {
        Config::default().resolve(&Overrides::default(), |_| None)
    }

    fn session_with(messages: &[Message]) -> Session {
        let mut session = Session::open(Box::new(MemoryStore::new())).unwrap();
        for m in messages {
            session.push(m.clone()).unwrap();
        }
        session
    }

    fn type_text(state: &mut TuiState, text: &str) {
        state.handle_action(Action::Paste(text.to_string()), 80);
    }

    #[test]
    fn test_history_is_rendered_in_order() {
        let session = session_with(&[Message::user("Hello"), Message::assistant("Hi")]);
        let state = TuiState::new(&settings(), &session);
        assert_eq!(
            state.messages,
            vec![ChatMessage::user("Hello"), ChatMessage::assistant("Hi")]
        );
    }

    #[test]
    fn test_submit_routes_prompts_and_commands() {
        let session = session_with(&[]);
        let mut state = TuiState::new(&settings(), &session);

        type_text(&mut state, "What are the trends?");
        assert_eq!(
            state.handle_action(Action::Submit, 80),
            Flow::Submit("What are the trends?".into())
        );
        assert_eq!(state.messages.len(), 1);

        type_text(&mut state, "/clear");
        assert_eq!(
            state.handle_action(Action::Submit, 80),
            Flow::Command("/clear".into())
        );
        assert_eq!(state.handle_action(Action::Submit, 80), Flow::Continue);
    }

    #[test]
    fn test_shortcuts() {
        let session = session_with(&[]);
        let mut state = TuiState::new(&settings(), &session);
        assert_eq!(state.handle_action(Action::ClearHistory, 80), Flow::ClearHistory);
        assert_eq!(state.handle_action(Action::NewThread, 80), Flow::NewThread);
        assert_eq!(state.handle_action(Action::Interrupt, 80), Flow::Quit);
    }

    #[test]
    fn test_escape_when_idle_keeps_running() {
        let session = session_with(&[]);
        let mut state = TuiState::new(&settings(), &session);

        type_text(&mut state, "half a question");
        assert_eq!(state.handle_action(Action::Escape, 80), Flow::Continue);
        assert!(state.input.is_empty());
    }

    #[test]
    fn test_clear_history_empties_view_and_session() {
        let mut session = session_with(&[Message::user("Hello"), Message::assistant("Hi")]);
        let mut state = TuiState::new(&settings(), &session);

        clear_history(&mut state, &mut session);
        assert!(state.messages.is_empty());
        assert!(session.history().is_empty());
        assert_eq!(state.status, "Cleared 2 messages.");
    }

    #[test]
    fn test_finish_shows_cancellation_and_errors() {
        let session = session_with(&[]);
        let mut state = TuiState::new(&settings(), &session);

        state.begin_pending();
        state.finish(Err(relay_agent::Error::Cancelled));
        assert!(state.pending_since.is_none());
        assert_eq!(state.messages.last(), Some(&ChatMessage::system("Cancelled.")));

        state.finish(Err(relay_agent::Error::Bootstrap("boom".into())));
        assert_eq!(
            state.messages.last(),
            Some(&ChatMessage::error("Bootstrap failed: boom"))
        );
    }

    #[test]
    fn test_render_shows_avatars() {
        let session = session_with(&[Message::user("Hello"), Message::assistant("Hi")]);
        let mut state = TuiState::new(&settings(), &session);
        let mut terminal = Terminal::new(TestBackend::new(60, 20)).unwrap();

        terminal.draw(|frame| state.render(frame)).unwrap();

        let buffer = terminal.backend().buffer();
        let screen: String = buffer.content().iter().map(|c| c.symbol()).collect();
        assert!(screen.contains("👤"));
        assert!(screen.contains("🤖"));
        assert!(screen.contains("Hello"));
    }
}
