//! Terminal chat UI
//!
//! Presentation only: renders the session's message list and input line,
//! and turns key presses into orchestrator events. All decisions live in
//! the state machine; the UI's single job beyond event dispatch is keeping
//! exactly one spawned operation in flight and feeding its outcome back.

use crate::client::{AiClient, FileStoreClient};
use crate::config::ClientConfig;
use crate::orchestrator::{Event, Message, MessageKind};
use crate::runtime::{ChatApi, ChatSession, WorkItem};
use crossterm::event::{self, Event as TermEvent, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};
use ratatui::{Frame, Terminal};
use std::io;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Run the chat client until the user quits.
pub async fn run(config: ClientConfig) -> io::Result<()> {
    let api = AiClient::new(&config);
    let store = FileStoreClient::new();

    // Startup probe: unreachable backend is a warning, not a failure.
    let greeting = match api.health().await {
        Ok(()) => Message::system(format!("Connected to AI service at {}", config.ai_service_url)),
        Err(error) => Message::system(format!(
            "AI service at {} is unreachable ({error}); messages will fail until it is up",
            config.ai_service_url
        )),
    };

    let mut app = App::new(ChatSession::new(api, store));
    app.session.push_message(greeting);
    app.session.push_message(Message::system(
        "Commands: /attach <path>, /detach, /quit",
    ));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = app.run(&mut terminal).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

struct App {
    session: ChatSession<AiClient, FileStoreClient>,
    input: String,
    /// Whether the file prompt was open on the previous pass, to clear the
    /// input buffer on mode changes.
    was_picking: bool,
    /// The single in-flight operation. The work item is kept alongside the
    /// handle so a dead task still yields its terminal failure event.
    pending: Option<(WorkItem, JoinHandle<Event>)>,
    should_quit: bool,
}

impl App {
    fn new(session: ChatSession<AiClient, FileStoreClient>) -> Self {
        Self {
            session,
            input: String::new(),
            was_picking: false,
            pending: None,
            should_quit: false,
        }
    }

    async fn run(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> io::Result<()> {
        loop {
            self.reap_pending().await;
            self.sync_picker_mode();

            terminal.draw(|frame| self.render(frame))?;

            if self.should_quit {
                return Ok(());
            }

            if !event::poll(Duration::from_millis(100))? {
                continue;
            }
            if let TermEvent::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    self.handle_key(key.code, key.modifiers);
                }
            }
        }
    }

    /// Collect the outcome of a finished operation and dispatch it. A task
    /// that died still produces its terminal failure event, so the session
    /// can never be left busy.
    async fn reap_pending(&mut self) {
        let finished = self
            .pending
            .as_ref()
            .is_some_and(|(_, handle)| handle.is_finished());
        if !finished {
            return;
        }

        let (work, handle) = self.pending.take().expect("pending operation must exist");
        let event = match handle.await {
            Ok(event) => event,
            Err(error) => work.failure_event(format!("operation aborted: {error}")),
        };
        let next = self.session.dispatch(event);
        self.spawn(next);
    }

    fn spawn(&mut self, work: Option<WorkItem>) {
        if let Some(work) = work {
            let handle = tokio::spawn(self.session.work_future(work.clone()));
            self.pending = Some((work, handle));
        }
    }

    fn picking(&self) -> bool {
        self.session.state().awaiting_pick().is_some()
    }

    fn sync_picker_mode(&mut self) {
        let picking = self.picking();
        if picking != self.was_picking {
            self.input.clear();
            self.was_picking = picking;
        }
    }

    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        match code {
            KeyCode::Enter => self.submit(),
            KeyCode::Esc => {
                if self.picking() {
                    let work = self.session.dismiss_picker();
                    self.spawn(work);
                    self.input.clear();
                }
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char(c) => self.input.push(c),
            _ => {}
        }
    }

    fn submit(&mut self) {
        let line = self.input.trim().to_string();
        self.input.clear();

        if self.picking() {
            // Empty path: keep the prompt open, nothing to do.
            if line.is_empty() {
                return;
            }
            if !std::path::Path::new(&line).is_file() {
                self.session
                    .push_message(Message::error(format!("File not found: {line}")));
                return;
            }
            let work = self.session.choose_file(line);
            self.spawn(work);
            return;
        }

        // Sends while an operation is in flight are ignored; the state
        // machine treats them as no-ops too, so this is belt only.
        if self.session.is_busy() {
            return;
        }

        if line == "/quit" {
            self.should_quit = true;
        } else if line == "/detach" {
            let work = self.session.detach();
            self.spawn(work);
        } else if let Some(path) = line.strip_prefix("/attach ") {
            let path = path.trim();
            if !std::path::Path::new(path).is_file() {
                self.session
                    .push_message(Message::error(format!("File not found: {path}")));
                return;
            }
            let work = self.session.attach(path);
            self.spawn(work);
        } else {
            let work = self.session.send(line);
            self.spawn(work);
        }
    }

    fn render(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),
                Constraint::Length(3),
                Constraint::Length(1),
            ])
            .split(frame.area());

        // Message list, pinned to the tail.
        let height = chunks[0].height.saturating_sub(2) as usize;
        let messages = self.session.messages();
        let skip = messages.len().saturating_sub(height.max(1));
        let items: Vec<ListItem> = messages
            .iter()
            .skip(skip)
            .map(|message| ListItem::new(render_message(message)))
            .collect();
        let list = List::new(items).block(Block::default().borders(Borders::ALL).title("filechat"));
        frame.render_widget(list, chunks[0]);

        // Input line; the title doubles as the picker prompt.
        let title = if let Some(prompt) = self.session.picker_prompt() {
            format!("{prompt} (enter a file path, Esc to cancel)")
        } else if self.session.is_busy() {
            "Processing...".to_string()
        } else {
            "Message".to_string()
        };
        let input_style = if self.session.is_busy() && !self.picking() {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };
        let input = Paragraph::new(self.input.as_str())
            .style(input_style)
            .block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(input, chunks[1]);
        frame.set_cursor_position((
            chunks[1].x + self.input.chars().count() as u16 + 1,
            chunks[1].y + 1,
        ));

        // Status line: busy indicator + attachment slot.
        let mut status = Vec::new();
        if self.session.is_busy() {
            status.push(Span::styled(
                "● processing ",
                Style::default().fg(Color::Yellow),
            ));
        }
        if let Some(file) = self.session.attached() {
            status.push(Span::styled(
                format!("📎 {} ", file.name),
                Style::default().fg(Color::Cyan),
            ));
        }
        status.push(Span::styled(
            "/attach <path>  /detach  /quit",
            Style::default().fg(Color::DarkGray),
        ));
        frame.render_widget(Paragraph::new(Line::from(status)), chunks[2]);
    }
}

fn render_message(message: &Message) -> Line<'_> {
    match message.kind {
        MessageKind::User => Line::from(vec![
            Span::styled("you> ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            Span::raw(message.text.as_str()),
        ]),
        MessageKind::Assistant => Line::from(vec![
            Span::styled("ai>  ", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
            Span::raw(message.text.as_str()),
        ]),
        MessageKind::System => Line::from(Span::styled(
            format!("* {}", message.text),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
        MessageKind::Error => Line::from(vec![
            Span::styled("error: ", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
            Span::styled(message.text.as_str(), Style::default().fg(Color::Red)),
        ]),
    }
}
