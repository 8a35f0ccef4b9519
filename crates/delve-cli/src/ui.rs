//! TUI implementation for delve

use tokio::sync::mpsc;

use chrono::Utc;
use crossterm::event::{Event, EventStream, MouseEventKind};
use delve_api::{HistorySession, SearchResult, Stats};
use delve_app::{
    AppEvent, Controller, EntryKind, LogEntry, MessageLog, format_server_time, session_detail,
    session_label, session_title,
};
use delve_tui::{
    TerminalSession, Theme,
    input::{Action, confirmation_answer, event_to_action},
    widgets::{
        ChatMessage, HistoryPanel, InputBox, MessageList, PanelItem, PanelMode,
        Selector, SelectorItem, SelectorState, Spinner, history_panel::truncate,
        message_list::calculate_message_height,
    },
};
use futures::{FutureExt, StreamExt, future::LocalBoxFuture};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Clear, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap,
    },
};
use std::time::{Duration, Instant};

use crate::commands::{self, CommandResult};
use crate::config::Settings;

const SIDEBAR_WIDTH: u16 = 34;
/// Below this terminal width the sidebar is hidden
const SIDEBAR_MIN_TOTAL: u16 = 90;
const CONFIRM_WIDTH: u16 = 60;

const CHAT_PLACEHOLDER: &str = "Ask a research question... (/help for commands)";
const SEARCH_PLACEHOLDER: &str = "Search past research (Enter to search, Esc to cancel)";

/// Messages sent from UI to the controller loop
#[derive(Debug, PartialEq)]
pub enum UiMessage {
    /// User submitted a question
    Submit(String),
    /// Slash command
    Command(String),
    /// Search history; empty lists all sessions
    Search(String),
    /// Load a stored session
    LoadSession(String),
    /// Start a new session
    NewSession,
    /// Answer to the pending confirmation
    Confirm(bool),
    /// User requested quit
    Quit,
}

/// A controller call that runs while the UI keeps drawing
#[derive(Debug)]
enum Operation {
    Initialize,
    Submit(String),
    Search(String),
    Load(String),
    Confirm(bool),
}

/// Progress stages shown while a question is being researched
const RESEARCH_STAGES: &[&str] = &[
    "Analyzing your question...",
    "Searching the web...",
    "Processing results...",
    "Generating response...",
];
/// Time each stage stays on screen
const STAGE_INTERVAL: Duration = Duration::from_secs(2);

impl Operation {
    fn stages(&self) -> &'static [&'static str] {
        match self {
            Self::Initialize => &["Connecting..."],
            Self::Submit(_) => RESEARCH_STAGES,
            Self::Search(_) => &["Searching..."],
            Self::Load(_) => &["Loading session..."],
            Self::Confirm(_) => &["Working..."],
        }
    }
}

/// Stage label for the time spent so far, cycling through the stages
fn stage_label(stages: &'static [&'static str], elapsed: Duration) -> &'static str {
    if stages.is_empty() {
        return "";
    }
    let step = (elapsed.as_millis() / STAGE_INTERVAL.as_millis()) as usize;
    stages[step % stages.len()]
}

/// Run an operation; resolves to an error message to show, if any
fn run_operation(
    controller: &mut Controller,
    operation: Operation,
) -> LocalBoxFuture<'_, Option<String>> {
    async move {
        match operation {
            Operation::Initialize => {
                controller.initialize().await;
                None
            }
            Operation::Submit(text) => controller.submit(&text).await.err().map(|e| e.to_string()),
            Operation::Search(query) => {
                controller.search(&query).await;
                None
            }
            Operation::Load(session_id) => controller
                .load_session(&session_id)
                .await
                .err()
                .map(|e| format!("Failed to load session: {}", e)),
            Operation::Confirm(yes) => {
                controller.answer_confirmation(yes).await;
                None
            }
        }
    }
    .boxed_local()
}

/// View of a log entry for the message list
fn chat_message(entry: &LogEntry) -> ChatMessage {
    let message = match entry.kind {
        EntryKind::User => ChatMessage::user(entry.content.clone()),
        EntryKind::Assistant if entry.is_streaming => {
            ChatMessage::assistant_streaming(entry.content.clone())
        }
        EntryKind::Assistant => ChatMessage::assistant(entry.content.clone()),
        EntryKind::Notice => return ChatMessage::notice(entry.content.clone(), entry.is_error),
    };
    message
        .with_error(entry.is_error)
        .with_time(entry.time_display())
}

/// TUI application state
pub struct TuiState {
    /// Chat bubbles
    log: MessageLog,
    /// Input box
    input: InputBox,
    /// Whether the input box edits a search query
    search_mode: bool,
    /// Width of the input box at the last render
    input_width: u16,
    /// Current scroll position
    scroll: usize,
    /// Progress stages of the running operation
    busy: Option<&'static [&'static str]>,
    /// Current status message
    status: String,
    /// Theme
    theme: Theme,
    /// Server shown in the status bar
    base_url: String,
    use_streaming: bool,
    session_id: Option<String>,
    sessions: Vec<HistorySession>,
    search_results: Vec<SearchResult>,
    stats: Stats,
    /// What the sidebar lists
    panel_mode: PanelMode,
    panel_focused: bool,
    panel_selected: usize,
    /// Session picker popup
    session_selector: SelectorState,
    /// Prompt of the pending confirmation
    confirmation: Option<String>,
    /// Channel to the controller loop
    ui_tx: mpsc::Sender<UiMessage>,
    /// Spinner start time for animation
    spinner_start: Instant,
}

impl TuiState {
    pub fn new(
        theme: Theme,
        base_url: String,
        use_streaming: bool,
        ui_tx: mpsc::Sender<UiMessage>,
    ) -> Self {
        let mut input = InputBox::new()
            .with_placeholder(CHAT_PLACEHOLDER)
            .with_disabled_placeholder("Waiting for the reply...");
        input.set_focused(true);

        Self {
            log: MessageLog::new(),
            input,
            search_mode: false,
            input_width: 80,
            scroll: 0,
            busy: None,
            status: "Ready".to_string(),
            theme,
            base_url,
            use_streaming,
            session_id: None,
            sessions: Vec::new(),
            search_results: Vec::new(),
            stats: Stats::default(),
            panel_mode: PanelMode::Sessions,
            panel_focused: false,
            panel_selected: 0,
            session_selector: SelectorState::default(),
            confirmation: None,
            ui_tx,
            spinner_start: Instant::now(),
        }
    }

    /// Handle controller events
    pub fn handle_app_event(&mut self, event: AppEvent) {
        self.log.apply(&event);

        match event {
            AppEvent::LoadingChanged { loading } => {
                self.input.set_enabled(!loading);
            }
            AppEvent::SessionAssigned { session_id } => {
                self.session_id = Some(session_id);
            }
            AppEvent::MessageEnd { .. } => {
                self.status = "Ready".to_string();
            }
            AppEvent::SubmissionFailed { .. } => {
                self.status = "Request failed".to_string();
            }
            AppEvent::HistoryLoaded { sessions } => {
                self.sessions = sessions;
                self.clamp_selection();
            }
            AppEvent::SearchResults { query, results } => {
                self.panel_mode = PanelMode::Search(query);
                self.search_results = results;
                self.panel_selected = 0;
            }
            AppEvent::StatsUpdated { stats } => {
                self.stats = stats;
            }
            AppEvent::SessionLoaded { session_id, .. } => {
                self.session_id = Some(session_id);
                self.status = "Session loaded".to_string();
            }
            AppEvent::SessionCleared => {
                self.session_id = None;
                self.status = "New session".to_string();
            }
            AppEvent::StreamingChanged { enabled } => {
                self.use_streaming = enabled;
                self.show_notice(
                    &format!("Streaming {}", if enabled { "on" } else { "off" }),
                    false,
                );
            }
            AppEvent::ConfirmationRequested { prompt } => {
                self.confirmation = Some(prompt);
            }
            AppEvent::ConfirmationCancelled => {
                self.confirmation = None;
                self.status = "Cancelled".to_string();
            }
            _ => {}
        }
    }

    /// Show a notice line in the conversation
    pub fn show_notice(&mut self, content: &str, is_error: bool) {
        self.log.push_notice(content, is_error);
    }

    fn begin_operation(&mut self, operation: &Operation) {
        self.busy = Some(operation.stages());
        self.spinner_start = Instant::now();
    }

    fn end_operation(&mut self) {
        self.busy = None;
    }

    fn panel_len(&self) -> usize {
        match self.panel_mode {
            PanelMode::Sessions => self.sessions.len(),
            PanelMode::Search(_) => self.search_results.len(),
        }
    }

    fn clamp_selection(&mut self) {
        self.panel_selected = self.panel_selected.min(self.panel_len().saturating_sub(1));
        self.session_selector.clamp(self.sessions.len());
    }

    /// Session behind the highlighted sidebar entry
    fn selected_panel_session(&self) -> Option<String> {
        match self.panel_mode {
            PanelMode::Sessions => self
                .sessions
                .get(self.panel_selected)
                .map(|s| s.session_id.clone()),
            PanelMode::Search(_) => self
                .search_results
                .get(self.panel_selected)
                .map(|r| r.session_id.clone()),
        }
    }

    fn set_search_mode(&mut self, enabled: bool) {
        self.search_mode = enabled;
        if enabled {
            self.input.set_title(Some("Search".to_string()));
            self.input.set_placeholder(SEARCH_PLACEHOLDER);
        } else {
            self.input.set_title(None);
            self.input.set_placeholder(CHAT_PLACEHOLDER);
        }
    }

    fn set_panel_focus(&mut self, focused: bool) {
        self.panel_focused = focused;
        self.input.set_focused(!focused);
        if focused {
            self.clamp_selection();
        }
    }

    fn open_session_selector(&mut self) {
        self.session_selector.selected = self
            .session_id
            .as_deref()
            .and_then(|id| self.sessions.iter().position(|s| s.session_id == id))
            .unwrap_or(0);
        self.session_selector.show();
    }

    fn scroll_up(&mut self, lines: usize) {
        self.log.scroll_manually();
        self.scroll = self.scroll.saturating_sub(lines);
    }

    fn scroll_down(&mut self, lines: usize) {
        self.log.scroll_manually();
        self.scroll = self.scroll.saturating_add(lines);
    }

    fn handle_mouse(&mut self, kind: MouseEventKind) {
        match kind {
            MouseEventKind::ScrollUp => self.scroll_up(3),
            MouseEventKind::ScrollDown => self.scroll_down(3),
            _ => {}
        }
    }

    /// Handle a key while an operation is running. Returns false to quit.
    fn handle_busy_action(&mut self, action: Action) -> bool {
        match action {
            Action::Interrupt => return false,
            Action::PageUp => self.scroll_up(10),
            Action::PageDown => self.scroll_down(10),
            Action::Submit
            | Action::Tab
            | Action::Escape
            | Action::SessionSelect
            | Action::NewSession
            | Action::Search => {}
            _ => {
                // Still allow typing during processing
                self.input.handle_action(&action, self.input_width);
            }
        }
        true
    }

    /// Handle keyboard action. Returns false to quit.
    pub async fn handle_action(&mut self, action: Action) -> bool {
        if self.confirmation.is_some() {
            if action == Action::Interrupt {
                let _ = self.ui_tx.send(UiMessage::Quit).await;
                return false;
            }
            if let Some(yes) = confirmation_answer(&action) {
                self.confirmation = None;
                let _ = self.ui_tx.send(UiMessage::Confirm(yes)).await;
            }
            return true;
        }

        if self.session_selector.visible {
            match action {
                Action::Up => self.session_selector.up(self.sessions.len()),
                Action::Down => self.session_selector.down(self.sessions.len()),
                Action::Submit => {
                    self.session_selector.hide();
                    if let Some(session) = self.sessions.get(self.session_selector.selected) {
                        let id = session.session_id.clone();
                        let _ = self.ui_tx.send(UiMessage::LoadSession(id)).await;
                    }
                }
                Action::Escape | Action::SessionSelect => self.session_selector.hide(),
                Action::Interrupt => {
                    let _ = self.ui_tx.send(UiMessage::Quit).await;
                    return false;
                }
                _ => {}
            }
            return true;
        }

        if self.panel_focused {
            let count = self.panel_len();
            match action {
                Action::Up if count > 0 => {
                    self.panel_selected = self.panel_selected.saturating_sub(1);
                }
                Action::Down if count > 0 => {
                    self.panel_selected = (self.panel_selected + 1).min(count - 1);
                }
                Action::Submit => {
                    if let Some(id) = self.selected_panel_session() {
                        self.set_panel_focus(false);
                        let _ = self.ui_tx.send(UiMessage::LoadSession(id)).await;
                    }
                }
                Action::Tab => self.set_panel_focus(false),
                Action::Escape => {
                    self.set_panel_focus(false);
                    if matches!(self.panel_mode, PanelMode::Search(_)) {
                        self.panel_mode = PanelMode::Sessions;
                        self.panel_selected = 0;
                    }
                }
                Action::Interrupt => {
                    let _ = self.ui_tx.send(UiMessage::Quit).await;
                    return false;
                }
                _ => {}
            }
            return true;
        }

        match action {
            Action::Submit => {
                if self.search_mode {
                    let query = self.input.content().trim().to_string();
                    self.input.clear();
                    self.set_search_mode(false);
                    if query.is_empty() {
                        self.panel_mode = PanelMode::Sessions;
                    }
                    let _ = self.ui_tx.send(UiMessage::Search(query)).await;
                } else if let Some(text) = self.input.take() {
                    let message = if text.starts_with('/') {
                        UiMessage::Command(text)
                    } else {
                        UiMessage::Submit(text)
                    };
                    let _ = self.ui_tx.send(message).await;
                }
                true
            }
            Action::Interrupt => {
                let _ = self.ui_tx.send(UiMessage::Quit).await;
                false
            }
            Action::Escape => {
                if self.search_mode {
                    self.input.clear();
                    self.set_search_mode(false);
                }
                true
            }
            Action::PageUp => {
                self.scroll_up(10);
                true
            }
            Action::PageDown => {
                self.scroll_down(10);
                true
            }
            Action::Tab => {
                self.set_panel_focus(true);
                true
            }
            Action::SessionSelect => {
                self.open_session_selector();
                true
            }
            Action::NewSession => {
                let _ = self.ui_tx.send(UiMessage::NewSession).await;
                true
            }
            Action::Search => {
                self.set_search_mode(true);
                true
            }
            _ => {
                self.input.handle_action(&action, self.input_width);
                true
            }
        }
    }

    /// Render the UI
    pub fn render(&mut self, frame: &mut Frame) {
        let size = frame.area();

        let (sidebar, main) = if size.width >= SIDEBAR_MIN_TOTAL {
            let columns = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(1)])
                .split(size);
            (Some(columns[0]), columns[1])
        } else {
            (None, size)
        };

        // Layout: messages (flex), status bar (1), input (3)
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),
                Constraint::Length(1),
                Constraint::Length(3),
            ])
            .split(main);

        if let Some(area) = sidebar {
            let items = self.panel_items(Utc::now());
            let footer = format!(
                "{} queries · {} sessions",
                self.stats.total_queries, self.stats.total_sessions
            );
            let panel = HistoryPanel::new(&items, &self.panel_mode, &self.theme)
                .footer(footer)
                .selected(Some(self.panel_selected))
                .focused(self.panel_focused);
            frame.render_widget(panel, area);
        }

        self.render_messages(frame, chunks[0]);
        self.render_status(frame, chunks[1]);

        self.input_width = chunks[2].width;
        self.input.render(chunks[2], frame.buffer_mut(), &self.theme);

        if self.session_selector.visible {
            self.render_session_selector(frame, size);
        }

        if let Some(prompt) = &self.confirmation {
            self.render_confirmation(frame, size, prompt);
        }
    }

    /// Sidebar rows for the current panel mode
    fn panel_items(&self, now: chrono::DateTime<Utc>) -> Vec<PanelItem> {
        match self.panel_mode {
            PanelMode::Sessions => self
                .sessions
                .iter()
                .map(|session| PanelItem {
                    title: session_title(session),
                    detail: session_detail(session, now),
                    when: None,
                    is_current: self.session_id.as_deref() == Some(session.session_id.as_str()),
                })
                .collect(),
            PanelMode::Search(_) => self
                .search_results
                .iter()
                .map(|result| PanelItem {
                    title: result.query.clone(),
                    detail: result.preview(),
                    when: Some(
                        result
                            .created_at
                            .as_deref()
                            .map(|raw| format_server_time(raw, now))
                            .unwrap_or_default(),
                    ),
                    is_current: false,
                })
                .collect(),
        }
    }

    fn render_session_selector(&self, frame: &mut Frame, area: Rect) {
        let now = Utc::now();
        let items: Vec<SelectorItem> = self
            .sessions
            .iter()
            .map(|session| SelectorItem {
                label: truncate(&session_title(session), 50),
                description: Some(session_detail(session, now)),
                is_current: self.session_id.as_deref() == Some(session.session_id.as_str()),
            })
            .collect();

        let selector = Selector::new("Research Sessions", items, &self.theme)
            .with_selected(self.session_selector.selected);

        selector.render_centered(area, frame.buffer_mut());
    }

    fn render_confirmation(&self, frame: &mut Frame, area: Rect, prompt: &str) {
        let width = CONFIRM_WIDTH.min(area.width);
        let inner_width = width.saturating_sub(2).max(1) as usize;
        let prompt_lines: usize = prompt
            .lines()
            .map(|line| line.chars().count().div_ceil(inner_width).max(1))
            .sum();
        let height = (prompt_lines as u16 + 4).min(area.height);
        let popup = Rect::new(
            area.x + area.width.saturating_sub(width) / 2,
            area.y + area.height.saturating_sub(height) / 2,
            width,
            height,
        );
        frame.render_widget(Clear, popup);

        let mut lines: Vec<Line> = prompt
            .lines()
            .map(|line| Line::from(Span::styled(line.to_string(), self.theme.base_style())))
            .collect();
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("[y] ", self.theme.accent_bold()),
            Span::styled("Yes   ", self.theme.base_style()),
            Span::styled("[n] ", self.theme.accent_bold()),
            Span::styled("No", self.theme.base_style()),
        ]));

        let block = Block::default()
            .title(" Confirm ")
            .title_style(self.theme.warning_style().add_modifier(Modifier::BOLD))
            .borders(Borders::ALL)
            .border_style(self.theme.warning_style());
        let paragraph = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, popup);
    }

    fn render_messages(&mut self, frame: &mut Frame, area: Rect) {
        let title = format!(
            " delve │ {} ",
            session_label(self.session_id.as_deref(), &self.sessions)
        );
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border_style())
            .title(title);

        let inner = block.inner(area);
        frame.render_widget(block, area);

        if inner.height == 0 {
            return;
        }

        if self.log.shows_welcome() {
            frame.render_widget(self.welcome(), inner);
            return;
        }

        let messages: Vec<ChatMessage> = self.log.entries().iter().map(chat_message).collect();
        let content_height = calculate_message_height(&messages, &self.theme, inner.width as usize);
        let max_scroll = content_height.saturating_sub(inner.height as usize);

        if self.log.follows_tail() {
            self.scroll = max_scroll;
        } else {
            self.scroll = self.scroll.min(max_scroll);
        }

        let message_list = MessageList::new(&messages, &self.theme)
            .scroll(self.scroll)
            .animation_start(self.spinner_start);
        frame.render_widget(message_list, inner);

        // Render scrollbar if content overflows
        if content_height > inner.height as usize {
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"))
                .track_symbol(Some("│"))
                .thumb_symbol("█");

            let mut scrollbar_state = ScrollbarState::new(content_height)
                .position(self.scroll)
                .viewport_content_length(inner.height as usize);

            frame.render_stateful_widget(scrollbar, inner, &mut scrollbar_state);
        }
    }

    fn welcome(&self) -> Paragraph<'static> {
        let key = |keys: &'static str, what: &'static str| {
            Line::from(vec![
                Span::styled(format!("    {:<10}", keys), self.theme.accent_style()),
                Span::styled(what, self.theme.base_style()),
            ])
        };

        Paragraph::new(vec![
            Line::from(""),
            Line::from(vec![
                Span::styled(
                    "  ◆ ",
                    Style::default()
                        .fg(self.theme.accent)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    "delve",
                    self.theme.base_style().add_modifier(Modifier::BOLD),
                ),
                Span::styled(" - research assistant", self.theme.dim_style()),
            ]),
            Line::from(""),
            Line::from(Span::styled(
                format!("  Server: {}", self.base_url),
                self.theme.dim_style(),
            )),
            Line::from(""),
            Line::from(Span::styled("  Keybindings", self.theme.warning_style())),
            Line::from(""),
            key("Enter", "Send question"),
            key("Ctrl+K", "Browse sessions"),
            key("Ctrl+N", "New session"),
            key("Ctrl+F", "Search history"),
            key("Tab", "Focus history sidebar"),
            key("PgUp/Dn", "Scroll conversation"),
            key("Ctrl+C", "Quit"),
            Line::from(""),
            Line::from(Span::styled(
                "  Ask a question to get started...",
                self.theme.dim_style(),
            )),
        ])
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        if let Some(stages) = self.busy {
            // Use animated spinner during processing
            let label = stage_label(stages, self.spinner_start.elapsed());
            let spinner = Spinner::new(label, &self.theme).with_start_time(self.spinner_start);
            frame.render_widget(spinner, area);
            return;
        }

        let stream = if self.use_streaming {
            "stream on"
        } else {
            "stream off"
        };
        let left_content = format!("{} │ {} │ {}", self.base_url, stream, self.status);
        let right_content = "Ctrl+K: sessions │ Ctrl+N: new │ Ctrl+F: search │ Ctrl+C: quit";

        let left_width = left_content.chars().count();
        let right_width = right_content.chars().count();
        let available = area.width as usize;

        let line = if left_width + right_width + 2 <= available {
            let spacing = available - left_width - right_width;
            Line::from(vec![
                Span::styled(left_content, self.theme.dim_style()),
                Span::raw(" ".repeat(spacing)),
                Span::styled(right_content, Style::default().fg(Color::DarkGray)),
            ])
        } else {
            Line::from(Span::styled(left_content, self.theme.dim_style()))
        };

        frame.render_widget(Paragraph::new(line), area);
    }
}

/// What the loop does after a slash command
enum Flow {
    Continue,
    Run(Operation),
    Quit,
}

fn apply_command(controller: &mut Controller, state: &mut TuiState, input: &str) -> Flow {
    let Some(result) = commands::execute_command(input, controller.state()) else {
        return Flow::Continue;
    };

    match result {
        CommandResult::Message(msg) => state.show_notice(&msg, false),
        CommandResult::NewSession => controller.start_new_session(),
        CommandResult::ShowHistory => state.open_session_selector(),
        CommandResult::Search(query) => return Flow::Run(Operation::Search(query)),
        CommandResult::Load(session_id) => return Flow::Run(Operation::Load(session_id)),
        CommandResult::ShowStats => {
            state.show_notice(&commands::format_stats(&controller.state().stats), false)
        }
        CommandResult::SetStreaming(enabled) => {
            controller.toggle_streaming(enabled);
        }
        CommandResult::ClearHistory => controller.request_clear_history(),
        CommandResult::Reset => controller.request_reset(),
        CommandResult::Exit => return Flow::Quit,
        CommandResult::Unknown(cmd) => state.show_notice(
            &format!("Unknown command: /{}\nType /help for available commands.", cmd),
            true,
        ),
    }
    Flow::Continue
}

/// Run the TUI application
pub async fn run_tui(controller: &mut Controller, settings: &Settings) -> anyhow::Result<()> {
    let mut terminal = TerminalSession::enter()?;

    // Create channels
    let (ui_tx, mut ui_rx) = mpsc::channel::<UiMessage>(32);

    let theme = Theme::named(&settings.theme).unwrap_or_default();
    let mut state = TuiState::new(
        theme,
        settings.base_url.clone(),
        controller.state().use_streaming,
        ui_tx,
    );

    // Subscribe to controller events
    let mut app_rx = controller.subscribe();

    // Event stream
    let mut event_stream = EventStream::new();

    // Tick interval for animations (80ms for smooth spinner)
    let mut tick_interval = tokio::time::interval(Duration::from_millis(80));

    // Operation to run at the start of the next loop iteration
    let mut pending: Option<Operation> = Some(Operation::Initialize);

    loop {
        if let Some(operation) = pending.take() {
            state.begin_operation(&operation);
            let mut future = run_operation(controller, operation);

            // Poll it alongside other events until completion
            loop {
                terminal.draw(|frame| state.render(frame))?;

                tokio::select! {
                    biased;

                    outcome = &mut future => {
                        if let Some(message) = outcome {
                            state.show_notice(&message, true);
                        }
                        break;
                    }

                    Some(app_event) = app_rx.recv() => {
                        state.handle_app_event(app_event);
                    }

                    // Input works during processing
                    event = event_stream.next() => {
                        match event {
                            Some(Ok(Event::Mouse(mouse))) => state.handle_mouse(mouse.kind),
                            Some(Ok(event)) => {
                                if let Some(action) = event_to_action(event) {
                                    if !state.handle_busy_action(action) {
                                        return Ok(());
                                    }
                                }
                            }
                            Some(Err(_)) | None => return Ok(()),
                        }
                    }

                    _ = tick_interval.tick() => {}
                }
            }

            // Drain any remaining events after the operation completes
            while let Ok(app_event) = app_rx.try_recv() {
                state.handle_app_event(app_event);
            }
            state.end_operation();
            continue;
        }

        terminal.draw(|frame| state.render(frame))?;

        tokio::select! {
            biased;

            Some(app_event) = app_rx.recv() => {
                state.handle_app_event(app_event);
            }

            event = event_stream.next() => {
                match event {
                    Some(Ok(Event::Mouse(mouse))) => state.handle_mouse(mouse.kind),
                    Some(Ok(event)) => {
                        if let Some(action) = event_to_action(event) {
                            if !state.handle_action(action).await {
                                break Ok(());
                            }
                        }
                    }
                    Some(Err(e)) => {
                        break Err(anyhow::anyhow!("Event error: {}", e));
                    }
                    None => {
                        break Ok(());
                    }
                }
            }

            _ = tick_interval.tick() => {}

            msg = ui_rx.recv() => {
                match msg {
                    Some(UiMessage::Submit(text)) => pending = Some(Operation::Submit(text)),
                    Some(UiMessage::Command(cmd)) => match apply_command(controller, &mut state, &cmd) {
                        Flow::Continue => {}
                        Flow::Run(operation) => pending = Some(operation),
                        Flow::Quit => break Ok(()),
                    },
                    Some(UiMessage::Search(query)) => pending = Some(Operation::Search(query)),
                    Some(UiMessage::LoadSession(id)) => pending = Some(Operation::Load(id)),
                    Some(UiMessage::NewSession) => controller.start_new_session(),
                    Some(UiMessage::Confirm(yes)) => pending = Some(Operation::Confirm(yes)),
                    Some(UiMessage::Quit) | None => break Ok(()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{Terminal, backend::TestBackend};

    fn state() -> (TuiState, mpsc::Receiver<UiMessage>) {
        let (tx, rx) = mpsc::channel(8);
        (
            TuiState::new(Theme::dark(), "http://127.0.0.1:5000".into(), true, tx),
            rx,
        )
    }

    fn session(id: &str) -> HistorySession {
        HistorySession {
            session_id: id.into(),
            created_at: None,
            updated_at: None,
            query_count: 1,
            last_query: Some(format!("query {}", id)),
        }
    }

    async fn type_text(state: &mut TuiState, text: &str) {
        for c in text.chars() {
            state.handle_action(Action::Char(c)).await;
        }
    }

    #[tokio::test]
    async fn test_submit_and_command_routing() {
        let (mut state, mut rx) = state();
        type_text(&mut state, "what is rust").await;
        state.handle_action(Action::Submit).await;
        assert_eq!(rx.try_recv().unwrap(), UiMessage::Submit("what is rust".into()));

        type_text(&mut state, "/stats").await;
        state.handle_action(Action::Submit).await;
        assert_eq!(rx.try_recv().unwrap(), UiMessage::Command("/stats".into()));

        state.handle_action(Action::Submit).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_confirmation_captures_keys() {
        let (mut state, mut rx) = state();
        state.handle_app_event(AppEvent::ConfirmationRequested {
            prompt: "Sure?".into(),
        });
        state.handle_action(Action::Char('x')).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(state.input.content(), "");

        state.handle_action(Action::Char('y')).await;
        assert_eq!(rx.try_recv().unwrap(), UiMessage::Confirm(true));
        assert!(state.confirmation.is_none());
    }

    #[tokio::test]
    async fn test_search_mode() {
        let (mut state, mut rx) = state();
        state.handle_action(Action::Search).await;
        type_text(&mut state, " tokio ").await;
        state.handle_action(Action::Submit).await;
        assert_eq!(rx.try_recv().unwrap(), UiMessage::Search("tokio".into()));
        assert!(!state.search_mode);

        state.panel_mode = PanelMode::Search("tokio".into());
        state.handle_action(Action::Search).await;
        state.handle_action(Action::Submit).await;
        assert_eq!(rx.try_recv().unwrap(), UiMessage::Search(String::new()));
        assert_eq!(state.panel_mode, PanelMode::Sessions);
    }

    #[tokio::test]
    async fn test_sidebar_loads_selected_session() {
        let (mut state, mut rx) = state();
        state.handle_app_event(AppEvent::HistoryLoaded {
            sessions: vec![session("a"), session("b")],
        });
        state.handle_action(Action::Tab).await;
        state.handle_action(Action::Down).await;
        state.handle_action(Action::Down).await;
        assert_eq!(state.panel_selected, 1);
        state.handle_action(Action::Submit).await;
        assert_eq!(rx.try_recv().unwrap(), UiMessage::LoadSession("b".into()));
        assert!(!state.panel_focused);
    }

    #[tokio::test]
    async fn test_session_selector_starts_at_current() {
        let (mut state, mut rx) = state();
        state.handle_app_event(AppEvent::HistoryLoaded {
            sessions: vec![session("a"), session("b"), session("c")],
        });
        state.handle_app_event(AppEvent::SessionAssigned {
            session_id: "c".into(),
        });
        state.handle_action(Action::SessionSelect).await;
        assert!(state.session_selector.visible);
        assert_eq!(state.session_selector.selected, 2);
        state.handle_action(Action::Down).await;
        state.handle_action(Action::Submit).await;
        assert_eq!(rx.try_recv().unwrap(), UiMessage::LoadSession("a".into()));
        assert!(!state.session_selector.visible);
    }

    #[test]
    fn test_loading_disables_input() {
        let (mut state, _rx) = state();
        state.handle_app_event(AppEvent::LoadingChanged { loading: true });
        assert!(!state.input.is_enabled());
        state.handle_app_event(AppEvent::LoadingChanged { loading: false });
        assert!(state.input.is_enabled());
    }

    #[test]
    fn test_panel_items_follow_mode() {
        let (mut state, _rx) = state();
        state.handle_app_event(AppEvent::HistoryLoaded {
            sessions: vec![session("a"), session("b")],
        });
        state.session_id = Some("b".into());
        let now = Utc::now();
        let items = state.panel_items(now);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "query a");
        assert!(items[1].is_current);

        state.handle_app_event(AppEvent::SearchResults {
            query: "tokio".into(),
            results: vec![SearchResult {
                id: Some(1),
                session_id: "a".into(),
                query: "what is tokio".into(),
                response: "An async runtime".into(),
                created_at: Some("not a date".into()),
            }],
        });
        let items = state.panel_items(now);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "what is tokio");
        assert_eq!(items[0].when.as_deref(), Some("not a date"));
    }

    #[test]
    fn test_log_entries_become_chat_messages() {
        let mut log = MessageLog::new();
        log.push_user("hi");
        log.begin_streaming();
        log.push_notice("Streaming off", true);
        let messages: Vec<ChatMessage> = log.entries().iter().map(chat_message).collect();
        assert_eq!(messages[0].kind, delve_tui::widgets::MessageKind::User);
        assert!(!messages[0].time.is_empty());
        assert!(messages[1].is_streaming);
        assert_eq!(messages[2].kind, delve_tui::widgets::MessageKind::Notice);
        assert!(messages[2].is_error);
    }

    #[test]
    fn test_research_stages_advance_every_two_seconds() {
        let stages = Operation::Submit("q".into()).stages();
        assert_eq!(stage_label(stages, Duration::ZERO), "Analyzing your question...");
        assert_eq!(stage_label(stages, Duration::from_millis(2100)), "Searching the web...");
        assert_eq!(stage_label(stages, Duration::from_secs(6)), "Generating response...");
        assert_eq!(stage_label(stages, Duration::from_secs(8)), "Analyzing your question...");
        let search = Operation::Search("x".into()).stages();
        assert_eq!(stage_label(search, Duration::from_secs(5)), "Searching...");
    }

    #[test]
    fn test_busy_keys_keep_typing_but_not_submitting() {
        let (mut state, mut rx) = state();
        assert!(state.handle_busy_action(Action::Char('a')));
        assert!(state.handle_busy_action(Action::Submit));
        assert_eq!(state.input.content(), "a");
        assert!(rx.try_recv().is_err());
        assert!(!state.handle_busy_action(Action::Interrupt));
    }

    #[test]
    fn test_render_welcome_and_conversation() {
        let (mut state, _rx) = state();
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|frame| state.render(frame)).unwrap();
        let screen: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(screen.contains("research assistant"));
        assert!(screen.contains("No research history yet"));

        state.handle_app_event(AppEvent::UserMessage {
            text: "hello there".into(),
        });
        state.handle_app_event(AppEvent::MessageEnd {
            text: "general kenobi".into(),
        });
        terminal.draw(|frame| state.render(frame)).unwrap();
        let screen: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(screen.contains("hello there"));
        assert!(screen.contains("general kenobi"));
    }
}
