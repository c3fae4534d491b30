use std::cell::Cell;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, TryRecvError};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use percent_encoding::percent_decode_str;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};
use url::Url;

use crate::apod::{FeedError, Record};
use crate::data::FeedService;
use crate::events::EventBus;
use crate::focus::{self, Focus};
use crate::gallery::{Gallery, View};
use crate::modal::{Hit, Modal, ModalEvent};
use crate::player;

// Palette
pub(crate) const COLOR_BG: Color = Color::Rgb(30, 30, 46);
pub(crate) const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
pub(crate) const COLOR_PANEL_FOCUSED_BG: Color = Color::Rgb(49, 50, 68);
pub(crate) const COLOR_PANEL_SELECTED_BG: Color = Color::Rgb(69, 71, 90);
pub(crate) const COLOR_OVERLAY_BG: Color = Color::Rgb(17, 17, 27);
pub(crate) const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
pub(crate) const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
pub(crate) const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
pub(crate) const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
pub(crate) const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
pub(crate) const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);

pub const TRIGGER_LABEL: &str = "Fetch Space Images";
pub const TRIGGER_LOADING_LABEL: &str = "Loading...";
const HEADER_TITLE: &str = "Astronomy Picture of the Day";
const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const MODAL_PAGE: i32 = 10;

pub type LinkOpener = Arc<dyn Fn(&str) -> Result<()> + Send + Sync>;

/// Opens links in the user's browser. Nothing about the viewer is handed to
/// the opened page: no opener handle, no referrer.
pub fn browser_opener() -> LinkOpener {
    Arc::new(|url: &str| {
        webbrowser::open(url).with_context(|| format!("open {url} in browser"))?;
        Ok(())
    })
}

pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let percent_x = percent_x.min(100);
    let percent_y = percent_y.min(100);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage(100 - percent_x - (100 - percent_x) / 2),
        ])
        .split(area);
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage(100 - percent_y - (100 - percent_y) / 2),
        ])
        .split(horizontal[1]);
    vertical[1]
}

/// Short display name for a media URL: its last path segment.
pub(crate) fn media_label(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .map(|segment| percent_decode_str(segment).decode_utf8_lossy().to_string())
        })
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| "media".to_string())
}

pub(crate) fn truncate_to_width(text: &str, width: usize) -> String {
    if UnicodeWidthStr::width(text) <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

fn is_focusable(focus: Focus, card_count: usize, trigger_enabled: bool) -> bool {
    match focus {
        Focus::Trigger => trigger_enabled,
        Focus::Card(index) => index < card_count,
        Focus::ModalClose | Focus::ModalWatch => false,
    }
}

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= Duration::from_millis(120) {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = now;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    enabled: bool,
    label: &'static str,
}

impl Trigger {
    fn idle() -> Self {
        Self {
            enabled: true,
            label: TRIGGER_LABEL,
        }
    }

    fn loading() -> Self {
        Self {
            enabled: false,
            label: TRIGGER_LOADING_LABEL,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

struct PendingFetch {
    request_id: u64,
    started: Instant,
    rx: Receiver<Result<Vec<Record>, FeedError>>,
}

#[derive(Clone)]
pub struct Options {
    pub status_message: String,
    pub feed_url: String,
    pub feed_service: Option<Arc<dyn FeedService + Send + Sync>>,
    pub player_command: Vec<String>,
    pub card_width: u16,
    pub card_height: u16,
    pub fetch_on_start: bool,
    pub link_opener: LinkOpener,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            status_message: String::new(),
            feed_url: crate::apod::DEFAULT_FEED_URL.to_string(),
            feed_service: None,
            player_command: vec!["mpv".into(), player::URL_PLACEHOLDER.into()],
            card_width: 34,
            card_height: 9,
            fetch_on_start: false,
            link_opener: browser_opener(),
        }
    }
}

pub struct Model {
    status_message: String,
    feed_url: String,
    feed_service: Option<Arc<dyn FeedService + Send + Sync>>,
    player_command: Vec<String>,
    link_opener: LinkOpener,
    records: Vec<Arc<Record>>,
    gallery: Gallery,
    modal: Modal,
    bus: EventBus<ModalEvent>,
    focus: Focus,
    trigger: Trigger,
    trigger_area: Cell<Option<Rect>>,
    pending_fetch: Option<PendingFetch>,
    next_request_id: u64,
    spinner: Spinner,
    needs_redraw: bool,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let mut model = Self {
            status_message: opts.status_message,
            feed_url: opts.feed_url,
            feed_service: opts.feed_service,
            player_command: opts.player_command,
            link_opener: opts.link_opener,
            records: Vec::new(),
            gallery: Gallery::new(opts.card_width, opts.card_height),
            modal: Modal::new(),
            bus: EventBus::new(),
            focus: Focus::Trigger,
            trigger: Trigger::idle(),
            trigger_area: Cell::new(None),
            pending_fetch: None,
            next_request_id: 1,
            spinner: Spinner::new(),
            needs_redraw: true,
        };
        if opts.fetch_on_start {
            model.fetch();
        }
        model
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        stdout.execute(EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(DisableMouseCapture)?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        loop {
            if self.poll_async() {
                self.mark_dirty();
            }
            if self.modal.reap_player() {
                self.status_message = "External player exited.".to_string();
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if key.modifiers.contains(KeyModifiers::CONTROL)
                            && key.code == KeyCode::Char('c')
                        {
                            break;
                        }
                        match self.handle_key(key.code) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                self.status_message = format!("Error: {}", err);
                                self.mark_dirty();
                            }
                        }
                    }
                    Event::Mouse(mouse) => {
                        if let Err(err) = self.handle_mouse(mouse) {
                            self.status_message = format!("Error: {}", err);
                            self.mark_dirty();
                        }
                    }
                    Event::Resize(_, _) => self.mark_dirty(),
                    _ => {}
                }
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                if self.is_loading() && self.spinner.advance() {
                    self.mark_dirty();
                }
            }
        }

        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn trigger(&self) -> Trigger {
        self.trigger
    }

    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    pub fn modal(&self) -> &Modal {
        &self.modal
    }

    /// The last successfully fetched feed.
    pub fn records(&self) -> &[Arc<Record>] {
        &self.records
    }

    pub fn is_loading(&self) -> bool {
        self.pending_fetch.is_some()
    }

    /// Starts a fetch unless one is already in flight.
    pub fn fetch(&mut self) {
        if self.pending_fetch.is_some() || !self.trigger.enabled {
            return;
        }
        let Some(service) = self.feed_service.clone() else {
            self.status_message = "No feed source configured.".to_string();
            self.mark_dirty();
            return;
        };

        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        let url = self.feed_url.clone();
        let (tx, rx) = bounded(1);

        self.trigger = Trigger::loading();
        self.gallery.show_loading();
        self.focus = Focus::Trigger;
        self.status_message = format!("Fetching {url}...");
        self.spinner.reset();
        tracing::info!(request_id, %url, "fetching feed");

        thread::spawn(move || {
            let result = service.load_feed(&url);
            let _ = tx.send(result);
        });

        self.pending_fetch = Some(PendingFetch {
            request_id,
            started: Instant::now(),
            rx,
        });
        self.mark_dirty();
    }

    /// Applies a finished fetch, if any. A worker that goes away without a
    /// reply counts as a failed fetch so the trigger always comes back.
    pub fn poll_async(&mut self) -> bool {
        let Some(pending) = &self.pending_fetch else {
            return false;
        };
        let result = match pending.rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Disconnected) => Err(FeedError::Network {
                url: self.feed_url.clone(),
                reason: "fetch worker exited without a reply".to_string(),
            }),
        };
        if let Some(pending) = self.pending_fetch.take() {
            self.finish_fetch(pending, result);
        }
        true
    }

    fn finish_fetch(&mut self, pending: PendingFetch, result: Result<Vec<Record>, FeedError>) {
        self.trigger = Trigger::idle();
        self.spinner.reset();
        let elapsed = pending.started.elapsed();

        match result {
            Ok(records) => {
                self.records = records.into_iter().map(Arc::new).collect();
                self.gallery.render(&self.records);
                tracing::info!(
                    request_id = pending.request_id,
                    count = self.records.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "feed loaded"
                );
                self.status_message = if self.records.is_empty() {
                    "The feed returned no items.".to_string()
                } else {
                    format!(
                        "Loaded {} items. Tab/arrows to move, Enter to open.",
                        self.records.len()
                    )
                };
            }
            Err(err) => {
                tracing::error!(
                    request_id = pending.request_id,
                    error = %err,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "feed fetch failed"
                );
                self.gallery.show_error();
                self.status_message = "Could not load the gallery.".to_string();
            }
        }
        self.mark_dirty();
    }

    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        if self.modal.is_open() {
            self.handle_modal_key(code)?;
            self.mark_dirty();
            return Ok(false);
        }

        match code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Tab => {
                self.set_focus(focus::next_in_page(self.focus, self.gallery.card_count(), true))
            }
            KeyCode::BackTab => {
                self.set_focus(focus::next_in_page(self.focus, self.gallery.card_count(), false))
            }
            // Space is consumed here; it never reaches the scroll handling below.
            KeyCode::Enter | KeyCode::Char(' ') => self.activate_focused(),
            KeyCode::Char('f') | KeyCode::Char('r') => self.fetch(),
            KeyCode::Char('w') => self.open_card_link(),
            KeyCode::Right | KeyCode::Char('l') => self.move_in_grid(1, 0),
            KeyCode::Left | KeyCode::Char('h') => self.move_in_grid(-1, 0),
            KeyCode::Down | KeyCode::Char('j') => self.move_in_grid(0, 1),
            KeyCode::Up | KeyCode::Char('k') => self.move_in_grid(0, -1),
            KeyCode::PageDown => {
                let rows = self.gallery.page_rows();
                self.gallery.scroll_by(rows);
            }
            KeyCode::PageUp => {
                let rows = self.gallery.page_rows();
                self.gallery.scroll_by(-rows);
            }
            KeyCode::Home if self.gallery.card_count() > 0 => self.set_focus(Focus::Card(0)),
            KeyCode::End if self.gallery.card_count() > 0 => {
                self.set_focus(Focus::Card(self.gallery.card_count() - 1))
            }
            _ => {}
        }
        self.mark_dirty();
        Ok(false)
    }

    fn handle_modal_key(&mut self, code: KeyCode) -> Result<()> {
        if self.bus.dispatch(code).contains(&ModalEvent::Dismiss) {
            self.close_modal();
            return Ok(());
        }

        match code {
            KeyCode::Tab | KeyCode::BackTab => self.focus = self.modal.cycle_focus(self.focus),
            KeyCode::Enter | KeyCode::Char(' ') => match self.focus {
                Focus::ModalWatch => self.open_modal_link(),
                _ => self.close_modal(),
            },
            KeyCode::Char('w') => self.open_modal_link(),
            KeyCode::Char('p') => self.play_video(),
            KeyCode::Down | KeyCode::Char('j') => self.modal.scroll(1),
            KeyCode::Up | KeyCode::Char('k') => self.modal.scroll(-1),
            KeyCode::PageDown => self.modal.scroll(MODAL_PAGE),
            KeyCode::PageUp => self.modal.scroll(-MODAL_PAGE),
            _ => {}
        }
        Ok(())
    }

    pub fn handle_mouse(&mut self, event: MouseEvent) -> Result<()> {
        match event.kind {
            MouseEventKind::Down(MouseButton::Left) => self.handle_click(event.column, event.row),
            MouseEventKind::ScrollDown if self.modal.is_open() => self.modal.scroll(1),
            MouseEventKind::ScrollUp if self.modal.is_open() => self.modal.scroll(-1),
            MouseEventKind::ScrollDown => self.gallery.scroll_by(1),
            MouseEventKind::ScrollUp => self.gallery.scroll_by(-1),
            _ => return Ok(()),
        }
        self.mark_dirty();
        Ok(())
    }

    fn handle_click(&mut self, column: u16, row: u16) {
        if self.modal.is_open() {
            match self.modal.hit_test(column, row) {
                Some(Hit::Close) | Some(Hit::Overlay) => self.close_modal(),
                Some(Hit::Watch) => {
                    self.focus = Focus::ModalWatch;
                    self.open_modal_link();
                }
                Some(Hit::Content) | None => {}
            }
            return;
        }

        let on_trigger = self.trigger_area.get().is_some_and(|area| {
            column >= area.x
                && column < area.x + area.width
                && row >= area.y
                && row < area.y + area.height
        });
        if on_trigger {
            if self.trigger.enabled {
                self.focus = Focus::Trigger;
                self.fetch();
            }
            return;
        }

        if let Some(index) = self.gallery.card_at(column, row) {
            self.focus = Focus::Card(index);
            self.open_card(index);
        }
    }

    fn set_focus(&mut self, focus: Focus) {
        self.focus = focus;
        if let Focus::Card(index) = focus {
            self.gallery.ensure_visible(index);
        }
    }

    fn move_in_grid(&mut self, dx: i32, dy: i32) {
        match self.focus {
            Focus::Trigger => {
                if (dx > 0 || dy > 0) && self.gallery.card_count() > 0 {
                    self.set_focus(Focus::Card(0));
                }
            }
            Focus::Card(index) => match self.gallery.neighbor(index, dx, dy) {
                Some(next) => self.set_focus(Focus::Card(next)),
                None if dy < 0 || (dx < 0 && index == 0) => self.set_focus(Focus::Trigger),
                None => {}
            },
            Focus::ModalClose | Focus::ModalWatch => {}
        }
    }

    fn activate_focused(&mut self) {
        match self.focus {
            Focus::Trigger => self.fetch(),
            Focus::Card(index) => self.open_card(index),
            Focus::ModalClose | Focus::ModalWatch => {}
        }
    }

    fn open_card(&mut self, index: usize) {
        let Some(record) = self.gallery.activate(index) else {
            return;
        };
        self.status_message = format!("Viewing \"{}\". Esc closes.", record.display_title());
        self.focus = self.modal.open(record, self.focus, &self.bus);
        self.mark_dirty();
    }

    pub fn close_modal(&mut self) {
        let card_count = self.gallery.card_count();
        let trigger_enabled = self.trigger.enabled;
        if !self.modal.is_open() {
            return;
        }
        let restored = self
            .modal
            .close(|focus| is_focusable(focus, card_count, trigger_enabled));
        self.focus = restored.unwrap_or(Focus::Trigger);
        if let Focus::Card(index) = self.focus {
            self.gallery.ensure_visible(index);
        }
        self.status_message.clear();
        self.mark_dirty();
    }

    fn open_card_link(&mut self) {
        let Focus::Card(index) = self.focus else {
            return;
        };
        let Some(url) = self
            .gallery
            .card(index)
            .and_then(|card| card.watch_link())
            .map(str::to_string)
        else {
            return;
        };
        self.open_link(&url);
    }

    fn open_modal_link(&mut self) {
        if let Some(url) = self.modal.watch_url().map(str::to_string) {
            self.open_link(&url);
        }
    }

    fn open_link(&mut self, url: &str) {
        match (self.link_opener)(url) {
            Ok(()) => {
                self.status_message = format!("Opened {url} in your browser.");
            }
            Err(err) => {
                tracing::warn!(%url, error = %err, "failed to open link");
                self.status_message = format!("Failed to open link: {err} (URL: {url})");
            }
        }
        self.mark_dirty();
    }

    fn play_video(&mut self) {
        let Some(url) = self.modal.watch_url().map(str::to_string) else {
            self.status_message = "Nothing to play for this item.".to_string();
            return;
        };
        let title = self
            .modal
            .record()
            .map(|record| record.display_title().to_string())
            .unwrap_or_default();
        match player::spawn(player::LaunchOptions {
            command: &self.player_command,
            url: &url,
            title: &title,
        }) {
            Ok(session) => {
                self.modal.attach_player(session);
                self.status_message = "Playing in external player. Closing the modal stops it.".to_string();
            }
            Err(err) => {
                tracing::warn!(%url, error = %err, "failed to launch player");
                self.status_message = format!("Failed to launch player: {err}");
            }
        }
    }

    pub fn draw(&mut self, frame: &mut Frame<'_>) {
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        let status_text = if self.is_loading() {
            format!("{} {}", self.spinner.frame(), self.status_message)
                .trim()
                .to_string()
        } else {
            self.status_message.clone()
        };
        let status_line = Paragraph::new(status_text).style(
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .bg(COLOR_PANEL_FOCUSED_BG)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(status_line, layout[0]);

        self.draw_header(frame, layout[1]);

        let focused_card = match self.focus {
            Focus::Card(index) => Some(index),
            _ => None,
        };
        self.gallery.draw(frame, layout[2], focused_card);

        let footer = Paragraph::new(self.footer_text())
            .style(
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(footer, layout[3]);

        if self.modal.is_open() {
            self.modal.draw(frame, full, self.focus);
        }
    }

    fn draw_header(&self, frame: &mut Frame<'_>, area: Rect) {
        let button_width = (TRIGGER_LABEL.chars().count() as u16 + 6).min(area.width);
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(button_width)])
            .split(area);

        let title = Paragraph::new(Line::from(Span::styled(
            HEADER_TITLE,
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD),
        )))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(COLOR_BORDER_IDLE))
                .style(Style::default().bg(COLOR_PANEL_BG)),
        );
        frame.render_widget(title, chunks[0]);

        let focused = self.focus == Focus::Trigger && !self.modal.is_open();
        let (border, text) = match (self.trigger.enabled, focused) {
            (false, _) => (
                Style::default().fg(COLOR_BORDER_IDLE),
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .add_modifier(Modifier::DIM),
            ),
            (true, true) => (
                Style::default().fg(COLOR_BORDER_FOCUSED),
                Style::default()
                    .fg(COLOR_TEXT_PRIMARY)
                    .bg(COLOR_PANEL_SELECTED_BG)
                    .add_modifier(Modifier::BOLD),
            ),
            (true, false) => (
                Style::default().fg(COLOR_BORDER_IDLE),
                Style::default().fg(COLOR_TEXT_PRIMARY),
            ),
        };
        let button = Paragraph::new(Span::styled(self.trigger.label, text))
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(border)
                    .style(Style::default().bg(COLOR_PANEL_BG)),
            );
        frame.render_widget(button, chunks[1]);
        self.trigger_area.set(Some(chunks[1]));
    }

    fn footer_text(&self) -> String {
        if self.modal.is_open() {
            let mut parts = vec!["Esc/Enter close", "Tab switch control", "j/k scroll"];
            if self.modal.watch_url().is_some() {
                parts.push("w open link");
                parts.push("p play");
            }
            return parts.join(" · ");
        }

        let mut parts: Vec<&str> = Vec::new();
        if self.trigger.enabled {
            parts.push("f/r fetch");
        }
        if self.gallery.view() == View::Cards {
            parts.push("Tab/arrows move");
            parts.push("Enter/Space open");
            parts.push("click a card");
        }
        if let Focus::Card(index) = self.focus {
            if self
                .gallery
                .card(index)
                .and_then(|card| card.watch_link())
                .is_some()
            {
                parts.push("w watch video");
            }
        }
        parts.push("q quit");
        parts.join(" · ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MockFeedService;
    use parking_lot::Mutex;
    use ratatui::backend::TestBackend;

    struct GatedService {
        gate: Mutex<Receiver<()>>,
        result: fn() -> Result<Vec<Record>, FeedError>,
    }

    impl FeedService for GatedService {
        fn load_feed(&self, _source_url: &str) -> Result<Vec<Record>, FeedError> {
            let _ = self.gate.lock().recv();
            (self.result)()
        }
    }

    fn options(service: Arc<dyn FeedService + Send + Sync>) -> Options {
        Options {
            feed_service: Some(service),
            link_opener: Arc::new(|_| Ok(())),
            ..Options::default()
        }
    }

    fn wait_for_fetch(model: &mut Model) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while model.is_loading() && Instant::now() < deadline {
            model.poll_async();
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!model.is_loading(), "fetch did not finish");
    }

    fn loaded_model() -> Model {
        let mut model = Model::new(options(Arc::new(MockFeedService)));
        model.fetch();
        wait_for_fetch(&mut model);
        model
    }

    fn draw(model: &mut Model) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| model.draw(frame)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer.content.iter().map(|cell| cell.symbol()).collect()
    }

    #[test]
    fn trigger_is_disabled_while_fetch_is_pending() {
        let (open_gate, gate) = bounded(1);
        let service = Arc::new(GatedService {
            gate: Mutex::new(gate),
            result: || Ok(Vec::new()),
        });
        let mut model = Model::new(options(service));
        model.fetch();
        assert!(model.is_loading());
        assert!(!model.trigger().is_enabled());
        assert_eq!(model.trigger().label(), TRIGGER_LOADING_LABEL);
        assert_eq!(model.gallery().view(), View::Loading);

        model.handle_key(KeyCode::Enter).unwrap();
        model.fetch();
        assert_eq!(model.next_request_id, 2);

        open_gate.send(()).unwrap();
        wait_for_fetch(&mut model);
        assert!(model.trigger().is_enabled());
        assert_eq!(model.trigger().label(), TRIGGER_LABEL);
        assert_eq!(model.gallery().view(), View::Empty);
    }

    #[test]
    fn failed_fetch_shows_error_and_resets_trigger() {
        let (open_gate, gate) = bounded(1);
        let service = Arc::new(GatedService {
            gate: Mutex::new(gate),
            result: || {
                Err(FeedError::Network {
                    url: "http://feed".into(),
                    reason: "HTTP status 503".into(),
                })
            },
        });
        let mut model = Model::new(options(service));
        model.fetch();
        open_gate.send(()).unwrap();
        wait_for_fetch(&mut model);
        assert_eq!(model.gallery().view(), View::Error);
        assert_eq!(model.gallery().card_count(), 0);
        assert!(model.trigger().is_enabled());
        assert_eq!(model.trigger().label(), TRIGGER_LABEL);
    }

    #[test]
    fn vanished_worker_still_resets_trigger() {
        let mut model = Model::new(options(Arc::new(MockFeedService)));
        let (tx, rx) = bounded(1);
        drop(tx);
        model.trigger = Trigger::loading();
        model.pending_fetch = Some(PendingFetch {
            request_id: 9,
            started: Instant::now(),
            rx,
        });
        assert!(model.poll_async());
        assert!(model.trigger().is_enabled());
        assert_eq!(model.gallery().view(), View::Error);
    }

    #[test]
    fn enter_and_space_open_focused_card() {
        let mut model = loaded_model();
        model.handle_key(KeyCode::Tab).unwrap();
        assert_eq!(model.focus(), Focus::Card(0));
        model.handle_key(KeyCode::Enter).unwrap();
        assert!(model.modal().is_open());
        assert_eq!(model.focus(), Focus::ModalClose);
        model.handle_key(KeyCode::Esc).unwrap();
        assert_eq!(model.focus(), Focus::Card(0));

        model.handle_key(KeyCode::Char(' ')).unwrap();
        assert!(model.modal().is_open());
    }

    #[test]
    fn space_never_scrolls_gallery() {
        let mut model = Model::new(Options {
            card_width: 90,
            card_height: 20,
            ..options(Arc::new(MockFeedService))
        });
        model.fetch();
        wait_for_fetch(&mut model);
        draw(&mut model);
        model.handle_key(KeyCode::PageDown).unwrap();
        assert_eq!(model.gallery().scroll_row(), 1);
        model.handle_key(KeyCode::PageUp).unwrap();

        model.handle_key(KeyCode::Tab).unwrap();
        model.handle_key(KeyCode::Char(' ')).unwrap();
        assert!(model.modal().is_open());
        model.close_modal();
        assert_eq!(model.gallery().scroll_row(), 0);
    }

    #[test]
    fn all_close_paths_converge() {
        let mut model = loaded_model();
        model.handle_key(KeyCode::Tab).unwrap();
        model.handle_key(KeyCode::Tab).unwrap();
        let origin = model.focus();
        assert_eq!(origin, Focus::Card(1));

        // close control
        model.handle_key(KeyCode::Enter).unwrap();
        model.handle_key(KeyCode::Enter).unwrap();
        assert!(!model.modal().is_open());
        assert_eq!(model.focus(), origin);

        // escape
        model.handle_key(KeyCode::Enter).unwrap();
        model.handle_key(KeyCode::Esc).unwrap();
        assert!(!model.modal().is_open());
        assert_eq!(model.focus(), origin);

        // overlay click
        model.handle_key(KeyCode::Enter).unwrap();
        draw(&mut model);
        let content = model.modal().content_area().unwrap();
        model.handle_click(content.x + 1, content.y + 1);
        assert!(model.modal().is_open());
        model.handle_click(0, 0);
        assert!(!model.modal().is_open());
        assert_eq!(model.focus(), origin);

        // clicked close control
        model.handle_key(KeyCode::Enter).unwrap();
        draw(&mut model);
        let close = model.modal().close_area().unwrap();
        model.handle_click(close.x + 1, close.y);
        assert!(!model.modal().is_open());
        assert_eq!(model.focus(), origin);
        assert_eq!(model.bus.listener_count(), 0);
    }

    #[test]
    fn keys_stay_inside_open_modal() {
        let mut model = loaded_model();
        model.handle_key(KeyCode::Tab).unwrap();
        model.handle_key(KeyCode::Enter).unwrap();
        assert!(!model.handle_key(KeyCode::Char('q')).unwrap());
        model.handle_key(KeyCode::Char('f')).unwrap();
        assert!(!model.is_loading());
        assert!(model.modal().is_open());
    }

    #[test]
    fn card_click_opens_that_record() {
        let mut model = loaded_model();
        draw(&mut model);
        let area = model.gallery().card_area(1).unwrap();
        model.handle_click(area.x + 1, area.y + 1);
        assert!(model.modal().is_open());
        assert!(Arc::ptr_eq(
            model.modal().record().unwrap(),
            &model.records()[1]
        ));
    }

    #[test]
    fn watch_link_opens_through_opener() {
        let opened = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = opened.clone();
        let mut model = Model::new(Options {
            feed_service: Some(Arc::new(MockFeedService)),
            link_opener: Arc::new(move |url: &str| {
                sink.lock().push(url.to_string());
                Ok(())
            }),
            ..Options::default()
        });
        model.fetch();
        wait_for_fetch(&mut model);

        for _ in 0..3 {
            model.handle_key(KeyCode::Tab).unwrap();
        }
        assert_eq!(model.focus(), Focus::Card(2));
        model.handle_key(KeyCode::Char('w')).unwrap();
        assert_eq!(opened.lock().as_slice(), ["https://vimeo.com/123456"]);
        assert!(!model.modal().is_open());
    }

    #[test]
    fn failed_link_open_is_reported() {
        let mut model = Model::new(Options {
            feed_service: Some(Arc::new(MockFeedService)),
            link_opener: Arc::new(|_| Err(anyhow::anyhow!("no browser"))),
            ..Options::default()
        });
        model.fetch();
        wait_for_fetch(&mut model);
        model.handle_key(KeyCode::Tab).unwrap();
        model.handle_key(KeyCode::Tab).unwrap();
        model.handle_key(KeyCode::Enter).unwrap();
        model.handle_key(KeyCode::Char('w')).unwrap();
        assert!(model.status_message().starts_with("Failed to open link: no browser"));
        assert!(model.modal().is_open());
    }

    #[test]
    fn refetch_key_is_listed_and_works() {
        let mut model = loaded_model();
        assert!(model.footer_text().contains("f/r fetch"));
        model.handle_key(KeyCode::Char('r')).unwrap();
        assert!(model.is_loading());
        assert!(!model.footer_text().contains("fetch"));
        wait_for_fetch(&mut model);
        assert_eq!(model.gallery().card_count(), 4);
    }

    #[test]
    fn draw_shows_trigger_and_gallery_state() {
        let mut model = Model::new(options(Arc::new(MockFeedService)));
        let screen = draw(&mut model);
        assert!(screen.contains(TRIGGER_LABEL));
        assert!(screen.contains("Fetch Space Images"));

        model.fetch();
        wait_for_fetch(&mut model);
        let screen = draw(&mut model);
        assert!(screen.contains("Gallery (4)"));
    }

    #[test]
    fn truncate_respects_display_width() {
        assert_eq!(truncate_to_width("abc", 5), "abc");
        assert_eq!(truncate_to_width("abcdef", 4), "abc…");
        assert_eq!(truncate_to_width("abc", 0), "");
    }

    #[test]
    fn media_label_uses_last_segment() {
        assert_eq!(media_label("https://apod.nasa.gov/apod/image/m1%20hd.jpg"), "m1 hd.jpg");
        assert_eq!(media_label("not a url"), "media");
    }
}
