use std::cell::Cell;
use std::sync::Arc;

use crossterm::event::KeyCode;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;
use textwrap::wrap;

use crate::apod::Record;
use crate::events::{EventBus, Subscription};
use crate::focus::Focus;
use crate::media::{self, Media};
use crate::player::PlayerSession;
use crate::ui::{
    centered_rect, media_label, COLOR_ACCENT, COLOR_BORDER_FOCUSED, COLOR_OVERLAY_BG,
    COLOR_PANEL_BG, COLOR_PANEL_SELECTED_BG, COLOR_TEXT_PRIMARY, COLOR_TEXT_SECONDARY,
};

pub const CLOSE_LABEL: &str = "[ Close ]";
pub const WATCH_LABEL: &str = "Watch on YouTube ↗";
pub const EXTERNAL_HINT: &str = "Videos play in your browser or external player (p).";
pub const UNAVAILABLE_MESSAGE: &str = "Media not available.";

/// Page-level events the modal listens for while it is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalEvent {
    Dismiss,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaNode {
    Image { url: String },
    Thumbnail { url: String },
    WatchLink { url: String },
    Hint(String),
    Unavailable,
    Unsupported(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hit {
    Close,
    Watch,
    Content,
    Overlay,
}

/// The reusable detail surface. Built on the first open and kept for the
/// lifetime of the application.
#[derive(Default)]
pub struct Surface {
    visible: bool,
    title: String,
    date: String,
    explanation: String,
    copyright: Option<String>,
    media: Vec<MediaNode>,
    scroll: u16,
    max_scroll: Cell<Option<u16>>,
    player: Option<PlayerSession>,
    escape: Option<Subscription>,
    content_area: Cell<Option<Rect>>,
    close_area: Cell<Option<Rect>>,
    watch_area: Cell<Option<Rect>>,
}

impl Surface {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    pub fn media(&self) -> &[MediaNode] {
        &self.media
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    fn watch_url(&self) -> Option<&str> {
        self.media.iter().find_map(|node| match node {
            MediaNode::WatchLink { url } => Some(url.as_str()),
            _ => None,
        })
    }
}

#[derive(Default)]
pub struct Modal {
    surface: Option<Surface>,
    record: Option<Arc<Record>>,
    previous_focus: Option<Focus>,
    created: usize,
}

impl Modal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.surface.as_ref().is_some_and(Surface::is_visible)
    }

    pub fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    /// How many surfaces were ever built; stays at one after the first open.
    pub fn surfaces_created(&self) -> usize {
        self.created
    }

    pub fn record(&self) -> Option<&Arc<Record>> {
        self.record.as_ref()
    }

    pub fn previous_focus(&self) -> Option<Focus> {
        self.previous_focus
    }

    pub fn watch_url(&self) -> Option<&str> {
        self.surface.as_ref().and_then(Surface::watch_url)
    }

    /// Shows `record`, replacing whatever was displayed. Returns the control
    /// that now holds focus.
    pub fn open(
        &mut self,
        record: Arc<Record>,
        current_focus: Focus,
        bus: &EventBus<ModalEvent>,
    ) -> Focus {
        let was_open = self.is_open();
        if self.surface.is_none() {
            self.created += 1;
        }
        let surface = self.surface.get_or_insert_with(Surface::default);

        surface.title = record.display_title().to_string();
        surface.date = record.display_date().to_string();
        surface.explanation = record.display_explanation().to_string();
        surface.copyright = record.copyright().map(str::to_string);
        surface.scroll = 0;
        surface.max_scroll.set(None);
        surface.media.clear();
        if let Some(player) = surface.player.take() {
            player.stop();
        }
        surface.media = media_nodes(&record);

        if !was_open {
            self.previous_focus = Some(current_focus);
            surface.escape = Some(bus.subscribe(KeyCode::Esc, ModalEvent::Dismiss));
            surface.visible = true;
        }
        tracing::debug!(title = %surface.title, reopened = was_open, "modal opened");
        self.record = Some(record);
        Focus::ModalClose
    }

    /// Hides the surface and hands back the control to refocus, when that
    /// control can still take focus.
    pub fn close(&mut self, can_focus: impl Fn(Focus) -> bool) -> Option<Focus> {
        let surface = self.surface.as_mut().filter(|surface| surface.visible)?;
        surface.visible = false;
        if let Some(subscription) = surface.escape.take() {
            subscription.unsubscribe();
        }
        if let Some(player) = surface.player.take() {
            player.stop();
        }
        surface.content_area.set(None);
        surface.close_area.set(None);
        surface.watch_area.set(None);
        self.record = None;
        tracing::debug!("modal closed");

        self.previous_focus.take().filter(|focus| can_focus(*focus))
    }

    pub fn attach_player(&mut self, session: PlayerSession) {
        if let Some(surface) = self.surface.as_mut().filter(|surface| surface.visible) {
            if let Some(previous) = surface.player.replace(session) {
                previous.stop();
            }
        }
    }

    pub fn has_player(&self) -> bool {
        self.surface
            .as_ref()
            .is_some_and(|surface| surface.player.is_some())
    }

    /// Drops a player that exited on its own so the process does not linger
    /// until the modal closes. Returns true when one was reaped.
    pub fn reap_player(&mut self) -> bool {
        let Some(surface) = self.surface.as_mut() else {
            return false;
        };
        let exited = surface
            .player
            .as_mut()
            .is_some_and(|session| !session.is_running());
        if exited {
            surface.player = None;
            tracing::debug!("external player exited");
        }
        exited
    }

    /// Focus trap: Tab cycles between the close control and the watch link.
    pub fn cycle_focus(&self, current: Focus) -> Focus {
        match current {
            Focus::ModalClose if self.watch_url().is_some() => Focus::ModalWatch,
            _ => Focus::ModalClose,
        }
    }

    pub fn scroll(&mut self, delta: i32) {
        if let Some(surface) = self.surface.as_mut() {
            // Unbounded until the first draw has measured the text.
            let limit = surface.max_scroll.get().unwrap_or(u16::MAX);
            let next = surface.scroll as i32 + delta;
            surface.scroll = next.clamp(0, limit as i32) as u16;
        }
    }

    pub fn scroll_offset(&self) -> u16 {
        self.surface.as_ref().map_or(0, |surface| surface.scroll)
    }

    pub fn hit_test(&self, column: u16, row: u16) -> Option<Hit> {
        let surface = self.surface.as_ref().filter(|surface| surface.visible)?;
        let inside = |area: Option<Rect>| {
            area.is_some_and(|area| {
                column >= area.x
                    && column < area.x + area.width
                    && row >= area.y
                    && row < area.y + area.height
            })
        };
        if inside(surface.close_area.get()) {
            Some(Hit::Close)
        } else if inside(surface.watch_area.get()) {
            Some(Hit::Watch)
        } else if inside(surface.content_area.get()) {
            Some(Hit::Content)
        } else {
            Some(Hit::Overlay)
        }
    }

    pub fn content_area(&self) -> Option<Rect> {
        self.surface.as_ref().and_then(|surface| surface.content_area.get())
    }

    pub fn close_area(&self) -> Option<Rect> {
        self.surface.as_ref().and_then(|surface| surface.close_area.get())
    }

    pub fn draw(&self, frame: &mut Frame<'_>, area: Rect, focus: Focus) {
        let Some(surface) = self.surface.as_ref().filter(|surface| surface.visible) else {
            return;
        };

        frame.render_widget(
            Block::default().style(Style::default().bg(COLOR_OVERLAY_BG)),
            area,
        );
        let content = centered_rect(80, 80, area);
        frame.render_widget(Clear, content);
        surface.content_area.set(Some(content));

        let block = Block::default()
            .title(Span::styled(
                surface.title.clone(),
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(COLOR_ACCENT))
            .style(Style::default().bg(COLOR_PANEL_BG));
        let inner = block.inner(content);
        frame.render_widget(block, content);

        let media_height = (surface.media.len() as u16).min(inner.height.saturating_sub(3));
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(media_height),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(inner);

        let mut header = vec![Span::styled(
            surface.date.clone(),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        )];
        if let Some(copyright) = &surface.copyright {
            header.push(Span::styled(
                format!("  © {}", copyright.trim()),
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .add_modifier(Modifier::ITALIC),
            ));
        }
        frame.render_widget(Paragraph::new(Line::from(header)), chunks[0]);

        surface.watch_area.set(None);
        for (offset, node) in surface.media.iter().enumerate() {
            if offset as u16 >= chunks[1].height {
                break;
            }
            let line_area = Rect::new(chunks[1].x, chunks[1].y + offset as u16, chunks[1].width, 1);
            if let MediaNode::WatchLink { .. } = node {
                let width = (WATCH_LABEL.chars().count() as u16 + 2).min(line_area.width);
                surface
                    .watch_area
                    .set(Some(Rect::new(line_area.x, line_area.y, width, 1)));
            }
            let focused = matches!(node, MediaNode::WatchLink { .. }) && focus == Focus::ModalWatch;
            frame.render_widget(Paragraph::new(media_line(node, focused)), line_area);
        }

        let text_area = chunks[2];
        let wrapped = wrapped_height(&surface.explanation, text_area.width);
        surface
            .max_scroll
            .set(Some(wrapped.saturating_sub(text_area.height)));

        let explanation = Paragraph::new(Text::from(surface.explanation.clone()))
            .style(Style::default().fg(COLOR_TEXT_PRIMARY))
            .wrap(Wrap { trim: true })
            .scroll((surface.scroll, 0));
        frame.render_widget(explanation, text_area);

        let footer = chunks[3];
        let close_width = (CLOSE_LABEL.len() as u16).min(footer.width);
        let close_area = Rect::new(
            footer.x + footer.width.saturating_sub(close_width),
            footer.y,
            close_width,
            footer.height,
        );
        let close_style = if focus == Focus::ModalClose {
            Style::default()
                .fg(COLOR_BORDER_FOCUSED)
                .bg(COLOR_PANEL_SELECTED_BG)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(COLOR_TEXT_SECONDARY)
        };
        frame.render_widget(
            Paragraph::new(Span::styled(CLOSE_LABEL, close_style)).alignment(Alignment::Right),
            close_area,
        );
        surface.close_area.set(Some(close_area));
    }
}

fn wrapped_height(text: &str, width: u16) -> u16 {
    if width == 0 {
        return 0;
    }
    let lines: usize = text
        .lines()
        .map(|line| wrap(line, width as usize).len().max(1))
        .sum();
    lines.min(u16::MAX as usize) as u16
}

/// Media content for one record, mirroring the resolver's variant.
pub fn media_nodes(record: &Record) -> Vec<MediaNode> {
    match media::resolve(record) {
        Media::Image {
            display_url: Some(url),
        } => vec![MediaNode::Image { url }],
        Media::Image { display_url: None } => vec![MediaNode::Unavailable],
        Media::Video(links) => {
            if links.thumbnail_url.is_none() && links.watch_url.is_none() {
                return vec![MediaNode::Unavailable];
            }
            let mut nodes = Vec::new();
            if let Some(url) = links.thumbnail_url {
                nodes.push(MediaNode::Thumbnail { url });
            }
            if let Some(url) = links.watch_url {
                nodes.push(MediaNode::WatchLink { url });
                nodes.push(MediaNode::Hint(EXTERNAL_HINT.to_string()));
            }
            nodes
        }
        Media::Unsupported { media_type } => {
            vec![MediaNode::Unsupported(media::unsupported_message(&media_type))]
        }
    }
}

fn media_line(node: &MediaNode, focused: bool) -> Line<'static> {
    let secondary = Style::default().fg(COLOR_TEXT_SECONDARY);
    match node {
        MediaNode::Image { url } => Line::from(vec![
            Span::styled("Image: ", secondary),
            Span::styled(
                media_label(url),
                Style::default().fg(COLOR_TEXT_PRIMARY),
            ),
            Span::styled(format!("  {url}"), secondary),
        ]),
        MediaNode::Thumbnail { url } => Line::from(vec![
            Span::styled("Thumbnail: ", secondary),
            Span::styled(url.clone(), Style::default().fg(COLOR_TEXT_PRIMARY)),
        ]),
        MediaNode::WatchLink { .. } => {
            let mut style = Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
            if focused {
                style = style.bg(COLOR_PANEL_SELECTED_BG);
            }
            Line::from(Span::styled(format!(" {WATCH_LABEL} "), style))
        }
        MediaNode::Hint(hint) => Line::from(Span::styled(
            hint.clone(),
            secondary.add_modifier(Modifier::ITALIC),
        )),
        MediaNode::Unavailable => Line::from(Span::styled(UNAVAILABLE_MESSAGE, secondary)),
        MediaNode::Unsupported(message) => Line::from(Span::styled(message.clone(), secondary)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(title: &str, url: &str) -> Arc<Record> {
        Arc::new(Record {
            title: Some(title.into()),
            date: Some("2024-01-01".into()),
            media_type: "image".into(),
            url: Some(url.into()),
            explanation: Some("Stars.".into()),
            ..Record::default()
        })
    }

    fn video(url: &str) -> Arc<Record> {
        Arc::new(Record {
            media_type: "video".into(),
            url: Some(url.into()),
            ..Record::default()
        })
    }

    #[test]
    fn surface_is_created_lazily_and_reused() {
        let bus = EventBus::new();
        let mut modal = Modal::new();
        assert!(modal.surface().is_none());
        modal.open(image("a", "http://x/a.jpg"), Focus::Card(0), &bus);
        modal.close(|_| true);
        modal.open(image("b", "http://x/b.jpg"), Focus::Card(1), &bus);
        assert_eq!(modal.surfaces_created(), 1);
        assert_eq!(modal.surface().unwrap().title(), "b");
    }

    #[test]
    fn open_populates_fields_and_moves_focus() {
        let bus = EventBus::new();
        let mut modal = Modal::new();
        let focus = modal.open(image("M1", "http://x/m1.jpg"), Focus::Card(0), &bus);
        assert_eq!(focus, Focus::ModalClose);
        assert!(modal.is_open());
        let surface = modal.surface().unwrap();
        assert_eq!(surface.title(), "M1");
        assert_eq!(surface.date(), "2024-01-01");
        assert_eq!(surface.explanation(), "Stars.");
        assert_eq!(
            surface.media(),
            [MediaNode::Image {
                url: "http://x/m1.jpg".into()
            }]
        );
        assert_eq!(bus.listener_count(), 1);
    }

    #[test]
    fn missing_fields_degrade_to_defaults() {
        let bus = EventBus::new();
        let mut modal = Modal::new();
        modal.open(Arc::new(Record::default()), Focus::Trigger, &bus);
        let surface = modal.surface().unwrap();
        assert_eq!(surface.title(), "Untitled");
        assert_eq!(surface.date(), "");
        assert_eq!(surface.explanation(), "");
        assert_eq!(
            surface.media(),
            [MediaNode::Unsupported("Unsupported media type: (none)".into())]
        );
    }

    #[test]
    fn reopening_replaces_media_without_residue() {
        let bus = EventBus::new();
        let mut modal = Modal::new();
        modal.open(image("a", "http://x/a.jpg"), Focus::Card(0), &bus);
        modal.open(video("https://www.youtube.com/embed/abc123"), Focus::ModalClose, &bus);
        let media = modal.surface().unwrap().media();
        assert!(media
            .iter()
            .all(|node| !matches!(node, MediaNode::Image { .. })));
        assert_eq!(
            media[0],
            MediaNode::Thumbnail {
                url: "https://img.youtube.com/vi/abc123/hqdefault.jpg".into()
            }
        );
        assert_eq!(modal.watch_url(), Some("https://www.youtube.com/watch?v=abc123"));
        assert_eq!(modal.previous_focus(), Some(Focus::Card(0)));
        assert_eq!(bus.listener_count(), 1);
    }

    #[test]
    fn video_without_any_url_is_unavailable() {
        assert_eq!(
            media_nodes(&Record {
                media_type: "video".into(),
                ..Record::default()
            }),
            [MediaNode::Unavailable]
        );
    }

    #[test]
    fn video_with_watch_link_carries_hint() {
        let nodes = media_nodes(&video("https://vimeo.com/1"));
        assert_eq!(
            nodes,
            [
                MediaNode::WatchLink {
                    url: "https://vimeo.com/1".into()
                },
                MediaNode::Hint(EXTERNAL_HINT.into()),
            ]
        );
    }

    #[test]
    fn close_unsubscribes_and_restores_focus() {
        let bus = EventBus::new();
        let mut modal = Modal::new();
        modal.open(image("a", "http://x/a.jpg"), Focus::Card(3), &bus);
        assert_eq!(modal.close(|_| true), Some(Focus::Card(3)));
        assert!(!modal.is_open());
        assert_eq!(bus.listener_count(), 0);
        assert!(bus.dispatch(KeyCode::Esc).is_empty());
        assert_eq!(modal.close(|_| true), None);
    }

    #[test]
    fn close_skips_unfocusable_control() {
        let bus = EventBus::new();
        let mut modal = Modal::new();
        modal.open(image("a", "http://x/a.jpg"), Focus::Card(3), &bus);
        assert_eq!(modal.close(|focus| focus == Focus::Trigger), None);
    }

    #[test]
    fn focus_trap_cycles_inside_modal() {
        let bus = EventBus::new();
        let mut modal = Modal::new();
        modal.open(image("a", "http://x/a.jpg"), Focus::Trigger, &bus);
        assert_eq!(modal.cycle_focus(Focus::ModalClose), Focus::ModalClose);

        modal.open(video("https://youtu.be/abc123"), Focus::Trigger, &bus);
        assert_eq!(modal.cycle_focus(Focus::ModalClose), Focus::ModalWatch);
        assert_eq!(modal.cycle_focus(Focus::ModalWatch), Focus::ModalClose);
    }

    #[cfg(unix)]
    #[test]
    fn close_stops_player() {
        let bus = EventBus::new();
        let mut modal = Modal::new();
        modal.open(video("https://youtu.be/abc123"), Focus::Trigger, &bus);
        let command: Vec<String> = ["sh", "-c", "sleep 30", "%URL%"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let session = crate::player::spawn(crate::player::LaunchOptions {
            command: &command,
            url: "https://www.youtube.com/watch?v=abc123",
            title: "",
        })
        .unwrap();
        modal.attach_player(session);
        assert!(modal.has_player());
        modal.close(|_| true);
        assert!(!modal.has_player());
    }

    #[cfg(unix)]
    #[test]
    fn exited_player_is_reaped_while_open() {
        use std::time::{Duration, Instant};

        let bus = EventBus::new();
        let mut modal = Modal::new();
        modal.open(video("https://youtu.be/abc123"), Focus::Trigger, &bus);
        let command: Vec<String> = ["sh", "-c", "exit 0", "%URL%"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let session = crate::player::spawn(crate::player::LaunchOptions {
            command: &command,
            url: "https://www.youtube.com/watch?v=abc123",
            title: "",
        })
        .unwrap();
        modal.attach_player(session);

        let deadline = Instant::now() + Duration::from_secs(5);
        while !modal.reap_player() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(!modal.has_player());
        assert!(modal.is_open());
        assert!(!modal.reap_player());
    }

    #[test]
    fn scroll_stops_at_end_of_explanation() {
        use ratatui::backend::TestBackend;
        use ratatui::Terminal;

        let bus = EventBus::new();
        let mut modal = Modal::new();
        let long = Arc::new(Record {
            title: Some("Long".into()),
            explanation: Some("word ".repeat(400)),
            ..Record::default()
        });
        modal.open(long, Focus::Trigger, &bus);
        let mut terminal = Terminal::new(TestBackend::new(60, 20)).unwrap();
        terminal
            .draw(|frame| {
                let area = frame.size();
                modal.draw(frame, area, Focus::ModalClose);
            })
            .unwrap();

        modal.scroll(10_000);
        let bottom = modal.scroll_offset();
        assert!(bottom > 0 && bottom < 10_000);
        modal.scroll(-10_000);
        assert_eq!(modal.scroll_offset(), 0);
    }

    #[test]
    fn wrapped_height_counts_paragraphs() {
        assert_eq!(wrapped_height("", 10), 0);
        assert_eq!(wrapped_height("one\n\ntwo", 10), 3);
        assert_eq!(wrapped_height("aaaa bbbb cccc", 9), 2);
    }
}
