use std::cell::{Cell, RefCell};
use std::sync::Arc;

use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use crate::apod::Record;
use crate::media::{self, Media};
use crate::ui::{
    media_label, truncate_to_width, COLOR_ACCENT, COLOR_BORDER_FOCUSED, COLOR_BORDER_IDLE,
    COLOR_ERROR, COLOR_PANEL_BG, COLOR_PANEL_SELECTED_BG, COLOR_TEXT_PRIMARY,
    COLOR_TEXT_SECONDARY,
};

pub const IDLE_MESSAGE: &str = "Press Enter on \"Fetch Space Images\" (or f) to load the gallery.";
pub const LOADING_MESSAGE: &str = "Loading space photos...";
pub const EMPTY_MESSAGE: &str = "No items found in the feed.";
pub const ERROR_MESSAGE: &str = "Failed to load images. Please try again later.";
pub const WATCH_VIDEO_LABEL: &str = "Watch video ↗";
pub const PLAY_ICON: &str = "▶";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Idle,
    Loading,
    Empty,
    Error,
    Cards,
}

/// Visual markup of one card, chosen from the resolver's variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardBody {
    Image { display_url: Option<String> },
    VideoThumbnail { thumbnail_url: String },
    VideoPlaceholder { watch_url: Option<String> },
    Unsupported { message: String },
}

#[derive(Debug, Clone)]
pub struct Card {
    pub record: Arc<Record>,
    pub media: Media,
}

impl Card {
    pub fn new(record: Arc<Record>) -> Self {
        let media = media::resolve(&record);
        Self { record, media }
    }

    pub fn body(&self) -> CardBody {
        match &self.media {
            Media::Image { display_url } => CardBody::Image {
                display_url: display_url.clone(),
            },
            Media::Video(links) => match &links.thumbnail_url {
                Some(thumbnail_url) => CardBody::VideoThumbnail {
                    thumbnail_url: thumbnail_url.clone(),
                },
                None => CardBody::VideoPlaceholder {
                    watch_url: links.watch_url.clone(),
                },
            },
            Media::Unsupported { media_type } => CardBody::Unsupported {
                message: media::unsupported_message(media_type),
            },
        }
    }

    /// The external link a card offers directly, only for videos that have no
    /// thumbnail to show.
    pub fn watch_link(&self) -> Option<&str> {
        match &self.media {
            Media::Video(links) if links.thumbnail_url.is_none() => links.watch_url.as_deref(),
            _ => None,
        }
    }
}

pub struct Gallery {
    view: View,
    cards: Vec<Card>,
    scroll_row: usize,
    card_width: u16,
    card_height: u16,
    columns: Cell<usize>,
    visible_rows: Cell<usize>,
    card_areas: RefCell<Vec<(usize, Rect)>>,
}

impl Gallery {
    pub fn new(card_width: u16, card_height: u16) -> Self {
        Self {
            view: View::Idle,
            cards: Vec::new(),
            scroll_row: 0,
            card_width: card_width.max(12),
            card_height: card_height.max(5),
            columns: Cell::new(1),
            visible_rows: Cell::new(1),
            card_areas: RefCell::new(Vec::new()),
        }
    }

    /// Replaces every card with one per record, in feed order.
    pub fn render(&mut self, records: &[Arc<Record>]) {
        self.cards = records.iter().cloned().map(Card::new).collect();
        self.scroll_row = 0;
        self.card_areas.borrow_mut().clear();
        self.view = if self.cards.is_empty() {
            View::Empty
        } else {
            View::Cards
        };
    }

    pub fn show_loading(&mut self) {
        self.clear_cards(View::Loading);
    }

    pub fn show_error(&mut self) {
        self.clear_cards(View::Error);
    }

    fn clear_cards(&mut self, view: View) {
        self.cards.clear();
        self.scroll_row = 0;
        self.card_areas.borrow_mut().clear();
        self.view = view;
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn placeholder(&self) -> Option<&'static str> {
        match self.view {
            View::Idle => Some(IDLE_MESSAGE),
            View::Loading => Some(LOADING_MESSAGE),
            View::Empty => Some(EMPTY_MESSAGE),
            View::Error => Some(ERROR_MESSAGE),
            View::Cards => None,
        }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn card_count(&self) -> usize {
        self.cards.len()
    }

    pub fn card(&self, index: usize) -> Option<&Card> {
        self.cards.get(index)
    }

    /// The record a card was built from, handed to the modal on activation.
    pub fn activate(&self, index: usize) -> Option<Arc<Record>> {
        self.cards.get(index).map(|card| card.record.clone())
    }

    pub fn scroll_row(&self) -> usize {
        self.scroll_row
    }

    pub fn columns(&self) -> usize {
        self.columns.get().max(1)
    }

    /// Grid neighbour of `index` moving by `dx` columns and `dy` rows.
    pub fn neighbor(&self, index: usize, dx: i32, dy: i32) -> Option<usize> {
        if self.cards.is_empty() {
            return None;
        }
        let columns = self.columns() as i64;
        let target = index as i64 + dx as i64 + dy as i64 * columns;
        if target < 0 || target >= self.cards.len() as i64 {
            return None;
        }
        Some(target as usize)
    }

    pub fn scroll_by(&mut self, rows: i32) {
        let total_rows = self.cards.len().div_ceil(self.columns());
        let max_row = total_rows.saturating_sub(self.visible_rows.get().max(1));
        let next = self.scroll_row as i64 + rows as i64;
        self.scroll_row = next.clamp(0, max_row as i64) as usize;
    }

    pub fn page_rows(&self) -> i32 {
        self.visible_rows.get().max(1) as i32
    }

    pub fn ensure_visible(&mut self, index: usize) {
        let row = index / self.columns();
        let visible = self.visible_rows.get().max(1);
        if row < self.scroll_row {
            self.scroll_row = row;
        } else if row >= self.scroll_row + visible {
            self.scroll_row = row + 1 - visible;
        }
    }

    /// Area of a card as laid out by the last draw, if it was on screen.
    pub fn card_area(&self, index: usize) -> Option<Rect> {
        self.card_areas
            .borrow()
            .iter()
            .find(|(candidate, _)| *candidate == index)
            .map(|(_, area)| *area)
    }

    pub fn card_at(&self, column: u16, row: u16) -> Option<usize> {
        self.card_areas
            .borrow()
            .iter()
            .find(|(_, area)| {
                column >= area.x
                    && column < area.x + area.width
                    && row >= area.y
                    && row < area.y + area.height
            })
            .map(|(index, _)| *index)
    }

    pub fn draw(&self, frame: &mut Frame<'_>, area: Rect, focused: Option<usize>) {
        let title = match self.view {
            View::Cards => format!("Gallery ({})", self.cards.len()),
            _ => "Gallery".to_string(),
        };
        let block = Block::default()
            .title(Span::styled(
                title,
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(COLOR_BORDER_IDLE))
            .style(Style::default().bg(COLOR_PANEL_BG));
        let inner = block.inner(area);
        frame.render_widget(block, area);
        self.card_areas.borrow_mut().clear();

        if let Some(message) = self.placeholder() {
            let style = if self.view == View::Error {
                Style::default().fg(COLOR_ERROR)
            } else {
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .add_modifier(Modifier::ITALIC)
            };
            let top = inner.y + inner.height / 2;
            let line_area = Rect::new(inner.x, top, inner.width, 1u16.min(inner.height));
            let placeholder = Paragraph::new(Line::from(Span::styled(message, style)))
                .alignment(Alignment::Center);
            frame.render_widget(placeholder, line_area);
            return;
        }

        if inner.width == 0 || inner.height == 0 {
            return;
        }

        let columns = (inner.width / self.card_width).max(1) as usize;
        let rows = (inner.height / self.card_height).max(1) as usize;
        self.columns.set(columns);
        self.visible_rows.set(rows);
        let cell_width = inner.width / columns as u16;

        let first = self.scroll_row * columns;
        let last = (first + rows * columns).min(self.cards.len());
        let mut areas = Vec::with_capacity(last.saturating_sub(first));
        for index in first..last {
            let slot = index - first;
            let x = inner.x + (slot % columns) as u16 * cell_width;
            let y = inner.y + (slot / columns) as u16 * self.card_height;
            let height = self.card_height.min(inner.y + inner.height - y);
            let card_area = Rect::new(x, y, cell_width, height);
            self.draw_card(frame, card_area, &self.cards[index], focused == Some(index));
            areas.push((index, card_area));
        }
        *self.card_areas.borrow_mut() = areas;
    }

    fn draw_card(&self, frame: &mut Frame<'_>, area: Rect, card: &Card, focused: bool) {
        let (border, background) = if focused {
            (COLOR_BORDER_FOCUSED, COLOR_PANEL_SELECTED_BG)
        } else {
            (COLOR_BORDER_IDLE, COLOR_PANEL_BG)
        };
        let title_width = area.width.saturating_sub(4) as usize;
        let block = Block::default()
            .title(Span::styled(
                truncate_to_width(card.record.display_title(), title_width),
                Style::default()
                    .fg(COLOR_TEXT_PRIMARY)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .style(Style::default().bg(background));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let lines = card_lines(&card.body(), card.record.display_date(), inner.width as usize);
        let body = Paragraph::new(Text::from(lines))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(body, inner);
    }
}

pub fn card_lines(body: &CardBody, date: &str, width: usize) -> Vec<Line<'static>> {
    let label_style = Style::default().fg(COLOR_TEXT_SECONDARY);
    let mut lines = Vec::new();
    match body {
        CardBody::Image { display_url } => {
            lines.push(Line::from(Span::styled(
                "[ image ]",
                Style::default().fg(COLOR_ACCENT),
            )));
            let label = display_url
                .as_deref()
                .map(media_label)
                .unwrap_or_else(|| "no image url".to_string());
            lines.push(Line::from(Span::styled(
                truncate_to_width(&label, width),
                label_style,
            )));
        }
        CardBody::VideoThumbnail { thumbnail_url } => {
            lines.push(Line::from(Span::styled(
                truncate_to_width(&media_label(thumbnail_url), width),
                label_style,
            )));
            lines.push(Line::from(Span::styled(
                format!("( {PLAY_ICON} )"),
                Style::default()
                    .fg(COLOR_TEXT_PRIMARY)
                    .add_modifier(Modifier::BOLD),
            )));
        }
        CardBody::VideoPlaceholder { watch_url } => {
            lines.push(Line::from(Span::styled("[ video ]", label_style)));
            if watch_url.is_some() {
                lines.push(Line::from(Span::styled(
                    WATCH_VIDEO_LABEL,
                    Style::default()
                        .fg(COLOR_ACCENT)
                        .add_modifier(Modifier::UNDERLINED),
                )));
            }
        }
        CardBody::Unsupported { message } => {
            lines.push(Line::from(Span::styled(message.clone(), label_style)));
        }
    }
    if !date.is_empty() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            date.to_string(),
            Style::default()
                .fg(COLOR_TEXT_SECONDARY)
                .add_modifier(Modifier::ITALIC),
        )));
    }
    lines
}
