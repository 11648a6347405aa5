//! Frame rendering
//!
//! Stateless apart from the [`VirtualList`] it lays rows out with. Every
//! frame rebuilds the hit map and the rendered slot rectangles that the drag
//! engine resolves targets against.

use super::virtual_list::{rendered_row_height, Slot, VirtualList};
use crate::core::item::{Item, ItemId};
use crate::drag::{DragSession, HitMap, RegionRole, SlotRect};
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Clear, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState,
    Wrap,
};
use ratatui::Frame;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

#[derive(Debug, Clone)]
pub struct Theme {
    pub highlight: Color,
    pub border: Color,
    pub text: Color,
    pub header_title: Color,
    pub pin: Color,
    pub favorite: Color,
    pub pin_icon: String,
    pub favorite_icon: String,
    pub rounded_borders: bool,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            highlight: Color::LightBlue,
            border: Color::White,
            text: Color::White,
            header_title: Color::White,
            pin: Color::Rgb(255, 165, 0),
            favorite: Color::Yellow,
            pin_icon: "📌".to_string(),
            favorite_icon: "★".to_string(),
            rounded_borders: true,
        }
    }
}

impl Theme {
    fn block<'a>(&self, title: impl Into<Line<'a>>) -> Block<'a> {
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.border))
            .title(title)
            .border_type(if self.rounded_borders {
                BorderType::Rounded
            } else {
                BorderType::Plain
            })
    }
}

/// Everything the renderer reads for one frame
pub struct ViewModel<'a> {
    pub items: &'a [Item],
    pub active_index: Option<usize>,
    pub search_query: &'a str,
    pub selected_group: Option<&'a str>,
    pub favorite_only: bool,
    pub is_loading: bool,
    pub status: Option<&'a str>,
    pub drag: Option<&'a DragSession>,
    /// Row hover controls are hidden while this is set
    pub dragged: Option<ItemId>,
    /// Unix seconds, for relative ages
    pub now: i64,
}

/// Geometry produced by a frame, consumed by mouse handling
#[derive(Debug, Clone, Default)]
pub struct RenderedFrame {
    pub hits: HitMap,
    pub slots: Vec<SlotRect>,
    /// Inner list area (borders excluded)
    pub list_area: Rect,
    pub scrollbar_area: Rect,
}

struct Screen {
    input: Rect,
    list: Rect,
    preview: Rect,
    status: Rect,
}

fn screen_layout(area: Rect) -> Screen {
    let [input, body, status] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(3),
        Constraint::Length(1),
    ])
    .areas(area);
    let [list, preview] =
        Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)]).areas(body);
    Screen {
        input,
        list,
        preview,
        status,
    }
}

pub fn draw(
    f: &mut Frame,
    view: &ViewModel,
    list: &mut VirtualList,
    theme: &Theme,
) -> RenderedFrame {
    let screen = screen_layout(f.area());
    let mut out = RenderedFrame::default();
    let root = out.hits.push(None, f.area(), RegionRole::Container);
    out.hits.push(Some(root), screen.input, RegionRole::Input);

    draw_input(f, view, theme, screen.input);

    let list_block = theme.block(Span::styled(
        format!(" {} ", list_title(view)),
        Style::default().fg(theme.header_title),
    ));
    let inner = list_block.inner(screen.list);
    f.render_widget(list_block, screen.list);

    // Rightmost inner column holds the scrollbar
    let rows_area = Rect {
        width: inner.width.saturating_sub(1),
        ..inner
    };
    let scrollbar_area = Rect {
        x: inner.right().saturating_sub(1),
        width: inner.width.min(1),
        ..inner
    };
    out.list_area = rows_area;
    out.scrollbar_area = scrollbar_area;
    let list_region = out.hits.push(Some(root), rows_area, RegionRole::Container);
    out.hits.push(Some(root), scrollbar_area, RegionRole::Scrollbar);

    let window = list.window(view.items, rows_area.height);
    let dragged = view.dragged;
    let over = view.drag.and_then(|session| session.over_slot);

    for slot in &window.slots {
        let Some(item) = view.items.get(slot.index) else {
            continue;
        };
        if slot.separator_above {
            let y = i32::from(rows_area.y) + slot.top;
            if let Some(row) = visible_row(rows_area, y) {
                draw_separator(f, theme, row);
            }
        }
        let Some((content, hidden_top)) = clip_slot(rows_area, slot) else {
            continue;
        };

        let row_region = out
            .hits
            .push(Some(list_region), content, RegionRole::ListRow(slot.index));
        if hidden_top == 0 && dragged.is_none() {
            // Pin toggle on the first cell of the header line
            let button = Rect {
                height: 1,
                width: content.width.min(2),
                ..content
            };
            out.hits.push(Some(row_region), button, RegionRole::ActionButton);
        }
        out.slots.push(SlotRect {
            index: slot.index,
            id: item.id,
            is_pinned: item.is_pinned,
            rect: content,
        });

        let mut style = Style::default().fg(theme.text);
        if view.active_index == Some(slot.index) {
            style = style.fg(theme.highlight).add_modifier(Modifier::BOLD);
        }
        if over == Some(slot.index) && dragged != Some(item.id) {
            style = style.add_modifier(Modifier::UNDERLINED);
        }
        if dragged == Some(item.id) {
            style = style.add_modifier(Modifier::DIM);
        }

        if window.placeholders {
            draw_placeholder(f, content, style);
        } else {
            let lines = row_lines(item, view.now, list.max_preview_lines(), theme, content.width);
            list.measure(item.id, rendered_row_height(item, list.max_preview_lines()));
            let visible: Vec<Line> = lines
                .into_iter()
                .skip(usize::from(hidden_top))
                .take(usize::from(content.height))
                .collect();
            f.render_widget(Paragraph::new(visible).style(style), content);
        }
    }

    if view.items.is_empty() {
        let message = if view.is_loading {
            "Loading…"
        } else {
            "No clipboard entries"
        };
        f.render_widget(
            Paragraph::new(message).style(Style::default().fg(Color::DarkGray)),
            rows_area,
        );
    }

    let mut scrollbar_state = ScrollbarState::new(view.items.len()).position(list.top_index());
    f.render_stateful_widget(
        Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(None)
            .end_symbol(None),
        scrollbar_area,
        &mut scrollbar_state,
    );

    if let Some(session) = view.drag {
        draw_overlay(f, theme, session, rows_area);
    }

    out.hits.push(Some(root), screen.preview, RegionRole::Preview);
    draw_preview(f, view, theme, screen.preview);
    draw_status(f, view, screen.status);
    out
}

fn list_title(view: &ViewModel) -> String {
    let mut title = String::from("clipdeck");
    if let Some(group) = view.selected_group {
        title.push_str(&format!(" · #{}", group));
    }
    if view.favorite_only {
        title.push_str(" · favorites");
    }
    title
}

fn draw_input(f: &mut Frame, view: &ViewModel, theme: &Theme, area: Rect) {
    let title = if view.is_loading { " Search … " } else { " Search " };
    let input = Paragraph::new(Line::from(vec![
        Span::raw("> "),
        Span::raw(sanitize_line(view.search_query)),
        Span::styled("█", Style::default().fg(theme.highlight)),
    ]))
    .block(theme.block(Span::styled(title, Style::default().fg(theme.header_title))));
    f.render_widget(input, area);
}

fn draw_separator(f: &mut Frame, theme: &Theme, row: Rect) {
    let label = " pinned ▲ ";
    let fill = usize::from(row.width).saturating_sub(label.width());
    let line = Line::from(vec![
        Span::raw("─".repeat(2.min(fill))),
        Span::raw(label),
        Span::raw("─".repeat(fill.saturating_sub(2))),
    ]);
    f.render_widget(
        Paragraph::new(line).style(Style::default().fg(theme.pin)),
        row,
    );
}

fn draw_placeholder(f: &mut Frame, area: Rect, style: Style) {
    let lines: Vec<Line> = (0..area.height)
        .map(|_| Line::from("░".repeat(usize::from(area.width) / 2)))
        .collect();
    f.render_widget(
        Paragraph::new(lines).style(style.add_modifier(Modifier::DIM)),
        area,
    );
}

fn draw_overlay(f: &mut Frame, theme: &Theme, session: &DragSession, rows_area: Rect) {
    if rows_area.height == 0 {
        return;
    }
    let overlay = &session.overlay;
    let top = overlay
        .top()
        .clamp(rows_area.y, rows_area.bottom().saturating_sub(1));
    let area = Rect {
        x: rows_area.x,
        y: top,
        width: rows_area.width,
        height: 1,
    };
    let icon = if overlay.is_pinned {
        theme.pin_icon.as_str()
    } else {
        "≡"
    };
    let text = truncate_to_width(
        &format!("{} {}", icon, sanitize_line(&overlay.label)),
        usize::from(area.width),
    );
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(text).style(
            Style::default()
                .fg(theme.highlight)
                .add_modifier(Modifier::REVERSED),
        ),
        area,
    );
}

fn draw_preview(f: &mut Frame, view: &ViewModel, theme: &Theme, area: Rect) {
    let active = view.active_index.and_then(|idx| view.items.get(idx));
    let title = match active {
        Some(item) => format!(" {} · {} ", item.mime_type, format_age(item.created_at, view.now)),
        None => " Preview ".to_string(),
    };
    let text: Vec<Line> = active
        .map(|item| item.preview.lines().map(|l| Line::from(sanitize_line(l))).collect())
        .unwrap_or_default();
    let preview = Paragraph::new(text)
        .style(Style::default().fg(theme.text))
        .wrap(Wrap { trim: false })
        .block(theme.block(Span::styled(title, Style::default().fg(theme.header_title))));
    f.render_widget(preview, area);
}

fn draw_status(f: &mut Frame, view: &ViewModel, area: Rect) {
    let pinned = crate::core::item::pinned_count(view.items);
    let mut text = format!(" {} entries · {} pinned", view.items.len(), pinned);
    if let Some(status) = view.status {
        text.push_str(" · ");
        text.push_str(status);
    }
    f.render_widget(
        Paragraph::new(truncate_to_width(&text, usize::from(area.width)))
            .style(Style::default().fg(Color::DarkGray)),
        area,
    );
}

/// Header line followed by the preview lines
fn row_lines(
    item: &Item,
    now: i64,
    max_preview_lines: usize,
    theme: &Theme,
    width: u16,
) -> Vec<Line<'static>> {
    let width = usize::from(width);
    let pin = if item.is_pinned {
        Span::styled(theme.pin_icon.clone(), Style::default().fg(theme.pin))
    } else {
        Span::raw("· ")
    };
    let favorite = if item.is_favorite {
        Span::styled(
            format!(" {}", theme.favorite_icon),
            Style::default().fg(theme.favorite),
        )
    } else {
        Span::raw("")
    };
    let mut lines = vec![Line::from(vec![
        pin,
        favorite,
        Span::styled(
            format!(" {} · {}", item.kind.label(), format_age(item.created_at, now)),
            Style::default().add_modifier(Modifier::ITALIC),
        ),
    ])];
    lines.extend(
        item.preview
            .lines()
            .chain(item.preview.is_empty().then_some(""))
            .take(max_preview_lines.max(1))
            .map(|line| Line::from(format!("  {}", truncate_to_width(&sanitize_line(line), width.saturating_sub(2))))),
    );
    lines
}

fn visible_row(area: Rect, y: i32) -> Option<Rect> {
    if y < i32::from(area.y) || y >= i32::from(area.bottom()) {
        return None;
    }
    Some(Rect {
        y: y as u16,
        height: 1,
        ..area
    })
}

/// Visible part of a slot's content and how many of its rows are cut off
/// above the viewport
fn clip_slot(area: Rect, slot: &Slot) -> Option<(Rect, u16)> {
    let top = i32::from(area.y) + slot.content_top();
    let bottom = i32::from(area.y) + slot.bottom();
    let visible_top = top.max(i32::from(area.y));
    let visible_bottom = bottom.min(i32::from(area.bottom()));
    if visible_bottom <= visible_top {
        return None;
    }
    Some((
        Rect {
            x: area.x,
            y: visible_top as u16,
            width: area.width,
            height: (visible_bottom - visible_top) as u16,
        },
        (visible_top - top) as u16,
    ))
}

/// Strip escape sequences and control characters, expand tabs
pub fn sanitize_line(line: &str) -> String {
    strip_ansi_escapes::strip_str(line)
        .chars()
        .filter_map(|c| match c {
            '\t' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}

/// Cut `s` to at most `width` display columns, marking the cut with `…`
pub fn truncate_to_width(s: &str, width: usize) -> String {
    if s.width() <= width {
        return s.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push('…');
    out
}

pub fn format_age(created_at: i64, now: i64) -> String {
    let secs = now.saturating_sub(created_at).max(0);
    match secs {
        0..=59 => format!("{}s", secs),
        60..=3599 => format!("{}m", secs / 60),
        3600..=86_399 => format!("{}h", secs / 3600),
        _ => format!("{}d", secs / 86_400),
    }
}
