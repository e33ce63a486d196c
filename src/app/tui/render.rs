use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Cell, Clear, Gauge, Padding, Paragraph, Row, Table, TableState,
    Wrap,
};

use crate::app::format::{episode_code, kind_label, source_label, truncate};
use crate::playback::{DisplayMode, SHORTCUTS};

use super::player::{Overlay, PlayerScreen};
use super::{Dashboard, DashboardView};

const ACCENT: Color = Color::Rgb(110, 170, 255);
const MUTED: Color = Color::Rgb(185, 195, 210);
const TEXT: Color = Color::Rgb(230, 230, 230);

pub(super) fn draw_dashboard(frame: &mut Frame, dashboard: &mut Dashboard) {
    paint_background(frame);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "REPRISE",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::raw("   "),
        Span::styled(
            format!(" {} ", DashboardView::Continue.label()),
            pill_style(dashboard.view == DashboardView::Continue),
        ),
        Span::raw(" "),
        Span::styled(
            format!(" {} ", DashboardView::Catalog.label()),
            pill_style(dashboard.view == DashboardView::Catalog),
        ),
        Span::raw("   "),
        Span::styled(
            format!("{} titles", dashboard.titles.len()),
            Style::default().fg(MUTED),
        ),
    ]))
    .alignment(Alignment::Center)
    .block(panel_block("Dashboard"));
    frame.render_widget(header, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(64), Constraint::Percentage(36)])
        .split(chunks[1]);

    match dashboard.view {
        DashboardView::Continue => draw_continue(frame, dashboard, body[0], body[1]),
        DashboardView::Catalog => draw_catalog(frame, dashboard, body[0], body[1]),
    }

    let controls = Paragraph::new(Line::from(Span::styled(
        "↑/↓ move  Tab switch view  Enter open  r reload  q quit",
        Style::default().fg(MUTED),
    )))
    .alignment(Alignment::Center)
    .block(panel_block("Controls"));
    frame.render_widget(controls, chunks[2]);

    draw_status(frame, &dashboard.status, chunks[3]);
}

fn draw_continue(frame: &mut Frame, dashboard: &mut Dashboard, list: Rect, details: Rect) {
    let rows: Vec<Row> = dashboard
        .rows
        .iter()
        .map(|row| {
            Row::new(vec![
                Cell::from(row.descriptor.title_name.clone()),
                Cell::from(row.descriptor.label.clone()),
                Cell::from(row.next_label.clone()),
            ])
        })
        .collect();
    let table = Table::new(
        rows,
        [
            Constraint::Percentage(50),
            Constraint::Length(24),
            Constraint::Length(8),
        ],
    )
    .header(table_header(&["Title", "Progress", "Next"]));
    render_table(frame, table, list, "Continue Watching", &mut dashboard.table_state);

    let details_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(3)])
        .split(details);

    let selected = dashboard
        .table_state
        .selected()
        .and_then(|idx| dashboard.rows.get(idx));
    let text = match selected {
        Some(row) => {
            let mut text = format!(
                "Title\n{}\n\nProgress\n{}\n\nNext\n{}",
                truncate(&row.descriptor.title_name, 40),
                row.descriptor.label,
                row.next_label,
            );
            if row.descriptor.has_new_season {
                text.push_str("\n\nA new season is out.");
            } else if row.descriptor.has_new_episodes {
                text.push_str("\n\nNew episodes are out.");
            }
            text
        }
        None => "Nothing started yet.\n\nPress Tab to browse the catalog.".to_string(),
    };
    frame.render_widget(details_panel(text), details_chunks[0]);

    if let Some(row) = selected {
        frame.render_widget(
            progress_gauge(row.descriptor.progress, &row.descriptor.label),
            details_chunks[1],
        );
    }
}

fn draw_catalog(frame: &mut Frame, dashboard: &mut Dashboard, list: Rect, details: Rect) {
    let rows: Vec<Row> = dashboard
        .titles
        .iter()
        .map(|title| {
            let episodes = if title.has_seasons() {
                title.total_episodes().to_string()
            } else {
                "-".to_string()
            };
            Row::new(vec![
                Cell::from(title.name.clone()),
                Cell::from(kind_label(title)),
                Cell::from(episodes),
            ])
        })
        .collect();
    let table = Table::new(
        rows,
        [
            Constraint::Percentage(60),
            Constraint::Length(8),
            Constraint::Length(10),
        ],
    )
    .header(table_header(&["Title", "Kind", "Episodes"]));
    render_table(frame, table, list, "Catalog", &mut dashboard.table_state);

    let selected = dashboard
        .table_state
        .selected()
        .and_then(|idx| dashboard.titles.get(idx));
    let text = match selected {
        Some(title) if title.has_seasons() => {
            let seasons = title
                .seasons()
                .iter()
                .map(|season| format!("S{}  {} episodes", season.number, season.episodes.len()))
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "Title\n{}\n\nID\n{}\n\nSeasons\n{}",
                truncate(&title.name, 40),
                truncate(&title.id, 28),
                seasons
            )
        }
        Some(title) => format!(
            "Title\n{}\n\nID\n{}\n\nSources\n{}",
            truncate(&title.name, 40),
            truncate(&title.id, 28),
            title.film_sources().len()
        ),
        None => "The catalog is empty.".to_string(),
    };
    frame.render_widget(details_panel(text), details);
}

pub(super) fn draw_player(frame: &mut Frame, screen: &PlayerScreen) {
    paint_background(frame);
    let machine = &screen.machine;
    let title = machine.title();
    let selection = machine.selection();

    if selection.display_mode == DisplayMode::Cinema {
        let area = frame.area();
        draw_now_playing(frame, screen, area);
        draw_overlays(frame, screen);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let route = screen.route().unwrap_or_else(|| format!("/watch/{}", title.id));
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            truncate(&title.name, 40),
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::raw("   "),
        Span::styled(route, Style::default().fg(MUTED)),
        Span::raw("   "),
        Span::styled(" AUTOPLAY ", pill_style(selection.autoplay)),
        Span::raw(" "),
        Span::styled(" CINEMA ", pill_style(false)),
    ]))
    .alignment(Alignment::Center)
    .block(panel_block("Player"));
    frame.render_widget(header, chunks[0]);

    if title.has_seasons() {
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[1]);
        draw_episode_list(frame, screen, body[0]);
        draw_now_playing(frame, screen, body[1]);
    } else {
        draw_now_playing(frame, screen, chunks[1]);
    }

    let hints = if title.has_seasons() {
        "Enter play  n/p episode  N season  ←/→ season  : jump  1-9 source  ? help  q back"
    } else {
        "Enter play  1-9 source  f fullscreen  i mini  t cinema  ? help  q back"
    };
    let controls = Paragraph::new(Line::from(Span::styled(hints, Style::default().fg(MUTED))))
        .alignment(Alignment::Center)
        .block(panel_block("Controls"));
    frame.render_widget(controls, chunks[2]);

    draw_status(frame, &screen.status, chunks[3]);
    draw_overlays(frame, screen);
}

fn draw_episode_list(frame: &mut Frame, screen: &PlayerScreen, area: Rect) {
    let machine = &screen.machine;
    let selection = machine.selection();

    let season_tabs: Vec<Span> = machine
        .title()
        .seasons()
        .iter()
        .enumerate()
        .flat_map(|(idx, season)| {
            [
                Span::styled(
                    format!(" S{} ", season.number),
                    pill_style(selection.season == Some(idx)),
                ),
                Span::raw(" "),
            ]
        })
        .collect();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(4)])
        .split(area);
    let tabs = Paragraph::new(Line::from(season_tabs))
        .wrap(Wrap { trim: true })
        .block(panel_block("Seasons"));
    frame.render_widget(tabs, chunks[0]);

    let rows: Vec<Row> = machine
        .current_season()
        .map(|season| {
            season
                .episodes
                .iter()
                .map(|episode| {
                    Row::new(vec![
                        Cell::from(episode.number.to_string()),
                        Cell::from(episode.title.clone()),
                        Cell::from(episode.video_sources.len().to_string()),
                    ])
                })
                .collect()
        })
        .unwrap_or_default();
    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Min(10),
            Constraint::Length(8),
        ],
    )
    .header(table_header(&["Ep", "Title", "Sources"]));
    let mut state = TableState::default();
    state.select(selection.episode);
    render_table(frame, table, chunks[1], "Episodes", &mut state);
}

fn draw_now_playing(frame: &mut Frame, screen: &PlayerScreen, area: Rect) {
    let machine = &screen.machine;
    let title = machine.title();
    let selection = machine.selection();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(3)])
        .split(area);

    let heading = match (machine.current_season(), machine.current_episode()) {
        (Some(season), Some(episode)) => format!(
            "{}  {}",
            episode_code(title, &season.id, &episode.id).unwrap_or_default(),
            episode.title
        ),
        (Some(season), None) => format!("Season {} has no episodes yet.", season.number),
        _ if title.has_seasons() => "No seasons yet.".to_string(),
        _ => title.name.clone(),
    };

    let mut lines = vec![
        Line::from(Span::styled(
            heading,
            Style::default().fg(TEXT).add_modifier(Modifier::BOLD),
        )),
    ];
    let index = machine.index();
    if let (Some(season), Some(episode)) = (machine.current_season(), machine.current_episode())
        && let Some(flat) = index.index_of(&season.id, &episode.id)
    {
        lines.push(Line::from(Span::styled(
            format!("{} of {} overall", flat + 1, index.len()),
            Style::default().fg(MUTED),
        )));
    }
    lines.push(Line::raw(""));
    let sources = machine.current_sources();
    if sources.is_empty() {
        lines.push(Line::from(Span::styled(
            "No playable source.",
            Style::default().fg(MUTED),
        )));
    } else {
        let mut pills = Vec::with_capacity(sources.len() * 2);
        for (idx, url) in sources.iter().enumerate() {
            pills.push(Span::styled(
                format!(" {} ", source_label(idx, url)),
                pill_style(idx == selection.source_index),
            ));
            pills.push(Span::raw(" "));
        }
        lines.push(Line::from(pills));
    }
    if title.has_seasons() {
        let mut flags = Vec::new();
        if machine.has_prev_episode() {
            flags.push("p previous");
        }
        if machine.has_next_episode() {
            flags.push("n next");
        }
        if machine.has_next_season() {
            flags.push("N next season");
        }
        if !flags.is_empty() {
            lines.push(Line::raw(""));
            lines.push(Line::from(Span::styled(
                flags.join("   "),
                Style::default().fg(MUTED),
            )));
        }
    }

    let panel = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(panel_block("Now Playing"));
    frame.render_widget(panel, chunks[0]);

    if let Some(percent) = machine.current_percent() {
        frame.render_widget(progress_gauge(percent, &format!("{percent}%")), chunks[1]);
    }
}

fn draw_overlays(frame: &mut Frame, screen: &PlayerScreen) {
    match &screen.overlay {
        Overlay::None => {}
        Overlay::Help => {
            let mut text = SHORTCUTS
                .iter()
                .map(|shortcut| format!("{:<8} {}", shortcut.keys, shortcut.description))
                .collect::<Vec<_>>();
            text.push(String::new());
            text.push("Press any key to close.".to_string());
            draw_popup(frame, "Shortcuts", &text.join("\n"));
        }
        Overlay::JumpPrompt(typed) => {
            let text = format!("Episode number\n\n> {typed}_\n\n[Enter] Jump   [Esc] Cancel");
            draw_popup(frame, "Jump To Episode", &text);
        }
        Overlay::SourcePicker(cursor) => {
            let mut text = screen
                .machine
                .current_sources()
                .iter()
                .enumerate()
                .map(|(idx, url)| {
                    let marker = if idx == *cursor { "▸" } else { " " };
                    format!("{marker} {}", source_label(idx, url))
                })
                .collect::<Vec<_>>();
            text.push(String::new());
            text.push("[↑/↓] Move   [Enter] Pick   [Esc] Cancel".to_string());
            draw_popup(frame, "Sources", &text.join("\n"));
        }
    }
}

fn draw_popup(frame: &mut Frame, title: &'static str, text: &str) {
    let area = popup_rect_for_text(frame.area(), text);
    render_popup_shadow(frame, area);
    frame.render_widget(Clear, area);
    let popup = Paragraph::new(text.to_string())
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(modal_block(title));
    frame.render_widget(popup, area);
}

fn paint_background(frame: &mut Frame) {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());
}

fn draw_status(frame: &mut Frame, status: &str, area: Rect) {
    let widget = Paragraph::new(status.to_string())
        .style(status_style(status))
        .block(panel_block("Status"));
    frame.render_widget(widget, area);
}

fn details_panel(text: String) -> Paragraph<'static> {
    Paragraph::new(text)
        .style(Style::default().fg(TEXT))
        .wrap(Wrap { trim: false })
        .block(panel_block("Selected"))
}

fn progress_gauge(percent: u8, label: &str) -> Gauge<'static> {
    Gauge::default()
        .block(panel_block("Progress"))
        .gauge_style(
            Style::default()
                .fg(Color::Rgb(130, 190, 255))
                .bg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .label(label.to_string())
        .ratio(f64::from(percent.min(100)) / 100.0)
}

fn table_header(labels: &[&'static str]) -> Row<'static> {
    Row::new(labels.to_vec()).style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD))
}

fn render_table(
    frame: &mut Frame,
    table: Table<'_>,
    area: Rect,
    title: &'static str,
    state: &mut TableState,
) {
    let table = table
        .block(panel_block(title))
        .row_highlight_style(
            Style::default()
                .bg(ACCENT)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(table, area, state);
}

fn panel_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(125, 135, 150)))
        .title(title)
}

fn modal_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(
            Style::default()
                .fg(Color::Rgb(160, 190, 235))
                .add_modifier(Modifier::BOLD),
        )
        .title(title)
        .padding(Padding::new(2, 2, 1, 1))
}

fn pill_style(active: bool) -> Style {
    if active {
        Style::default()
            .bg(ACCENT)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
            .bg(Color::Rgb(72, 82, 96))
            .fg(Color::Rgb(230, 235, 242))
    }
}

fn status_style(status: &str) -> Style {
    if status.starts_with("ERROR:") {
        Style::default()
            .fg(Color::Rgb(255, 145, 120))
            .add_modifier(Modifier::BOLD)
    } else if status.starts_with("INFO:") {
        Style::default().fg(Color::Rgb(205, 165, 255))
    } else {
        Style::default().fg(TEXT)
    }
}

fn render_popup_shadow(frame: &mut Frame, popup_area: Rect) {
    let area = frame.area();
    let shadow = Rect::new(
        (popup_area.x + 1).min(area.x + area.width.saturating_sub(1)),
        (popup_area.y + 1).min(area.y + area.height.saturating_sub(1)),
        popup_area.width.saturating_sub(1),
        popup_area.height.saturating_sub(1),
    );
    if shadow.width == 0 || shadow.height == 0 {
        return;
    }
    frame.render_widget(
        Block::default().style(Style::default().bg(Color::Rgb(14, 16, 24))),
        shadow,
    );
}

/// Centered popup sized to its text, clamped to the terminal.
fn popup_rect_for_text(area: Rect, text: &str) -> Rect {
    let widest = text
        .lines()
        .map(|line| line.chars().count() as u16)
        .max()
        .unwrap_or(0);
    let line_count = text.lines().count() as u16;

    let available_width = area.width.saturating_sub(2).max(1);
    let width = widest
        .saturating_add(12)
        .clamp(40.min(available_width), 72.min(available_width));
    let available_height = area.height.saturating_sub(2).max(1);
    let height = line_count
        .saturating_add(6)
        .clamp(8.min(available_height), 20.min(available_height));

    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width, height)
}
