use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use networkmap::data::MapMode;

use crate::state::{AppState, MAKE_AREA_LABEL, Panel};

fn panel_style(active: bool) -> Style {
    if active {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    }
}

fn controls_text(state: &AppState) -> String {
    let controls = state.session.controls();
    let mut lines = Vec::new();
    if controls.frame_all {
        lines.push("[a] Frame All".to_string());
    }
    let enabled = |on: bool| if on { "" } else { " (-)" };
    if let Some(on) = controls.frame_area {
        lines.push(format!("[f] Frame Area{}", enabled(on)));
    }
    if let Some(on) = controls.frame_network {
        lines.push(format!("[n] Frame Network{}", enabled(on)));
    }
    if let Some(label) = controls.snap_label {
        lines.push(format!("[p] {}", label));
    }
    lines.push(format!("[s] {}", controls.base_view_label));
    if let Some(tiles) = state.session.map().tile_source() {
        lines.push(format!("    {}", tiles));
    }
    if controls.street_view_armed {
        lines.push("[v] Street View: kliknij mapę".to_string());
    } else {
        lines.push("[v] Street View".to_string());
    }
    if let Some(url) = &state.street_view {
        lines.push(url.clone());
    }
    lines.join("\n")
}

pub fn draw<'a>(f: &mut Frame<'a>, state: &mut AppState) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(20),
            Constraint::Percentage(60),
            Constraint::Percentage(20),
        ].as_ref())
        .split(f.area());

    // Lewy panel: lista obszarów
    let active_area = state
        .session
        .registry()
        .active_area()
        .map(|l| l.unique_id.clone());
    let items: Vec<ListItem> = state
        .session
        .catalog()
        .areas()
        .iter()
        .map(|a| {
            let item = ListItem::new(a.full_name.clone());
            if active_area.as_deref() == Some(a.unique_id.as_str()) {
                item.style(Style::default().fg(Color::Cyan))
            } else {
                item
            }
        })
        .collect();
    let mut list_state = ListState::default();
    list_state.select(Some(state.selected));
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Obszary")
                .border_style(panel_style(state.active_panel == Panel::Left)),
        )
        .highlight_symbol(">> ")
        .highlight_style(Style::default().fg(Color::Red));
    f.render_stateful_widget(list, chunks[0], &mut list_state);

    // Środek: mapa
    let mode = match state.session.config().mode {
        MapMode::Browse => "przeglądanie",
        MapMode::LocationMarkers => "znaczniki",
        MapMode::LocationDraw => "rysowanie",
    };
    let view = if state.session.map().satellite() { "satelita" } else { "mapa" };
    let title = format!("Mapa ({}, {})", mode, view);
    state.session.map_mut().set_viewport(chunks[1]);
    state.session.map().render(f, chunks[1], &title);

    if let Some((column, row)) = state.make_area_cell() {
        let button = Rect::new(column, row, MAKE_AREA_LABEL.len() as u16, 1).intersection(chunks[1]);
        if !button.is_empty() {
            f.render_widget(Clear, button);
            f.render_widget(
                Paragraph::new(MAKE_AREA_LABEL).style(Style::default().fg(Color::Black).bg(Color::Cyan)),
                button,
            );
        }
    }

    // Prawy panel: zaznaczenie, przyciski, zdarzenia
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Percentage(30),
            Constraint::Percentage(30),
        ].as_ref())
        .split(chunks[2]);

    let info_paragraph = Paragraph::new(state.selection_text())
        .block(Block::default().borders(Borders::ALL).title("Informacje"))
        .wrap(Wrap { trim: true });
    f.render_widget(info_paragraph, right_chunks[0]);

    let controls_paragraph = Paragraph::new(controls_text(state))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Sterowanie")
                .border_style(panel_style(state.active_panel == Panel::Center)),
        )
        .wrap(Wrap { trim: true });
    f.render_widget(controls_paragraph, right_chunks[1]);

    let events_text = state
        .events
        .borrow()
        .iter()
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");
    let events_paragraph = Paragraph::new(events_text)
        .block(Block::default().borders(Borders::ALL).title("Zdarzenia"))
        .style(Style::default().fg(Color::White))
        .wrap(Wrap { trim: true });
    f.render_widget(events_paragraph, right_chunks[2]);
}
