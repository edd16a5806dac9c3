use crossterm::event::{KeyCode, MouseButton, MouseEvent, MouseEventKind};
use std::{
    cell::RefCell,
    collections::VecDeque,
    rc::Rc,
    time::{Duration, Instant},
};

use networkmap::adapter::MapAdapter;
use networkmap::bridge::SessionEvent;
use networkmap::data::{LatLng, MapMode};
use networkmap::drawing::{PointerEvent, PointerKind};
use networkmap::session::{MapSession, PendingWork};

use crate::map_draw::TerminalMap;

const DOUBLE_CLICK: Duration = Duration::from_millis(400);
const EVENT_LOG_LEN: usize = 8;
const PAN_STEP: f64 = 0.1;
const ZOOM_STEP: f64 = 1.5;
pub const MAKE_AREA_LABEL: &str = "[Make Area]";

#[derive(PartialEq)]
pub enum Panel {
    Left,
    Center,
}

/// Wciśnięty przycisk myszy nad mapą.
struct Press {
    column: u16,
    row: u16,
    moved: bool,
}

pub struct AppState {
    pub session: MapSession<TerminalMap>,
    pub selected: usize,
    pub active_panel: Panel,
    pub events: Rc<RefCell<VecDeque<String>>>,
    pub street_view: Option<String>,
    /// Zlecenia do uruchomienia przez pętlę główną.
    pub pending: Vec<PendingWork>,
    press: Option<Press>,
    last_click: Option<(u16, u16, Instant)>,
    space_held: bool,
}

fn describe(event: &SessionEvent) -> String {
    match event {
        SessionEvent::LayerClick { data } if data.area_id.is_empty() => "selection cleared".to_string(),
        SessionEvent::LayerClick { data } => format!(
            "selected {} {}",
            data.area_full_name.as_deref().unwrap_or(&data.area_id),
            data.network_full_name.as_deref().unwrap_or("")
        ),
        SessionEvent::UserDataChanged { json_data } => format!("drawings: {} bytes", json_data.len()),
    }
}

impl AppState {
    pub const HELP_TEXT: &'static str = "\
Tab: lista / mapa
↑/↓ Enter: wybór obszaru (lista)
strzałki: przesuw (mapa), +/-: zoom
a/f/n: kadruj wszystko/obszar/sieć
Esc: odznacz, s: satelita, v: Street View
spacja: przesuw w trybie rysowania
p: przyciąganie, m: Make Area
q: wyjście";

    pub fn new(mut session: MapSession<TerminalMap>) -> Self {
        let events = Rc::new(RefCell::new(VecDeque::new()));
        let sink = events.clone();
        session.subscribe(Box::new(move |event: &SessionEvent| {
            let mut log = sink.borrow_mut();
            if log.len() == EVENT_LOG_LEN {
                log.pop_front();
            }
            log.push_back(describe(event));
        }));

        Self {
            session,
            selected: 0,
            active_panel: Panel::Left,
            events,
            street_view: None,
            pending: Vec::new(),
            press: None,
            last_click: None,
            space_held: false,
        }
    }

    fn queue(&mut self, work: Option<PendingWork>) {
        self.pending.extend(work);
        if let Some(url) = self.session.take_street_view() {
            self.street_view = Some(url);
        }
    }

    /// Zwraca true, jeśli trzeba wyjść
    pub fn handle_input(&mut self, key: KeyCode) -> bool {
        use KeyCode::*;
        match key {
            Char('q') => return true,
            Tab => {
                self.active_panel = match self.active_panel {
                    Panel::Left => Panel::Center,
                    Panel::Center => Panel::Left,
                };
            }
            Up if self.active_panel == Panel::Left => {
                self.selected = self.selected.saturating_sub(1);
            }
            Down if self.active_panel == Panel::Left => {
                if self.selected + 1 < self.session.catalog().areas().len() {
                    self.selected += 1;
                }
            }
            Enter if self.active_panel == Panel::Left => self.select_listed_area(),
            Up => self.session.map_mut().pan(0.0, PAN_STEP),
            Down => self.session.map_mut().pan(0.0, -PAN_STEP),
            Left => self.session.map_mut().pan(-PAN_STEP, 0.0),
            Right => self.session.map_mut().pan(PAN_STEP, 0.0),
            Char('+') | Char('=') => self.session.map_mut().zoom(ZOOM_STEP),
            Char('-') => self.session.map_mut().zoom(1.0 / ZOOM_STEP),
            Char('a') => self.session.frame_all(),
            Char('f') => self.session.frame_area(),
            Char('n') => self.session.frame_network(),
            Char('s') => {
                self.session.toggle_base_view();
            }
            Char('p') => {
                self.session.toggle_snap();
            }
            Char('m') => {
                self.session.make_area();
            }
            Char('v') => self.session.arm_street_view(Instant::now()),
            Char(' ') => {
                // terminal nie zgłasza puszczenia klawisza: spacja przełącza
                self.space_held = !self.space_held;
                self.session.key_space(self.space_held);
            }
            Esc => {
                let center = self.session.map().center();
                self.session.click_map(center);
                self.queue(None);
            }
            _ => {}
        }
        false
    }

    /// Enter na liście działa jak kliknięcie w środek obszaru.
    fn select_listed_area(&mut self) {
        let Some(area) = self.session.catalog().areas().get(self.selected) else {
            return;
        };
        let Some(layer) = self.session.registry().area_by_unique_id(&area.unique_id) else {
            log::warn!("area {} has no layer", area.unique_id);
            return;
        };
        let id = layer.id;
        let at = layer
            .bounds()
            .map(|b| LatLng::from(b.center()))
            .unwrap_or_else(|| self.session.map().center());
        if self.session.config().mode == MapMode::Browse {
            let work = self.session.click_area(id, at);
            self.queue(work);
        }
        self.session.double_click_area(id);
    }

    fn pointer(&self, kind: PointerKind, column: u16, row: u16, at: Instant) -> Option<PointerEvent> {
        let position = self.session.map().cell_to_container(column, row)?;
        Some(PointerEvent {
            pointer_id: 1,
            kind,
            button: 0,
            position,
            at,
        })
    }

    pub fn handle_mouse(&mut self, event: MouseEvent, now: Instant) {
        let drawing = self.session.config().mode == MapMode::LocationDraw;
        let (column, row) = (event.column, event.row);
        match event.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let Some(pointer) = self.pointer(PointerKind::Mouse, column, row, now) else {
                    return;
                };
                self.active_panel = Panel::Center;
                if self.on_make_area_button(column, row) {
                    self.session.make_area();
                    return;
                }
                self.press = Some(Press { column, row, moved: false });
                if drawing {
                    self.session.pointer_down(pointer);
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                let Some(press) = self.press.as_mut() else {
                    return;
                };
                let (dx, dy) = (
                    column as f64 - press.column as f64,
                    row as f64 - press.row as f64,
                );
                press.moved = true;
                press.column = column;
                press.row = row;
                if self.session.map().dragging() {
                    self.session.map_mut().pan_px(
                        dx * crate::map_draw::CELL_WIDTH_PX,
                        dy * crate::map_draw::CELL_HEIGHT_PX,
                    );
                } else if let Some(pointer) = self.pointer(PointerKind::Mouse, column, row, now) {
                    self.session.pointer_move(pointer);
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                let Some(press) = self.press.take() else {
                    return;
                };
                if drawing {
                    let pointer = self
                        .pointer(PointerKind::Mouse, column, row, now)
                        .or_else(|| self.pointer(PointerKind::Mouse, press.column, press.row, now));
                    if let Some(pointer) = pointer {
                        let work = self.session.pointer_end(pointer);
                        self.queue(work);
                    }
                }
                if !press.moved {
                    self.click(column, row, now);
                }
            }
            _ => {}
        }
    }

    /// Komórka, w której zaczyna się przycisk "Make Area".
    pub fn make_area_cell(&self) -> Option<(u16, u16)> {
        let map = self.session.map();
        let position = self.session.drawing().offer_position(map)?;
        map.container_to_cell(position)
    }

    fn on_make_area_button(&self, column: u16, row: u16) -> bool {
        self.make_area_cell().is_some_and(|(c, r)| {
            row == r && column >= c && column < c.saturating_add(MAKE_AREA_LABEL.len() as u16)
        })
    }

    fn click(&mut self, column: u16, row: u16, now: Instant) {
        let Some(point) = self.session.map().cell_to_container(column, row) else {
            return;
        };
        let at = self.session.map().container_point_to_lat_lng(point);
        let picked = self.session.map().pick(at);

        let double = self
            .last_click
            .is_some_and(|(c, r, t)| c == column && r == row && now.duration_since(t) <= DOUBLE_CLICK);
        self.last_click = Some((column, row, now));
        if double {
            if let Some(id) = picked {
                self.session.double_click_layer(id);
            }
            return;
        }

        let work = match picked {
            Some(id) => self.session.click_layer(id, at),
            None => {
                self.session.click_map(at);
                None
            }
        };
        self.queue(work);
    }

    pub fn tick(&mut self, now: Instant) {
        self.session.tick(now);
    }

    pub fn selection_text(&self) -> String {
        let registry = self.session.registry();
        let catalog = self.session.catalog();
        let area = registry
            .active_area()
            .and_then(|a| catalog.area(&a.unique_id));
        let Some(area) = area else {
            return format!("Brak zaznaczenia\n\n{}", Self::HELP_TEXT);
        };
        let mut text = format!("{}\nSieci: {}", area.full_name, registry.network_layers().len());
        if let Some(network) = registry
            .active_network()
            .and_then(|n| catalog.network(&area.unique_id, &n.unique_id))
        {
            text.push_str(&format!("\nSieć: {}", network.full_name));
        }
        text
    }
}
