//! Zdarzenia wysyłane do strony osadzającej mapę.

use serde::Serialize;
use std::io::Write;

use crate::data::LatLng;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerClickData {
    pub area_id: String,
    pub area_full_name: Option<String>,
    pub network_id: String,
    pub network_full_name: Option<String>,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    #[serde(rename = "layerClick")]
    LayerClick { data: LayerClickData },
    #[serde(rename = "user-data-changed")]
    UserDataChanged {
        #[serde(rename = "jsonData")]
        json_data: String,
    },
}

/// Rysunki użytkownika; puste klucze są pomijane.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct UserData {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub polylines: Vec<Vec<LatLng>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub polygons: Vec<Vec<Vec<LatLng>>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub markers: Vec<LatLng>,
}

pub trait SessionObserver {
    fn on_event(&mut self, event: &SessionEvent);
}

impl<F: FnMut(&SessionEvent)> SessionObserver for F {
    fn on_event(&mut self, event: &SessionEvent) {
        self(event)
    }
}

#[derive(Default)]
pub struct EventBus {
    observers: Vec<Box<dyn SessionObserver>>,
}

impl EventBus {
    pub fn subscribe(&mut self, observer: Box<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    pub fn emit(&mut self, event: SessionEvent) {
        log::debug!("session event {:?}", event);
        for observer in &mut self.observers {
            observer.on_event(&event);
        }
    }
}

/// Odpowiednik `window.parent.postMessage(.., '*')`: każda wiadomość to
/// jedna linia JSON. Zmiany rysunków idą tylko wtedy, gdy mapa jest
/// osadzona w ramce.
pub struct ParentFrame<W: Write> {
    out: W,
    embedded: bool,
}

impl<W: Write> ParentFrame<W> {
    pub fn new(out: W, embedded: bool) -> Self {
        Self { out, embedded }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn post(&mut self, event: &SessionEvent) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.out, event)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}

impl<W: Write> SessionObserver for ParentFrame<W> {
    fn on_event(&mut self, event: &SessionEvent) {
        if matches!(event, SessionEvent::UserDataChanged { .. }) && !self.embedded {
            return;
        }
        if let Err(err) = self.post(event) {
            log::warn!("failed to post message to parent frame: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    fn click() -> SessionEvent {
        SessionEvent::LayerClick {
            data: LayerClickData {
                area_id: String::new(),
                area_full_name: None,
                network_id: String::new(),
                network_full_name: None,
                lat: 1.5,
                lng: -2.0,
            },
        }
    }

    #[test]
    fn layer_click_wire_format() {
        let json = serde_json::to_value(click()).unwrap();
        assert_eq!(json["type"], "layerClick");
        assert_eq!(json["data"]["areaId"], "");
        assert!(json["data"]["areaFullName"].is_null());
        assert_eq!(json["data"]["lng"], -2.0);
    }

    #[test]
    fn user_data_omits_empty_keys() {
        let data = UserData {
            polygons: vec![vec![vec![LatLng::new(1.0, 2.0)]]],
            ..UserData::default()
        };
        let json = serde_json::to_string(&data).unwrap();
        assert_eq!(json, r#"{"polygons":[[[{"lat":1.0,"lng":2.0}]]]}"#);
        assert_eq!(serde_json::to_string(&UserData::default()).unwrap(), "{}");
    }

    #[test]
    fn parent_frame_filters_user_data_when_not_embedded() {
        let changed = SessionEvent::UserDataChanged { json_data: "{}".into() };

        let mut top = ParentFrame::new(Vec::new(), false);
        top.on_event(&click());
        top.on_event(&changed);
        let out = String::from_utf8(top.into_inner()).unwrap();
        assert_eq!(out.lines().count(), 1);

        let mut framed = ParentFrame::new(Vec::new(), true);
        framed.on_event(&changed);
        let out = String::from_utf8(framed.into_inner()).unwrap();
        assert_eq!(out.trim(), r#"{"type":"user-data-changed","jsonData":"{}"}"#);
    }

    #[test]
    fn bus_fans_out_to_every_observer() {
        let seen = Rc::new(RefCell::new(0));
        let mut bus = EventBus::default();
        for _ in 0..2 {
            let seen = seen.clone();
            bus.subscribe(Box::new(move |_: &SessionEvent| *seen.borrow_mut() += 1));
        }
        bus.emit(click());
        assert_eq!(*seen.borrow(), 2);
    }
}
