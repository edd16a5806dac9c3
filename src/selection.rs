//! Maszyna stanów zaznaczenia: brak → obszar → obszar + sieć.

use crate::adapter::MapAdapter;
use crate::bridge::{LayerClickData, SessionEvent};
use crate::data::{CurrentSelection, LatLng, MapMode};
use crate::error::{MapError, MapResult};
use crate::geometry::{AREA_BOUNDS_SCALE, NETWORK_BOUNDS_SCALE, scale_bounds};
use crate::layers::LayerId;
use crate::session::{MapSession, PendingWork};
use crate::source::GeoSource;

impl<M: MapAdapter> MapSession<M> {
    /// Kliknięcie w obszar. Zwraca zlecenie załadowania jego sieci, jeśli
    /// obszar zmienił się na inny.
    pub fn click_area(&mut self, id: LayerId, at: LatLng) -> Option<PendingWork> {
        let unique_id = self.registry.area(id)?.unique_id.clone();
        let current = self.registry.active_area().map(|l| l.id);
        if current == Some(id) && self.registry.active_network().is_none() {
            return None;
        }

        self.registry.set_active_network_layer(None, &mut self.map);

        let mut work = None;
        if current != Some(id) {
            if current.is_some() {
                self.registry.deactivate_area(&mut self.map);
            }
            self.registry.activate_area(id, &mut self.map);
            if self.config.mode == MapMode::Browse {
                self.registry.apply_spotlight(&mut self.ids, &mut self.map);
            }
            work = self
                .registry
                .plan_network_load(&self.catalog, &self.config.source_domain)
                .map(PendingWork::Networks);
        }

        if !unique_id.is_empty() {
            self.emit_layer_click(&unique_id, "", at);
        }
        work
    }

    /// Kliknięcie w sieć aktywnego obszaru. `false`, gdy już była aktywna.
    pub fn click_network(&mut self, id: LayerId, at: LatLng) -> bool {
        let Some(layer) = self.registry.network(id) else {
            return false;
        };
        if self.registry.active_network().map(|l| l.id) == Some(id) {
            return false;
        }
        let network_id = layer.unique_id.clone();
        let area_id = self
            .registry
            .active_area()
            .map(|a| a.unique_id.clone())
            .unwrap_or_default();

        self.registry.set_active_network_layer(Some(id), &mut self.map);
        if !network_id.is_empty() {
            self.emit_layer_click(&area_id, &network_id, at);
        }
        true
    }

    /// Kliknięcie w tło mapy: czyści całe zaznaczenie.
    pub fn click_background(&mut self, at: LatLng) {
        if self.registry.active_area().is_some() {
            self.registry.set_active_network_layer(None, &mut self.map);
            self.registry.deactivate_area(&mut self.map);
        }
        self.registry.remove_spotlight(&mut self.map);
        self.emit_layer_click("", "", at);
    }

    pub fn double_click_area(&mut self, id: LayerId) {
        if let Some(bounds) = self.registry.area(id).and_then(|l| l.bounds()) {
            self.map.fit_bounds(scale_bounds(bounds, AREA_BOUNDS_SCALE), true);
        }
    }

    pub fn double_click_network(&mut self, id: LayerId) {
        if let Some(bounds) = self.registry.network(id).and_then(|l| l.bounds()) {
            self.map.fit_bounds(scale_bounds(bounds, NETWORK_BOUNDS_SCALE), true);
        }
    }

    /// Odtwarza zaznaczenie podane przez stronę osadzającą. Nieznany
    /// dystrykt lub sieć są ignorowane.
    pub async fn apply_selection<S: GeoSource>(&mut self, source: &S, selection: &CurrentSelection) {
        let Some(district) = selection.district_id.as_deref().filter(|d| !d.is_empty()) else {
            return;
        };
        let district_id = district.split(',').next().unwrap_or_default();
        let area = match self.area_layer_id(district_id) {
            Ok(id) => id,
            Err(err) => {
                log::debug!("ignoring selection: {}", err);
                return;
            }
        };

        let center = self.map.center();
        let work = self.click_area(area, center);

        let Some(network_id) = selection.network_id.as_deref().filter(|n| !n.is_empty()) else {
            if let Some(work) = work {
                self.settle(source, work).await;
            }
            self.double_click_area(area);
            return;
        };

        // sieci ładowane od nowa, a wynik czekany przed wyborem
        self.registry.remove_network_layers(&mut self.map);
        if let Some(plan) = self
            .registry
            .plan_network_load(&self.catalog, &self.config.source_domain)
        {
            self.settle(source, PendingWork::Networks(plan)).await;
        }

        let network = match self.network_layer_id(district_id, network_id) {
            Ok(id) => id,
            Err(err) => {
                log::debug!("ignoring selection: {}", err);
                return;
            }
        };
        if self.config.mode == MapMode::Browse {
            self.click_network(network, center);
        }
        self.double_click_network(network);
    }

    fn area_layer_id(&self, unique_id: &str) -> MapResult<LayerId> {
        self.registry
            .area_by_unique_id(unique_id)
            .map(|l| l.id)
            .ok_or_else(|| MapError::UnknownArea(unique_id.to_string()))
    }

    fn network_layer_id(&self, area: &str, network: &str) -> MapResult<LayerId> {
        self.registry
            .network_by_unique_id(network)
            .map(|l| l.id)
            .ok_or_else(|| MapError::UnknownNetwork {
                area: area.to_string(),
                network: network.to_string(),
            })
    }

    pub(crate) fn emit_layer_click(&mut self, area_id: &str, network_id: &str, at: LatLng) {
        let data = LayerClickData {
            area_id: area_id.to_string(),
            area_full_name: self.catalog.area_full_name(area_id),
            network_id: network_id.to_string(),
            network_full_name: self.catalog.network_full_name(area_id, network_id),
            lat: at.lat,
            lng: at.lng,
        };
        self.events.emit(SessionEvent::LayerClick { data });
    }
}
