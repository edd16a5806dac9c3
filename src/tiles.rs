//! Podkłady kafelkowe i przełącznik widoku satelitarnego.

const ATTRIBUTION_PREFIX: &str = "<a href=\"http://www.litternetworks.org\">Litter Networks</a>";
const ESRI_SUBDOMAINS: [&str; 2] = ["server", "services"];
const OSM_SUBDOMAINS: [&str; 3] = ["a", "b", "c"];

pub const SATELLITE_FILTER_CLASS: &str = "satellite-view-filter";

#[derive(Clone, Debug, PartialEq)]
pub struct TileLayer {
    pub url_template: &'static str,
    pub max_zoom: u8,
    pub attribution: Option<String>,
    pub subdomains: &'static [&'static str],
}

impl TileLayer {
    /// Adres kafelka; subdomena wybierana jak w Leaflecie: `(x + y) % n`.
    pub fn tile_url(&self, z: u8, x: u32, y: u32) -> String {
        let s = if self.subdomains.is_empty() {
            ""
        } else {
            self.subdomains[((x as usize) + (y as usize)) % self.subdomains.len()]
        };
        self.url_template
            .replace("{s}", s)
            .replace("{z}", &z.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BaseView {
    #[default]
    Standard,
    Satellite,
}

impl BaseView {
    pub fn layers(&self) -> Vec<TileLayer> {
        match self {
            BaseView::Standard => vec![TileLayer {
                url_template: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png",
                max_zoom: 18,
                attribution: Some(format!(
                    "{} | Map &copy; OpenStreetMap contributors",
                    ATTRIBUTION_PREFIX
                )),
                subdomains: &OSM_SUBDOMAINS,
            }],
            BaseView::Satellite => vec![
                TileLayer {
                    url_template: "https://{s}.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}",
                    max_zoom: 18,
                    attribution: Some(format!("{} | Map &copy; Esri", ATTRIBUTION_PREFIX)),
                    subdomains: &ESRI_SUBDOMAINS,
                },
                TileLayer {
                    url_template: "https://{s}.arcgisonline.com/ArcGIS/rest/services/Reference/World_Transportation/MapServer/tile/{z}/{y}/{x}",
                    max_zoom: 18,
                    attribution: None,
                    subdomains: &ESRI_SUBDOMAINS,
                },
                TileLayer {
                    url_template: "https://{s}.arcgisonline.com/ArcGIS/rest/services/Reference/World_Boundaries_and_Places/MapServer/tile/{z}/{y}/{x}",
                    max_zoom: 18,
                    attribution: None,
                    subdomains: &ESRI_SUBDOMAINS,
                },
            ],
        }
    }

    /// Etykieta przycisku: pokazuje widok, na który się przełączy.
    pub fn toggle_label(&self) -> &'static str {
        match self {
            BaseView::Standard => "Satellite View",
            BaseView::Satellite => "Normal View",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            BaseView::Standard => BaseView::Satellite,
            BaseView::Satellite => BaseView::Standard,
        }
    }
}
