//! Źródła danych: pliki GeoJSON obszarów i sieci oraz serwis
//! przyciągania tras do ścieżek.

use geojson::GeoJson;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, str::FromStr};

use crate::data::{AreaInfo, LatLng, NetworkInfo};
use crate::error::{MapError, MapResult};

pub const SNAP_ROUTE_PATH: &str = "/api/maps/snap-route";

pub fn area_url(source_domain: &str, area: &AreaInfo) -> String {
    format!("{}/maps/areas/{}.json", source_domain, area.map_name)
}

pub fn network_urls(source_domain: &str, network: &NetworkInfo) -> Vec<String> {
    network
        .map_files()
        .iter()
        .map(|file| format!("{}/maps/{}/{}", source_domain, network.map_source, file))
        .collect()
}

/// Ciało żądania: punkty jako pary `[lng, lat]`.
#[derive(Clone, Debug, Serialize)]
pub struct SnapRequest {
    pub locations: Vec<[f64; 2]>,
}

impl SnapRequest {
    pub fn from_points(points: &[LatLng]) -> Self {
        Self {
            locations: points.iter().map(|p| [p.lng, p.lat]).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnappedLocation {
    pub location: [f64; 2],
    #[serde(default)]
    pub name: Option<String>,
}

impl SnappedLocation {
    pub fn lat_lng(&self) -> LatLng {
        LatLng::new(self.location[1], self.location[0])
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SnapResponse {
    #[serde(default)]
    pub locations: Vec<SnappedLocation>,
}

/// Dostawca GeoJSON i przyciągania tras.
#[allow(async_fn_in_trait)]
pub trait GeoSource {
    async fn fetch_geojson(&self, url: &str) -> MapResult<GeoJson>;
    async fn snap_route(&self, request: &SnapRequest) -> MapResult<SnapResponse>;
}

/// Przyciąga punkty do ścieżek i usuwa chwilowe przeskoki nazw.
pub async fn snap_points<S: GeoSource>(source: &S, points: &[LatLng]) -> MapResult<Vec<LatLng>> {
    let response = source.snap_route(&SnapRequest::from_points(points)).await?;
    if response.locations.is_empty() {
        return Err(MapError::SnapRejected(
            "no snapped locations in the response".into(),
        ));
    }
    Ok(crate::geometry::adjust_snapped_locations(&response.locations)
        .iter()
        .map(SnappedLocation::lat_lng)
        .collect())
}

/// Źródło HTTP (`reqwest`).
#[derive(Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    api_base: String,
}

impl HttpSource {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    async fn checked(url: &str, resp: reqwest::Response) -> MapResult<String> {
        let status = resp.status();
        if !status.is_success() {
            return Err(MapError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        resp.text().await.map_err(|source| MapError::Http {
            url: url.to_string(),
            source,
        })
    }
}

impl GeoSource for HttpSource {
    async fn fetch_geojson(&self, url: &str) -> MapResult<GeoJson> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| MapError::Http {
                url: url.to_string(),
                source,
            })?;
        let body = Self::checked(url, resp).await?;
        Ok(GeoJson::from_str(&body)?)
    }

    async fn snap_route(&self, request: &SnapRequest) -> MapResult<SnapResponse> {
        let url = format!("{}{}", self.api_base, SNAP_ROUTE_PATH);
        let resp = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|source| MapError::Http {
                url: url.clone(),
                source,
            })?;
        let body = Self::checked(&url, resp).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Źródło z lokalnego katalogu o układzie `maps/areas/*.json`,
/// `maps/<source>/<file>`. Nie obsługuje przyciągania.
#[derive(Clone, Debug)]
pub struct DirectorySource {
    base: PathBuf,
}

impl DirectorySource {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn resolve(&self, url: &str) -> PathBuf {
        self.base.join(url.trim_start_matches('/'))
    }
}

impl GeoSource for DirectorySource {
    async fn fetch_geojson(&self, url: &str) -> MapResult<GeoJson> {
        let txt = tokio::fs::read_to_string(self.resolve(url)).await?;
        Ok(GeoJson::from_str(&txt)?)
    }

    async fn snap_route(&self, _request: &SnapRequest) -> MapResult<SnapResponse> {
        Err(MapError::SnapRejected(
            "snapping is not available for a local directory".into(),
        ))
    }
}
