use thiserror::Error;

/// Błędy rdzenia mapy. Żaden z nich nie wychodzi poza sesję, poza
/// odczytem katalogu obszarów przy starcie.
#[derive(Error, Debug)]
pub enum MapError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid geojson: {0}")]
    GeoJson(#[from] geojson::Error),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported geometry: {0}")]
    Geometry(String),
    #[error("snap service rejected the route: {0}")]
    SnapRejected(String),
    #[error("unknown area {0}")]
    UnknownArea(String),
    #[error("unknown network {network} in area {area}")]
    UnknownNetwork { area: String, network: String },
}

pub type MapResult<T> = Result<T, MapError>;
