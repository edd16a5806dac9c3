//! Mapa obszarów i sieci sprzątania: warstwy GeoJSON, zaznaczanie,
//! rysowanie odręczne i komunikaty dla strony osadzającej.

pub mod adapter;
pub mod bridge;
pub mod data;
pub mod drawing;
pub mod error;
pub mod geometry;
pub mod layers;
pub mod selection;
pub mod session;
pub mod source;
pub mod tiles;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{MapError, MapResult};
pub use session::{MapConfig, MapSession};
