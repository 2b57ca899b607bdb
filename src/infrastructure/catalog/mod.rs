//! Catalog loading infrastructure.

pub mod loader;

pub use loader::{CatalogDocument, CatalogLoader};
