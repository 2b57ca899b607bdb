//! Domain layer: models, errors, and persistence ports.

pub mod errors;
pub mod models;
pub mod ports;
