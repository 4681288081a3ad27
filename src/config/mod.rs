//! Configuration loading: versioned YAML plus `STOREGATE_*` overrides.

pub mod config;
pub mod logging;
pub mod store;

pub use config::*;
pub use logging::*;
pub use store::*;
