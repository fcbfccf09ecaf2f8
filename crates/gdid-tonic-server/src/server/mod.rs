pub mod config;
pub mod location;
pub mod service;
pub mod telemetry;
