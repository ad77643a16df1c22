pub mod photo;
pub mod service;

pub use service::TelemetryService;
