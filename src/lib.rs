pub mod api;
pub mod backend;
pub mod busy;
pub mod config;
pub mod control;
pub mod error;
pub mod firebase;
pub mod identity;
pub mod models;
pub mod notify;
pub mod response_store;
pub mod session;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;
