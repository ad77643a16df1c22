pub mod service;

pub use service::CommandDispatcher;
