pub mod service;

pub use service::{AccountService, Registration};
