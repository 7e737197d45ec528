pub mod app;
pub mod auth;
pub mod cache;
pub mod client;
pub mod merge;
pub mod models;
pub mod monitoring;
pub mod scheduler;
pub mod server;
pub mod sports;
pub mod types;
pub mod utils;

pub use crate::types::*;
