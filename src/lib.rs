pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod models;
pub mod routes;
pub mod schema;
pub mod state;
pub mod storage;
pub mod timeline;
pub mod utils;
pub mod workers;
pub mod workflow;

pub use workers::{default_handlers, Worker};
