pub mod config;
pub mod error;
pub mod db;
pub mod ingest;
pub mod embeddings;
pub mod cache;
pub mod store;
pub mod search;
pub mod mcp;
pub mod sql;
pub mod app;

pub use config::Config;
pub use error::{AccordError, Result};
