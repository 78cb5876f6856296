//! League standings and recent-form analytics over a chronological match log,
//! with leakage-safe feature tables for match prediction.

pub mod config;
pub mod entity_map;
pub mod error;
pub mod features;
pub mod form;
pub mod http_cache;
pub mod http_client;
pub mod match_record;
pub mod openligadb;
pub mod pipeline;
pub mod scoring;
pub mod standings;
pub mod table;
pub mod team_view;

pub use error::{EngineError, Result};
