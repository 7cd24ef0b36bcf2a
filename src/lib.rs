//! Football league ingestion and reconciliation (Ligue 1 / Ligue 2).
//!
//! Raw payloads from the competition API, scraped encyclopedia pages, squad
//! exports and a results site flow through the source adapters, the
//! normalizer and the identity resolver into a relational store (teams,
//! people, leagues, rankings) and a document store (match documents).

pub mod config;
pub mod error;
pub mod health;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod resolver;
pub mod service;
pub mod sources;
pub mod store;

pub use config::Config;
pub use pipeline::{Pipeline, RunReport};
pub use service::IngestionService;
