//! gamedex: harvest a paginated game catalog into a vector store and
//! search it semantically.
//!
//! The write path is a two-stage pipeline driven by in-process dispatch
//! queues: a seeder enumerates the sweep, a gatherer fetches catalog pages,
//! and an indexer chunks, embeds, and upserts the records. The read path
//! embeds a query and asks the store for nearest neighbors.

pub mod catalog;
pub mod cli;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod queue;
pub mod services;

pub use cli::{Cli, Commands};
pub use error::AppError;
pub use models::{Config, OutputFormat};
