use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat, QueryResults};
use crate::pipeline::run_query;
use crate::services::{EmbeddingClient, create_backend};

#[derive(Debug, Args)]
pub struct QueryArgs {
    #[arg(required = true, help = "Query text")]
    pub query: String,

    #[arg(long, short = 'n', help = "Maximum number of results to return")]
    pub limit: Option<u32>,
}

pub async fn handle_query(args: QueryArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let query = args.query.trim();
    if query.is_empty() {
        anyhow::bail!("query text cannot be empty");
    }

    let config = Config::load()?;
    let formatter = get_formatter(format);

    let limit = args.limit.unwrap_or(config.search.default_limit);
    if limit == 0 {
        anyhow::bail!("limit must be at least 1");
    }

    if verbose {
        eprintln!("Query: \"{query}\"");
        eprintln!("  Limit: {limit}");
        eprintln!("  Collection: {}", config.vector_store.collection);
    }

    let embedder =
        EmbeddingClient::new(&config.embedding).context("failed to create embedding client")?;
    let store = create_backend(&config.vector_store, u64::from(config.embedding.dimension))
        .context("failed to create vector store backend")?;

    let start_time = Instant::now();
    let matches = run_query(&embedder, store.as_ref(), query, u64::from(limit))
        .await
        .context("query failed")?;
    let duration_ms = start_time.elapsed().as_millis() as u64;

    let results = QueryResults::new(query.to_string(), matches, duration_ms);
    print!("{}", formatter.format_query_results(&results));

    Ok(())
}
