use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;

use crate::catalog::CatalogClient;
use crate::cli::output::{SeedReport, get_formatter};
use crate::models::{Config, OutputFormat, StoreDriver};
use crate::pipeline::{run_sweep, sweep_units};
use crate::services::{Embedder, EmbeddingClient, VectorStore, create_backend};

#[derive(Debug, Args)]
pub struct SeedArgs {
    #[arg(long, help = "First catalog offset to sweep")]
    pub start: Option<u64>,

    #[arg(long, help = "Last catalog offset to cover (inclusive)")]
    pub end: Option<u64>,

    #[arg(long, help = "Records per catalog page")]
    pub limit: Option<u32>,

    #[arg(long, help = "Vector store driver override: qdrant or memory")]
    pub driver: Option<StoreDriver>,
}

pub async fn handle_seed(args: SeedArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let mut config = Config::load()?;
    let formatter = get_formatter(format);

    if let Some(start) = args.start {
        config.pipeline.sweep_start = start;
    }
    if let Some(end) = args.end {
        config.pipeline.sweep_end = end;
    }
    if let Some(limit) = args.limit {
        config.pipeline.page_limit = limit;
    }
    if let Some(driver) = args.driver {
        config.vector_store.driver = driver;
    }
    config.pipeline.validate()?;

    let units = sweep_units(
        config.pipeline.sweep_start,
        config.pipeline.sweep_end,
        config.pipeline.page_limit,
    )
    .len() as u64;

    if verbose {
        eprintln!(
            "Sweep: offsets {}..={} step {} ({} gather units)",
            config.pipeline.sweep_start,
            config.pipeline.sweep_end,
            config.pipeline.page_limit,
            units
        );
    }

    let catalog = CatalogClient::new(&config.catalog).context("failed to create catalog client")?;
    let embedder: Arc<dyn Embedder> = Arc::new(
        EmbeddingClient::new(&config.embedding).context("failed to create embedding client")?,
    );
    let store: Arc<dyn VectorStore> = Arc::from(
        create_backend(&config.vector_store, u64::from(config.embedding.dimension))
            .context("failed to create vector store backend")?,
    );

    store
        .ensure_collection()
        .await
        .context("failed to ensure collection exists")?;

    let start_time = Instant::now();
    let receipt = run_sweep(catalog, Arc::clone(&embedder), Arc::clone(&store), &config.pipeline)
        .await
        .context("sweep failed")?;
    let duration_ms = start_time.elapsed().as_millis() as u64;

    let points = store.count().await.unwrap_or(0);
    let report = SeedReport {
        receipt,
        units,
        points,
        duration_ms,
    };

    print!("{}", formatter.format_seed_report(&report));

    Ok(())
}
