use anyhow::Result;

use crate::cli::output::{StatusInfo, get_formatter};
use crate::models::{Config, OutputFormat, StoreDriver};
use crate::services::{EmbeddingClient, create_backend};

pub async fn handle_status(format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let (embedding_ok, embedding_model) = match EmbeddingClient::new(&config.embedding) {
        Ok(client) => match client.health_check().await {
            Ok(health) => (true, health.model_id),
            Err(_) => (false, None),
        },
        Err(_) => (false, None),
    };

    let (store_ok, points) = match create_backend(
        &config.vector_store,
        u64::from(config.embedding.dimension),
    ) {
        Ok(store) => {
            let ok = store.health_check().await.unwrap_or(false);
            let points = if ok { store.count().await.unwrap_or(0) } else { 0 };
            (ok, points)
        }
        Err(_) => (false, 0),
    };

    let driver = match config.vector_store.driver {
        StoreDriver::Qdrant => "qdrant",
        StoreDriver::Memory => "memory",
    };

    let status = StatusInfo {
        embedding_url: config.embedding.url.clone(),
        embedding_ok,
        embedding_model,
        store_driver: driver.to_string(),
        store_url: config.vector_store.url.clone(),
        store_ok,
        collection: config.vector_store.collection.clone(),
        points,
    };

    print!("{}", formatter.format_status(&status));

    if !embedding_ok || !store_ok {
        eprintln!();
        if !embedding_ok {
            eprintln!(
                "Warning: embedding server not reachable at {}",
                config.embedding.url
            );
        }
        if !store_ok && config.vector_store.driver == StoreDriver::Qdrant {
            eprintln!("Warning: Qdrant not running. Start with: docker compose up -d qdrant");
        }
    }

    Ok(())
}
