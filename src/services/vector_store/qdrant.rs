//! Qdrant vector store backend.

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder,
};
use std::collections::HashMap;
use uuid::Uuid;

use super::VectorStore;
use crate::error::VectorStoreError;
use crate::models::{QueryMatch, TextField, VectorMetadata, VectorRecord, VectorStoreConfig};

/// Qdrant vector store backend.
///
/// Qdrant point ids must be UUIDs or integers, so the deterministic string
/// vector id is mapped to a UUIDv5 of itself; the string id travels in the
/// payload. Same input id, same point id, so upserts replace.
pub struct QdrantBackend {
    client: Qdrant,
    collection: String,
    embedding_dim: u64,
}

impl QdrantBackend {
    /// Create a new Qdrant backend from configuration.
    pub fn new(config: &VectorStoreConfig, embedding_dim: u64) -> Result<Self, VectorStoreError> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            embedding_dim,
        })
    }

    fn point_id(vector_id: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, vector_id.as_bytes()).to_string()
    }

    fn collection_exists_error(msg: &str) -> bool {
        msg.contains("not found") || msg.contains("doesn't exist")
    }
}

fn payload_str(payload: &HashMap<String, qdrant_client::qdrant::Value>, key: &str) -> String {
    payload
        .get(key)
        .and_then(|v| match &v.kind {
            Some(qdrant_client::qdrant::value::Kind::StringValue(s)) => Some(s.as_str()),
            _ => None,
        })
        .unwrap_or("")
        .to_string()
}

fn payload_i64(payload: &HashMap<String, qdrant_client::qdrant::Value>, key: &str) -> i64 {
    payload
        .get(key)
        .and_then(|v| match &v.kind {
            Some(qdrant_client::qdrant::value::Kind::IntegerValue(n)) => Some(*n),
            _ => None,
        })
        .unwrap_or(0)
}

#[async_trait]
impl VectorStore for QdrantBackend {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        self.client
            .health_check()
            .await
            .map(|_| true)
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))
    }

    async fn ensure_collection(&self) -> Result<(), VectorStoreError> {
        match self.client.collection_info(&self.collection).await {
            Ok(_) => return Ok(()),
            Err(e) if Self::collection_exists_error(&e.to_string()) => {}
            Err(e) => return Err(VectorStoreError::CollectionError(e.to_string())),
        }

        let create_collection = CreateCollectionBuilder::new(&self.collection).vectors_config(
            VectorParamsBuilder::new(self.embedding_dim, Distance::Cosine),
        );

        self.client
            .create_collection(create_collection)
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;

        Ok(())
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<u64, VectorStoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let count = records.len() as u64;
        let points: Vec<PointStruct> = records
            .into_iter()
            .map(|record| {
                let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
                payload.insert("vector_id".to_string(), record.id.clone().into());
                payload.insert("text".to_string(), record.metadata.text.into());
                payload.insert("source_id".to_string(), record.metadata.source_id.into());
                payload.insert("name".to_string(), record.metadata.name.into());
                payload.insert("url".to_string(), record.metadata.url.into());
                payload.insert(
                    "field".to_string(),
                    record.metadata.field.as_str().to_string().into(),
                );

                PointStruct::new(Self::point_id(&record.id), record.values, payload)
            })
            .collect();

        let upsert = UpsertPointsBuilder::new(&self.collection, points);

        self.client
            .upsert_points(upsert)
            .await
            .map_err(|e| VectorStoreError::UpsertError(e.to_string()))?;

        Ok(count)
    }

    async fn query(
        &self,
        vector: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<QueryMatch>, VectorStoreError> {
        let search =
            SearchPointsBuilder::new(&self.collection, vector, limit).with_payload(true);

        let results = self
            .client
            .search_points(search)
            .await
            .map_err(|e| VectorStoreError::SearchError(e.to_string()))?;

        let matches = results
            .result
            .into_iter()
            .map(|point| {
                let payload = point.payload;

                let field = match payload_str(&payload, "field").as_str() {
                    "summary" => TextField::Summary,
                    "storyline" => TextField::Storyline,
                    _ => TextField::Name,
                };

                QueryMatch {
                    id: payload_str(&payload, "vector_id"),
                    score: point.score,
                    metadata: VectorMetadata {
                        text: payload_str(&payload, "text"),
                        source_id: payload_i64(&payload, "source_id"),
                        name: payload_str(&payload, "name"),
                        url: payload_str(&payload, "url"),
                        field,
                    },
                }
            })
            .collect();

        Ok(matches)
    }

    async fn count(&self) -> Result<u64, VectorStoreError> {
        match self.client.collection_info(&self.collection).await {
            Ok(info) => Ok(info.result.map_or(0, |r| r.points_count.unwrap_or(0))),
            Err(e) if Self::collection_exists_error(&e.to_string()) => Ok(0),
            Err(e) => Err(VectorStoreError::CollectionError(e.to_string())),
        }
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}
