//! Work units and records flowing through the ingestion pipeline.

use serde::{Deserialize, Serialize};

/// One page of the catalog sweep: fetch at most `limit` records starting at
/// `offset`. Immutable once created; retried as-is on failure so the sweep's
/// coverage invariant survives redelivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatherUnit {
    pub offset: u64,
    pub limit: u32,
}

/// One catalog item as returned by the external API.
///
/// `id` is source-assigned and stable; it anchors every vector id derived
/// from this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storyline: Option<String>,
    pub url: String,
}

/// The text-bearing fields of a [`CatalogRecord`], in the fixed order the
/// indexer processes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextField {
    Name,
    Summary,
    Storyline,
}

impl TextField {
    /// All indexable fields, in processing order.
    pub const ALL: [TextField; 3] = [TextField::Name, TextField::Summary, TextField::Storyline];

    pub fn as_str(&self) -> &'static str {
        match self {
            TextField::Name => "name",
            TextField::Summary => "summary",
            TextField::Storyline => "storyline",
        }
    }
}

impl std::fmt::Display for TextField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CatalogRecord {
    /// Extract one field's text, if present and non-empty.
    ///
    /// A statically declared extractor per field keeps the processing order
    /// deterministic, which chunk indices depend on.
    pub fn field_text(&self, field: TextField) -> Option<&str> {
        let text = match field {
            TextField::Name => Some(self.name.as_str()),
            TextField::Summary => self.summary.as_deref(),
            TextField::Storyline => self.storyline.as_deref(),
        };
        text.filter(|t| !t.trim().is_empty())
    }
}

/// Metadata stored alongside each vector, returned in full on query matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMetadata {
    /// The chunk text this vector embeds.
    pub text: String,
    /// Source-assigned id of the originating catalog record.
    pub source_id: i64,
    pub name: String,
    pub url: String,
    /// Which record field the chunk came from.
    pub field: TextField,
}

/// A single embedding ready for upsert, keyed by a deterministic id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: VectorMetadata,
}

impl VectorRecord {
    /// Derive the vector id for chunk `index` of `field`, given the total
    /// chunk count the field produced.
    ///
    /// Single-chunk fields get an index-free id (`4711:summary`); multi-chunk
    /// fields are suffixed (`4711:summary[0]`). Ids depend only on stable
    /// source attributes, so re-indexing the same record overwrites rather
    /// than duplicates.
    pub fn derive_id(source_id: i64, field: TextField, index: usize, total: usize) -> String {
        if total > 1 {
            format!("{source_id}:{field}[{index}]")
        } else {
            format!("{source_id}:{field}")
        }
    }
}
