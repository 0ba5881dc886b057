//! Query-side models for nearest-neighbor lookups.

use serde::{Deserialize, Serialize};

use super::record::VectorMetadata;

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// One nearest-neighbor match, in the order the store returned it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryMatch {
    /// Deterministic vector id of the matched chunk.
    pub id: String,

    /// Similarity score as reported by the store.
    pub score: f32,

    /// Full metadata stored with the vector.
    pub metadata: VectorMetadata,
}

/// Result set for one query execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResults {
    pub query: String,
    pub matches: Vec<QueryMatch>,
    pub duration_ms: u64,
}

impl QueryResults {
    pub fn new(query: String, matches: Vec<QueryMatch>, duration_ms: u64) -> Self {
        Self {
            query,
            matches,
            duration_ms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }
}

/// Receipt returned by the seed trigger: the last computed step of the sweep
/// (`offset` is the first offset past the sweep end).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SweepReceipt {
    pub offset: u64,
    pub limit: u32,
}
