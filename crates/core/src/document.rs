use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A persisted unit of retrievable knowledge (`D` in the data model).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(alias = "text")]
    pub content: String,
    pub metadata: HashMap<String, String>,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(|s| s.as_str())
    }
}

/// Where a candidate was retrieved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionOrigin {
    WebsiteContent,
    IstaDocuments,
}

impl CollectionOrigin {
    pub fn collection_name(&self) -> &'static str {
        match self {
            CollectionOrigin::WebsiteContent => "website_content",
            CollectionOrigin::IstaDocuments => "ista_documents",
        }
    }
}

/// A document materialized during re-ranking, carrying its scoring components.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub document: Document,
    pub raw_distance: f32,
    pub keyword_hits: usize,
    pub metadata_boost: f32,
    pub final_score: f32,
    pub collection_origin: CollectionOrigin,
}

/// A citation surfaced to the caller alongside a generated answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub section: String,
    pub url: String,
}

impl Source {
    /// Dedup key: candidates with no URL never contribute a source.
    pub fn dedup_key(&self) -> Option<(String, String)> {
        if self.url.is_empty() {
            None
        } else {
            Some((self.url.clone(), self.title.clone()))
        }
    }
}

/// A single top-K hit returned directly by the vector store, before re-ranking.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub content: String,
    pub metadata: HashMap<String, String>,
    pub distance: f32,
    pub origin: CollectionOrigin,
}
