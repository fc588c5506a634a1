//! Qdrant-backed adapter (C2): opens and queries the two named collections
//! (`website_content`, `ista_documents`) behind one client connection.

use std::collections::HashMap;

use qdrant_client::qdrant::{
    point_id::PointIdOptions, value::Kind, Condition, CreateCollectionBuilder, DeletePointsBuilder,
    Distance, FieldCondition, Filter, Match, PointId, PointStruct, PointsIdsList,
    ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::Qdrant;

use assistant_core::document::{CollectionOrigin, Document, VectorHit};

use crate::RagError;

#[derive(Debug, Clone)]
pub struct CollectionStoreConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

/// A where-filter applied server-side during a query.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    conditions: Vec<(String, String)>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push((key.into(), value.into()));
        self
    }

    fn into_qdrant(self) -> Filter {
        let must = self
            .conditions
            .into_iter()
            .map(|(key, value)| Condition {
                condition_one_of: Some(qdrant_client::qdrant::condition::ConditionOneOf::Field(FieldCondition {
                    key,
                    r#match: Some(Match { match_value: Some(qdrant_client::qdrant::r#match::MatchValue::Keyword(value)) }),
                    ..Default::default()
                })),
            })
            .collect();
        Filter { must, ..Default::default() }
    }
}

/// One Qdrant-backed collection, bound to a fixed embedding dimension.
struct OpenCollection {
    name: String,
    origin: CollectionOrigin,
    dim: usize,
}

/// Adapter over a Qdrant client exposing the collections the retriever
/// needs, each opened once with a checked embedding dimension.
pub struct CollectionStore {
    client: Qdrant,
    collections: Vec<OpenCollection>,
}

impl CollectionStore {
    pub fn connect(config: CollectionStoreConfig) -> Result<Self, RagError> {
        let mut builder = Qdrant::from_url(&config.endpoint);
        if let Some(api_key) = config.api_key {
            builder = builder.api_key(api_key);
        }
        let client = builder.build().map_err(|e| RagError::Connection(e.to_string()))?;
        Ok(Self { client, collections: Vec::new() })
    }

    /// Idempotently opens `name`, creating it with `embedding_dim` if
    /// missing. Refuses to reopen an already-open collection with a
    /// different dimension — dimension is constant per collection.
    pub async fn open_or_create(
        &mut self,
        name: &str,
        origin: CollectionOrigin,
        embedding_dim: usize,
    ) -> Result<(), RagError> {
        if let Some(existing) = self.collections.iter().find(|c| c.name == name) {
            if existing.dim != embedding_dim {
                return Err(RagError::DimensionMismatch { expected: existing.dim, actual: embedding_dim });
            }
            return Ok(());
        }

        let exists = self.client.collection_exists(name).await.map_err(|e| RagError::VectorStore(e.to_string()))?;
        if exists {
            let info = self.client.collection_info(name).await.map_err(|e| RagError::VectorStore(e.to_string()))?;
            if let Some(existing_dim) = info.result.and_then(|r| r.config).and_then(vector_size) {
                if existing_dim as usize != embedding_dim {
                    return Err(RagError::DimensionMismatch { expected: existing_dim as usize, actual: embedding_dim });
                }
            }
        } else {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(name)
                        .vectors_config(VectorParamsBuilder::new(embedding_dim as u64, Distance::Cosine)),
                )
                .await
                .map_err(|e| RagError::VectorStore(e.to_string()))?;
        }

        self.collections.push(OpenCollection { name: name.to_string(), origin, dim: embedding_dim });
        Ok(())
    }

    fn origin_of(&self, name: &str) -> CollectionOrigin {
        self.collections.iter().find(|c| c.name == name).map(|c| c.origin).unwrap_or(CollectionOrigin::WebsiteContent)
    }

    /// Upserts documents in batches of 100.
    pub async fn add(&self, collection: &str, documents: &[Document], embeddings: &[Vec<f32>]) -> Result<(), RagError> {
        if documents.len() != embeddings.len() {
            return Err(RagError::VectorStore("document/embedding count mismatch".to_string()));
        }

        for (doc_chunk, emb_chunk) in documents.chunks(100).zip(embeddings.chunks(100)) {
            let points: Vec<PointStruct> = doc_chunk
                .iter()
                .zip(emb_chunk.iter())
                .map(|(doc, emb)| {
                    let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
                    payload.insert("text".to_string(), doc.content.clone().into());
                    for (k, v) in &doc.metadata {
                        payload.insert(k.clone(), v.clone().into());
                    }
                    PointStruct::new(doc.id.clone(), emb.clone(), payload)
                })
                .collect();

            self.client
                .upsert_points(UpsertPointsBuilder::new(collection, points))
                .await
                .map_err(|e| RagError::VectorStore(e.to_string()))?;
        }
        Ok(())
    }

    /// Top-`top_k` nearest neighbors by embedding.
    pub async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
        filter: Option<MetadataFilter>,
    ) -> Result<Vec<VectorHit>, RagError> {
        let mut builder = SearchPointsBuilder::new(collection, embedding.to_vec(), top_k as u64).with_payload(true);
        if let Some(f) = filter {
            builder = builder.filter(f.into_qdrant());
        }

        let results = self.client.search_points(builder).await.map_err(|e| RagError::Search(e.to_string()))?;
        let origin = self.origin_of(collection);
        Ok(results.result.into_iter().map(|point| point_to_hit(point, origin)).collect())
    }

    /// Full scan of a collection, used by the keyword-scan fallback when a
    /// vector query returns nothing.
    pub async fn get_all(&self, collection: &str) -> Result<Vec<VectorHit>, RagError> {
        let origin = self.origin_of(collection);
        let mut all = Vec::new();
        let mut offset = None;
        loop {
            let mut builder = ScrollPointsBuilder::new(collection).limit(256).with_payload(true);
            if let Some(o) = offset.take() {
                builder = builder.offset(o);
            }
            let response = self.client.scroll(builder).await.map_err(|e| RagError::VectorStore(e.to_string()))?;
            let batch_len = response.result.len();
            for point in response.result {
                all.push(scored_point_to_hit(point, origin));
            }
            offset = response.next_page_offset;
            if offset.is_none() || batch_len == 0 {
                break;
            }
        }
        Ok(all)
    }

    pub async fn count(&self, collection: &str) -> Result<u64, RagError> {
        let info = self.client.collection_info(collection).await.map_err(|e| RagError::VectorStore(e.to_string()))?;
        Ok(info.result.and_then(|r| r.points_count).unwrap_or(0))
    }

    pub async fn delete(&self, collection: &str, ids: &[String]) -> Result<(), RagError> {
        let points: Vec<PointId> = ids.iter().map(|id| PointId::from(id.clone())).collect();
        self.client
            .delete_points(DeletePointsBuilder::new(collection).points(PointsIdsList { ids: points }))
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;
        Ok(())
    }
}

fn vector_size(config: qdrant_client::qdrant::CollectionConfig) -> Option<u64> {
    use qdrant_client::qdrant::vectors_config::Config as VecConfig;
    config.params?.vectors_config?.config.and_then(|c| match c {
        VecConfig::Params(p) => Some(p.size),
        _ => None,
    })
}

fn extract_payload(payload: HashMap<String, qdrant_client::qdrant::Value>) -> (String, HashMap<String, String>) {
    let mut content = String::new();
    let mut metadata = HashMap::new();
    for (k, v) in payload {
        if let Some(Kind::StringValue(s)) = v.kind {
            if k == "text" {
                content = s;
            } else {
                metadata.insert(k, s);
            }
        }
    }
    (content, metadata)
}

fn point_id_to_string(id: Option<PointId>) -> String {
    id.and_then(|p| p.point_id_options)
        .map(|opts| match opts {
            PointIdOptions::Uuid(u) => u,
            PointIdOptions::Num(n) => n.to_string(),
        })
        .unwrap_or_default()
}

fn point_to_hit(point: qdrant_client::qdrant::ScoredPoint, origin: CollectionOrigin) -> VectorHit {
    let (content, metadata) = extract_payload(point.payload);
    // Qdrant's score is a similarity (higher = better) regardless of the
    // configured distance metric; callers expect smaller = more similar.
    let distance = 1.0 - point.score;
    VectorHit { id: point_id_to_string(point.id), content, metadata, distance, origin }
}

fn scored_point_to_hit(point: qdrant_client::qdrant::RetrievedPoint, origin: CollectionOrigin) -> VectorHit {
    let (content, metadata) = extract_payload(point.payload);
    VectorHit { id: point_id_to_string(point.id), content, metadata, distance: 0.0, origin }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_filter_builds_required_conditions() {
        let filter = MetadataFilter::new().eq("groupe", "NTIC2-FS201").into_qdrant();
        assert_eq!(filter.must.len(), 1);
    }
}
