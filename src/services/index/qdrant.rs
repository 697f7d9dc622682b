//! Qdrant vector index backend.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, Distance, FieldType,
    Filter, PointStruct, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use uuid::Uuid;

use super::VectorIndex;
use crate::error::IndexError;
use crate::models::{IndexConfig, IndexedVector, MetadataFilter, SearchResult, keys};

const CONTENT_FIELD: &str = "content";
const VECTOR_ID_FIELD: &str = "vector_id";

/// Payload fields that get a keyword index on `optimize`.
const FILTERABLE_FIELDS: [&str; 3] = [keys::SUBJECT, keys::DIFFICULTY, keys::DOCUMENT_ID];

/// Qdrant-backed index. Vector ids like `doc1_0` are not valid Qdrant point
/// ids, so points are keyed by a UUIDv5 of the id and the id itself travels
/// in the payload.
pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
    dimension: u64,
}

impl QdrantIndex {
    pub fn new(config: &IndexConfig, dimension: u64) -> Result<Self, IndexError> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| IndexError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            dimension,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Create the collection if it doesn't exist yet.
    pub async fn ensure_collection(&self) -> Result<(), IndexError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(unavailable)?;
        if exists {
            return Ok(());
        }

        tracing::info!(collection = %self.collection, dimension = self.dimension, "creating collection");
        let create = CreateCollectionBuilder::new(&self.collection)
            .vectors_config(VectorParamsBuilder::new(self.dimension, Distance::Cosine));

        self.client
            .create_collection(create)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    /// Number of stored points, or `None` when the collection is missing.
    pub async fn points_count(&self) -> Result<Option<u64>, IndexError> {
        match self.client.collection_info(&self.collection).await {
            Ok(info) => Ok(Some(
                info.result.map_or(0, |r| r.points_count.unwrap_or(0)),
            )),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("not found") || msg.contains("doesn't exist") {
                    Ok(None)
                } else {
                    Err(IndexError::Unavailable(msg))
                }
            }
        }
    }

    pub fn point_id(vector_id: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, vector_id.as_bytes()).to_string()
    }

    fn build_filter(filter: Option<&MetadataFilter>) -> Option<Filter> {
        let filter = filter.filter(|f| !f.is_empty())?;
        let conditions: Vec<Condition> = filter
            .conditions()
            .map(|(key, value)| Condition::matches(key, value.to_string()))
            .collect();
        Some(Filter::must(conditions))
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn health_check(&self) -> Result<(), IndexError> {
        self.client
            .health_check()
            .await
            .map(|_| ())
            .map_err(|e| IndexError::Unavailable(e.to_string()))
    }

    async fn insert(&self, vector: IndexedVector) -> Result<(), IndexError> {
        let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
        for (key, value) in vector.metadata {
            payload.insert(key, value.into());
        }
        payload.insert(CONTENT_FIELD.to_string(), vector.content.into());
        payload.insert(VECTOR_ID_FIELD.to_string(), vector.id.clone().into());

        let point = PointStruct::new(Self::point_id(&vector.id), vector.embedding, payload);
        let upsert = UpsertPointsBuilder::new(&self.collection, vec![point]).wait(true);

        self.client.upsert_points(upsert).await.map_err(|e| {
            let msg = e.to_string();
            if is_connection_error(&msg) {
                IndexError::Unavailable(msg)
            } else {
                IndexError::InsertFailed(msg)
            }
        })?;

        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>, IndexError> {
        let mut search_builder =
            SearchPointsBuilder::new(&self.collection, vector.to_vec(), k as u64)
                .with_payload(true);

        if let Some(f) = Self::build_filter(filter) {
            search_builder = search_builder.filter(f);
        }

        let results = self
            .client
            .search_points(search_builder)
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if is_connection_error(&msg) {
                    IndexError::Unavailable(msg)
                } else {
                    IndexError::SearchFailed(msg)
                }
            })?;

        let search_results = results
            .result
            .into_iter()
            .map(|point| {
                let mut id = String::new();
                let mut content = String::new();
                let mut metadata = BTreeMap::new();

                for (key, value) in point.payload {
                    let Some(Kind::StringValue(s)) = value.kind else {
                        continue;
                    };
                    match key.as_str() {
                        CONTENT_FIELD => content = s,
                        VECTOR_ID_FIELD => id = s,
                        _ => {
                            metadata.insert(key, s);
                        }
                    }
                }

                SearchResult {
                    document: IndexedVector {
                        id,
                        content,
                        embedding: Vec::new(),
                        metadata,
                    },
                    score: point.score,
                }
            })
            .collect();

        Ok(search_results)
    }

    async fn optimize(&self) -> Result<(), IndexError> {
        for field in FILTERABLE_FIELDS {
            let request =
                CreateFieldIndexCollectionBuilder::new(&self.collection, field, FieldType::Keyword)
                    .wait(true);
            self.client
                .create_field_index(request)
                .await
                .map_err(unavailable)?;
        }
        tracing::debug!(collection = %self.collection, "payload indexes refreshed");
        Ok(())
    }
}

fn unavailable(e: qdrant_client::QdrantError) -> IndexError {
    IndexError::Unavailable(e.to_string())
}

fn is_connection_error(msg: &str) -> bool {
    let msg = msg.to_lowercase();
    msg.contains("connect") || msg.contains("unavailable") || msg.contains("timeout")
}
