use serde::{Deserialize, Serialize};
use serde_json::Value;
use vectime_core::{Filter, Predicates, QueryParams, RecordId, UuidTimeRange};

/// A similarity-search request.
///
/// All parts are optional: without an embedding the search degrades to
/// filter-only retrieval (no ordering, sentinel distance), and without any
/// filter, predicates, or time range the WHERE clause is unconditional.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub embedding: Option<Vec<f32>>,
    pub limit: usize,
    pub filter: Option<Filter>,
    pub predicates: Option<Predicates>,
    pub time_range: Option<UuidTimeRange>,
    /// Session-scoped engine settings applied for this search only.
    pub query_params: Option<QueryParams>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            embedding: None,
            limit: 10,
            filter: None,
            predicates: None,
            time_range: None,
            query_params: None,
        }
    }
}

impl SearchQuery {
    /// A request with the default limit of 10 and no constraints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rank results by similarity to this embedding.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_predicates(mut self, predicates: Predicates) -> Self {
        self.predicates = Some(predicates);
        self
    }

    pub fn with_time_range(mut self, time_range: UuidTimeRange) -> Self {
        self.time_range = Some(time_range);
        self
    }

    pub fn with_query_params(mut self, query_params: QueryParams) -> Self {
        self.query_params = Some(query_params);
        self
    }
}

/// One row of a search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: RecordId,
    pub metadata: Value,
    pub contents: String,
    pub embedding: Vec<f32>,
    /// Distance to the query embedding under the configured metric, or the
    /// sentinel `-1.0` for filter-only retrieval.
    pub distance: f64,
}
