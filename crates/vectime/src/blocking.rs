//! Thread-blocking client.
//!
//! [`BlockingClient`] wraps the async [`Client`] behind a private
//! current-thread runtime, giving synchronous callers identical semantics
//! (same compiled statements, same pool, same errors) without an async
//! context of their own.

use vectime_core::{Filter, Index, Record, RecordId, TableConfig, VectimeError};

use crate::client::Client;
use crate::search::{SearchQuery, SearchResult};

/// Blocking counterpart of [`Client`].
pub struct BlockingClient {
    inner: Client,
    runtime: tokio::runtime::Runtime,
}

impl BlockingClient {
    /// Create a blocking client. Fails on invalid configuration or if the
    /// internal runtime cannot start; no connection is opened until the
    /// first operation.
    pub fn new(service_url: impl Into<String>, config: TableConfig) -> Result<Self, VectimeError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                VectimeError::Database(format!("failed to start blocking runtime: {e}"))
            })?;
        Ok(Self {
            inner: Client::new(service_url, config)?,
            runtime,
        })
    }

    /// Override the pool-size heuristic.
    pub fn with_max_db_connections(mut self, max_db_connections: u32) -> Self {
        self.inner = self.inner.with_max_db_connections(max_db_connections);
        self
    }

    pub fn create_tables(&self) -> Result<(), VectimeError> {
        self.runtime.block_on(self.inner.create_tables())
    }

    pub fn table_is_empty(&self) -> Result<bool, VectimeError> {
        self.runtime.block_on(self.inner.table_is_empty())
    }

    pub fn upsert(&self, records: &[Record]) -> Result<(), VectimeError> {
        self.runtime.block_on(self.inner.upsert(records))
    }

    pub fn search(&self, request: SearchQuery) -> Result<Vec<SearchResult>, VectimeError> {
        self.runtime.block_on(self.inner.search(request))
    }

    pub fn delete_all(&self, drop_index: bool) -> Result<(), VectimeError> {
        self.runtime.block_on(self.inner.delete_all(drop_index))
    }

    pub fn delete_by_ids(&self, ids: &[RecordId]) -> Result<u64, VectimeError> {
        self.runtime.block_on(self.inner.delete_by_ids(ids))
    }

    pub fn delete_by_metadata(&self, filter: &Filter) -> Result<u64, VectimeError> {
        self.runtime.block_on(self.inner.delete_by_metadata(filter))
    }

    pub fn drop_table(&self) -> Result<(), VectimeError> {
        self.runtime.block_on(self.inner.drop_table())
    }

    pub fn approx_count(&self) -> Result<u64, VectimeError> {
        self.runtime.block_on(self.inner.approx_count())
    }

    pub fn create_embedding_index(&self, index: &Index) -> Result<(), VectimeError> {
        self.runtime.block_on(self.inner.create_embedding_index(index))
    }

    pub fn drop_embedding_index(&self) -> Result<(), VectimeError> {
        self.runtime.block_on(self.inner.drop_embedding_index())
    }

    pub fn close(&self) {
        self.runtime.block_on(self.inner.close());
    }
}
