use pgvector::Vector;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Connection, PgConnection, PgPool, Postgres, Row};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use vectime_core::{
    munge_records, Filter, IdKind, Index, QueryBuilder, QueryParam, Record, RecordId, TableConfig,
    VectimeError,
};

use crate::search::{SearchQuery, SearchResult};

fn db_err(err: sqlx::Error) -> VectimeError {
    VectimeError::Database(err.to_string())
}

/// Asynchronous client for one vector table.
///
/// The connection pool is created lazily on first use. Its size defaults to
/// a heuristic against the server's own connection limit (reserving
/// headroom for other clients) and can be overridden with
/// [`with_max_db_connections`](Client::with_max_db_connections).
#[derive(Debug)]
pub struct Client {
    service_url: String,
    builder: QueryBuilder,
    max_db_connections: Option<u32>,
    pool: OnceCell<PgPool>,
}

impl Client {
    /// Create a client. Fails on invalid configuration; no connection is
    /// opened until the first operation.
    pub fn new(service_url: impl Into<String>, config: TableConfig) -> Result<Self, VectimeError> {
        Ok(Self {
            service_url: service_url.into(),
            builder: QueryBuilder::new(config)?,
            max_db_connections: None,
            pool: OnceCell::new(),
        })
    }

    /// Override the pool-size heuristic.
    pub fn with_max_db_connections(mut self, max_db_connections: u32) -> Self {
        self.max_db_connections = Some(max_db_connections);
        self
    }

    /// The query compiler backing this client.
    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    async fn default_max_db_connections(&self) -> Result<u32, VectimeError> {
        let mut conn = PgConnection::connect(&self.service_url)
            .await
            .map_err(db_err)?;
        let max: Option<i32> = sqlx::query_scalar(&self.builder.default_max_db_connections_query())
            .fetch_optional(&mut conn)
            .await
            .map_err(db_err)?;
        conn.close().await.map_err(db_err)?;
        Ok(max.map_or(10, |m| m.max(1) as u32))
    }

    async fn pool(&self) -> Result<&PgPool, VectimeError> {
        self.pool
            .get_or_try_init(|| async {
                let max_connections = match self.max_db_connections {
                    Some(max) => max,
                    None => self.default_max_db_connections().await?,
                };
                debug!(max_connections, "initializing connection pool");
                PgPoolOptions::new()
                    .min_connections(1)
                    .max_connections(max_connections)
                    .connect(&self.service_url)
                    .await
                    .map_err(db_err)
            })
            .await
    }

    /// Create the table, extensions, and metadata index (idempotent).
    ///
    /// Runs on a fresh connection rather than the pool: the vector
    /// extension may not be installed yet when the pool's connections are
    /// first set up.
    pub async fn create_tables(&self) -> Result<(), VectimeError> {
        let sql = self.builder.create_query();
        info!(
            table = %self.builder.config().table_name,
            "creating vector table"
        );
        let mut conn = PgConnection::connect(&self.service_url)
            .await
            .map_err(db_err)?;
        sqlx::raw_sql(&sql).execute(&mut conn).await.map_err(db_err)?;
        conn.close().await.map_err(db_err)?;
        Ok(())
    }

    /// True if the table holds no rows.
    pub async fn table_is_empty(&self) -> Result<bool, VectimeError> {
        let row = sqlx::query(&self.builder.row_exists_query())
            .fetch_optional(self.pool().await?)
            .await
            .map_err(db_err)?;
        Ok(row.is_none())
    }

    /// Insert records, silently skipping ids that already exist.
    ///
    /// The batch is validated before any row is sent: metadata
    /// representations must be consistent and every id must match the
    /// table's key kind.
    pub async fn upsert(&self, records: &[Record]) -> Result<(), VectimeError> {
        if records.is_empty() {
            return Ok(());
        }
        let metadata_docs = munge_records(records)?;
        for record in records {
            if let (RecordId::Text(text), IdKind::Uuid) = (&record.id, self.builder.id_kind()) {
                return Err(VectimeError::MalformedInput(format!(
                    "table keys are UUIDs but record id is text {text}"
                )));
            }
        }

        let sql = self.builder.upsert_query();
        let pool = self.pool().await?;
        let mut tx = pool.begin().await.map_err(db_err)?;
        for (record, metadata) in records.iter().zip(metadata_docs) {
            let query = sqlx::query(&sql);
            let query = match &record.id {
                RecordId::Uuid(uuid) => query.bind(*uuid),
                RecordId::Text(text) => query.bind(text.clone()),
            };
            query
                .bind(metadata)
                .bind(&record.contents)
                .bind(Vector::from(record.embedding.clone()))
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    /// Run a similarity search.
    ///
    /// When the request carries session query parameters, the `SET LOCAL`
    /// statements and the search run inside a single transaction so the
    /// settings apply to exactly this statement and stay invisible to
    /// other sessions.
    pub async fn search(&self, request: SearchQuery) -> Result<Vec<SearchResult>, VectimeError> {
        let SearchQuery {
            embedding,
            limit,
            filter,
            predicates,
            time_range,
            query_params,
        } = request;
        let (sql, params) = self.builder.search_query(
            embedding.as_deref(),
            limit,
            filter,
            predicates.as_ref(),
            time_range,
        )?;
        debug!(%sql, "executing similarity search");

        let pool = self.pool().await?;
        let rows: Vec<PgRow> = match &query_params {
            Some(query_params) if !query_params.is_empty() => {
                let mut tx = pool.begin().await.map_err(db_err)?;
                for statement in query_params.statements() {
                    sqlx::raw_sql(&statement)
                        .execute(&mut *tx)
                        .await
                        .map_err(db_err)?;
                }
                let rows = bind_params(sqlx::query(&sql), &params)
                    .fetch_all(&mut *tx)
                    .await
                    .map_err(db_err)?;
                tx.commit().await.map_err(db_err)?;
                rows
            }
            _ => bind_params(sqlx::query(&sql), &params)
                .fetch_all(pool)
                .await
                .map_err(db_err)?,
        };

        rows.iter().map(|row| self.decode_row(row)).collect()
    }

    /// Delete every record. Also drops the embedding index when
    /// `drop_index` is true.
    pub async fn delete_all(&self, drop_index: bool) -> Result<(), VectimeError> {
        if drop_index {
            self.drop_embedding_index().await?;
        }
        sqlx::query(&self.builder.delete_all_query())
            .execute(self.pool().await?)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Delete records by key, returning the number of rows removed.
    pub async fn delete_by_ids(&self, ids: &[RecordId]) -> Result<u64, VectimeError> {
        let (sql, params) = self.builder.delete_by_ids_query(ids)?;
        let result = bind_params(sqlx::query(&sql), &params)
            .execute(self.pool().await?)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    /// Delete records matching a metadata filter, returning the number of
    /// rows removed.
    pub async fn delete_by_metadata(&self, filter: &Filter) -> Result<u64, VectimeError> {
        let (sql, params) = self.builder.delete_by_metadata_query(filter)?;
        let result = bind_params(sqlx::query(&sql), &params)
            .execute(self.pool().await?)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    /// Drop the table (idempotent).
    pub async fn drop_table(&self) -> Result<(), VectimeError> {
        sqlx::query(&self.builder.drop_table_query())
            .execute(self.pool().await?)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Approximate record count; feeds index-sizing heuristics.
    pub async fn approx_count(&self) -> Result<u64, VectimeError> {
        let count: i64 = sqlx::query_scalar(&self.builder.approx_count_query())
            .fetch_one(self.pool().await?)
            .await
            .map_err(db_err)?;
        Ok(count.max(0) as u64)
    }

    /// Create an embedding index of the given kind.
    pub async fn create_embedding_index(&self, index: &Index) -> Result<(), VectimeError> {
        let num_records = self.approx_count().await?;
        let sql = self
            .builder
            .create_embedding_index_query(index, &|| num_records)?;
        info!(%sql, "creating embedding index");
        sqlx::query(&sql)
            .execute(self.pool().await?)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Drop the embedding index (idempotent).
    pub async fn drop_embedding_index(&self) -> Result<(), VectimeError> {
        sqlx::query(&self.builder.drop_embedding_index_query())
            .execute(self.pool().await?)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Close the pool, if one was opened.
    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
        }
    }

    fn decode_row(&self, row: &PgRow) -> Result<SearchResult, VectimeError> {
        let id = match self.builder.id_kind() {
            IdKind::Uuid => RecordId::Uuid(row.try_get::<uuid::Uuid, _>("id").map_err(db_err)?),
            IdKind::Text => RecordId::Text(row.try_get::<String, _>("id").map_err(db_err)?),
        };
        let metadata: Option<Value> = row.try_get("metadata").map_err(db_err)?;
        let contents: Option<String> = row.try_get("contents").map_err(db_err)?;
        let embedding: Option<Vector> = row.try_get("embedding").map_err(db_err)?;
        let distance: f64 = row.try_get("distance").map_err(db_err)?;
        Ok(SearchResult {
            id,
            metadata: metadata.unwrap_or(Value::Null),
            contents: contents.unwrap_or_default(),
            embedding: embedding.map(|v| v.to_vec()).unwrap_or_default(),
            distance,
        })
    }
}

/// Bind a compiled parameter list in order. Appending strictly preserves
/// the `$n` positions the compiler emitted.
fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [QueryParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            QueryParam::Text(value) => query.bind(value),
            QueryParam::Int(value) => query.bind(*value),
            QueryParam::Float(value) => query.bind(*value),
            QueryParam::Timestamp(value) => query.bind(*value),
            QueryParam::Jsonb(value) => query.bind(value),
            QueryParam::JsonbArray(values) => query.bind(values),
            QueryParam::Embedding(values) => query.bind(Vector::from(values.clone())),
            QueryParam::UuidArray(values) => query.bind(values),
            QueryParam::TextArray(values) => query.bind(values),
        };
    }
    query
}
