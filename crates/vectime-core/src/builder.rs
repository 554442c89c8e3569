//! The query compiler: turns structured search/upsert/delete/DDL requests
//! into parameterized SQL.
//!
//! A [`QueryBuilder`] is constructed once per logical table binding and is
//! read-only afterwards; every compile method is a pure function of the
//! configuration and its call-time inputs. Values always travel as `$n`
//! parameters; identifiers are quoted with [`quote_ident`] before
//! interpolation.

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};

use crate::error::VectimeError;
use crate::index::Index;
use crate::params::QueryParam;
use crate::predicates::Predicates;
use crate::quoting::quote_ident;
use crate::record::RecordId;
use crate::time_range::{parse_datetime, UuidTimeRange};

/// Reserved filter key: inferred inclusive start of a time range.
pub const START_DATE_FILTER_KEY: &str = "__start_date";
/// Reserved filter key: inferred exclusive end of a time range.
pub const END_DATE_FILTER_KEY: &str = "__end_date";

// ---------------------------------------------------------------------------
// DistanceType / IdKind
// ---------------------------------------------------------------------------

/// Distance metric used for similarity ordering and index creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceType {
    Cosine,
    Euclidean,
}

impl DistanceType {
    /// Resolve a metric token. Accepts `cosine`/`<=>` and
    /// `euclidean`/`l2`/`<->`; anything else is a configuration error.
    pub fn parse_token(token: &str) -> Result<Self, VectimeError> {
        match token {
            "cosine" | "<=>" => Ok(DistanceType::Cosine),
            "euclidean" | "l2" | "<->" => Ok(DistanceType::Euclidean),
            other => Err(VectimeError::Config(format!(
                "unrecognized distance type {other}"
            ))),
        }
    }

    /// The engine's distance operator token.
    pub fn operator(self) -> &'static str {
        match self {
            DistanceType::Cosine => "<=>",
            DistanceType::Euclidean => "<->",
        }
    }

    /// The operator class used when creating pgvector indexes.
    pub(crate) fn index_method(self) -> &'static str {
        match self {
            DistanceType::Cosine => "vector_cosine_ops",
            DistanceType::Euclidean => "vector_l2_ops",
        }
    }
}

/// Kind of the primary key column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    /// Time-ordered version-1 UUID keys; required for time partitioning.
    Uuid,
    /// Opaque text keys.
    Text,
}

impl IdKind {
    pub(crate) fn sql_type(self) -> &'static str {
        match self {
            IdKind::Uuid => "uuid",
            IdKind::Text => "text",
        }
    }
}

// ---------------------------------------------------------------------------
// TableConfig
// ---------------------------------------------------------------------------

/// Configuration of one logical table binding.
#[derive(Debug, Clone)]
pub struct TableConfig {
    pub table_name: String,
    pub schema_name: Option<String>,
    pub num_dimensions: u32,
    pub distance_type: DistanceType,
    pub id_kind: IdKind,
    pub time_partition_interval: Option<Duration>,
    pub infer_filters: bool,
}

impl TableConfig {
    /// A configuration with cosine distance, UUID keys, filter inference
    /// enabled, and no schema or time partitioning.
    pub fn new(table_name: impl Into<String>, num_dimensions: u32) -> Self {
        Self {
            table_name: table_name.into(),
            schema_name: None,
            num_dimensions,
            distance_type: DistanceType::Cosine,
            id_kind: IdKind::Uuid,
            time_partition_interval: None,
            infer_filters: true,
        }
    }

    /// Qualify the table with a schema (defaults to the database's search
    /// path).
    pub fn with_schema(mut self, schema_name: impl Into<String>) -> Self {
        self.schema_name = Some(schema_name.into());
        self
    }

    pub fn with_distance_type(mut self, distance_type: DistanceType) -> Self {
        self.distance_type = distance_type;
        self
    }

    pub fn with_id_kind(mut self, id_kind: IdKind) -> Self {
        self.id_kind = id_kind;
        self
    }

    /// Partition the table by the timestamp embedded in its UUID keys.
    /// Only valid with [`IdKind::Uuid`].
    pub fn with_time_partition_interval(mut self, interval: Duration) -> Self {
        self.time_partition_interval = Some(interval);
        self
    }

    /// Enable or disable `__start_date`/`__end_date` filter-key inference
    /// (enabled by default).
    pub fn with_infer_filters(mut self, infer_filters: bool) -> Self {
        self.infer_filters = infer_filters;
        self
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// A metadata containment filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Match records whose metadata contains every key-value pair of the
    /// document.
    Document(Map<String, Value>),
    /// Match records whose metadata contains any one of the documents.
    AnyOf(Vec<Map<String, Value>>),
}

impl Filter {
    /// Build from a JSON value: an object becomes [`Filter::Document`], an
    /// array of objects becomes [`Filter::AnyOf`].
    pub fn from_value(value: Value) -> Result<Self, VectimeError> {
        match value {
            Value::Object(map) => Ok(Filter::Document(map)),
            Value::Array(items) => {
                let maps = items
                    .into_iter()
                    .map(|item| match item {
                        Value::Object(map) => Ok(map),
                        other => Err(VectimeError::MalformedInput(format!(
                            "filter list entries must be JSON objects, got {other}"
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Filter::AnyOf(maps))
            }
            other => Err(VectimeError::MalformedInput(format!(
                "filter must be a JSON object or a list of objects, got {other}"
            ))),
        }
    }
}

impl From<Map<String, Value>> for Filter {
    fn from(map: Map<String, Value>) -> Self {
        Filter::Document(map)
    }
}

// ---------------------------------------------------------------------------
// QueryBuilder
// ---------------------------------------------------------------------------

/// Compiles every statement the execution backends run.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    config: TableConfig,
}

impl QueryBuilder {
    /// Validate the configuration and build the compiler.
    pub fn new(config: TableConfig) -> Result<Self, VectimeError> {
        if config.table_name.is_empty() {
            return Err(VectimeError::Config("table_name must not be empty".to_string()));
        }
        if config.num_dimensions == 0 {
            return Err(VectimeError::Config(
                "num_dimensions must be greater than zero".to_string(),
            ));
        }
        if config.time_partition_interval.is_some() && config.id_kind != IdKind::Uuid {
            return Err(VectimeError::Config(
                "time partitioning is only supported for uuid keys".to_string(),
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn id_kind(&self) -> IdKind {
        self.config.id_kind
    }

    fn quoted_table_name(&self) -> String {
        match &self.config.schema_name {
            Some(schema) => format!(
                "{}.{}",
                quote_ident(schema),
                quote_ident(&self.config.table_name)
            ),
            None => quote_ident(&self.config.table_name),
        }
    }

    fn quoted_embedding_index_name(&self) -> String {
        quote_ident(&format!("{}_embedding_idx", self.config.table_name))
    }

    fn schema_qualified_embedding_index_name(&self) -> String {
        match &self.config.schema_name {
            Some(schema) => format!(
                "{}.{}",
                quote_ident(schema),
                self.quoted_embedding_index_name()
            ),
            None => self.quoted_embedding_index_name(),
        }
    }

    /// Probe for the existence of any row.
    pub fn row_exists_query(&self) -> String {
        format!("SELECT 1 FROM {} LIMIT 1", self.quoted_table_name())
    }

    /// Insert-if-absent upsert. On key conflict the new row is silently
    /// dropped; existing rows are never updated.
    pub fn upsert_query(&self) -> String {
        format!(
            "INSERT INTO {} (id, metadata, contents, embedding) \
             VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING",
            self.quoted_table_name()
        )
    }

    /// Count the table's records; feeds index-sizing heuristics.
    pub fn approx_count_query(&self) -> String {
        format!("SELECT COUNT(*) as cnt FROM {}", self.quoted_table_name())
    }

    /// Pool-sizing heuristic: the engine's `max_connections` minus current
    /// activity, with 4 connections held in reserve, floored at 1.
    pub fn default_max_db_connections_query(&self) -> String {
        "SELECT greatest(1, ((SELECT setting::int FROM pg_settings \
         WHERE name='max_connections')-(SELECT count(*) FROM pg_stat_activity) - 4)::int)"
            .to_string()
    }

    /// The table/extension/index creation bundle. Idempotent throughout;
    /// re-running setup on an initialized table is a no-op.
    pub fn create_query(&self) -> String {
        let table = self.quoted_table_name();
        let meta_index = quote_ident(&format!("{}_meta_idx", self.config.table_name));

        let hypertable_sql = match self.config.time_partition_interval {
            None => String::new(),
            Some(interval) => format!(
                r#"
CREATE EXTENSION IF NOT EXISTS timescaledb;

CREATE OR REPLACE FUNCTION public.uuid_timestamp(uuid UUID) RETURNS TIMESTAMPTZ AS $$
DECLARE
bytes bytea;
BEGIN
bytes := uuid_send(uuid);
if (get_byte(bytes, 6) >> 4)::int2 != 1 then
    RAISE EXCEPTION 'UUID version is not 1';
end if;
RETURN to_timestamp(
            (
                (
                (get_byte(bytes, 0)::bigint << 24) |
                (get_byte(bytes, 1)::bigint << 16) |
                (get_byte(bytes, 2)::bigint <<  8) |
                (get_byte(bytes, 3)::bigint <<  0)
                ) + (
                ((get_byte(bytes, 4)::bigint << 8 |
                get_byte(bytes, 5)::bigint)) << 32
                ) + (
                (((get_byte(bytes, 6)::bigint & 15) << 8 | get_byte(bytes, 7)::bigint) & 4095) << 48
                ) - 122192928000000000
            ) / 10000 / 1000::double precision
        );
END
$$ LANGUAGE plpgsql
IMMUTABLE PARALLEL SAFE
RETURNS NULL ON NULL INPUT;

SELECT create_hypertable('{table}',
    'id',
    if_not_exists=> true,
    time_partitioning_func=>'public.uuid_timestamp',
    chunk_time_interval => '{seconds} seconds'::interval);
"#,
                seconds = interval.num_seconds(),
            ),
        };

        format!(
            r#"
CREATE EXTENSION IF NOT EXISTS vector;
CREATE EXTENSION IF NOT EXISTS vectorscale;

CREATE TABLE IF NOT EXISTS {table} (
    id {id_type} PRIMARY KEY,
    metadata JSONB,
    contents TEXT,
    embedding VECTOR({dimensions})
);

CREATE INDEX IF NOT EXISTS {meta_index} ON {table}
USING GIN(metadata jsonb_path_ops);

{hypertable_sql}
"#,
            id_type = self.config.id_kind.sql_type(),
            dimensions = self.config.num_dimensions,
        )
    }

    pub fn drop_table_query(&self) -> String {
        format!("DROP TABLE IF EXISTS {};", self.quoted_table_name())
    }

    pub fn delete_all_query(&self) -> String {
        format!("TRUNCATE {};", self.quoted_table_name())
    }

    /// Delete by key list. Keys must match the table's id kind; UUID keys on
    /// a text-keyed table are sent in their canonical text form.
    pub fn delete_by_ids_query(
        &self,
        ids: &[RecordId],
    ) -> Result<(String, Vec<QueryParam>), VectimeError> {
        let param = match self.config.id_kind {
            IdKind::Uuid => {
                let uuids = ids
                    .iter()
                    .map(|id| match id {
                        RecordId::Uuid(uuid) => Ok(*uuid),
                        RecordId::Text(text) => Err(VectimeError::MalformedInput(format!(
                            "table keys are UUIDs but got text id {text}"
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                QueryParam::UuidArray(uuids)
            }
            IdKind::Text => QueryParam::TextArray(
                ids.iter()
                    .map(|id| match id {
                        RecordId::Text(text) => text.clone(),
                        RecordId::Uuid(uuid) => uuid.to_string(),
                    })
                    .collect(),
            ),
        };
        let query = format!(
            "DELETE FROM {} WHERE id = ANY($1::{}[]);",
            self.quoted_table_name(),
            self.config.id_kind.sql_type()
        );
        Ok((query, vec![param]))
    }

    /// Delete every record matching a metadata filter.
    pub fn delete_by_metadata_query(
        &self,
        filter: &Filter,
    ) -> Result<(String, Vec<QueryParam>), VectimeError> {
        let mut params = Vec::new();
        let where_clause = Self::filter_clause(&mut params, filter)?;
        let query = format!(
            "DELETE FROM {} WHERE {};",
            self.quoted_table_name(),
            where_clause
        );
        Ok((query, params))
    }

    /// Compile the CREATE INDEX statement for `index` on the embedding
    /// column. `num_records_callback` supplies the table's record count for
    /// sizing heuristics; it is injected so compilation stays pure.
    pub fn create_embedding_index_query(
        &self,
        index: &Index,
        num_records_callback: &dyn Fn() -> u64,
    ) -> Result<String, VectimeError> {
        index.create_index_query(
            &self.quoted_table_name(),
            &quote_ident("embedding"),
            &self.quoted_embedding_index_name(),
            self.config.distance_type,
            num_records_callback,
        )
    }

    pub fn drop_embedding_index_query(&self) -> String {
        format!(
            "DROP INDEX IF EXISTS {};",
            self.schema_qualified_embedding_index_name()
        )
    }

    fn filter_clause(
        params: &mut Vec<QueryParam>,
        filter: &Filter,
    ) -> Result<String, VectimeError> {
        match filter {
            Filter::Document(map) => {
                params.push(QueryParam::Jsonb(Value::Object(map.clone())));
                Ok(format!("metadata @> ${}", params.len()))
            }
            Filter::AnyOf(maps) => {
                params.push(QueryParam::JsonbArray(
                    maps.iter().cloned().map(Value::Object).collect(),
                ));
                Ok(format!("metadata @> ANY(${}::jsonb[])", params.len()))
            }
        }
    }

    fn parse_reserved_key(value: Option<Value>) -> Result<Option<DateTime<Utc>>, VectimeError> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) => parse_datetime(&text).map(Some),
            Some(other) => Err(VectimeError::MalformedInput(format!(
                "reserved time filter keys expect ISO-8601 strings, got {other}"
            ))),
        }
    }

    /// When inference is enabled and no explicit range was given, lift the
    /// reserved `__start_date`/`__end_date` keys out of a single-document
    /// filter into a [`UuidTimeRange`]. List-shaped filters are never
    /// inferred from.
    fn extract_inferred_time_range(
        filter: &mut Filter,
    ) -> Result<Option<UuidTimeRange>, VectimeError> {
        let Filter::Document(map) = filter else {
            return Ok(None);
        };
        if !map.contains_key(START_DATE_FILTER_KEY) && !map.contains_key(END_DATE_FILTER_KEY) {
            return Ok(None);
        }
        let start = Self::parse_reserved_key(map.remove(START_DATE_FILTER_KEY))?;
        let end = Self::parse_reserved_key(map.remove(END_DATE_FILTER_KEY))?;
        Ok(Some(UuidTimeRange::new(start, end)?))
    }

    /// Compile a similarity search.
    ///
    /// With an embedding the result is ordered by the configured distance
    /// operator; without one a constant sentinel distance is selected and no
    /// ordering is applied (filter-only retrieval). Filter, predicates, and
    /// time range each compile against the same growing parameter list and
    /// join under AND; with none present the WHERE clause is `TRUE`.
    pub fn search_query(
        &self,
        query_embedding: Option<&[f32]>,
        limit: usize,
        filter: Option<Filter>,
        predicates: Option<&Predicates>,
        time_range: Option<UuidTimeRange>,
    ) -> Result<(String, Vec<QueryParam>), VectimeError> {
        let mut params: Vec<QueryParam> = Vec::new();

        let (distance, order_by) = match query_embedding {
            Some(embedding) => {
                params.push(QueryParam::Embedding(embedding.to_vec()));
                let distance = format!(
                    "embedding {} ${}",
                    self.config.distance_type.operator(),
                    params.len()
                );
                let order_by = format!("ORDER BY {distance} ASC");
                (distance, Some(order_by))
            }
            None => ("-1.0::float8".to_string(), None),
        };

        let mut filter = filter;
        let mut time_range = time_range;
        if self.config.infer_filters && time_range.is_none() {
            if let Some(filter) = filter.as_mut() {
                time_range = Self::extract_inferred_time_range(filter)?;
            }
        }

        let mut where_clauses = Vec::new();
        if let Some(filter) = &filter {
            where_clauses.push(Self::filter_clause(&mut params, filter)?);
        }
        if let Some(predicates) = predicates {
            let fragment = predicates.compile(&mut params)?;
            if !fragment.is_empty() {
                where_clauses.push(fragment);
            }
        }
        if let Some(time_range) = &time_range {
            let fragment = time_range.compile(&mut params);
            if !fragment.is_empty() {
                where_clauses.push(fragment);
            }
        }
        let where_clause = if where_clauses.is_empty() {
            "TRUE".to_string()
        } else {
            where_clauses.join(" AND ")
        };

        let mut query = format!(
            "SELECT id, metadata, contents, embedding, {distance} as distance \
             FROM {} WHERE {where_clause}",
            self.quoted_table_name()
        );
        if let Some(order_by) = order_by {
            query.push(' ');
            query.push_str(&order_by);
        }
        query.push_str(&format!(" LIMIT {limit}"));

        Ok((query, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicates::Clause;
    use chrono::TimeZone;
    use serde_json::json;

    fn builder(config: TableConfig) -> QueryBuilder {
        QueryBuilder::new(config).unwrap()
    }

    fn doc_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn rejects_time_partitioning_with_text_keys() {
        let config = TableConfig::new("docs", 3)
            .with_id_kind(IdKind::Text)
            .with_time_partition_interval(Duration::days(7));
        let err = QueryBuilder::new(config).unwrap_err();
        assert!(matches!(err, VectimeError::Config(_)));
    }

    #[test]
    fn rejects_zero_dimensions_and_empty_table_name() {
        assert!(QueryBuilder::new(TableConfig::new("docs", 0)).is_err());
        assert!(QueryBuilder::new(TableConfig::new("", 3)).is_err());
    }

    #[test]
    fn distance_tokens_parse_to_operators() {
        assert_eq!(DistanceType::parse_token("cosine").unwrap().operator(), "<=>");
        assert_eq!(DistanceType::parse_token("<=>").unwrap().operator(), "<=>");
        assert_eq!(DistanceType::parse_token("euclidean").unwrap().operator(), "<->");
        assert_eq!(DistanceType::parse_token("l2").unwrap().operator(), "<->");
        assert_eq!(DistanceType::parse_token("<->").unwrap().operator(), "<->");
        let err = DistanceType::parse_token("manhattan").unwrap_err();
        assert!(matches!(err, VectimeError::Config(_)));
    }

    #[test]
    fn upsert_is_insert_if_absent() {
        let builder = builder(TableConfig::new("docs", 3));
        assert_eq!(
            builder.upsert_query(),
            "INSERT INTO \"docs\" (id, metadata, contents, embedding) \
             VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING"
        );
    }

    #[test]
    fn schema_qualifies_table_references() {
        let builder = builder(TableConfig::new("docs", 3).with_schema("corp"));
        assert_eq!(
            builder.row_exists_query(),
            "SELECT 1 FROM \"corp\".\"docs\" LIMIT 1"
        );
        assert_eq!(
            builder.drop_embedding_index_query(),
            "DROP INDEX IF EXISTS \"corp\".\"docs_embedding_idx\";"
        );
    }

    #[test]
    fn search_without_arguments_is_unconditional() {
        let builder = builder(TableConfig::new("docs", 3));
        let (query, params) = builder.search_query(None, 10, None, None, None).unwrap();
        assert_eq!(
            query,
            "SELECT id, metadata, contents, embedding, -1.0::float8 as distance \
             FROM \"docs\" WHERE TRUE LIMIT 10"
        );
        assert!(params.is_empty());
    }

    #[test]
    fn search_with_embedding_orders_by_distance() {
        let builder = builder(TableConfig::new("docs", 3));
        let (query, params) = builder
            .search_query(Some(&[1.0, 2.0, 3.0]), 5, None, None, None)
            .unwrap();
        assert_eq!(
            query,
            "SELECT id, metadata, contents, embedding, embedding <=> $1 as distance \
             FROM \"docs\" WHERE TRUE ORDER BY embedding <=> $1 ASC LIMIT 5"
        );
        assert_eq!(params, vec![QueryParam::Embedding(vec![1.0, 2.0, 3.0])]);
    }

    #[test]
    fn euclidean_metric_changes_the_operator() {
        let builder = builder(
            TableConfig::new("docs", 3).with_distance_type(DistanceType::Euclidean),
        );
        let (query, _) = builder
            .search_query(Some(&[0.0; 3]), 10, None, None, None)
            .unwrap();
        assert!(query.contains("embedding <-> $1"));
    }

    #[test]
    fn search_joins_filter_predicates_and_time_range_with_and() {
        let builder = builder(TableConfig::new("docs", 3));
        let filter = Filter::Document(doc_map(json!({"key": "val"})));
        let predicates = Predicates::all([Clause::with_op("n", "<", 10).unwrap()]);
        let range = UuidTimeRange::new(
            Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()),
            None,
        )
        .unwrap();
        let (query, params) = builder
            .search_query(
                Some(&[0.5, 0.5, 0.5]),
                7,
                Some(filter),
                Some(&predicates),
                Some(range),
            )
            .unwrap();
        assert!(query.contains(
            "WHERE metadata @> $2 AND (metadata->>'n')::int < $3 \
             AND uuid_timestamp(id) >= $4"
        ));
        assert_eq!(params.len(), 4);
        assert!(matches!(params[0], QueryParam::Embedding(_)));
        assert!(matches!(params[1], QueryParam::Jsonb(_)));
        assert!(matches!(params[2], QueryParam::Int(10)));
        assert!(matches!(params[3], QueryParam::Timestamp(_)));
    }

    #[test]
    fn list_filter_compiles_to_any_of_containment() {
        let builder = builder(TableConfig::new("docs", 3));
        let filter = Filter::AnyOf(vec![
            doc_map(json!({"k": "a"})),
            doc_map(json!({"k": "b"})),
        ]);
        let (query, params) = builder
            .search_query(None, 10, Some(filter), None, None)
            .unwrap();
        assert!(query.contains("WHERE metadata @> ANY($1::jsonb[])"));
        assert_eq!(
            params,
            vec![QueryParam::JsonbArray(vec![
                json!({"k": "a"}),
                json!({"k": "b"}),
            ])]
        );
    }

    #[test]
    fn reserved_filter_keys_are_lifted_into_a_time_range() {
        let builder = builder(TableConfig::new("docs", 3));
        let filter = Filter::Document(doc_map(json!({
            "__start_date": "2018-08-10T15:30:00+00:00",
            "key": "val",
        })));
        let (query, params) = builder
            .search_query(None, 10, Some(filter), None, None)
            .unwrap();
        // The containment document keeps only the ordinary key.
        assert_eq!(params[0], QueryParam::Jsonb(json!({"key": "val"})));
        assert!(query.contains("metadata @> $1 AND uuid_timestamp(id) >= $2"));
        assert_eq!(params.len(), 2);
        match &params[1] {
            QueryParam::Timestamp(ts) => {
                assert_eq!(*ts, Utc.with_ymd_and_hms(2018, 8, 10, 15, 30, 0).unwrap());
            }
            other => panic!("expected timestamp param, got {other:?}"),
        }
    }

    #[test]
    fn inference_skips_list_filters_and_explicit_ranges() {
        let builder = builder(TableConfig::new("docs", 3));

        let list_filter = Filter::AnyOf(vec![doc_map(json!({"__start_date": "2020-01-01"}))]);
        let (query, _) = builder
            .search_query(None, 10, Some(list_filter), None, None)
            .unwrap();
        assert!(!query.contains("uuid_timestamp"));

        let filter = Filter::Document(doc_map(json!({"__start_date": "2020-01-01T00:00:00+00:00"})));
        let explicit = UuidTimeRange::new(
            Some(Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()),
            None,
        )
        .unwrap();
        let (_, params) = builder
            .search_query(None, 10, Some(filter), None, Some(explicit))
            .unwrap();
        // The reserved key stays in the containment document and the
        // explicit range wins.
        assert_eq!(
            params[0],
            QueryParam::Jsonb(json!({"__start_date": "2020-01-01T00:00:00+00:00"}))
        );
        match &params[1] {
            QueryParam::Timestamp(ts) => {
                assert_eq!(*ts, Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap());
            }
            other => panic!("expected timestamp param, got {other:?}"),
        }
    }

    #[test]
    fn inference_respects_the_config_flag() {
        let builder = builder(TableConfig::new("docs", 3).with_infer_filters(false));
        let filter = Filter::Document(doc_map(json!({"__end_date": "2020-01-01T00:00:00+00:00"})));
        let (query, params) = builder
            .search_query(None, 10, Some(filter), None, None)
            .unwrap();
        assert!(!query.contains("uuid_timestamp"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn delete_by_ids_binds_keys_per_id_kind() {
        let builder = builder(TableConfig::new("docs", 3));
        let id = uuid::Uuid::new_v4();
        let (query, params) = builder
            .delete_by_ids_query(&[RecordId::Uuid(id)])
            .unwrap();
        assert_eq!(query, "DELETE FROM \"docs\" WHERE id = ANY($1::uuid[]);");
        assert_eq!(params, vec![QueryParam::UuidArray(vec![id])]);

        let err = builder
            .delete_by_ids_query(&[RecordId::Text("k1".to_string())])
            .unwrap_err();
        assert!(matches!(err, VectimeError::MalformedInput(_)));

        let text_builder = builder_with_text_ids();
        let (query, params) = text_builder
            .delete_by_ids_query(&[RecordId::Text("k1".to_string())])
            .unwrap();
        assert_eq!(query, "DELETE FROM \"docs\" WHERE id = ANY($1::text[]);");
        assert_eq!(params, vec![QueryParam::TextArray(vec!["k1".to_string()])]);
    }

    fn builder_with_text_ids() -> QueryBuilder {
        builder(TableConfig::new("docs", 3).with_id_kind(IdKind::Text))
    }

    #[test]
    fn delete_by_metadata_reuses_the_filter_compiler() {
        let builder = builder(TableConfig::new("docs", 3));
        let filter = Filter::Document(doc_map(json!({"key": "val"})));
        let (query, params) = builder.delete_by_metadata_query(&filter).unwrap();
        assert_eq!(query, "DELETE FROM \"docs\" WHERE metadata @> $1;");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn create_query_is_idempotent_ddl() {
        let builder = builder(TableConfig::new("docs", 768));
        let sql = builder.create_query();
        assert!(sql.contains("CREATE EXTENSION IF NOT EXISTS vector;"));
        assert!(sql.contains("CREATE EXTENSION IF NOT EXISTS vectorscale;"));
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS \"docs\""));
        assert!(sql.contains("id uuid PRIMARY KEY"));
        assert!(sql.contains("embedding VECTOR(768)"));
        assert!(sql.contains("CREATE INDEX IF NOT EXISTS \"docs_meta_idx\""));
        assert!(sql.contains("USING GIN(metadata jsonb_path_ops)"));
        assert!(!sql.contains("create_hypertable"));
    }

    #[test]
    fn create_query_with_partitioning_installs_hypertable_machinery() {
        let builder = builder(
            TableConfig::new("docs", 768).with_time_partition_interval(Duration::days(7)),
        );
        let sql = builder.create_query();
        assert!(sql.contains("CREATE EXTENSION IF NOT EXISTS timescaledb;"));
        assert!(sql.contains("CREATE OR REPLACE FUNCTION public.uuid_timestamp"));
        assert!(sql.contains("SELECT create_hypertable('\"docs\"',"));
        assert!(sql.contains("if_not_exists=> true"));
        assert!(sql.contains("chunk_time_interval => '604800 seconds'::interval"));
    }

    #[test]
    fn text_keyed_tables_declare_text_primary_keys() {
        let sql = builder_with_text_ids().create_query();
        assert!(sql.contains("id text PRIMARY KEY"));
    }

    #[test]
    fn drop_and_truncate_statements() {
        let builder = builder(TableConfig::new("docs", 3));
        assert_eq!(builder.drop_table_query(), "DROP TABLE IF EXISTS \"docs\";");
        assert_eq!(builder.delete_all_query(), "TRUNCATE \"docs\";");
    }

    #[test]
    fn connection_heuristic_queries_engine_settings() {
        let builder = builder(TableConfig::new("docs", 3));
        let sql = builder.default_max_db_connections_query();
        assert!(sql.contains("pg_settings"));
        assert!(sql.contains("pg_stat_activity"));
    }
}
