//! Similarity-index variants and session-scoped query tuning.
//!
//! Each index kind carries its own option set and validates it when the
//! CREATE INDEX statement is compiled, not at construction. The record-count
//! input for sizing heuristics is an injected callback so the compiler stays
//! pure; the execution backend supplies the count.

use std::collections::BTreeMap;

use crate::builder::DistanceType;
use crate::error::VectimeError;

// ---------------------------------------------------------------------------
// Index variants
// ---------------------------------------------------------------------------

/// pgvector's ivfflat index. `num_lists` falls back to a sizing heuristic
/// over the table's record count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IvfflatIndex {
    pub num_records: Option<u64>,
    pub num_lists: Option<u64>,
}

impl IvfflatIndex {
    fn lists(&self, num_records_callback: &dyn Fn() -> u64) -> u64 {
        if let Some(lists) = self.num_lists {
            return lists;
        }
        let num_records = self.num_records.unwrap_or_else(num_records_callback);
        let mut num_lists = num_records / 1000;
        if num_lists < 10 {
            num_lists = 10;
        }
        if num_records > 1_000_000 {
            num_lists = (num_records as f64).sqrt() as u64;
        }
        num_lists
    }
}

/// pgvector's hnsw index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HnswIndex {
    pub m: Option<u32>,
    pub ef_construction: Option<u32>,
}

/// pgvectorscale's disk-oriented graph index. Cosine distance only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiskAnnIndex {
    pub search_list_size: Option<u32>,
    pub num_neighbors: Option<u32>,
    pub max_alpha: Option<f64>,
    pub storage_layout: Option<String>,
    pub num_dimensions: Option<u32>,
    pub num_bits_per_dimension: Option<u32>,
}

/// An embedding index to create on the table.
#[derive(Debug, Clone, PartialEq)]
pub enum Index {
    Ivfflat(IvfflatIndex),
    Hnsw(HnswIndex),
    DiskAnn(DiskAnnIndex),
}

impl From<IvfflatIndex> for Index {
    fn from(index: IvfflatIndex) -> Self {
        Index::Ivfflat(index)
    }
}

impl From<HnswIndex> for Index {
    fn from(index: HnswIndex) -> Self {
        Index::Hnsw(index)
    }
}

impl From<DiskAnnIndex> for Index {
    fn from(index: DiskAnnIndex) -> Self {
        Index::DiskAnn(index)
    }
}

impl Index {
    /// Compile the CREATE INDEX statement for this variant.
    ///
    /// All name arguments must already be quoted by the caller.
    pub fn create_index_query(
        &self,
        table_name_quoted: &str,
        column_name_quoted: &str,
        index_name_quoted: &str,
        distance_type: DistanceType,
        num_records_callback: &dyn Fn() -> u64,
    ) -> Result<String, VectimeError> {
        match self {
            Index::Ivfflat(index) => {
                let method = distance_type.index_method();
                let lists = index.lists(num_records_callback);
                Ok(format!(
                    "CREATE INDEX IF NOT EXISTS {index_name_quoted} ON {table_name_quoted} \
                     USING ivfflat ({column_name_quoted} {method}) WITH (lists = {lists});"
                ))
            }
            Index::Hnsw(index) => {
                let method = distance_type.index_method();
                let mut options = Vec::new();
                if let Some(m) = index.m {
                    options.push(format!("m = {m}"));
                }
                if let Some(ef) = index.ef_construction {
                    options.push(format!("ef_construction = {ef}"));
                }
                Ok(format!(
                    "CREATE INDEX IF NOT EXISTS {index_name_quoted} ON {table_name_quoted} \
                     USING hnsw ({column_name_quoted} {method}){};",
                    with_clause(&options)
                ))
            }
            Index::DiskAnn(index) => {
                if distance_type != DistanceType::Cosine {
                    return Err(VectimeError::UnsupportedCombination(format!(
                        "the diskann index only supports cosine distance, \
                         but distance_type was {}",
                        distance_type.operator()
                    )));
                }
                let mut options = Vec::new();
                if let Some(v) = index.search_list_size {
                    options.push(format!("search_list_size = {v}"));
                }
                if let Some(v) = index.num_neighbors {
                    options.push(format!("num_neighbors = {v}"));
                }
                if let Some(v) = index.max_alpha {
                    options.push(format!("max_alpha = {v}"));
                }
                if let Some(v) = &index.storage_layout {
                    options.push(format!("storage_layout = {v}"));
                }
                if let Some(v) = index.num_dimensions {
                    options.push(format!("num_dimensions = {v}"));
                }
                if let Some(v) = index.num_bits_per_dimension {
                    options.push(format!("num_bits_per_dimension = {v}"));
                }
                Ok(format!(
                    "CREATE INDEX IF NOT EXISTS {index_name_quoted} ON {table_name_quoted} \
                     USING diskann ({column_name_quoted}){};",
                    with_clause(&options)
                ))
            }
        }
    }
}

fn with_clause(options: &[String]) -> String {
    if options.is_empty() {
        String::new()
    } else {
        format!(" WITH ({})", options.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Session-scoped query parameters
// ---------------------------------------------------------------------------

/// Engine settings applied for the duration of one search.
///
/// Compiles to one `SET LOCAL` statement per entry. The statements must run
/// immediately before, and in the same session (transaction) as, the search
/// they tune; the execution backends honor this.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    params: BTreeMap<String, String>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tuning knobs for diskann searches.
    pub fn diskann(search_list_size: Option<u32>, rescore: Option<u32>) -> Self {
        let mut params = Self::new();
        if let Some(v) = search_list_size {
            params = params.set("diskann.query_search_list_size", v);
        }
        if let Some(v) = rescore {
            params = params.set("diskann.query_rescore", v);
        }
        params
    }

    /// Probe count for ivfflat searches.
    pub fn ivfflat(probes: u32) -> Self {
        Self::new().set("ivfflat.probes", probes)
    }

    /// Search-breadth setting for hnsw searches.
    pub fn hnsw(ef_search: u32) -> Self {
        Self::new().set("hnsw.ef_search", ef_search)
    }

    /// Set an arbitrary engine setting.
    pub fn set(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// One `SET LOCAL` statement per entry, in key order.
    pub fn statements(&self) -> Vec<String> {
        self.params
            .iter()
            .map(|(key, value)| format!("SET LOCAL {key} = {value}"))
            .collect()
    }
}
