//! End-to-end compilation tests: full statements assembled from filters,
//! predicate trees, and time ranges sharing one parameter list.

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use vectime_core::{
    Clause, Filter, Predicates, QueryBuilder, QueryParam, TableConfig, UuidTimeRange,
};

fn doc_filter(value: serde_json::Value) -> Filter {
    Filter::from_value(value).unwrap()
}

#[test]
fn every_fragment_appends_parameters_in_order() {
    let builder = QueryBuilder::new(TableConfig::new("events", 4)).unwrap();

    let filter = doc_filter(json!({"tenant": "acme"}));
    let predicates = Predicates::all([
        Clause::new("kind", "signup"),
        Clause::with_op("attempts", "<", 5).unwrap(),
    ]);
    let range = UuidTimeRange::with_duration(
        Some(Utc.with_ymd_and_hms(2018, 8, 10, 0, 0, 0).unwrap()),
        None,
        Duration::days(7),
    )
    .unwrap();

    let (sql, params) = builder
        .search_query(
            Some(&[0.1, 0.2, 0.3, 0.4]),
            20,
            Some(filter),
            Some(&predicates),
            Some(range),
        )
        .unwrap();

    // One embedding + one filter document + two predicate leaves + two
    // time-range bounds.
    assert_eq!(params.len(), 6);
    assert!(matches!(params[0], QueryParam::Embedding(_)));
    assert!(matches!(params[1], QueryParam::Jsonb(_)));
    assert!(matches!(params[2], QueryParam::Text(_)));
    assert!(matches!(params[3], QueryParam::Int(5)));
    assert!(matches!(params[4], QueryParam::Timestamp(_)));
    assert!(matches!(params[5], QueryParam::Timestamp(_)));

    // References are strictly increasing and contiguous.
    for n in 1..=6 {
        assert!(sql.contains(&format!("${n}")), "missing ${n} in {sql}");
    }
    assert!(!sql.contains("$7"));

    assert!(sql.contains(
        "WHERE metadata @> $2 \
         AND (metadata->>'kind') = $3 AND (metadata->>'attempts')::int < $4 \
         AND uuid_timestamp(id) >= $5 AND uuid_timestamp(id) < $6"
    ));
    assert!(sql.ends_with("ORDER BY embedding <=> $1 ASC LIMIT 20"));
}

#[test]
fn seven_day_window_excludes_the_end_instant() {
    // A record stamped exactly start + 7 days must fall outside the range;
    // one microsecond earlier falls inside.
    let start = Utc.with_ymd_and_hms(2018, 8, 10, 0, 0, 0).unwrap();
    let range = UuidTimeRange::with_duration(Some(start), None, Duration::days(7)).unwrap();
    assert_eq!(range.end(), Some(start + Duration::days(7)));

    let mut params = Vec::new();
    let fragment = range.compile(&mut params);
    assert_eq!(
        fragment,
        "uuid_timestamp(id) >= $1 AND uuid_timestamp(id) < $2"
    );
}

#[test]
fn negated_tree_matches_rows_missing_the_field() {
    // Three-valued NOT: the negation of (key = 'val2' AND key_10 < 100)
    // must compile to an IS DISTINCT FROM wrapper so a row without `key`
    // (NULL conditions) still matches.
    let inner = Predicates::all([
        Clause::new("key", "val2"),
        Clause::with_op("key_10", "<", 100).unwrap(),
    ]);
    let mut params = Vec::new();
    let fragment = inner.negate().compile(&mut params).unwrap();
    assert!(fragment.starts_with("TRUE IS DISTINCT FROM ("));
    assert_eq!(params.len(), 2);
}

#[test]
fn combined_trees_compile_inside_a_search() {
    let builder = QueryBuilder::new(TableConfig::new("docs", 2)).unwrap();
    let a = Predicates::all([Clause::new("team", "core")]);
    let b = Predicates::all([Clause::with_op("stars", ">=", 50).unwrap()]);
    let either = a.or_with(b);

    let (sql, params) = builder
        .search_query(None, 10, None, Some(&either), None)
        .unwrap();
    assert!(sql.contains(
        "WHERE ((metadata->>'team') = $1) OR ((metadata->>'stars')::int >= $2)"
    ));
    assert_eq!(params.len(), 2);
    // Filter-only retrieval: sentinel distance, no ordering.
    assert!(sql.contains("-1.0::float8 as distance"));
    assert!(!sql.contains("ORDER BY"));
}

#[test]
fn empty_predicates_disappear_from_the_statement() {
    let builder = QueryBuilder::new(TableConfig::new("docs", 2)).unwrap();
    let empty = Predicates::all([]);
    let (sql, params) = builder
        .search_query(None, 10, None, Some(&empty), None)
        .unwrap();
    assert!(sql.contains("WHERE TRUE"));
    assert!(params.is_empty());
}
