use std::time::Instant;

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use tracing::info;

use crate::catalog::{CatalogSnapshot, ProductRecord};
use crate::cli::QueryArgs;
use crate::resolve::{MatchKind, QueryResolver, format_response};
use crate::semantic::DEFAULT_VECTORIZER_ID;

use super::output;
use super::semantic_search;

const PRODUCT_INTENT_MARKERS: [&str; 3] = ["part number", "price", "cost"];

#[derive(Debug, Serialize)]
pub(super) struct StructuredReport {
    pub query: String,
    pub method: String,
    pub match_kind: MatchKind,
    pub score: usize,
    pub answer: String,
    pub product_name: String,
    pub product: ProductRecord,
    pub duration_ms: f64,
}

#[derive(Debug, Serialize)]
pub(super) struct SemanticReport {
    pub query: String,
    pub method: String,
    pub vectorizer_id: String,
    pub top_k: usize,
    pub returned: usize,
    pub results: Vec<semantic_search::SemanticResult>,
    pub duration_ms: f64,
}

pub fn run(args: QueryArgs) -> Result<()> {
    let started = Instant::now();
    let query_text = args.query.trim();
    if query_text.is_empty() {
        bail!("query must not be empty");
    }

    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join("pricebook_index.sqlite"));
    if !db_path.exists() {
        bail!(
            "no index database at {}; run `pricebook ingest` first",
            db_path.display()
        );
    }

    let connection = Connection::open_with_flags(
        &db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open database read-only: {}", db_path.display()))?;

    let top_k = args.top_k.max(1);
    let structured_enabled = !args.no_structured && is_product_intent(query_text);

    if structured_enabled {
        let catalog = load_catalog(&connection)?;
        let resolver = QueryResolver::new()?;

        if let Some(found) = resolver.resolve(&catalog, query_text) {
            if let Some(response) = format_response(Some(&found), query_text) {
                let report = StructuredReport {
                    query: query_text.to_string(),
                    method: "structured_extraction".to_string(),
                    match_kind: found.match_kind,
                    score: found.score,
                    answer: response.answer,
                    product_name: response.product_name,
                    product: response.full_details,
                    duration_ms: started.elapsed().as_secs_f64() * 1000.0,
                };

                info!(
                    query = %query_text,
                    method = %report.method,
                    match_kind = %report.match_kind.as_str(),
                    score = report.score,
                    duration_ms = report.duration_ms,
                    "query completed"
                );

                if args.json {
                    output::write_structured_json(&report)?;
                } else {
                    output::write_structured_text(&report)?;
                }
                return Ok(());
            }
        }

        info!(query = %query_text, "no structured product match, falling back to semantic search");
    }

    let vectorizer_id = args
        .vectorizer_id
        .clone()
        .unwrap_or_else(|| DEFAULT_VECTORIZER_ID.to_string());
    let vectorizer = semantic_search::load_vectorizer(&connection, &vectorizer_id)?;
    let results =
        semantic_search::search(&connection, &vectorizer, &vectorizer_id, query_text, top_k)?;

    let report = SemanticReport {
        query: query_text.to_string(),
        method: "semantic_search".to_string(),
        vectorizer_id,
        top_k,
        returned: results.len(),
        results,
        duration_ms: started.elapsed().as_secs_f64() * 1000.0,
    };

    info!(
        query = %query_text,
        method = %report.method,
        vectorizer_id = %report.vectorizer_id,
        returned = report.returned,
        duration_ms = report.duration_ms,
        "query completed"
    );

    if args.json {
        output::write_semantic_json(&report)?;
    } else {
        output::write_semantic_text(&report)?;
    }

    Ok(())
}

/// Queries that name a part number, price, or cost try the structured product
/// catalog before the semantic index.
pub(super) fn is_product_intent(query: &str) -> bool {
    let lowered = query.to_lowercase();
    PRODUCT_INTENT_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

fn load_catalog(connection: &Connection) -> Result<CatalogSnapshot> {
    let mut statement = connection.prepare(
        "
        SELECT name, description, price, part_number, source
        FROM products
        ORDER BY order_index ASC
        ",
    )?;

    let mut rows = statement.query([])?;
    let mut records = Vec::new();

    while let Some(row) = rows.next()? {
        records.push(ProductRecord {
            name: row.get(0)?,
            description: row.get(1)?,
            price: row.get(2)?,
            part_number: row.get(3)?,
            source: row.get(4)?,
        });
    }

    Ok(CatalogSnapshot::from_records(records))
}
