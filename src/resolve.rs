use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;

use crate::catalog::{CatalogSnapshot, ProductRecord};
use crate::util::truncate_chars;

const PRODUCT_NAME_FALLBACK_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    PartNumber,
    Lexical,
}

impl MatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PartNumber => "part_number",
            Self::Lexical => "lexical",
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryMatch<'a> {
    pub record: &'a ProductRecord,
    pub score: usize,
    pub match_kind: MatchKind,
}

#[derive(Debug)]
pub struct QueryResolver {
    word_token: Regex,
}

impl QueryResolver {
    pub fn new() -> Result<Self> {
        let word_token = Regex::new(r"\w+").context("failed to compile query token regex")?;
        Ok(Self { word_token })
    }

    /// Part-number containment wins outright and is never scored; lexical
    /// scoring only runs when no part number appears in the query. Ties and
    /// multiple containment hits keep the earliest catalog record.
    pub fn resolve<'a>(&self, catalog: &'a CatalogSnapshot, query: &str) -> Option<QueryMatch<'a>> {
        let query_lower = query.to_lowercase();

        for record in catalog.records() {
            if query_lower.contains(&record.part_number.to_lowercase()) {
                return Some(QueryMatch {
                    record,
                    score: 0,
                    match_kind: MatchKind::PartNumber,
                });
            }
        }

        let tokens = self
            .word_token
            .find_iter(&query_lower)
            .map(|token| token.as_str())
            .collect::<Vec<&str>>();

        let mut best: Option<&ProductRecord> = None;
        let mut best_score = 0usize;

        for record in catalog.records() {
            let searchable = format!("{} {}", record.name, record.description).to_lowercase();
            let score = tokens
                .iter()
                .filter(|token| token.chars().count() > 2 && searchable.contains(**token))
                .count();

            if score > best_score {
                best = Some(record);
                best_score = score;
            }
        }

        best.map(|record| QueryMatch {
            record,
            score: best_score,
            match_kind: MatchKind::Lexical,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductResponse {
    pub answer: String,
    pub product_name: String,
    pub full_details: ProductRecord,
}

pub fn format_response(matched: Option<&QueryMatch<'_>>, query: &str) -> Option<ProductResponse> {
    let record = matched?.record;
    let query_lower = query.to_lowercase();

    let mut parts = Vec::new();
    if query_lower.contains("part number") || query_lower.contains("part") {
        parts.push(format!("Part Number: {}", record.part_number));
    }
    if query_lower.contains("price")
        || query_lower.contains("cost")
        || query_lower.contains("part number")
    {
        parts.push(format!("Price: {}", record.price));
    }
    if parts.is_empty() {
        parts.push(format!("Part Number: {}", record.part_number));
        parts.push(format!("Price: {}", record.price));
    }

    let product_name = if record.name.is_empty() {
        truncate_chars(&record.description, PRODUCT_NAME_FALLBACK_CHARS).to_string()
    } else {
        record.name.clone()
    };

    Some(ProductResponse {
        answer: parts.join(" and "),
        product_name,
        full_details: record.clone(),
    })
}
