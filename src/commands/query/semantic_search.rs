use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use crate::semantic::{TfIdfVectorizer, blob_to_embedding, cosine_similarity};

#[derive(Debug, Clone, Serialize)]
pub(super) struct SemanticResult {
    pub rank: usize,
    pub score: f32,
    pub chunk_id: String,
    pub source: String,
    pub text: String,
}

pub(super) struct VectorRow {
    pub chunk_id: String,
    pub source: String,
    pub text: String,
    pub embedding: Vec<f32>,
}

pub(super) fn load_vectorizer(
    connection: &Connection,
    vectorizer_id: &str,
) -> Result<TfIdfVectorizer> {
    let row = connection
        .query_row(
            "SELECT vocabulary_json, idf_json FROM vectorizers WHERE vectorizer_id = ?1",
            [vectorizer_id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;

    let Some((vocabulary_json, idf_json)) = row else {
        bail!("no fitted vectorizer '{vectorizer_id}'; run `pricebook embed` first");
    };

    let vocabulary: Vec<String> = serde_json::from_str(&vocabulary_json)
        .with_context(|| format!("failed to parse stored vocabulary for {vectorizer_id}"))?;
    let idf: Vec<f32> = serde_json::from_str(&idf_json)
        .with_context(|| format!("failed to parse stored idf weights for {vectorizer_id}"))?;

    TfIdfVectorizer::from_parts(vocabulary, idf)
}

pub(super) fn search(
    connection: &Connection,
    vectorizer: &TfIdfVectorizer,
    vectorizer_id: &str,
    query_text: &str,
    top_k: usize,
) -> Result<Vec<SemanticResult>> {
    let rows = load_vector_rows(connection, vectorizer_id)?;
    if rows.is_empty() {
        bail!("no stored vectors for '{vectorizer_id}'; run `pricebook embed` first");
    }

    let query_embedding = vectorizer.transform(query_text);
    Ok(rank_rows(&query_embedding, rows, top_k))
}

fn load_vector_rows(connection: &Connection, vectorizer_id: &str) -> Result<Vec<VectorRow>> {
    let mut statement = connection.prepare(
        "
        SELECT chunk_vectors.chunk_id, docs.filename, chunks.text, chunk_vectors.embedding
        FROM chunk_vectors
        JOIN chunks ON chunks.chunk_id = chunk_vectors.chunk_id
        JOIN docs ON docs.doc_id = chunks.doc_id
        WHERE chunk_vectors.vectorizer_id = ?1
        ORDER BY docs.order_index ASC, chunks.chunk_index ASC
        ",
    )?;

    let mut rows = statement.query([vectorizer_id])?;
    let mut out = Vec::<VectorRow>::new();

    while let Some(row) = rows.next()? {
        let chunk_id: String = row.get(0)?;
        let blob: Vec<u8> = row.get(3)?;
        let embedding = blob_to_embedding(&blob)
            .with_context(|| format!("failed to decode stored embedding for {chunk_id}"))?;

        out.push(VectorRow {
            chunk_id,
            source: row.get(1)?,
            text: row.get(2)?,
            embedding,
        });
    }

    Ok(out)
}

/// Chunk order breaks score ties so repeated queries return a stable ranking.
pub(super) fn rank_rows(
    query_embedding: &[f32],
    rows: Vec<VectorRow>,
    top_k: usize,
) -> Vec<SemanticResult> {
    let mut scored: Vec<(usize, f32, VectorRow)> = rows
        .into_iter()
        .enumerate()
        .map(|(index, row)| {
            let score = cosine_similarity(query_embedding, &row.embedding);
            (index, score, row)
        })
        .collect();

    scored.sort_by(|left, right| right.1.total_cmp(&left.1).then(left.0.cmp(&right.0)));
    scored.truncate(top_k);

    scored
        .into_iter()
        .enumerate()
        .map(|(position, (_, score, row))| SemanticResult {
            rank: position + 1,
            score,
            chunk_id: row.chunk_id,
            source: row.source,
            text: row.text,
        })
        .collect()
}
