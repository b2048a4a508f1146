use std::time::Instant;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rusqlite::{Connection, OpenFlags, params};
use serde::Serialize;
use tracing::info;

use crate::cli::EmbedArgs;
use crate::commands::ingest::{DB_SCHEMA_VERSION, configure_connection, ensure_vector_schema};
use crate::semantic::{TfIdfVectorizer, embedding_to_blob};
use crate::util::{
    ensure_directory, now_utc_string, sha256_text, utc_compact_string, write_json_pretty,
};

#[derive(Debug, Serialize)]
struct EmbedRunManifest {
    manifest_version: u32,
    run_id: String,
    generated_at: String,
    db_schema_version: String,
    vectorizer_id: String,
    max_features: usize,
    dimensions: usize,
    fitted_chunk_count: usize,
    vectors_written: usize,
    duration_ms: u128,
    status: String,
}

pub fn run(args: EmbedArgs) -> Result<()> {
    let started = Instant::now();
    let started_at = now_utc_string();
    let run_id = format!("embed-{}", utc_compact_string(Utc::now()));

    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join("pricebook_index.sqlite"));
    let manifest_dir = args.cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;

    if !db_path.exists() {
        bail!(
            "no index database at {}; run `pricebook ingest` first",
            db_path.display()
        );
    }

    let mut connection = Connection::open_with_flags(
        &db_path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open database for embedding: {}", db_path.display()))?;
    configure_connection(&connection)?;
    ensure_vector_schema(&connection)?;

    let chunk_rows = load_chunk_rows(&connection)?;
    if chunk_rows.is_empty() {
        bail!(
            "no chunks found in {}; run `pricebook ingest` first",
            db_path.display()
        );
    }

    let texts: Vec<String> = chunk_rows.iter().map(|row| row.text.clone()).collect();
    let vectorizer = TfIdfVectorizer::fit(&texts, args.max_features)?;

    info!(
        vectorizer_id = %args.vectorizer_id,
        chunks = chunk_rows.len(),
        dimensions = vectorizer.dimension(),
        "fitted vectorizer vocabulary"
    );

    upsert_vectorizer(
        &connection,
        &args.vectorizer_id,
        args.max_features,
        &vectorizer,
        chunk_rows.len(),
    )?;
    let vectors_written =
        replace_chunk_vectors(&mut connection, &args.vectorizer_id, &vectorizer, &chunk_rows)?;

    let manifest = EmbedRunManifest {
        manifest_version: 1,
        run_id,
        generated_at: started_at,
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        vectorizer_id: args.vectorizer_id.clone(),
        max_features: args.max_features,
        dimensions: vectorizer.dimension(),
        fitted_chunk_count: chunk_rows.len(),
        vectors_written,
        duration_ms: started.elapsed().as_millis(),
        status: "completed".to_string(),
    };

    let manifest_path = manifest_dir.join(format!(
        "embed_run_{}.json",
        utc_compact_string(Utc::now())
    ));
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        path = %manifest_path.display(),
        vectorizer_id = %args.vectorizer_id,
        vectors = vectors_written,
        "embedding refresh completed"
    );

    Ok(())
}

struct EmbedChunkRow {
    chunk_id: String,
    text: String,
}

fn load_chunk_rows(connection: &Connection) -> Result<Vec<EmbedChunkRow>> {
    let mut statement = connection.prepare(
        "
        SELECT chunks.chunk_id, chunks.text
        FROM chunks
        JOIN docs ON docs.doc_id = chunks.doc_id
        ORDER BY docs.order_index ASC, chunks.chunk_index ASC
        ",
    )?;

    let mut rows = statement.query([])?;
    let mut out = Vec::<EmbedChunkRow>::new();

    while let Some(row) = rows.next()? {
        out.push(EmbedChunkRow {
            chunk_id: row.get(0)?,
            text: row.get(1)?,
        });
    }

    Ok(out)
}

fn upsert_vectorizer(
    connection: &Connection,
    vectorizer_id: &str,
    max_features: usize,
    vectorizer: &TfIdfVectorizer,
    fitted_chunk_count: usize,
) -> Result<()> {
    let vocabulary_json = serde_json::to_string(vectorizer.vocabulary())?;
    let idf_json = serde_json::to_string(vectorizer.idf())?;

    connection.execute(
        "
        INSERT INTO vectorizers(vectorizer_id, max_features, dimensions, vocabulary_json, idf_json, fitted_chunk_count, created_at)
        VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(vectorizer_id) DO UPDATE SET
          max_features=excluded.max_features,
          dimensions=excluded.dimensions,
          vocabulary_json=excluded.vocabulary_json,
          idf_json=excluded.idf_json,
          fitted_chunk_count=excluded.fitted_chunk_count,
          created_at=excluded.created_at
        ",
        params![
            vectorizer_id,
            max_features as i64,
            vectorizer.dimension() as i64,
            vocabulary_json,
            idf_json,
            fitted_chunk_count as i64,
            now_utc_string(),
        ],
    )?;

    Ok(())
}

/// Full refit: stale vectors for this vectorizer are dropped and rewritten so
/// stored embeddings always match the fitted vocabulary.
fn replace_chunk_vectors(
    connection: &mut Connection,
    vectorizer_id: &str,
    vectorizer: &TfIdfVectorizer,
    chunk_rows: &[EmbedChunkRow],
) -> Result<usize> {
    let tx = connection.transaction()?;
    tx.execute(
        "DELETE FROM chunk_vectors WHERE vectorizer_id = ?1",
        [vectorizer_id],
    )?;

    let mut written = 0usize;
    {
        let mut statement = tx.prepare(
            "
            INSERT INTO chunk_vectors(chunk_id, vectorizer_id, embedding, embedding_dim, text_hash, generated_at)
            VALUES(?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )?;

        for row in chunk_rows {
            let embedding = vectorizer.transform(&row.text);
            statement.execute(params![
                row.chunk_id,
                vectorizer_id,
                embedding_to_blob(&embedding),
                embedding.len() as i64,
                sha256_text(&row.text),
                now_utc_string(),
            ])?;
            written += 1;
        }
    }

    tx.commit()?;
    Ok(written)
}
