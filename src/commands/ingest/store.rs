use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use crate::catalog::ProductRecord;
use crate::util::now_utc_string;

pub(crate) const DB_SCHEMA_VERSION: &str = "0.1.0";

pub(crate) fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

pub(crate) fn ensure_schema(connection: &Connection) -> Result<()> {
    connection.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS docs (
          doc_id TEXT PRIMARY KEY,
          filename TEXT NOT NULL,
          sha256 TEXT NOT NULL,
          page_count INTEGER NOT NULL,
          order_index INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chunks (
          chunk_id TEXT PRIMARY KEY,
          doc_id TEXT NOT NULL,
          chunk_index INTEGER NOT NULL,
          text TEXT NOT NULL,
          char_count INTEGER NOT NULL,
          FOREIGN KEY(doc_id) REFERENCES docs(doc_id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS products (
          order_index INTEGER PRIMARY KEY,
          name TEXT NOT NULL,
          description TEXT NOT NULL,
          price TEXT NOT NULL,
          part_number TEXT NOT NULL,
          source TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chunks_doc_order ON chunks(doc_id, chunk_index);
        CREATE INDEX IF NOT EXISTS idx_products_part_number ON products(part_number);
        ",
    )?;

    ensure_vector_schema(connection)?;

    let now = now_utc_string();
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now],
    )?;

    Ok(())
}

pub(crate) fn ensure_vector_schema(connection: &Connection) -> Result<()> {
    connection.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS vectorizers (
          vectorizer_id TEXT PRIMARY KEY,
          max_features INTEGER NOT NULL,
          dimensions INTEGER NOT NULL,
          vocabulary_json TEXT NOT NULL,
          idf_json TEXT NOT NULL,
          fitted_chunk_count INTEGER NOT NULL,
          created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chunk_vectors (
          chunk_id TEXT NOT NULL,
          vectorizer_id TEXT NOT NULL,
          embedding BLOB NOT NULL,
          embedding_dim INTEGER NOT NULL,
          text_hash TEXT NOT NULL,
          generated_at TEXT NOT NULL,
          PRIMARY KEY (chunk_id, vectorizer_id),
          FOREIGN KEY (chunk_id) REFERENCES chunks(chunk_id) ON DELETE CASCADE,
          FOREIGN KEY (vectorizer_id) REFERENCES vectorizers(vectorizer_id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_chunk_vectors_vectorizer ON chunk_vectors(vectorizer_id);
        CREATE INDEX IF NOT EXISTS idx_chunk_vectors_hash ON chunk_vectors(vectorizer_id, text_hash);
        ",
    )?;

    Ok(())
}

/// Removes every derived row so a fresh ingest run fully replaces the index.
/// Fitted vectorizers stay behind so `embed` output survives until refit.
pub(crate) fn clear_index_rows(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            DELETE FROM chunk_vectors;
            DELETE FROM chunks;
            DELETE FROM products;
            DELETE FROM docs;
            ",
        )
        .context("failed to clear previous index rows")?;
    Ok(())
}

pub(crate) fn insert_doc(
    connection: &Connection,
    doc_id: &str,
    filename: &str,
    sha256: &str,
    page_count: usize,
    order_index: usize,
) -> Result<()> {
    connection
        .execute(
            "INSERT INTO docs(doc_id, filename, sha256, page_count, order_index)
             VALUES(?1, ?2, ?3, ?4, ?5)",
            params![doc_id, filename, sha256, page_count as i64, order_index as i64],
        )
        .with_context(|| format!("failed to insert doc row for {filename}"))?;
    Ok(())
}

pub(crate) fn insert_chunks(
    connection: &Connection,
    doc_id: &str,
    chunk_texts: &[String],
) -> Result<usize> {
    let mut statement = connection.prepare(
        "INSERT INTO chunks(chunk_id, doc_id, chunk_index, text, char_count)
         VALUES(?1, ?2, ?3, ?4, ?5)",
    )?;

    for (chunk_index, text) in chunk_texts.iter().enumerate() {
        let chunk_id = format!("{doc_id}-chunk-{chunk_index:04}");
        statement
            .execute(params![
                chunk_id,
                doc_id,
                chunk_index as i64,
                text,
                text.chars().count() as i64
            ])
            .with_context(|| format!("failed to insert chunk {chunk_index} for {doc_id}"))?;
    }

    Ok(chunk_texts.len())
}

pub(crate) fn insert_products(connection: &Connection, records: &[ProductRecord]) -> Result<usize> {
    let mut statement = connection.prepare(
        "INSERT INTO products(order_index, name, description, price, part_number, source)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6)",
    )?;

    for (order_index, record) in records.iter().enumerate() {
        statement
            .execute(params![
                order_index as i64,
                record.name,
                record.description,
                record.price,
                record.part_number,
                record.source
            ])
            .with_context(|| {
                format!("failed to insert product row {order_index} from {}", record.source)
            })?;
    }

    Ok(records.len())
}

pub(crate) fn count_rows(connection: &Connection, sql: &str) -> Result<i64> {
    let count = connection.query_row(sql, [], |row| row.get(0))?;
    Ok(count)
}
