use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::ProductRecord;
use crate::cli::ExportArgs;
use crate::semantic::{DEFAULT_VECTORIZER_ID, blob_to_embedding};
use crate::util::write_json_pretty;

#[derive(Debug, Serialize)]
struct ChunkWithMetadata {
    text: String,
    source: String,
}

/// Bundle consumed by external tooling. Chunk texts and embeddings are
/// parallel arrays in document order.
#[derive(Debug, Serialize)]
struct ExportPayload {
    chunks: Vec<String>,
    chunks_with_metadata: Vec<ChunkWithMetadata>,
    embeddings: Vec<Vec<f32>>,
    vocabulary: Vec<String>,
    idf_values: Vec<f32>,
    pdf_files: Vec<String>,
    products: Vec<ProductRecord>,
}

pub fn run(args: ExportArgs) -> Result<()> {
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

    let pdf_files = load_pdf_files(&connection)?;
    let chunks_with_metadata = load_chunks(&connection)?;
    let chunks: Vec<String> = chunks_with_metadata
        .iter()
        .map(|chunk| chunk.text.clone())
        .collect();
    let products = load_products(&connection)?;

    let vectorizer_id = args
        .vectorizer_id
        .clone()
        .unwrap_or_else(|| DEFAULT_VECTORIZER_ID.to_string());
    let (vocabulary, idf_values, embeddings) =
        match load_vectorizer_parts(&connection, &vectorizer_id)? {
            Some((vocabulary, idf_values)) => {
                let embeddings = load_embeddings(&connection, &vectorizer_id)?;
                if embeddings.len() != chunks.len() {
                    warn!(
                        vectorizer_id = %vectorizer_id,
                        vectors = embeddings.len(),
                        chunks = chunks.len(),
                        "stored vector count does not match chunk count; run `pricebook embed` to refresh"
                    );
                }
                (vocabulary, idf_values, embeddings)
            }
            None => {
                warn!(
                    vectorizer_id = %vectorizer_id,
                    "no fitted vectorizer; exporting without embeddings"
                );
                (Vec::new(), Vec::new(), Vec::new())
            }
        };

    let payload = ExportPayload {
        chunks,
        chunks_with_metadata,
        embeddings,
        vocabulary,
        idf_values,
        pdf_files,
        products,
    };

    let output_path = args
        .output_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join("embeddings_data.json"));
    write_json_pretty(&output_path, &payload)?;

    info!(
        path = %output_path.display(),
        chunks = payload.chunks.len(),
        embeddings = payload.embeddings.len(),
        products = payload.products.len(),
        pdf_files = payload.pdf_files.len(),
        "wrote export bundle"
    );

    Ok(())
}

fn load_pdf_files(connection: &Connection) -> Result<Vec<String>> {
    let mut statement =
        connection.prepare("SELECT filename FROM docs ORDER BY order_index ASC")?;
    let mut rows = statement.query([])?;
    let mut out = Vec::new();

    while let Some(row) = rows.next()? {
        out.push(row.get(0)?);
    }

    Ok(out)
}

fn load_chunks(connection: &Connection) -> Result<Vec<ChunkWithMetadata>> {
    let mut statement = connection.prepare(
        "
        SELECT chunks.text, docs.filename
        FROM chunks
        JOIN docs ON docs.doc_id = chunks.doc_id
        ORDER BY docs.order_index ASC, chunks.chunk_index ASC
        ",
    )?;

    let mut rows = statement.query([])?;
    let mut out = Vec::new();

    while let Some(row) = rows.next()? {
        out.push(ChunkWithMetadata {
            text: row.get(0)?,
            source: row.get(1)?,
        });
    }

    Ok(out)
}

fn load_products(connection: &Connection) -> Result<Vec<ProductRecord>> {
    let mut statement = connection.prepare(
        "
        SELECT name, description, price, part_number, source
        FROM products
        ORDER BY order_index ASC
        ",
    )?;

    let mut rows = statement.query([])?;
    let mut out = Vec::new();

    while let Some(row) = rows.next()? {
        out.push(ProductRecord {
            name: row.get(0)?,
            description: row.get(1)?,
            price: row.get(2)?,
            part_number: row.get(3)?,
            source: row.get(4)?,
        });
    }

    Ok(out)
}

fn load_vectorizer_parts(
    connection: &Connection,
    vectorizer_id: &str,
) -> Result<Option<(Vec<String>, Vec<f32>)>> {
    let row = connection
        .query_row(
            "SELECT vocabulary_json, idf_json FROM vectorizers WHERE vectorizer_id = ?1",
            [vectorizer_id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;

    let Some((vocabulary_json, idf_json)) = row else {
        return Ok(None);
    };

    let vocabulary: Vec<String> = serde_json::from_str(&vocabulary_json)
        .with_context(|| format!("failed to parse stored vocabulary for {vectorizer_id}"))?;
    let idf_values: Vec<f32> = serde_json::from_str(&idf_json)
        .with_context(|| format!("failed to parse stored idf weights for {vectorizer_id}"))?;

    Ok(Some((vocabulary, idf_values)))
}

fn load_embeddings(connection: &Connection, vectorizer_id: &str) -> Result<Vec<Vec<f32>>> {
    let mut statement = connection.prepare(
        "
        SELECT chunk_vectors.chunk_id, chunk_vectors.embedding
        FROM chunk_vectors
        JOIN chunks ON chunks.chunk_id = chunk_vectors.chunk_id
        JOIN docs ON docs.doc_id = chunks.doc_id
        WHERE chunk_vectors.vectorizer_id = ?1
        ORDER BY docs.order_index ASC, chunks.chunk_index ASC
        ",
    )?;

    let mut rows = statement.query([vectorizer_id])?;
    let mut out = Vec::new();

    while let Some(row) = rows.next()? {
        let chunk_id: String = row.get(0)?;
        let blob: Vec<u8> = row.get(1)?;
        let embedding = blob_to_embedding(&blob)
            .with_context(|| format!("failed to decode stored embedding for {chunk_id}"))?;
        out.push(embedding);
    }

    Ok(out)
}
