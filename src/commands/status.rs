use std::fs;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::ingest::count_rows;
use crate::model::PdfInventoryManifest;

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.cache_root.join("manifests");
    let inventory_path = manifest_dir.join("pdf_inventory.json");
    let db_path = args.cache_root.join("pricebook_index.sqlite");

    info!(cache_root = %args.cache_root.display(), "status requested");

    if inventory_path.exists() {
        let raw = fs::read(&inventory_path)
            .with_context(|| format!("failed to read {}", inventory_path.display()))?;
        let inventory: PdfInventoryManifest = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", inventory_path.display()))?;

        info!(
            generated_at = %inventory.generated_at,
            pdf_count = inventory.pdf_count,
            "loaded inventory manifest"
        );
    } else {
        warn!(path = %inventory_path.display(), "inventory manifest missing");
    }

    if db_path.exists() {
        let connection = Connection::open_with_flags(
            &db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("failed to open {}", db_path.display()))?;

        // unwrap_or(0) keeps status usable against a database whose schema
        // predates some of these tables.
        let docs_count = count_rows(&connection, "SELECT COUNT(*) FROM docs").unwrap_or(0);
        let chunks_count = count_rows(&connection, "SELECT COUNT(*) FROM chunks").unwrap_or(0);
        let products_count = count_rows(&connection, "SELECT COUNT(*) FROM products").unwrap_or(0);
        let vectorizers_count =
            count_rows(&connection, "SELECT COUNT(*) FROM vectorizers").unwrap_or(0);
        let vectors_count =
            count_rows(&connection, "SELECT COUNT(*) FROM chunk_vectors").unwrap_or(0);

        info!(
            path = %db_path.display(),
            docs = docs_count,
            chunks = chunks_count,
            products = products_count,
            vectorizers = vectorizers_count,
            vectors = vectors_count,
            "database status"
        );
    } else {
        warn!(path = %db_path.display(), "database file missing");
    }

    Ok(())
}
