use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::catalog::{RecordScanner, SourceDocument, build_catalog};
use crate::cli::{IngestArgs, OcrMode};
use crate::commands::inventory;
use crate::model::{IngestCounts, IngestPaths, IngestRunManifest, PdfInventoryManifest};
use crate::util::{ensure_directory, now_utc_string, utc_compact_string, write_json_pretty};

use super::chunking::split_text_with_overlap;
use super::pdf_text::{collect_tool_versions, command_available, extract_document_text};
use super::store::{
    DB_SCHEMA_VERSION, clear_index_rows, configure_connection, count_rows, ensure_schema,
    insert_chunks, insert_doc, insert_products,
};

pub fn run(args: IngestArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let cache_root = args.cache_root.clone();
    let manifest_dir = cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;

    let inventory_manifest_path = args
        .inventory_manifest_path
        .clone()
        .unwrap_or_else(|| manifest_dir.join("pdf_inventory.json"));
    let ingest_manifest_path = args.ingest_manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!(
            "ingest_run_{}.json",
            utc_compact_string(started_ts)
        ))
    });
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| cache_root.join("pricebook_index.sqlite"));

    info!(cache_root = %cache_root.display(), run_id = %run_id, "starting ingest");

    let inventory = load_or_refresh_inventory(
        &args.docs_dir,
        &inventory_manifest_path,
        args.refresh_inventory,
    )?;

    let tool_versions = collect_tool_versions()?;
    let mut warnings = Vec::new();
    let ocr_mode = resolve_ocr_mode(args.ocr_mode, &mut warnings)?;

    let mut connection = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    configure_connection(&connection)?;
    ensure_schema(&connection)?;

    let mut counts = IngestCounts {
        pdf_count: inventory.pdf_count,
        ..IngestCounts::default()
    };
    let mut documents = Vec::new();

    let tx = connection.transaction()?;
    clear_index_rows(&tx)?;

    for (order_index, pdf) in inventory.pdfs.iter().enumerate() {
        let pdf_path = args.docs_dir.join(&pdf.filename);

        let extracted = match extract_document_text(
            &pdf_path,
            args.max_pages_per_doc,
            ocr_mode,
            &args.ocr_lang,
            args.ocr_min_text_chars,
        ) {
            Ok(extracted) => extracted,
            Err(error) if ocr_mode != OcrMode::Force => {
                warn!(pdf = %pdf.filename, error = %error, "skipping PDF after failed extraction");
                warnings.push(format!(
                    "skipped {} after failed extraction: {error:#}",
                    pdf.filename
                ));
                counts.skipped_pdf_count += 1;
                continue;
            }
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("failed to extract text from {}", pdf.filename));
            }
        };

        counts.pages_extracted += extracted.page_count;
        counts.text_layer_page_count += extracted.text_layer_page_count;
        counts.ocr_page_count += extracted.ocr_page_count;
        counts.empty_page_count += extracted.empty_page_count;
        warnings.extend(extracted.warnings);

        insert_doc(
            &tx,
            &pdf.filename,
            &pdf.filename,
            &pdf.sha256,
            extracted.page_count,
            order_index,
        )?;

        let chunk_texts =
            split_text_with_overlap(&extracted.text, args.chunk_chars, args.chunk_overlap_chars);
        counts.chunks_inserted += insert_chunks(&tx, &pdf.filename, &chunk_texts)?;

        info!(
            pdf = %pdf.filename,
            pages = extracted.page_count,
            chunks = chunk_texts.len(),
            "ingested PDF"
        );

        documents.push(SourceDocument {
            source: pdf.filename.clone(),
            text: extracted.text,
        });
        counts.processed_pdf_count += 1;
    }

    let scanner = RecordScanner::pattern()?;
    let (catalog, scan_stats) = build_catalog(&scanner, &documents);
    counts.product_matches_scanned = scan_stats.matches_scanned;
    counts.products_extracted = scan_stats.records_extracted;
    counts.product_matches_discarded = scan_stats.matches_discarded;
    insert_products(&tx, catalog.records())?;

    info!(
        matches = scan_stats.matches_scanned,
        extracted = scan_stats.records_extracted,
        discarded = scan_stats.matches_discarded,
        "extracted product records"
    );

    tx.commit()?;

    counts.docs_total = count_rows(&connection, "SELECT COUNT(*) FROM docs")?;
    counts.chunks_total = count_rows(&connection, "SELECT COUNT(*) FROM chunks")?;
    counts.products_total = count_rows(&connection, "SELECT COUNT(*) FROM products")?;
    let updated_at = now_utc_string();

    let manifest = IngestRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        status: "completed".to_string(),
        started_at,
        updated_at,
        command: render_ingest_command(&args),
        tool_versions,
        paths: IngestPaths {
            cache_root: cache_root.display().to_string(),
            docs_dir: args.docs_dir.display().to_string(),
            manifest_dir: manifest_dir.display().to_string(),
            inventory_manifest_path: inventory_manifest_path.display().to_string(),
            db_path: db_path.display().to_string(),
        },
        counts: counts.clone(),
        source_hashes: inventory.pdfs,
        warnings,
    };

    write_json_pretty(&ingest_manifest_path, &manifest)?;

    info!(path = %ingest_manifest_path.display(), "wrote ingest run manifest");
    info!(
        docs = counts.docs_total,
        chunks = counts.chunks_total,
        products = counts.products_total,
        "ingest completed"
    );

    Ok(())
}

/// Downgrades auto OCR to plain text extraction when the OCR toolchain is
/// missing. Force mode treats missing tools as a hard error instead.
fn resolve_ocr_mode(requested: OcrMode, warnings: &mut Vec<String>) -> Result<OcrMode> {
    if requested == OcrMode::Off {
        return Ok(requested);
    }

    let missing: Vec<&str> = ["pdftoppm", "tesseract"]
        .into_iter()
        .filter(|program| !command_available(program))
        .collect();

    if missing.is_empty() {
        return Ok(requested);
    }

    if requested == OcrMode::Force {
        bail!(
            "OCR mode 'force' requires {} on PATH",
            missing.join(" and ")
        );
    }

    warn!(missing = %missing.join(", "), "OCR tools unavailable, continuing with text layer only");
    warnings.push(format!(
        "OCR downgraded to off: missing {}",
        missing.join(", ")
    ));

    Ok(OcrMode::Off)
}

fn load_or_refresh_inventory(
    docs_dir: &Path,
    inventory_manifest_path: &Path,
    refresh_inventory: bool,
) -> Result<PdfInventoryManifest> {
    if refresh_inventory || !inventory_manifest_path.exists() {
        let manifest = inventory::build_manifest(docs_dir)?;
        write_json_pretty(inventory_manifest_path, &manifest)?;
        info!(
            path = %inventory_manifest_path.display(),
            pdf_count = manifest.pdf_count,
            "refreshed inventory manifest"
        );
        return Ok(manifest);
    }

    let raw = fs::read(inventory_manifest_path)
        .with_context(|| format!("failed to read {}", inventory_manifest_path.display()))?;
    let manifest: PdfInventoryManifest = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", inventory_manifest_path.display()))?;

    info!(
        path = %inventory_manifest_path.display(),
        pdf_count = manifest.pdf_count,
        "loaded existing inventory manifest"
    );

    Ok(manifest)
}

pub(super) fn render_ingest_command(args: &IngestArgs) -> String {
    let mut command = vec![
        "pricebook".to_string(),
        "ingest".to_string(),
        "--cache-root".to_string(),
        args.cache_root.display().to_string(),
        "--docs-dir".to_string(),
        args.docs_dir.display().to_string(),
    ];

    if let Some(path) = &args.inventory_manifest_path {
        command.push("--inventory-manifest-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.ingest_manifest_path {
        command.push("--ingest-manifest-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.db_path {
        command.push("--db-path".to_string());
        command.push(path.display().to_string());
    }
    if args.refresh_inventory {
        command.push("--refresh-inventory".to_string());
    }
    command.push("--chunk-chars".to_string());
    command.push(args.chunk_chars.to_string());
    command.push("--chunk-overlap-chars".to_string());
    command.push(args.chunk_overlap_chars.to_string());
    if let Some(max_pages) = args.max_pages_per_doc {
        command.push("--max-pages-per-doc".to_string());
        command.push(max_pages.to_string());
    }
    if args.ocr_mode != OcrMode::Off {
        command.push("--ocr-mode".to_string());
        command.push(args.ocr_mode.as_str().to_string());
        command.push("--ocr-lang".to_string());
        command.push(args.ocr_lang.clone());
        command.push("--ocr-min-text-chars".to_string());
        command.push(args.ocr_min_text_chars.to_string());
    }

    command.join(" ")
}
