use std::path::PathBuf;

use crate::cli::{IngestArgs, OcrMode};

use super::chunking::split_text_with_overlap;
use super::pdf_text::{collect_ocr_candidates, non_whitespace_char_count};
use super::run::render_ingest_command;

#[test]
fn short_text_becomes_a_single_chunk() {
    let chunks = split_text_with_overlap("alpha beta gamma", 800, 100);
    assert_eq!(chunks, vec!["alpha beta gamma".to_string()]);
}

#[test]
fn whitespace_only_text_produces_no_chunks() {
    assert!(split_text_with_overlap("", 800, 100).is_empty());
    assert!(split_text_with_overlap("  \n\t  ", 800, 100).is_empty());
}

#[test]
fn chunking_normalizes_internal_whitespace() {
    let chunks = split_text_with_overlap("alpha\n\nbeta\tgamma", 800, 100);
    assert_eq!(chunks, vec!["alpha beta gamma".to_string()]);
}

#[test]
fn chunks_repeat_trailing_words_as_overlap() {
    let words: Vec<String> = (1..=20).map(|index| format!("w{index:02}")).collect();
    let text = words.join(" ");

    let chunks = split_text_with_overlap(&text, 19, 7);

    assert_eq!(
        chunks,
        vec![
            "w01 w02 w03 w04 w05".to_string(),
            "w04 w05 w06 w07 w08".to_string(),
            "w07 w08 w09 w10 w11".to_string(),
            "w10 w11 w12 w13 w14".to_string(),
            "w13 w14 w15 w16 w17".to_string(),
            "w16 w17 w18 w19 w20".to_string(),
        ]
    );
}

#[test]
fn zero_overlap_disables_word_repetition() {
    let words: Vec<String> = (1..=6).map(|index| format!("w{index:02}")).collect();
    let text = words.join(" ");

    let chunks = split_text_with_overlap(&text, 19, 0);

    assert_eq!(
        chunks,
        vec!["w01 w02 w03 w04 w05".to_string(), "w06".to_string()]
    );
}

#[test]
fn oversized_word_lands_in_its_own_chunk() {
    let chunks = split_text_with_overlap("short supercalifragilistic tail", 10, 3);
    assert_eq!(
        chunks,
        vec![
            "short".to_string(),
            "supercalifragilistic".to_string(),
            "tail".to_string(),
        ]
    );
}

#[test]
fn chunk_lengths_stay_within_the_requested_budget() {
    let text = vec!["word"; 50].join(" ");
    let chunks = split_text_with_overlap(&text, 40, 10);

    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(chunk.chars().count() <= 40, "chunk too long: {chunk:?}");
    }
}

#[test]
fn non_whitespace_count_ignores_spacing() {
    assert_eq!(non_whitespace_char_count("a b\n c\t"), 3);
    assert_eq!(non_whitespace_char_count(""), 0);
    assert_eq!(non_whitespace_char_count("   \n\t"), 0);
}

#[test]
fn ocr_candidates_depend_on_mode_and_threshold() {
    let pages = vec!["x".repeat(200), "tiny".to_string(), String::new()];

    assert!(collect_ocr_candidates(&pages, OcrMode::Off, 120).is_empty());
    assert_eq!(
        collect_ocr_candidates(&pages, OcrMode::Force, 120),
        vec![1, 2, 3]
    );
    assert_eq!(
        collect_ocr_candidates(&pages, OcrMode::Auto, 120),
        vec![2, 3]
    );
}

#[test]
fn render_ingest_command_includes_ocr_flags_when_enabled() {
    let args = IngestArgs {
        cache_root: PathBuf::from(".cache/pricebook"),
        docs_dir: PathBuf::from("docs"),
        inventory_manifest_path: None,
        ingest_manifest_path: None,
        db_path: None,
        refresh_inventory: false,
        chunk_chars: 800,
        chunk_overlap_chars: 100,
        max_pages_per_doc: Some(5),
        ocr_mode: OcrMode::Auto,
        ocr_lang: "eng".to_string(),
        ocr_min_text_chars: 200,
    };

    let command = render_ingest_command(&args);
    assert!(command.contains("--chunk-chars 800"));
    assert!(command.contains("--chunk-overlap-chars 100"));
    assert!(command.contains("--max-pages-per-doc 5"));
    assert!(command.contains("--ocr-mode auto"));
    assert!(command.contains("--ocr-lang eng"));
    assert!(command.contains("--ocr-min-text-chars 200"));
}

#[test]
fn render_ingest_command_omits_ocr_flags_when_disabled() {
    let args = IngestArgs {
        cache_root: PathBuf::from(".cache/pricebook"),
        docs_dir: PathBuf::from("docs"),
        inventory_manifest_path: None,
        ingest_manifest_path: None,
        db_path: None,
        refresh_inventory: true,
        chunk_chars: 400,
        chunk_overlap_chars: 50,
        max_pages_per_doc: None,
        ocr_mode: OcrMode::Off,
        ocr_lang: "eng".to_string(),
        ocr_min_text_chars: 120,
    };

    let command = render_ingest_command(&args);
    assert!(command.starts_with("pricebook ingest"));
    assert!(command.contains("--refresh-inventory"));
    assert!(!command.contains("--ocr-mode"));
    assert!(!command.contains("--max-pages-per-doc"));
}
