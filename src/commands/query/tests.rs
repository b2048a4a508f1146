use super::run::is_product_intent;
use super::semantic_search::{VectorRow, rank_rows};

fn vector_row(chunk_id: &str, embedding: Vec<f32>) -> VectorRow {
    VectorRow {
        chunk_id: chunk_id.to_string(),
        source: "catalog.pdf".to_string(),
        text: format!("text for {chunk_id}"),
        embedding,
    }
}

#[test]
fn price_and_part_number_queries_have_product_intent() {
    assert!(is_product_intent("What is the price of the hydraulic pump?"));
    assert!(is_product_intent("part number for the 66 inch grapple"));
    assert!(is_product_intent("how much does the auger COST"));
}

#[test]
fn descriptive_queries_have_no_product_intent() {
    assert!(!is_product_intent("tell me about excavator attachments"));
    assert!(!is_product_intent("which buckets fit a compact loader"));
}

#[test]
fn ranking_orders_rows_by_similarity() {
    let rows = vec![
        vector_row("doc-chunk-0000", vec![0.0, 1.0]),
        vector_row("doc-chunk-0001", vec![1.0, 0.0]),
        vector_row("doc-chunk-0002", vec![0.6, 0.8]),
    ];

    let results = rank_rows(&[1.0, 0.0], rows, 3);

    let ids: Vec<&str> = results.iter().map(|result| result.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["doc-chunk-0001", "doc-chunk-0002", "doc-chunk-0000"]);
    assert_eq!(results[0].rank, 1);
    assert_eq!(results[1].rank, 2);
    assert_eq!(results[2].rank, 3);
    assert_eq!(results[0].score, 1.0);
}

#[test]
fn equal_scores_keep_chunk_order() {
    let rows = vec![
        vector_row("doc-chunk-0000", vec![1.0, 0.0]),
        vector_row("doc-chunk-0001", vec![1.0, 0.0]),
    ];

    let results = rank_rows(&[1.0, 0.0], rows, 2);

    assert_eq!(results[0].chunk_id, "doc-chunk-0000");
    assert_eq!(results[1].chunk_id, "doc-chunk-0001");
}

#[test]
fn top_k_bounds_the_result_count() {
    let rows = vec![
        vector_row("doc-chunk-0000", vec![0.0, 1.0]),
        vector_row("doc-chunk-0001", vec![1.0, 0.0]),
    ];

    let results = rank_rows(&[1.0, 0.0], rows, 1);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk_id, "doc-chunk-0001");

    let rows = vec![vector_row("doc-chunk-0000", vec![1.0, 0.0])];
    let results = rank_rows(&[1.0, 0.0], rows, 5);
    assert_eq!(results.len(), 1);
}
