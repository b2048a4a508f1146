use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::util::truncate_chars;

const CONTEXT_WINDOW_CHARS: usize = 300;
const NAME_FALLBACK_CHARS: usize = 60;
const MIN_LINE_CHARS: usize = 10;

const HEADER_TOKENS: &[&str] = &["DESCRIPTION", "PRICE", "PART NUMBER", "PICTURE"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    pub description: String,
    pub price: String,
    pub part_number: String,
    pub source: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub matches_scanned: usize,
    pub records_extracted: usize,
    pub matches_discarded: usize,
}

impl ScanStats {
    pub fn absorb(&mut self, other: ScanStats) {
        self.matches_scanned += other.matches_scanned;
        self.records_extracted += other.records_extracted;
        self.matches_discarded += other.matches_discarded;
    }
}

#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub source: String,
    pub text: String,
}

/// Record extraction strategies. Only the pattern scanner exists today; a
/// layout-aware scanner would be a second variant, leaving the resolver
/// untouched.
#[derive(Debug)]
pub enum RecordScanner {
    Pattern(PatternScanner),
}

impl RecordScanner {
    pub fn pattern() -> Result<Self> {
        Ok(Self::Pattern(PatternScanner::new()?))
    }

    pub fn scan(&self, text: &str, source: &str) -> (Vec<ProductRecord>, ScanStats) {
        match self {
            Self::Pattern(scanner) => scanner.scan(text, source),
        }
    }
}

#[derive(Debug)]
pub struct PatternScanner {
    price_part: Regex,
}

impl PatternScanner {
    pub fn new() -> Result<Self> {
        let price_part = Regex::new(r"\$(\d+\.\d+)\s+([A-Z0-9/-]+(?:AM/A|LL/A)?)")
            .context("failed to compile price/part-number regex")?;
        Ok(Self { price_part })
    }

    pub fn scan(&self, text: &str, source: &str) -> (Vec<ProductRecord>, ScanStats) {
        let mut records = Vec::new();
        let mut stats = ScanStats::default();

        for captures in self.price_part.captures_iter(text) {
            let (Some(whole), Some(price), Some(part_number)) =
                (captures.get(0), captures.get(1), captures.get(2))
            else {
                continue;
            };

            stats.matches_scanned += 1;

            let window_start = context_window_start(text, whole.start());
            let context = &text[window_start..whole.start()];

            let lines = context
                .split('\n')
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect::<Vec<&str>>();

            let mut description = None::<&str>;
            let mut name = None::<&str>;

            // Closest-first: the first substantial line is the description;
            // the name search keeps going and may land on the same line.
            for line in lines.iter().rev() {
                if HEADER_TOKENS.iter().any(|token| line.contains(token)) {
                    continue;
                }

                if description.is_none()
                    && line.chars().count() > MIN_LINE_CHARS
                    && !line.starts_with('$')
                {
                    description = Some(line);
                }

                if is_product_name_line(line) {
                    name = Some(line);
                    break;
                }
            }

            let Some(description) = description else {
                stats.matches_discarded += 1;
                continue;
            };

            let name = name
                .map(str::to_string)
                .unwrap_or_else(|| truncate_chars(description, NAME_FALLBACK_CHARS).to_string());

            records.push(ProductRecord {
                name,
                description: description.to_string(),
                price: format!("${}", price.as_str()),
                part_number: part_number.as_str().to_string(),
                source: source.to_string(),
            });
            stats.records_extracted += 1;
        }

        (records, stats)
    }
}

/// Byte index where the up-to-300-character window before `match_start`
/// begins. Counts Unicode scalars, so the slice always lands on a char
/// boundary.
fn context_window_start(text: &str, match_start: usize) -> usize {
    text[..match_start]
        .char_indices()
        .rev()
        .nth(CONTEXT_WINDOW_CHARS - 1)
        .map(|(index, _)| index)
        .unwrap_or(0)
}

fn is_product_name_line(line: &str) -> bool {
    line.chars().count() > MIN_LINE_CHARS
        && line.chars().all(|character| !character.is_lowercase())
        && has_uppercase_run(line, 3)
}

fn has_uppercase_run(line: &str, min_run: usize) -> bool {
    let mut run = 0usize;
    for character in line.chars() {
        if character.is_ascii_uppercase() {
            run += 1;
            if run >= min_run {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

/// Immutable catalog built once per run and passed by reference into the
/// resolver. Insertion order is document order, then in-text appearance
/// order; duplicate part numbers across documents are kept as-is.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    records: Vec<ProductRecord>,
}

impl CatalogSnapshot {
    pub fn from_records(records: Vec<ProductRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ProductRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub fn build_catalog(
    scanner: &RecordScanner,
    documents: &[SourceDocument],
) -> (CatalogSnapshot, ScanStats) {
    let mut records = Vec::new();
    let mut stats = ScanStats::default();

    for document in documents {
        let (mut extracted, document_stats) = scanner.scan(&document.text, &document.source);
        records.append(&mut extracted);
        stats.absorb(document_stats);
    }

    (CatalogSnapshot::from_records(records), stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> RecordScanner {
        RecordScanner::pattern().expect("pattern scanner compiles")
    }

    #[test]
    fn scan_extracts_name_description_price_and_part_number() {
        let text = "intro text\nUSB-C CHARGE CABLE\nCable for charging.\n$19.99 MX0X2AM/A\nmore";

        let (records, stats) = scanner().scan(text, "accessories.pdf");

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "USB-C CHARGE CABLE");
        assert_eq!(records[0].description, "Cable for charging.");
        assert_eq!(records[0].price, "$19.99");
        assert_eq!(records[0].part_number, "MX0X2AM/A");
        assert_eq!(records[0].source, "accessories.pdf");
        assert_eq!(stats.matches_scanned, 1);
        assert_eq!(stats.records_extracted, 1);
        assert_eq!(stats.matches_discarded, 0);
    }

    #[test]
    fn scan_defaults_name_to_description_prefix() {
        let description = "a".repeat(70);
        let text = format!("{description}\n$5.00 AB-123\n");

        let (records, _) = scanner().scan(&text, "doc.pdf");

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "a".repeat(60));
        assert_eq!(records[0].description, description);
    }

    #[test]
    fn scan_skips_table_header_lines() {
        let text = "MAGIC KEYBOARD FOLIO\nKeyboard and folio case.\nPICTURE DESCRIPTION PRICE PART NUMBER\n$29.99 MQDP3LL/A";

        let (records, _) = scanner().scan(text, "doc.pdf");

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "MAGIC KEYBOARD FOLIO");
        assert_eq!(records[0].description, "Keyboard and folio case.");
    }

    #[test]
    fn scan_counts_discarded_matches_without_description() {
        let text = "short\ntiny\n$9.99 AB-1";

        let (records, stats) = scanner().scan(text, "doc.pdf");

        assert!(records.is_empty());
        assert_eq!(stats.matches_scanned, 1);
        assert_eq!(stats.matches_discarded, 1);
    }

    #[test]
    fn scan_discards_match_with_empty_context() {
        let (records, stats) = scanner().scan("$9.99 AB-1", "doc.pdf");

        assert!(records.is_empty());
        assert_eq!(stats.matches_discarded, 1);
    }

    #[test]
    fn scan_ignores_lines_starting_with_dollar_for_description() {
        let text = "ACCESSORY PRICE GUIDE\n$149.00 PREVIOUS ITEM\n$9.99 AB-1";

        let (records, stats) = scanner().scan(text, "doc.pdf");

        // "$149.00 PREVIOUS ITEM" fails the description check but passes the
        // name check, so the scan stops there with no description found.
        assert!(records.is_empty());
        assert_eq!(stats.matches_scanned, 2);
        assert_eq!(stats.matches_discarded, 2);
    }

    #[test]
    fn scan_uses_same_line_for_name_and_description() {
        let text = "APPLE PENCIL PRO STYLUS\n$129.00 MX2D3AM/A";

        let (records, _) = scanner().scan(text, "doc.pdf");

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "APPLE PENCIL PRO STYLUS");
        assert_eq!(records[0].description, "APPLE PENCIL PRO STYLUS");
    }

    #[test]
    fn scan_emits_records_in_text_order() {
        let text = "SMART FOLIO COVER CASE\nFolio for 11-inch models.\n$79.00 MWRY3ZM/A\nUSB-C POWER ADAPTER\nCompact 20W power adapter.\n$19.00 MHJA3AM/A";

        let (records, stats) = scanner().scan(text, "doc.pdf");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].part_number, "MWRY3ZM/A");
        assert_eq!(records[1].part_number, "MHJA3AM/A");
        assert_eq!(stats.records_extracted, 2);
    }

    #[test]
    fn scan_is_idempotent() {
        let text = "USB-C CHARGE CABLE\nCable for charging.\n$19.99 MX0X2AM/A";
        let scanner = scanner();

        let first = scanner.scan(text, "doc.pdf");
        let second = scanner.scan(text, "doc.pdf");

        assert_eq!(first.0, second.0);
        assert_eq!(first.1, second.1);
    }

    #[test]
    fn context_window_start_respects_char_boundaries() {
        let text = format!("{}$1.00 AB-1", "é".repeat(400));
        let match_start = text.find('$').expect("match position");

        let start = context_window_start(&text, match_start);

        assert!(text.is_char_boundary(start));
        assert_eq!(text[start..match_start].chars().count(), 300);
    }

    #[test]
    fn build_catalog_preserves_document_order_and_sums_stats() {
        let documents = vec![
            SourceDocument {
                source: "first.pdf".to_string(),
                text: "LIGHTNING TO USB CABLE\nOne metre charge cable.\n$25.00 MD818ZM/A".to_string(),
            },
            SourceDocument {
                source: "second.pdf".to_string(),
                text: "short\n$5.00 AB-1\nMAGIC MOUSE ACCESSORY\nWireless multi-touch mouse.\n$99.00 MK2E3AM/A"
                    .to_string(),
            },
        ];

        let (catalog, stats) = build_catalog(&scanner(), &documents);

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.records()[0].source, "first.pdf");
        assert_eq!(catalog.records()[1].source, "second.pdf");
        assert_eq!(catalog.records()[1].part_number, "MK2E3AM/A");
        assert_eq!(stats.matches_scanned, 3);
        assert_eq!(stats.records_extracted, 2);
        assert_eq!(stats.matches_discarded, 1);
    }

    #[test]
    fn duplicate_part_numbers_across_documents_are_kept() {
        let text = "USB-C POWER ADAPTER UNIT\nCompact 20W power adapter.\n$19.00 MHJA3AM/A";
        let documents = vec![
            SourceDocument {
                source: "a.pdf".to_string(),
                text: text.to_string(),
            },
            SourceDocument {
                source: "b.pdf".to_string(),
                text: text.to_string(),
            },
        ];

        let (catalog, _) = build_catalog(&scanner(), &documents);

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.records()[0].part_number, catalog.records()[1].part_number);
        assert_ne!(catalog.records()[0].source, catalog.records()[1].source);
    }
}
