use std::io::{self, Write};

use anyhow::{Context, Result};

use super::run::{SemanticReport, StructuredReport};

pub(super) fn write_structured_json(report: &StructuredReport) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, report)
        .context("failed to serialize structured query output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

pub(super) fn write_structured_text(report: &StructuredReport) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(output, "Query: {}", report.query)?;
    writeln!(
        output,
        "Method: {} (match={} score={}) duration_ms={:.3}",
        report.method,
        report.match_kind.as_str(),
        report.score,
        report.duration_ms,
    )?;
    writeln!(output, "Product: {}", report.product_name)?;
    writeln!(output, "Answer: {}", report.answer)?;
    writeln!(
        output,
        "Details: part_number={} price={} source={}",
        report.product.part_number, report.product.price, report.product.source,
    )?;

    output.flush()?;
    Ok(())
}

pub(super) fn write_semantic_json(report: &SemanticReport) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, report)
        .context("failed to serialize semantic query output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

pub(super) fn write_semantic_text(report: &SemanticReport) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(output, "Query: {}", report.query)?;
    writeln!(
        output,
        "Method: {} (vectorizer={} top_k={}) duration_ms={:.3}",
        report.method, report.vectorizer_id, report.top_k, report.duration_ms,
    )?;
    writeln!(output, "Results: {}", report.returned)?;

    for result in &report.results {
        writeln!(
            output,
            "{}.\tscore={:.6}\t{}\t{}",
            result.rank, result.score, result.source, result.chunk_id,
        )?;
        writeln!(output, "\ttext: {}", result.text)?;
    }

    output.flush()?;
    Ok(())
}
