use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use chrono::Utc;

use crate::cli::OcrMode;
use crate::model::ToolVersions;

#[derive(Debug, Default)]
pub(crate) struct ExtractedDocument {
    pub text: String,
    pub page_count: usize,
    pub text_layer_page_count: usize,
    pub ocr_page_count: usize,
    pub empty_page_count: usize,
    pub warnings: Vec<String>,
}

pub(crate) fn extract_document_text(
    pdf_path: &Path,
    max_pages_per_doc: Option<usize>,
    ocr_mode: OcrMode,
    ocr_lang: &str,
    ocr_min_text_chars: usize,
) -> Result<ExtractedDocument> {
    let mut pages = extract_pages_with_pdftotext(pdf_path, max_pages_per_doc)?;
    let mut warnings = Vec::new();
    let mut ocr_page_count = 0usize;

    for page_number in collect_ocr_candidates(&pages, ocr_mode, ocr_min_text_chars) {
        let page_index = page_number - 1;

        match extract_page_with_ocr(pdf_path, page_number, ocr_lang) {
            Ok(ocr_text) => {
                if non_whitespace_char_count(&ocr_text) == 0 && ocr_mode == OcrMode::Auto {
                    warnings.push(format!(
                        "OCR text was empty for {} page {} in auto mode",
                        pdf_path.display(),
                        page_number
                    ));
                    continue;
                }

                if let Some(page) = pages.get_mut(page_index) {
                    *page = ocr_text;
                    ocr_page_count += 1;
                }
            }
            Err(error) => {
                if ocr_mode == OcrMode::Force {
                    return Err(error).with_context(|| {
                        format!(
                            "failed OCR extraction for {} page {}",
                            pdf_path.display(),
                            page_number
                        )
                    });
                }

                warnings.push(format!(
                    "OCR fallback failed for {} page {}: {}",
                    pdf_path.display(),
                    page_number,
                    error
                ));
            }
        }
    }

    let page_count = pages.len();
    let empty_page_count = pages
        .iter()
        .filter(|page| non_whitespace_char_count(page) == 0)
        .count();

    Ok(ExtractedDocument {
        text: pages.join("\n"),
        page_count,
        text_layer_page_count: page_count - ocr_page_count,
        ocr_page_count,
        empty_page_count,
        warnings,
    })
}

fn extract_pages_with_pdftotext(
    pdf_path: &Path,
    max_pages_per_doc: Option<usize>,
) -> Result<Vec<String>> {
    let mut command = Command::new("pdftotext");
    command.arg("-enc").arg("UTF-8").arg("-f").arg("1");
    if let Some(max_pages) = max_pages_per_doc {
        command.arg("-l").arg(max_pages.to_string());
    }
    command.arg(pdf_path).arg("-");

    let output = command
        .output()
        .with_context(|| format!("failed to execute pdftotext for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdftotext returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    let mut pages: Vec<String> = raw
        .split('\u{000C}')
        .map(|chunk| chunk.replace('\u{0000}', ""))
        .collect();

    while pages
        .last()
        .map(|page| page.trim().is_empty())
        .unwrap_or(false)
    {
        pages.pop();
    }

    Ok(pages)
}

fn extract_page_with_ocr(pdf_path: &Path, page_number: usize, ocr_lang: &str) -> Result<String> {
    let pdf_stem = pdf_path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("pdf");
    let safe_stem = pdf_stem
        .chars()
        .map(|character| {
            if character.is_ascii_alphanumeric() {
                character
            } else {
                '_'
            }
        })
        .collect::<String>();

    let stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let output_root = std::env::temp_dir().join(format!(
        "pricebook_ocr_{}_{}_{}_{}",
        safe_stem,
        std::process::id(),
        page_number,
        stamp
    ));
    let png_path = PathBuf::from(format!("{}.png", output_root.display()));

    let pdftoppm_output = Command::new("pdftoppm")
        .arg("-f")
        .arg(page_number.to_string())
        .arg("-l")
        .arg(page_number.to_string())
        .arg("-singlefile")
        .arg("-png")
        .arg(pdf_path)
        .arg(&output_root)
        .output()
        .with_context(|| format!("failed to execute pdftoppm for {}", pdf_path.display()))?;

    if !pdftoppm_output.status.success() {
        let stderr = String::from_utf8_lossy(&pdftoppm_output.stderr);
        bail!(
            "pdftoppm returned non-zero exit status for {} page {}: {}",
            pdf_path.display(),
            page_number,
            stderr.trim()
        );
    }

    if !png_path.exists() {
        bail!(
            "pdftoppm did not produce expected image for {} page {}",
            pdf_path.display(),
            page_number
        );
    }

    let tesseract_output = Command::new("tesseract")
        .arg(&png_path)
        .arg("stdout")
        .arg("-l")
        .arg(ocr_lang)
        .output()
        .with_context(|| format!("failed to execute tesseract for {}", png_path.display()))?;

    let _ = fs::remove_file(&png_path);

    if !tesseract_output.status.success() {
        let stderr = String::from_utf8_lossy(&tesseract_output.stderr);
        bail!(
            "tesseract returned non-zero exit status for {} page {}: {}",
            pdf_path.display(),
            page_number,
            stderr.trim()
        );
    }

    Ok(String::from_utf8_lossy(&tesseract_output.stdout)
        .replace('\u{0000}', "")
        .trim()
        .to_string())
}

pub(crate) fn collect_ocr_candidates(
    pages: &[String],
    ocr_mode: OcrMode,
    min_text_chars: usize,
) -> Vec<usize> {
    match ocr_mode {
        OcrMode::Off => Vec::new(),
        OcrMode::Force => (1..=pages.len()).collect(),
        OcrMode::Auto => pages
            .iter()
            .enumerate()
            .filter_map(|(index, page)| {
                if non_whitespace_char_count(page) < min_text_chars {
                    Some(index + 1)
                } else {
                    None
                }
            })
            .collect(),
    }
}

pub(crate) fn non_whitespace_char_count(text: &str) -> usize {
    text.chars()
        .filter(|character| !character.is_whitespace())
        .count()
}

pub(crate) fn command_available(program: &str) -> bool {
    Command::new(program).arg("--version").output().is_ok()
}

pub(crate) fn collect_tool_versions() -> Result<ToolVersions> {
    Ok(ToolVersions {
        pdftotext: command_version("pdftotext", &["-v"])?,
        pdftoppm: command_version_optional("pdftoppm", &["-v"]),
        tesseract: command_version_optional("tesseract", &["--version"]),
    })
}

fn command_version(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("failed to run {} {}", program, args.join(" ")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{} {} failed: {}", program, args.join(" "), stderr.trim());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let source = if stdout.trim().is_empty() {
        stderr.trim()
    } else {
        stdout.trim()
    };

    let version_line = source
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .unwrap_or("unknown");

    Ok(version_line.to_string())
}

fn command_version_optional(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let source = if stdout.trim().is_empty() {
        stderr.trim()
    } else {
        stdout.trim()
    };

    source
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
}
