use std::io::Write;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::intake::{Document, DocumentKind, split_pages};

const PDFTOTEXT: &str = "pdftotext";

/// Page texts of a document: PDFs go through `pdftotext`, text documents are split as-is.
pub fn document_pages(
    document: &Document,
    max_pages_per_doc: Option<usize>,
) -> Result<Vec<String>> {
    let mut pages = match document.kind {
        DocumentKind::Text => document.text_pages(),
        DocumentKind::Pdf => extract_pdf_bytes(&document.bytes, max_pages_per_doc)
            .with_context(|| format!("failed to extract text for {}", document.name))?,
    };

    if let Some(max_pages) = max_pages_per_doc {
        pages.truncate(max_pages);
    }

    debug!(
        document = %document.name,
        kind = document.kind.as_str(),
        pages = pages.len(),
        "loaded document pages"
    );
    Ok(pages)
}

fn extract_pdf_bytes(bytes: &[u8], max_pages_per_doc: Option<usize>) -> Result<Vec<String>> {
    let mut staged = tempfile::Builder::new()
        .prefix("labflux-")
        .suffix(".pdf")
        .tempfile()
        .context("failed to create temporary PDF file")?;
    staged
        .write_all(bytes)
        .context("failed to stage PDF for pdftotext")?;
    staged.flush().context("failed to flush staged PDF")?;

    extract_pages_with_pdftotext(staged.path(), max_pages_per_doc)
}

fn extract_pages_with_pdftotext(
    pdf_path: &Path,
    max_pages_per_doc: Option<usize>,
) -> Result<Vec<String>> {
    let mut command = Command::new(PDFTOTEXT);
    command
        .arg("-layout")
        .arg("-enc")
        .arg("UTF-8")
        .arg("-f")
        .arg("1");
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

    Ok(split_pages(&String::from_utf8_lossy(&output.stdout)))
}

/// First line of `pdftotext -v`, or `unavailable` when the tool cannot be run.
pub fn pdftotext_version() -> String {
    match command_version(PDFTOTEXT, &["-v"]) {
        Ok(version) => version,
        Err(err) => {
            debug!(error = %err, "pdftotext version probe failed");
            "unavailable".to_string()
        }
    }
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

    // pdftotext prints its banner on stderr.
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let source = if stdout.trim().is_empty() {
        stderr.trim()
    } else {
        stdout.trim()
    };

    Ok(source
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .unwrap_or("unknown")
        .to_string())
}
