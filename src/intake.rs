use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::util::sha256_bytes;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    /// Page text already extracted upstream, pages separated by form feed.
    Text,
}

impl DocumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Text => "text",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())?
            .to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    /// File name, or `archive.zip:entry` for archive members.
    pub name: String,
    pub kind: DocumentKind,
    pub sha256: String,
    pub bytes: Vec<u8>,
}

impl Document {
    fn new(name: String, kind: DocumentKind, bytes: Vec<u8>) -> Self {
        Self {
            name,
            kind,
            sha256: sha256_bytes(&bytes),
            bytes,
        }
    }

    /// Pages of a text document; the lossy UTF-8 decode mirrors what the PDF path gets
    /// back from the extractor.
    pub fn text_pages(&self) -> Vec<String> {
        split_pages(&String::from_utf8_lossy(&self.bytes))
    }
}

#[derive(Debug, Default)]
pub struct Intake {
    pub documents: Vec<Document>,
    pub warnings: Vec<String>,
}

impl Intake {
    fn warn(&mut self, warning: String) {
        warn!(warning = %warning, "intake warning");
        self.warnings.push(warning);
    }
}

/// Gathers the documents of one run from files, directories (one level) and zip archives,
/// in the order the inputs are given.
pub fn collect_documents(inputs: &[PathBuf]) -> Result<Intake> {
    let mut intake = Intake::default();

    for input in inputs {
        let metadata = fs::metadata(input)
            .with_context(|| format!("failed to inspect input: {}", input.display()))?;

        if metadata.is_dir() {
            for path in list_directory(input)? {
                collect_file(&path, &mut intake)?;
            }
        } else {
            collect_file(input, &mut intake)?;
        }
    }

    if intake.documents.is_empty() {
        bail!("no valid documents found in the given inputs");
    }

    info!(
        documents = intake.documents.len(),
        warnings = intake.warnings.len(),
        "collected input documents"
    );

    Ok(intake)
}

fn list_directory(directory: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(directory)
        .with_context(|| format!("failed to read {}", directory.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", directory.display()))?;
        let path = entry.path();
        if entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

fn collect_file(path: &Path, intake: &mut Intake) -> Result<()> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(ToOwned::to_owned)
        .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;

    let is_archive = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));

    if is_archive {
        let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        if let Err(err) = collect_archive(&name, data, intake) {
            intake.warn(format!("skipping unreadable archive {name}: {err:#}"));
        }
        return Ok(());
    }

    match DocumentKind::from_name(&name) {
        Some(kind) => {
            let bytes =
                fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
            intake.documents.push(Document::new(name, kind, bytes));
        }
        None => debug!(path = %path.display(), "ignoring unsupported input file"),
    }

    Ok(())
}

fn collect_archive(archive_name: &str, data: Vec<u8>, intake: &mut Intake) -> Result<()> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data)).context("invalid zip archive")?;
    let mut members = Vec::new();

    for index in 0..archive.len() {
        let mut file = archive
            .by_index(index)
            .with_context(|| format!("failed to open entry {index}"))?;
        if file.is_dir() {
            continue;
        }

        let entry_name = file.name().to_string();
        let Some(kind) = DocumentKind::from_name(&entry_name) else {
            debug!(archive = archive_name, entry = %entry_name, "ignoring archive entry");
            continue;
        };

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .with_context(|| format!("failed to read entry {entry_name}"))?;
        members.push(Document::new(format!("{archive_name}:{entry_name}"), kind, bytes));
    }

    debug!(archive = archive_name, documents = members.len(), "read zip archive");
    intake.documents.extend(members);
    Ok(())
}

/// Splits extracted text into pages on form feed, dropping NUL bytes and trailing
/// blank pages.
pub fn split_pages(raw: &str) -> Vec<String> {
    let mut pages: Vec<String> = raw
        .split('\u{000C}')
        .map(|chunk| chunk.replace('\u{0000}', ""))
        .collect();

    while pages.last().is_some_and(|page| page.trim().is_empty()) {
        pages.pop();
    }

    pages
}
