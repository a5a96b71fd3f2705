use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::extract::BatchSummary;
use crate::intake::{Document, DocumentKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub name: String,
    pub kind: DocumentKind,
    pub byte_size: u64,
    pub sha256: String,
}

impl From<&Document> for DocumentEntry {
    fn from(document: &Document) -> Self {
        Self {
            name: document.name.clone(),
            kind: document.kind,
            byte_size: document.bytes.len() as u64,
            sha256: document.sha256.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source_directory: String,
    pub document_count: usize,
    pub documents: Vec<DocumentEntry>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolVersions {
    pub labflux: String,
    pub pdftotext: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractPaths {
    pub work_dir: String,
    pub manifest_dir: String,
    pub output_path: String,
    pub rows_path: Option<String>,
    pub alias_config: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractCounts {
    pub document_count: usize,
    pub processed_document_count: usize,
    pub page_count: usize,
    pub row_count: usize,
    pub resolved_row_count: usize,
    pub rows_without_timestamp: usize,
    pub batch_count: usize,
    pub dropped_batch_count: usize,
    pub alias_rule_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub tool_versions: ToolVersions,
    pub paths: ExtractPaths,
    pub counts: ExtractCounts,
    pub batches: Vec<BatchSummary>,
    pub dropped_batches: Vec<NaiveDateTime>,
    pub unrecognized_labels: Vec<String>,
    pub source_hashes: Vec<DocumentEntry>,
    pub warnings: Vec<String>,
    pub notes: Vec<String>,
}

/// Fields of a previously written run manifest that `status` reports on.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractRunSummary {
    pub run_id: Option<String>,
    pub status: Option<String>,
    pub started_at: Option<String>,
    pub updated_at: Option<String>,
    pub command: Option<String>,
    pub counts: Option<ExtractCounts>,
    #[serde(default)]
    pub unrecognized_labels: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}
