use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::model::{DocumentInventoryManifest, ExtractRunSummary};

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.work_dir.join("manifests");
    let inventory_path = manifest_dir.join("document_inventory.json");
    let run_path = manifest_dir.join("extract_run.json");
    let flowsheet_path = args.work_dir.join("flowsheet.json");

    info!(work_dir = %args.work_dir.display(), "status requested");

    if inventory_path.exists() {
        let inventory: DocumentInventoryManifest = read_manifest(&inventory_path)?;
        info!(
            generated_at = %inventory.generated_at,
            source = %inventory.source_directory,
            document_count = inventory.document_count,
            warnings = inventory.warnings.len(),
            "loaded inventory manifest"
        );
    } else {
        warn!(path = %inventory_path.display(), "inventory manifest missing");
    }

    if run_path.exists() {
        let summary: ExtractRunSummary = read_manifest(&run_path)?;
        let counts = summary.counts.unwrap_or_default();
        info!(
            run_id = %summary.run_id.unwrap_or_default(),
            status = %summary.status.unwrap_or_default(),
            started_at = %summary.started_at.unwrap_or_default(),
            updated_at = %summary.updated_at.unwrap_or_default(),
            command = %summary.command.unwrap_or_default(),
            documents = counts.document_count,
            processed_documents = counts.processed_document_count,
            rows = counts.row_count,
            resolved_rows = counts.resolved_row_count,
            batches = counts.batch_count,
            dropped_batches = counts.dropped_batch_count,
            unrecognized_labels = summary.unrecognized_labels.len(),
            warnings = summary.warnings.len(),
            "loaded extract run manifest"
        );
    } else {
        warn!(path = %run_path.display(), "extract run manifest missing");
    }

    if flowsheet_path.exists() {
        info!(path = %flowsheet_path.display(), "flowsheet mapping present");
    } else {
        warn!(path = %flowsheet_path.display(), "flowsheet mapping missing");
    }

    Ok(())
}

fn read_manifest<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_manifests_are_not_an_error() {
        let work = tempfile::tempdir().expect("work dir");
        run(StatusArgs {
            work_dir: work.path().to_path_buf(),
        })
        .expect("status on empty work dir");
    }

    #[test]
    fn partial_run_manifest_is_readable() {
        let work = tempfile::tempdir().expect("work dir");
        let path = work.path().join("extract_run.json");
        fs::write(&path, r#"{"run_id":"run-20240101T000000Z","status":"completed"}"#)
            .expect("write");

        let summary: ExtractRunSummary = read_manifest(&path).expect("summary parses");
        assert_eq!(summary.status.as_deref(), Some("completed"));
        assert!(summary.counts.is_none());
        assert!(summary.warnings.is_empty());
    }

    #[test]
    fn corrupt_manifest_is_an_error() {
        let work = tempfile::tempdir().expect("work dir");
        let manifests = work.path().join("manifests");
        fs::create_dir_all(&manifests).expect("mkdir");
        fs::write(manifests.join("extract_run.json"), "{not json").expect("write");

        assert!(
            run(StatusArgs {
                work_dir: work.path().to_path_buf(),
            })
            .is_err()
        );
    }
}
