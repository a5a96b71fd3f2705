use std::path::Path;

use anyhow::Result;
use tracing::info;

use crate::cli::InventoryArgs;
use crate::intake::collect_documents;
use crate::model::{DocumentEntry, DocumentInventoryManifest};
use crate::util::{now_utc_string, write_json_pretty};

pub fn run(args: InventoryArgs) -> Result<()> {
    let manifest = build_manifest(&args.input_dir)?;

    if args.dry_run {
        info!(
            document_count = manifest.document_count,
            source = %manifest.source_directory,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args.manifest_path.unwrap_or_else(|| {
        args.work_dir
            .join("manifests")
            .join("document_inventory.json")
    });

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote inventory manifest");
    info!(
        document_count = manifest.document_count,
        "inventory completed"
    );

    Ok(())
}

pub fn build_manifest(input_dir: &Path) -> Result<DocumentInventoryManifest> {
    let intake = collect_documents(&[input_dir.to_path_buf()])?;

    let documents = intake
        .documents
        .iter()
        .map(DocumentEntry::from)
        .collect::<Vec<_>>();

    Ok(DocumentInventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        source_directory: input_dir.display().to_string(),
        document_count: documents.len(),
        documents,
        warnings: intake.warnings,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::intake::DocumentKind;

    #[test]
    fn manifest_lists_documents_with_size_and_hash() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("hemograma.txt"), "HEMATOCRITO   42").expect("write");
        fs::write(dir.path().join("orina.pdf"), b"%PDF-1.4").expect("write");

        let manifest = build_manifest(dir.path()).expect("manifest");
        assert_eq!(manifest.document_count, 2);
        assert_eq!(manifest.documents[0].name, "hemograma.txt");
        assert_eq!(manifest.documents[0].kind, DocumentKind::Text);
        assert_eq!(manifest.documents[0].byte_size, 16);
        assert_eq!(manifest.documents[1].kind, DocumentKind::Pdf);
        assert_eq!(manifest.documents[1].sha256.len(), 64);
    }

    #[test]
    fn run_writes_manifest_under_work_dir() {
        let input = tempfile::tempdir().expect("input dir");
        let work = tempfile::tempdir().expect("work dir");
        fs::write(input.path().join("informe.txt"), "SODIO   140").expect("write");

        run(InventoryArgs {
            input_dir: input.path().to_path_buf(),
            work_dir: work.path().to_path_buf(),
            manifest_path: None,
            dry_run: false,
        })
        .expect("inventory run");

        let path = work.path().join("manifests").join("document_inventory.json");
        let raw = fs::read(&path).expect("manifest written");
        let manifest: DocumentInventoryManifest =
            serde_json::from_slice(&raw).expect("manifest parses");
        assert_eq!(manifest.document_count, 1);
    }

    #[test]
    fn dry_run_writes_nothing() {
        let input = tempfile::tempdir().expect("input dir");
        let work = tempfile::tempdir().expect("work dir");
        fs::write(input.path().join("informe.txt"), "SODIO   140").expect("write");

        run(InventoryArgs {
            input_dir: input.path().to_path_buf(),
            work_dir: work.path().to_path_buf(),
            manifest_path: None,
            dry_run: true,
        })
        .expect("inventory dry run");

        assert!(!work.path().join("manifests").exists());
    }
}
