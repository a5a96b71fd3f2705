use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::ExtractArgs;
use crate::extract::{Flowsheet, RawRow, RowAssembler, RuleSet, build_flowsheet};
use crate::intake::{Document, collect_documents};
use crate::model::{DocumentEntry, ExtractCounts, ExtractPaths, ExtractRunManifest, ToolVersions};
use crate::pdftext::{document_pages, pdftotext_version};
use crate::util::{ensure_directory, now_utc_string, utc_compact_string, write_json_pretty};

#[derive(Debug, Default)]
struct RowExtraction {
    rows: Vec<RawRow>,
    processed_document_count: usize,
    page_count: usize,
    warnings: Vec<String>,
}

pub fn run(args: ExtractArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let work_dir = args.work_dir.clone();
    let manifest_dir = work_dir.join("manifests");
    ensure_directory(&manifest_dir)?;

    let output_path = args
        .output_path
        .clone()
        .unwrap_or_else(|| work_dir.join("flowsheet.json"));
    let manifest_path = args
        .manifest_path
        .clone()
        .unwrap_or_else(|| manifest_dir.join("extract_run.json"));

    info!(work_dir = %work_dir.display(), run_id = %run_id, "starting extract");

    let rule_set = load_rule_set(args.alias_config.as_deref())?;
    let assembler = RowAssembler::new(&rule_set)?;
    let intake = collect_documents(&args.inputs)?;

    let tool_versions = ToolVersions {
        labflux: env!("CARGO_PKG_VERSION").to_string(),
        pdftotext: pdftotext_version(),
    };

    let extraction = assemble_rows(&assembler, &intake.documents, args.max_pages_per_doc);
    let flowsheet = build_flowsheet(&extraction.rows);

    if flowsheet.batches.is_empty() {
        warn!("no receipt timestamps recovered; flowsheet mapping is empty");
    }

    write_json_pretty(&output_path, &flowsheet.mapping)?;
    info!(path = %output_path.display(), "wrote flowsheet mapping");

    if let Some(rows_path) = &args.rows_path {
        write_json_pretty(rows_path, &extraction.rows)?;
        info!(path = %rows_path.display(), rows = extraction.rows.len(), "wrote row dump");
    }

    let counts = build_counts(&intake.documents, &extraction, &flowsheet, rule_set.rules.len());
    let mut warnings = intake.warnings;
    warnings.extend(extraction.warnings);

    let manifest = ExtractRunManifest {
        manifest_version: 1,
        run_id,
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_extract_command(&args),
        tool_versions,
        paths: ExtractPaths {
            work_dir: work_dir.display().to_string(),
            manifest_dir: manifest_dir.display().to_string(),
            output_path: output_path.display().to_string(),
            rows_path: args.rows_path.as_ref().map(|path| path.display().to_string()),
            alias_config: args
                .alias_config
                .as_ref()
                .map(|path| path.display().to_string()),
        },
        counts,
        batches: flowsheet.batches.clone(),
        dropped_batches: flowsheet.dropped_batches.clone(),
        unrecognized_labels: flowsheet.unrecognized_labels.iter().cloned().collect(),
        source_hashes: intake.documents.iter().map(DocumentEntry::from).collect(),
        warnings,
        notes: vec![
            "Rows are grouped by specimen receipt time; only the earliest batches fill the flowsheet slots."
                .to_string(),
        ],
    };

    write_json_pretty(&manifest_path, &manifest)?;

    info!(path = %manifest_path.display(), "wrote extract run manifest");
    info!(
        documents = manifest.counts.document_count,
        rows = manifest.counts.row_count,
        batches = manifest.counts.batch_count,
        "extract completed"
    );

    Ok(())
}

fn load_rule_set(alias_config: Option<&Path>) -> Result<RuleSet> {
    let builtin = RuleSet::builtin();
    match alias_config {
        Some(path) => Ok(builtin.extended_with(RuleSet::load(path)?)),
        None => Ok(builtin),
    }
}

fn assemble_rows(
    assembler: &RowAssembler,
    documents: &[Document],
    max_pages_per_doc: Option<usize>,
) -> RowExtraction {
    let mut extraction = RowExtraction::default();

    for (document_index, document) in documents.iter().enumerate() {
        let pages = match document_pages(document, max_pages_per_doc) {
            Ok(pages) => pages,
            Err(err) => {
                let warning = format!("{err:#}");
                warn!(warning = %warning, "document extraction warning");
                extraction.warnings.push(warning);
                continue;
            }
        };

        let rows = assembler.assemble_document(document_index, &pages);
        info!(
            document = %document.name,
            pages = pages.len(),
            rows = rows.len(),
            "assembled document rows"
        );

        extraction.processed_document_count += 1;
        extraction.page_count += pages.len();
        extraction.rows.extend(rows);
    }

    extraction
}

fn build_counts(
    documents: &[Document],
    extraction: &RowExtraction,
    flowsheet: &Flowsheet,
    alias_rule_count: usize,
) -> ExtractCounts {
    ExtractCounts {
        document_count: documents.len(),
        processed_document_count: extraction.processed_document_count,
        page_count: extraction.page_count,
        row_count: extraction.rows.len(),
        resolved_row_count: extraction
            .rows
            .iter()
            .filter(|row| row.parameter.is_some())
            .count(),
        rows_without_timestamp: flowsheet.rows_without_timestamp,
        batch_count: flowsheet.batches.len(),
        dropped_batch_count: flowsheet.dropped_batches.len(),
        alias_rule_count,
    }
}

fn render_extract_command(args: &ExtractArgs) -> String {
    let mut command = vec!["labflux".to_string(), "extract".to_string()];

    for input in &args.inputs {
        command.push("--input".to_string());
        command.push(input.display().to_string());
    }
    command.push("--work-dir".to_string());
    command.push(args.work_dir.display().to_string());

    if let Some(path) = &args.output_path {
        command.push("--output-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.rows_path {
        command.push("--rows-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.manifest_path {
        command.push("--manifest-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.alias_config {
        command.push("--alias-config".to_string());
        command.push(path.display().to_string());
    }
    if let Some(max_pages) = args.max_pages_per_doc {
        command.push("--max-pages-per-doc".to_string());
        command.push(max_pages.to_string());
    }

    command.join(" ")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::PathBuf;

    use super::*;

    fn args(inputs: Vec<PathBuf>, work_dir: &Path) -> ExtractArgs {
        ExtractArgs {
            inputs,
            work_dir: work_dir.to_path_buf(),
            output_path: None,
            rows_path: None,
            manifest_path: None,
            alias_config: None,
            max_pages_per_doc: None,
        }
    }

    fn read_mapping(path: &Path) -> BTreeMap<String, String> {
        let raw = fs::read(path).expect("mapping written");
        serde_json::from_slice(&raw).expect("mapping parses")
    }

    #[test]
    fn run_writes_mapping_and_manifest_from_text_reports() {
        let input = tempfile::tempdir().expect("input dir");
        let work = tempfile::tempdir().expect("work dir");
        fs::write(
            input.path().join("1-hemograma.txt"),
            "Recepción 01/01/24 08:00\nHEMATOCRITO   42\n",
        )
        .expect("write");
        fs::write(
            input.path().join("2-orina.txt"),
            "ORINA COMPLETA (Incluye SED.U)\nRecepción 01/01/24 08:00\nCOLOR   Amarillo\n",
        )
        .expect("write");

        let mut extract_args = args(vec![input.path().to_path_buf()], work.path());
        extract_args.rows_path = Some(work.path().join("rows.json"));
        run(extract_args).expect("extract run");

        let mapping = read_mapping(&work.path().join("flowsheet.json"));
        assert_eq!(mapping["fecha_1"], "01/01/2024");
        assert_eq!(mapping["hto_1"], "42");
        assert_eq!(mapping["coloroc_1"], "Amarillo");
        assert_eq!(mapping["fecha_2"], "");

        let manifest_raw = fs::read(work.path().join("manifests").join("extract_run.json"))
            .expect("manifest written");
        let manifest: serde_json::Value =
            serde_json::from_slice(&manifest_raw).expect("manifest parses");
        assert_eq!(manifest["status"], "completed");
        assert_eq!(manifest["counts"]["document_count"], 2);
        assert_eq!(manifest["counts"]["batch_count"], 1);
        assert_eq!(manifest["source_hashes"][0]["name"], "1-hemograma.txt");

        let rows_raw = fs::read(work.path().join("rows.json")).expect("rows written");
        let rows: serde_json::Value = serde_json::from_slice(&rows_raw).expect("rows parse");
        let rows = rows.as_array().expect("rows array");
        let receipt_row = rows
            .iter()
            .find(|row| row["label"] == "Recepción 01/01/24 08")
            .expect("receipt line kept as a row");
        assert!(receipt_row["parameter"].is_null());
        let hematocrit = rows
            .iter()
            .find(|row| row["label"] == "HEMATOCRITO")
            .expect("hematocrit row");
        assert_eq!(hematocrit["parameter"], "hto");
        assert_eq!(hematocrit["panel"], "general");
    }

    #[test]
    fn alias_config_adds_site_specific_labels() {
        let input = tempfile::tempdir().expect("input dir");
        let work = tempfile::tempdir().expect("work dir");
        fs::write(
            input.path().join("informe.txt"),
            "Recepción 03/02/24 10:30\nHTO (CAPILAR)   39\n",
        )
        .expect("write");
        let alias_path = work.path().join("aliases.json");
        fs::write(
            &alias_path,
            r#"{"rules":[{"panel":"general","kind":"anchored","pattern":"HTO \\(CAPILAR\\)","target":"hto"}]}"#,
        )
        .expect("write");

        let mut extract_args = args(vec![input.path().join("informe.txt")], work.path());
        extract_args.alias_config = Some(alias_path);
        run(extract_args).expect("extract run");

        let mapping = read_mapping(&work.path().join("flowsheet.json"));
        assert_eq!(mapping["hto_1"], "39");
    }

    #[test]
    fn unknown_alias_target_fails_the_run() {
        let input = tempfile::tempdir().expect("input dir");
        let work = tempfile::tempdir().expect("work dir");
        fs::write(input.path().join("informe.txt"), "SODIO   140").expect("write");
        let alias_path = work.path().join("aliases.json");
        fs::write(
            &alias_path,
            r#"{"rules":[{"panel":"general","kind":"anchored","pattern":"NA","target":"natremia"}]}"#,
        )
        .expect("write");

        let mut extract_args = args(vec![input.path().to_path_buf()], work.path());
        extract_args.alias_config = Some(alias_path);
        assert!(run(extract_args).is_err());
    }

    #[test]
    fn render_extract_command_lists_given_flags() {
        let mut extract_args = args(
            vec![PathBuf::from("a.pdf"), PathBuf::from("lote.zip")],
            Path::new(".cache/labflux"),
        );
        extract_args.max_pages_per_doc = Some(4);

        assert_eq!(
            render_extract_command(&extract_args),
            "labflux extract --input a.pdf --input lote.zip --work-dir .cache/labflux --max-pages-per-doc 4"
        );
    }
}
