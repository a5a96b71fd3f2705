use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use super::alias::{AliasResolver, RuleSet};
use super::panel::PanelDetector;
use super::receipt::ReceiptLocator;
use super::text::{compose, non_blank_lines};
use super::value::ValueNormalizer;
use super::vocabulary::{Panel, Parameter};

pub const DATE_FORMAT: &str = "%d/%m/%Y";
pub const TIME_FORMAT: &str = "%H:%M";

const CULTURE_DATE_LABEL: &str = "Recepción cultivo (fecha)";
const CULTURE_TIME_LABEL: &str = "Recepción cultivo (hora)";

/// One label/value pair read from a report page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawRow {
    pub document_index: usize,
    pub page_index: usize,
    pub label: String,
    pub value: String,
    pub parameter: Option<Parameter>,
    pub panel: Panel,
    pub received_at: Option<NaiveDateTime>,
}

#[derive(Debug)]
pub struct RowAssembler {
    columns: Regex,
    panels: PanelDetector,
    aliases: AliasResolver,
    values: ValueNormalizer,
    receipts: ReceiptLocator,
}

impl RowAssembler {
    pub fn new(rule_set: &RuleSet) -> Result<Self> {
        Ok(Self {
            columns: Regex::new(r"\s{2,}").context("failed to compile column split regex")?,
            panels: PanelDetector::new()?,
            aliases: AliasResolver::new(rule_set)?,
            values: ValueNormalizer::new()?,
            receipts: ReceiptLocator::new()?,
        })
    }

    pub fn assemble_document(&self, document_index: usize, pages: &[String]) -> Vec<RawRow> {
        pages
            .iter()
            .enumerate()
            .flat_map(|(page_index, page_text)| {
                self.assemble_page(document_index, page_index, page_text)
            })
            .collect()
    }

    pub fn assemble_page(
        &self,
        document_index: usize,
        page_index: usize,
        page_text: &str,
    ) -> Vec<RawRow> {
        if page_text.trim().is_empty() {
            debug!(document_index, page_index, "skipping page without text");
            return Vec::new();
        }

        let text = compose(page_text);
        let panel = self.panels.detect(&text);
        let received_at = self.receipts.locate(&text);

        let mut rows = Vec::new();
        for line in non_blank_lines(&text) {
            let Some((label, raw_value)) = self.split_fields(line) else {
                continue;
            };

            let parameter = self.aliases.resolve(label, panel);
            let value = self.values.normalize(parameter, raw_value);

            rows.push(RawRow {
                document_index,
                page_index,
                label: label.to_string(),
                value,
                parameter,
                panel,
                received_at,
            });
        }

        if let (Panel::Culture, Some(timestamp)) = (panel, received_at) {
            for (label, parameter, value) in [
                (
                    CULTURE_DATE_LABEL,
                    Parameter::FechaCul,
                    timestamp.format(DATE_FORMAT).to_string(),
                ),
                (
                    CULTURE_TIME_LABEL,
                    Parameter::HoraCul,
                    timestamp.format(TIME_FORMAT).to_string(),
                ),
            ] {
                rows.push(RawRow {
                    document_index,
                    page_index,
                    label: label.to_string(),
                    value,
                    parameter: Some(parameter),
                    panel,
                    received_at,
                });
            }
        }

        debug!(
            document_index,
            page_index,
            panel = %panel,
            received = received_at.is_some(),
            rows = rows.len(),
            "assembled page rows"
        );

        rows
    }

    /// Label and value columns of a tabular line: split on wide gaps, else on the first
    /// colon. Lines with neither carry no field.
    fn split_fields<'a>(&self, line: &'a str) -> Option<(&'a str, &'a str)> {
        let mut columns = self.columns.split(line);
        let first = columns.next().map(str::trim);
        let second = columns.next().map(str::trim);

        let (label, value) = match (first, second) {
            (Some(label), Some(value)) => (label, value),
            _ => {
                let (label, value) = line.split_once(':')?;
                (label.trim(), value.trim())
            }
        };

        if label.is_empty() {
            return None;
        }
        Some((label, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assembler() -> RowAssembler {
        RowAssembler::new(&RuleSet::builtin()).expect("assembler should build")
    }

    #[test]
    fn splits_tabular_lines_and_resolves_aliases() {
        let text = "Recepción: 01/01/24 08:00\nHEMATOCRITO   42 %   36 - 46\nRCTO DE LEUCOCITOS    7,5";
        let rows = assembler().assemble_page(0, 0, text);

        let hto = rows
            .iter()
            .find(|row| row.parameter == Some(Parameter::Hto))
            .expect("hematocrit row");
        assert_eq!(hto.label, "HEMATOCRITO");
        assert_eq!(hto.value, "42");
        assert_eq!(hto.panel, Panel::General);
        assert!(hto.received_at.is_some());

        let leuco = rows
            .iter()
            .find(|row| row.parameter == Some(Parameter::Leuco))
            .expect("leukocyte row");
        assert_eq!(leuco.value, "7500");
    }

    #[test]
    fn colon_split_is_the_fallback() {
        let rows = assembler().assemble_page(0, 0, "Glucosa: 98 mg/dL");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, "Glucosa");
        assert_eq!(rows[0].value, "98");
        assert_eq!(rows[0].parameter, Some(Parameter::Glucosa));
    }

    #[test]
    fn lines_without_fields_are_skipped() {
        let rows = assembler().assemble_page(0, 0, "LABORATORIO CLINICO\n\n   \nHEMOGRAMA");
        assert!(rows.is_empty());

        let rows = assembler().assemble_page(0, 0, ": sin etiqueta");
        assert!(rows.is_empty());
    }

    #[test]
    fn unmatched_labels_are_kept_without_parameter() {
        let rows = assembler().assemble_page(0, 0, "Médico tratante   Dr. Pérez");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].parameter, None);
        assert_eq!(rows[0].value, "Dr. Pérez");
    }

    #[test]
    fn empty_pages_produce_no_rows() {
        assert!(assembler().assemble_page(0, 3, "  \n ").is_empty());
    }

    #[test]
    fn culture_pages_synthesize_receipt_rows() {
        let text = "UROCULTIVO\nRecepción: 02/02/24 09:10\nMICROORGANISMO   Escherichia coli";
        let rows = assembler().assemble_page(1, 2, text);

        assert!(rows.iter().all(|row| row.panel == Panel::Culture));
        let agente = rows
            .iter()
            .find(|row| row.parameter == Some(Parameter::Agente))
            .expect("agent row");
        assert_eq!(agente.value, "Escherichia coli");

        let synthesized = &rows[rows.len() - 2..];
        assert_eq!(synthesized[0].parameter, Some(Parameter::FechaCul));
        assert_eq!(synthesized[0].value, "02/02/2024");
        assert_eq!(synthesized[1].parameter, Some(Parameter::HoraCul));
        assert_eq!(synthesized[1].value, "09:10");
        assert_eq!(synthesized[1].document_index, 1);
        assert_eq!(synthesized[1].page_index, 2);
    }

    #[test]
    fn culture_pages_without_receipt_get_no_synthesized_rows() {
        let rows = assembler().assemble_page(0, 0, "HEMOCULTIVO\nMICROORGANISMO   Negativo");
        assert!(rows.iter().all(|row| row.parameter != Some(Parameter::FechaCul)));
    }

    #[test]
    fn assembling_twice_is_identical() {
        let text = "ORINA COMPLETA (Incluye SED.U)\nRecepción 03/03/24 10:00\nPH   6,0\nCOLOR   Amarillo";
        let assembler = assembler();
        let first = assembler.assemble_page(0, 0, text);
        let second = assembler.assemble_page(0, 0, text);
        assert_eq!(first, second);
        assert!(
            first
                .iter()
                .any(|row| row.parameter == Some(Parameter::PhOc) && row.value == "6.0")
        );
    }

    #[test]
    fn document_pages_keep_their_index_and_panel() {
        let pages = vec![
            "HEMATOCRITO   40\nRecepción 01/01/24 08:00".to_string(),
            String::new(),
            "ORINA COMPLETA (Incluye SED.U)\nGLUCOSA   Negativo".to_string(),
        ];
        let rows = assembler().assemble_document(4, &pages);

        let glucose = rows
            .iter()
            .find(|row| row.label == "GLUCOSA")
            .expect("urine glucose row");
        assert_eq!(glucose.page_index, 2);
        assert_eq!(glucose.document_index, 4);
        assert_eq!(glucose.parameter, Some(Parameter::GlucosaOc));
        assert_eq!(glucose.received_at, None);
    }
}
