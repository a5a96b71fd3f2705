use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;
use tracing::{info, warn};

use super::rows::{DATE_FORMAT, RawRow, TIME_FORMAT};
use super::vocabulary::Parameter;

/// Number of time slots in the flowsheet template.
pub const MAX_BATCHES: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub slot: usize,
    pub received_at: NaiveDateTime,
    pub parameter_count: usize,
    pub row_count: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Flowsheet {
    /// `fecha_{slot}`, `hora_{slot}` and `{parameter}_{slot}` for every slot.
    pub mapping: BTreeMap<String, String>,
    pub batches: Vec<BatchSummary>,
    pub dropped_batches: Vec<NaiveDateTime>,
    pub unrecognized_labels: BTreeSet<String>,
    pub rows_without_timestamp: usize,
}

#[derive(Debug, Default)]
struct Batch {
    values: HashMap<Parameter, String>,
    row_count: usize,
}

/// Groups rows into receipt-time batches and lays the earliest ones out into the
/// fixed-slot mapping. Later rows overwrite earlier ones for the same parameter.
pub fn build_flowsheet(rows: &[RawRow]) -> Flowsheet {
    let mut batches: BTreeMap<NaiveDateTime, Batch> = BTreeMap::new();
    let mut unrecognized_labels = BTreeSet::new();
    let mut rows_without_timestamp = 0usize;

    for row in rows {
        let Some(received_at) = row.received_at else {
            rows_without_timestamp += 1;
            continue;
        };

        let batch = batches.entry(truncate_to_minute(received_at)).or_default();
        batch.row_count += 1;
        match row.parameter {
            Some(parameter) => {
                batch.values.insert(parameter, row.value.clone());
            }
            None => {
                unrecognized_labels.insert(row.label.clone());
            }
        }
    }

    let total_batches = batches.len();
    let mut ordered = batches.into_iter();
    let kept = ordered.by_ref().take(MAX_BATCHES).collect::<Vec<_>>();
    let dropped_batches = ordered.map(|(received_at, _)| received_at).collect::<Vec<_>>();

    if !dropped_batches.is_empty() {
        warn!(
            total = total_batches,
            dropped = dropped_batches.len(),
            "more receipt batches than flowsheet slots; keeping the earliest"
        );
    }

    let mut mapping = BTreeMap::new();
    let mut summaries = Vec::with_capacity(kept.len());
    for slot in 1..=MAX_BATCHES {
        match kept.get(slot - 1) {
            Some((received_at, batch)) => {
                fill_slot(&mut mapping, slot, Some((received_at, batch)));
                summaries.push(BatchSummary {
                    slot,
                    received_at: *received_at,
                    parameter_count: batch.values.len(),
                    row_count: batch.row_count,
                });
            }
            None => fill_slot(&mut mapping, slot, None),
        }
    }

    info!(
        batches = summaries.len(),
        unrecognized = unrecognized_labels.len(),
        rows_without_timestamp,
        "built flowsheet mapping"
    );

    Flowsheet {
        mapping,
        batches: summaries,
        dropped_batches,
        unrecognized_labels,
        rows_without_timestamp,
    }
}

fn fill_slot(
    mapping: &mut BTreeMap<String, String>,
    slot: usize,
    batch: Option<(&NaiveDateTime, &Batch)>,
) {
    let (date, time) = match batch {
        Some((received_at, _)) => (
            received_at.format(DATE_FORMAT).to_string(),
            received_at.format(TIME_FORMAT).to_string(),
        ),
        None => (String::new(), String::new()),
    };
    mapping.insert(format!("fecha_{slot}"), date);
    mapping.insert(format!("hora_{slot}"), time);

    for parameter in Parameter::ALL {
        let value = batch
            .and_then(|(_, batch)| batch.values.get(parameter))
            .cloned()
            .unwrap_or_default();
        mapping.insert(format!("{}_{slot}", parameter.as_str()), value);
    }
}

fn truncate_to_minute(timestamp: NaiveDateTime) -> NaiveDateTime {
    timestamp
        .with_second(0)
        .and_then(|value| value.with_nanosecond(0))
        .unwrap_or(timestamp)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::extract::vocabulary::Panel;

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
            .expect("valid test timestamp")
    }

    fn row(
        parameter: Option<Parameter>,
        label: &str,
        value: &str,
        received_at: Option<NaiveDateTime>,
    ) -> RawRow {
        RawRow {
            document_index: 0,
            page_index: 0,
            label: label.to_string(),
            value: value.to_string(),
            parameter,
            panel: Panel::General,
            received_at,
        }
    }

    #[test]
    fn later_rows_overwrite_earlier_ones_in_a_batch() {
        let rows = vec![
            row(Some(Parameter::Hb), "HEMOGLOBINA", "13.0", Some(at(1, 8, 0))),
            row(Some(Parameter::Hb), "Hemoglobina", "13.2", Some(at(1, 8, 0))),
        ];
        let flowsheet = build_flowsheet(&rows);
        assert_eq!(flowsheet.mapping["hb_1"], "13.2");
        assert_eq!(flowsheet.batches.len(), 1);
        assert_eq!(flowsheet.batches[0].row_count, 2);
        assert_eq!(flowsheet.batches[0].parameter_count, 1);
    }

    #[test]
    fn only_the_eight_earliest_batches_are_kept() {
        let rows = (1..=10)
            .rev()
            .map(|day| {
                let value = day.to_string();
                row(Some(Parameter::Hto), "HEMATOCRITO", &value, Some(at(day, 9, 0)))
            })
            .collect::<Vec<_>>();
        let flowsheet = build_flowsheet(&rows);

        assert_eq!(flowsheet.batches.len(), MAX_BATCHES);
        assert_eq!(flowsheet.dropped_batches, vec![at(9, 9, 0), at(10, 9, 0)]);
        for slot in 1..=MAX_BATCHES {
            assert_eq!(flowsheet.mapping[&format!("hto_{slot}")], slot.to_string());
            assert_eq!(
                flowsheet.mapping[&format!("fecha_{slot}")],
                format!("{slot:02}/01/2024")
            );
            assert_eq!(flowsheet.mapping[&format!("hora_{slot}")], "09:00");
        }
        assert!(!flowsheet.mapping.contains_key("hto_9"));
    }

    #[test]
    fn mapping_always_has_every_key_for_eight_slots() {
        let flowsheet = build_flowsheet(&[]);
        assert_eq!(flowsheet.mapping.len(), MAX_BATCHES * (Parameter::ALL.len() + 2));
        assert!(flowsheet.mapping.values().all(String::is_empty));
        assert!(flowsheet.batches.is_empty());
        assert!(flowsheet.mapping.contains_key("ATB_8"));
    }

    #[test]
    fn rows_without_timestamp_are_excluded() {
        let rows = vec![
            row(Some(Parameter::Hto), "HEMATOCRITO", "40", None),
            row(None, "Paciente", "Juan", None),
        ];
        let flowsheet = build_flowsheet(&rows);
        assert_eq!(flowsheet.rows_without_timestamp, 2);
        assert!(flowsheet.batches.is_empty());
        assert!(flowsheet.unrecognized_labels.is_empty());
        assert_eq!(flowsheet.mapping["hto_1"], "");
    }

    #[test]
    fn unrecognized_labels_are_collected_not_mapped() {
        let rows = vec![
            row(None, "Médico tratante", "Dr. Pérez", Some(at(2, 7, 30))),
            row(None, "Médico tratante", "Dr. Pérez", Some(at(2, 7, 30))),
        ];
        let flowsheet = build_flowsheet(&rows);
        assert_eq!(flowsheet.unrecognized_labels.len(), 1);
        assert!(flowsheet.unrecognized_labels.contains("Médico tratante"));
        // The batch still claims a slot even though nothing in it resolved.
        assert_eq!(flowsheet.mapping["fecha_1"], "02/01/2024");
        assert_eq!(flowsheet.mapping["hora_1"], "07:30");
        assert_eq!(flowsheet.batches[0].parameter_count, 0);
    }

    #[test]
    fn seconds_do_not_split_batches() {
        let with_seconds = at(3, 10, 15).with_second(42).expect("valid second");
        let rows = vec![
            row(Some(Parameter::Sodio), "SODIO", "140", Some(at(3, 10, 15))),
            row(Some(Parameter::Potasio), "POTASIO", "4.1", Some(with_seconds)),
        ];
        let flowsheet = build_flowsheet(&rows);
        assert_eq!(flowsheet.batches.len(), 1);
        assert_eq!(flowsheet.mapping["sodio_1"], "140");
        assert_eq!(flowsheet.mapping["potasio_1"], "4.1");
    }
}
