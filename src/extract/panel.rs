use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use super::text::fold;
use super::vocabulary::Panel;

const URINALYSIS_MARKERS: &[&str] = &[
    r"ORINA\s+COMPLETA\s*\(Incluye\s*SED\.U\)",
    r"SEDIMENTO\s+URINARIO",
];

const CULTURE_MARKERS: &[&str] = &[
    r"\bCULTIVO\b",
    r"\bUROCULTIVO\b",
    r"\bHEMOCULTIVO\b",
    r"\bANTIBIOGRAMA\b",
    r"\bGRAM\b",
];

const URINALYSIS_KEYWORDS: &[&str] = &[
    "orina",
    "sedimento",
    "nitritos",
    "urobilinogeno",
    "cilindros",
];

const CULTURE_KEYWORDS: &[&str] = &[
    "microorganismo",
    "colonias",
    "ufc",
    "aislamiento",
    "antimicrobiano",
];

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum DetectionStep {
    Markers,
    Keywords,
}

const DETECTION_CHAIN: [DetectionStep; 2] = [DetectionStep::Markers, DetectionStep::Keywords];

#[derive(Debug)]
pub struct PanelDetector {
    markers: Vec<(Panel, Vec<Regex>)>,
}

impl PanelDetector {
    pub fn new() -> Result<Self> {
        let mut markers = Vec::new();
        for (panel, patterns) in [
            (Panel::Urinalysis, URINALYSIS_MARKERS),
            (Panel::Culture, CULTURE_MARKERS),
        ] {
            let compiled = patterns
                .iter()
                .map(|pattern| {
                    Regex::new(&format!("(?i){pattern}"))
                        .with_context(|| format!("failed to compile {panel} marker: {pattern}"))
                })
                .collect::<Result<Vec<Regex>>>()?;
            markers.push((panel, compiled));
        }

        Ok(Self { markers })
    }

    pub fn detect(&self, page_text: &str) -> Panel {
        if page_text.trim().is_empty() {
            return Panel::General;
        }

        DETECTION_CHAIN
            .iter()
            .find_map(|step| match step {
                DetectionStep::Markers => self.detect_by_marker(page_text),
                DetectionStep::Keywords => detect_by_keywords(page_text),
            })
            .unwrap_or_default()
    }

    fn detect_by_marker(&self, page_text: &str) -> Option<Panel> {
        self.markers
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|pattern| pattern.is_match(page_text)))
            .map(|(panel, _)| *panel)
    }
}

fn detect_by_keywords(page_text: &str) -> Option<Panel> {
    let folded = fold(page_text);
    let urinalysis_hits = count_present(&folded, URINALYSIS_KEYWORDS);
    let culture_hits = count_present(&folded, CULTURE_KEYWORDS);

    debug!(urinalysis_hits, culture_hits, "panel keyword heuristics");

    if culture_hits > 0 {
        Some(Panel::Culture)
    } else if urinalysis_hits > 0 {
        Some(Panel::Urinalysis)
    } else {
        None
    }
}

fn count_present(folded: &str, keywords: &[&str]) -> usize {
    keywords
        .iter()
        .filter(|keyword| folded.contains(*keyword))
        .count()
}
