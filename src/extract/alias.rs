use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::text::fold;
use super::vocabulary::{Panel, Parameter};

/// How an alias pattern is compared against a printed label.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// Case-insensitive regex that must cover the whole trimmed label.
    Anchored,
    /// Accent-free lower-case stem that only has to occur inside the label.
    Substring,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasRule {
    pub panel: Panel,
    pub kind: RuleKind,
    pub pattern: String,
    pub target: Parameter,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    pub rules: Vec<AliasRule>,
}

const GENERAL_ANCHORED: &[(&str, Parameter)] = &[
    ("HEMATOCRITO", Parameter::Hto),
    ("HEMOGLOBINA", Parameter::Hb),
    ("VCM", Parameter::Vcm),
    ("HCM", Parameter::Hcm),
    ("RCTO DE LEUCOCITOS", Parameter::Leuco),
    ("NEUTR[ÓO]FILOS", Parameter::Neu),
    ("LINFOCITOS", Parameter::Linfocitos),
    ("MONOCITOS", Parameter::Mono),
    ("EOSIN[ÓO]FILOS", Parameter::Eosin),
    ("BAS[ÓO]FILOS", Parameter::Basofilos),
    ("RCTO DE PLAQUETAS", Parameter::Plaq),
    ("VHS", Parameter::Vhs),
    ("GLUCOSA", Parameter::Glucosa),
    ("HEMOGLOBINA GLICOSILADA %?", Parameter::Glicada),
    ("COLESTEROL TOTAL", Parameter::Coltotal),
    ("COLESTEROL HDL", Parameter::Hdl),
    ("COLESTEROL LDL", Parameter::Ldl),
    ("TRIGLIC[ÉE]RIDOS", Parameter::Tgl),
    ("BUN", Parameter::Bun),
    ("CREATININA", Parameter::Crea),
    ("BUN ?/ ?CREATININA", Parameter::BunCrea),
    ("VFG.*", Parameter::Vfg),
    ("F[ÓO]SFORO", Parameter::Fosforo),
    ("MAGNESIO", Parameter::Magnesio),
    ("CALCIO", Parameter::Calcio),
    ("CALCIO I[ÓO]NICO", Parameter::CalcioIon),
    ("[ÁA]CIDO [ÚU]RICO", Parameter::AcUrico),
    ("GOT", Parameter::Got),
    ("GPT", Parameter::Gpt),
    ("GGT", Parameter::Ggt),
    ("FOSFATASA ALCALINA", Parameter::Fa),
    ("BILIRRUBINA TOTAL", Parameter::Bt),
    ("BILIRRUBINA DIRECTA", Parameter::Bd),
    ("AMILASA", Parameter::Amilasa),
    ("PROTE[ÍI]NAS TOTALES", Parameter::Proteinas),
    ("ALB[ÚU]MINA", Parameter::Albumina),
    ("PROTE[ÍI]NA C REACTIVA", Parameter::Pcr),
    ("[ÁA]CIDO L[ÁA]CTICO", Parameter::Lactico),
    ("LDH", Parameter::Ldh),
    ("CREATINKINASA TOTAL", Parameter::Ck),
    ("CREATINKINASA MB", Parameter::CkMb),
    ("TROPONINA T.*", Parameter::Tropo),
    ("NIVELES VITAMINA D", Parameter::VitD),
    ("NIVELES VITAMINA B12", Parameter::VitB),
    ("SODIO", Parameter::Sodio),
    ("POTASIO", Parameter::Potasio),
    ("CLORO", Parameter::Cloro),
    ("PH", Parameter::Ph),
    ("P CO2", Parameter::PCo2),
    ("P O2", Parameter::PO2),
    ("HCO3", Parameter::Bicarb),
    ("EBVT", Parameter::Base),
    ("PORCENTAJE", Parameter::Tp),
    ("INR", Parameter::Inr),
    ("TTPA", Parameter::Ttpk),
];

const URINALYSIS_ANCHORED: &[(&str, Parameter)] = &[
    ("COLOR", Parameter::ColorOc),
    ("ASPECTO", Parameter::AspectoOc),
    ("DENSIDAD", Parameter::DensOc),
    ("PH", Parameter::PhOc),
    ("NITRITOS", Parameter::NitritosOc),
    ("PROTE[IÍ]NAS?", Parameter::ProtOc),
    ("CETONAS", Parameter::CetonasOc),
    ("GLUCOSA", Parameter::GlucosaOc),
    ("UROBILIN[ÓO]GENO", Parameter::UrobilOc),
    ("BILIRRUBINA", Parameter::BiliOc),
    ("MUCUS", Parameter::MucusOc),
    ("LEUCOCITOS", Parameter::LeucosOc),
    ("GL[ÓO]BULOS ROJOS|ERITROCITOS", Parameter::GrOc),
    ("BACTERIAS", Parameter::BactOc),
    ("CILINDROS HIALINOS", Parameter::HialOc),
    ("CILINDROS GRANULOSOS", Parameter::GranulOc),
    ("C[EÉ]LULAS EPITELIALES", Parameter::EpitelOc),
    ("CRISTALES", Parameter::CristalOc),
    ("LEVADURAS", Parameter::LevadOc),
];

const CULTURE_ANCHORED: &[(&str, Parameter)] = &[
    ("TINCI[ÓO]N DE GRAM", Parameter::Gram),
    ("ANTIBIOGRAMA", Parameter::Atb),
    ("MICROORGANISMO", Parameter::Agente),
    ("MUESTRA:?", Parameter::Muestra),
];

// Ordered: more specific stems precede the stems they contain.
const GENERAL_SUBSTRING: &[(&str, Parameter)] = &[
    ("hematocrito", Parameter::Hto),
    ("glicosilada", Parameter::Glicada),
    ("glicada", Parameter::Glicada),
    ("corpuscular media", Parameter::Hcm),
    ("volumen corpuscular", Parameter::Vcm),
    ("hemoglobina", Parameter::Hb),
    ("leucocitos", Parameter::Leuco),
    ("neutrofilo", Parameter::Neu),
    ("linfocito", Parameter::Linfocitos),
    ("monocito", Parameter::Mono),
    ("eosinofilo", Parameter::Eosin),
    ("basofilo", Parameter::Basofilos),
    ("plaquetas", Parameter::Plaq),
    ("sedimentacion", Parameter::Vhs),
    ("glicemia", Parameter::Glucosa),
    ("glucosa", Parameter::Glucosa),
    ("hdl", Parameter::Hdl),
    ("ldl", Parameter::Ldl),
    ("colesterol", Parameter::Coltotal),
    ("triglic", Parameter::Tgl),
    ("bun/crea", Parameter::BunCrea),
    ("nitrogeno ureico", Parameter::Bun),
    ("filtracion glomerular", Parameter::Vfg),
    ("creatinkinasa mb", Parameter::CkMb),
    ("ck-mb", Parameter::CkMb),
    ("creatinkinasa", Parameter::Ck),
    ("creatinina", Parameter::Crea),
    ("fosfatasa", Parameter::Fa),
    ("fosforo", Parameter::Fosforo),
    ("magnesio", Parameter::Magnesio),
    ("calcio i", Parameter::CalcioIon),
    ("calcio", Parameter::Calcio),
    ("acido urico", Parameter::AcUrico),
    ("oxalacetica", Parameter::Got),
    ("piruvica", Parameter::Gpt),
    ("glutamil", Parameter::Ggt),
    ("bilirrubina total", Parameter::Bt),
    ("bilirrubina directa", Parameter::Bd),
    ("amilasa", Parameter::Amilasa),
    ("proteina c", Parameter::Pcr),
    ("proteinas totales", Parameter::Proteinas),
    ("albumina", Parameter::Albumina),
    ("lactico", Parameter::Lactico),
    ("lactato", Parameter::Lactico),
    ("deshidrogenasa", Parameter::Ldh),
    ("troponina", Parameter::Tropo),
    ("vitamina d", Parameter::VitD),
    ("b12", Parameter::VitB),
    ("sodio", Parameter::Sodio),
    ("potasio", Parameter::Potasio),
    ("cloro", Parameter::Cloro),
    ("pco2", Parameter::PCo2),
    ("po2", Parameter::PO2),
    ("bicarbonato", Parameter::Bicarb),
    ("exceso de base", Parameter::Base),
    ("protrombina", Parameter::Tp),
    ("tromboplastina", Parameter::Ttpk),
];

const URINALYSIS_SUBSTRING: &[(&str, Parameter)] = &[
    ("color", Parameter::ColorOc),
    ("aspecto", Parameter::AspectoOc),
    ("densidad", Parameter::DensOc),
    ("nitrito", Parameter::NitritosOc),
    ("cetona", Parameter::CetonasOc),
    ("urobilin", Parameter::UrobilOc),
    ("bilirrubina", Parameter::BiliOc),
    ("mucus", Parameter::MucusOc),
    ("leucocito", Parameter::LeucosOc),
    ("globulos rojos", Parameter::GrOc),
    ("eritrocito", Parameter::GrOc),
    ("hematies", Parameter::GrOc),
    ("bacteria", Parameter::BactOc),
    ("hialino", Parameter::HialOc),
    ("granuloso", Parameter::GranulOc),
    ("epitel", Parameter::EpitelOc),
    ("cristal", Parameter::CristalOc),
    ("levadura", Parameter::LevadOc),
    ("proteina", Parameter::ProtOc),
    ("glucosa", Parameter::GlucosaOc),
];

const CULTURE_SUBSTRING: &[(&str, Parameter)] = &[
    ("antibiograma", Parameter::Atb),
    ("gram", Parameter::Gram),
    ("microorganismo", Parameter::Agente),
    ("agente", Parameter::Agente),
    // Bare "muestra" would also claim collection and receipt date labels.
    ("tipo de muestra", Parameter::Muestra),
];

impl RuleSet {
    pub fn builtin() -> Self {
        let tables = [
            (Panel::General, RuleKind::Anchored, GENERAL_ANCHORED),
            (Panel::Urinalysis, RuleKind::Anchored, URINALYSIS_ANCHORED),
            (Panel::Culture, RuleKind::Anchored, CULTURE_ANCHORED),
            (Panel::General, RuleKind::Substring, GENERAL_SUBSTRING),
            (Panel::Urinalysis, RuleKind::Substring, URINALYSIS_SUBSTRING),
            (Panel::Culture, RuleKind::Substring, CULTURE_SUBSTRING),
        ];

        let rules = tables
            .into_iter()
            .flat_map(|(panel, kind, entries)| {
                entries.iter().map(move |(pattern, target)| AliasRule {
                    panel,
                    kind,
                    pattern: (*pattern).to_string(),
                    target: *target,
                })
            })
            .collect();

        Self { rules }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let rule_set: RuleSet = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse alias rules {}", path.display()))?;

        info!(
            path = %path.display(),
            rules = rule_set.rules.len(),
            "loaded alias extension rules"
        );

        Ok(rule_set)
    }

    /// Places `extension` ahead of the current rules so site-specific labels win.
    pub fn extended_with(self, extension: RuleSet) -> Self {
        let mut rules = extension.rules;
        rules.extend(self.rules);
        Self { rules }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum ResolutionStep {
    PanelAnchored,
    GeneralAnchored,
    PanelSubstring,
}

const RESOLUTION_CHAIN: [ResolutionStep; 3] = [
    ResolutionStep::PanelAnchored,
    ResolutionStep::GeneralAnchored,
    ResolutionStep::PanelSubstring,
];

#[derive(Debug, Default)]
struct CompiledTable {
    anchored: Vec<(Regex, Parameter)>,
    substring: Vec<(String, Parameter)>,
}

#[derive(Debug)]
pub struct AliasResolver {
    tables: HashMap<Panel, CompiledTable>,
}

impl AliasResolver {
    pub fn new(rule_set: &RuleSet) -> Result<Self> {
        let mut tables: HashMap<Panel, CompiledTable> = Panel::ALL
            .iter()
            .map(|panel| (*panel, CompiledTable::default()))
            .collect();

        for rule in &rule_set.rules {
            if rule.target.panel() != rule.panel {
                warn!(
                    pattern = %rule.pattern,
                    panel = %rule.panel,
                    parameter = %rule.target,
                    "alias rule targets a parameter owned by another panel"
                );
            }

            let table = tables.entry(rule.panel).or_default();
            match rule.kind {
                RuleKind::Anchored => {
                    let regex = Regex::new(&format!("(?i)^(?:{})$", rule.pattern))
                        .with_context(|| {
                            format!(
                                "failed to compile {} alias pattern: {}",
                                rule.panel, rule.pattern
                            )
                        })?;
                    table.anchored.push((regex, rule.target));
                }
                RuleKind::Substring => {
                    let stem = fold(rule.pattern.trim());
                    if stem.is_empty() {
                        warn!(parameter = %rule.target, "skipping empty substring alias");
                        continue;
                    }
                    table.substring.push((stem, rule.target));
                }
            }
        }

        Ok(Self { tables })
    }

    pub fn resolve(&self, label: &str, panel: Panel) -> Option<Parameter> {
        let trimmed = label.trim();
        if trimmed.is_empty() {
            return None;
        }

        RESOLUTION_CHAIN.iter().find_map(|step| match step {
            ResolutionStep::PanelAnchored => self.match_anchored(panel, trimmed),
            ResolutionStep::GeneralAnchored if panel != Panel::General => {
                self.match_anchored(Panel::General, trimmed)
            }
            ResolutionStep::GeneralAnchored => None,
            ResolutionStep::PanelSubstring => self.match_substring(panel, trimmed),
        })
    }

    fn match_anchored(&self, panel: Panel, label: &str) -> Option<Parameter> {
        self.tables
            .get(&panel)?
            .anchored
            .iter()
            .find(|(regex, _)| regex.is_match(label))
            .map(|(_, target)| *target)
    }

    fn match_substring(&self, panel: Panel, label: &str) -> Option<Parameter> {
        let folded = fold(label);
        self.tables
            .get(&panel)?
            .substring
            .iter()
            .find(|(stem, _)| folded.contains(stem.as_str()))
            .map(|(_, target)| *target)
    }
}
