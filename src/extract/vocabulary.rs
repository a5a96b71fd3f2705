use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Clinical section a page of a lab report belongs to.
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Panel {
    #[default]
    General,
    Urinalysis,
    Culture,
}

impl Panel {
    pub const ALL: [Panel; 3] = [Panel::General, Panel::Urinalysis, Panel::Culture];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Urinalysis => "urinalysis",
            Self::Culture => "culture",
        }
    }
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! parameters {
    ($($variant:ident => ($id:literal, $panel:ident)),+ $(,)?) => {
        /// Canonical lab parameter. The declaration order is the column order of the
        /// flowsheet.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
        pub enum Parameter {
            $($variant),+
        }

        impl Parameter {
            pub const ALL: &'static [Parameter] = &[$(Parameter::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Parameter::$variant => $id),+
                }
            }

            pub fn panel(self) -> Panel {
                match self {
                    $(Parameter::$variant => Panel::$panel),+
                }
            }

            pub fn from_id(id: &str) -> Option<Self> {
                match id {
                    $($id => Some(Parameter::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

parameters! {
    Hto => ("hto", General),
    Hb => ("hb", General),
    Vcm => ("vcm", General),
    Hcm => ("hcm", General),
    Leuco => ("leuco", General),
    Neu => ("neu", General),
    Linfocitos => ("linfocitos", General),
    Mono => ("mono", General),
    Eosin => ("eosin", General),
    Basofilos => ("basofilos", General),
    Plaq => ("plaq", General),
    Vhs => ("vhs", General),
    Glucosa => ("glucosa", General),
    Glicada => ("glicada", General),
    Coltotal => ("coltotal", General),
    Hdl => ("hdl", General),
    Ldl => ("ldl", General),
    Tgl => ("tgl", General),
    Bun => ("bun", General),
    Crea => ("crea", General),
    BunCrea => ("buncrea", General),
    Vfg => ("vfg", General),
    Fosforo => ("fosforo", General),
    Magnesio => ("magnesio", General),
    Calcio => ("calcio", General),
    CalcioIon => ("calcioion", General),
    AcUrico => ("acurico", General),
    Got => ("got", General),
    Gpt => ("gpt", General),
    Ggt => ("ggt", General),
    Fa => ("fa", General),
    Bt => ("bt", General),
    Bd => ("bd", General),
    Amilasa => ("amilasa", General),
    Proteinas => ("proteinas", General),
    Albumina => ("albumina", General),
    Pcr => ("pcr", General),
    Lactico => ("lactico", General),
    Ldh => ("ldh", General),
    Ck => ("ck", General),
    CkMb => ("ckmb", General),
    Tropo => ("tropo", General),
    VitD => ("vitd", General),
    VitB => ("vitb", General),
    Sodio => ("sodio", General),
    Potasio => ("potasio", General),
    Cloro => ("cloro", General),
    Ph => ("ph", General),
    PCo2 => ("pcodos", General),
    PO2 => ("podos", General),
    Bicarb => ("bicarb", General),
    Base => ("base", General),
    Tp => ("tp", General),
    Inr => ("inr", General),
    Ttpk => ("ttpk", General),
    ColorOc => ("coloroc", Urinalysis),
    AspectoOc => ("aspectooc", Urinalysis),
    DensOc => ("densoc", Urinalysis),
    PhOc => ("phoc", Urinalysis),
    NitritosOc => ("nitritosoc", Urinalysis),
    ProtOc => ("protoc", Urinalysis),
    CetonasOc => ("cetonasoc", Urinalysis),
    GlucosaOc => ("glucosaoc", Urinalysis),
    UrobilOc => ("urobiloc", Urinalysis),
    BiliOc => ("bilioc", Urinalysis),
    MucusOc => ("mucusoc", Urinalysis),
    LeucosOc => ("leucosoc", Urinalysis),
    GrOc => ("groc", Urinalysis),
    BactOc => ("bactoc", Urinalysis),
    HialOc => ("hialoc", Urinalysis),
    GranulOc => ("granuloc", Urinalysis),
    EpitelOc => ("epiteloc", Urinalysis),
    CristalOc => ("cristaloc", Urinalysis),
    LevadOc => ("levadoc", Urinalysis),
    FechaCul => ("fechacul", Culture),
    HoraCul => ("horacul", Culture),
    FechaPosCul => ("fechaposcul", Culture),
    HoraPosCul => ("horaposcul", Culture),
    Muestra => ("muestra", Culture),
    Gram => ("gram", Culture),
    Agente => ("agente", Culture),
    Atb => ("ATB", Culture),
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Parameter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Parameter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = String::deserialize(deserializer)?;
        Parameter::from_id(&id)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown parameter id: {id}")))
    }
}
