use serde::{Deserialize, Serialize};

/// Language of the placeholder values written into missing categorical fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Pt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentinels {
    pub state: &'static str,
    pub city: &'static str,
    pub health_region_name: &'static str,
    pub health_region_code: i64,
    pub area_classification: &'static str,
    /// Macro-region label for states outside the five regions. Only used by the report.
    pub region: &'static str,
}

const ENGLISH: Sentinels = Sentinels {
    state: "BR",
    city: "Not informed",
    health_region_name: "Unknown",
    health_region_code: -1,
    area_classification: "Unknown",
    region: "Unknown",
};

const PORTUGUESE: Sentinels = Sentinels {
    state: "BR",
    city: "Não informado",
    health_region_name: "Desconhecido",
    health_region_code: -1,
    area_classification: "Desconhecido",
    region: "Desconhecida",
};

impl Locale {
    pub fn sentinels(&self) -> &'static Sentinels {
        match self {
            Locale::En => &ENGLISH,
            Locale::Pt => &PORTUGUESE,
        }
    }
}
