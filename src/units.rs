//! Display language and unit preferences. These are presentation hints that
//! reach the model as prompt context; persisted values stay canonical
//! (kilograms, years) no matter what is configured here.

use serde::Deserialize;

pub const LBS_PER_KG: f64 = 2.20462;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    En,
    De,
    Es,
    Tr,
}

impl Language {
    /// Name used when instructing the model which language to answer in.
    pub fn prompt_name(self) -> &'static str {
        match self {
            Language::En => "English",
            Language::De => "German",
            Language::Es => "Spanish",
            Language::Tr => "Turkish",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    /// Portion-unit instruction for the analysis prompt.
    pub fn portion_hint(self) -> &'static str {
        match self {
            UnitSystem::Metric => "Metric (kg, g)",
            UnitSystem::Imperial => "Imperial (lbs, oz)",
        }
    }

    pub fn weight_label(self) -> &'static str {
        match self {
            UnitSystem::Metric => "kg",
            UnitSystem::Imperial => "lbs",
        }
    }

    /// Canonical kilograms → display value.
    pub fn display_weight(self, kg: f64) -> f64 {
        match self {
            UnitSystem::Metric => kg,
            UnitSystem::Imperial => kg * LBS_PER_KG,
        }
    }

    /// User-entered display value → canonical kilograms.
    pub fn weight_to_kg(self, value: f64) -> f64 {
        match self {
            UnitSystem::Metric => value,
            UnitSystem::Imperial => value / LBS_PER_KG,
        }
    }
}
