use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed species set. Determined by the classification call at profile
/// creation, never chosen or edited by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Species {
    Dog,
    Cat,
    #[default]
    Other,
}

impl Species {
    /// Map a free-form label from the model onto the closed set.
    /// Anything unrecognized collapses to `Other`.
    pub fn from_label(label: &str) -> Self {
        match label {
            "Dog" => Species::Dog,
            "Cat" => Species::Cat,
            _ => Species::Other,
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Species::Dog => "Dog",
            Species::Cat => "Cat",
            Species::Other => "Other",
        };
        write!(f, "{}", s)
    }
}

/// A pet profile. Weight is always stored in kilograms and age in years;
/// imperial display is a read-time transform in `units`, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PetProfile {
    pub id: String,
    pub name: String,
    pub species: Species,
    pub breed: Option<String>,
    pub age: f64,
    pub weight_kg: f64,
    pub notes: Option<String>,
    /// The photo the user supplied at creation (encoded image bytes).
    pub original_image: Option<Vec<u8>>,
    /// AI-generated portrait, if the best-effort generation call produced one.
    pub portrait: Option<Vec<u8>>,
    pub allergies: Vec<String>,
    pub conditions: Vec<String>,
}

/// Closed risk set for a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Safe,
    Caution,
    Dangerous,
    Unknown,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Safe => "SAFE",
            RiskLevel::Caution => "CAUTION",
            RiskLevel::Dangerous => "DANGEROUS",
            RiskLevel::Unknown => "UNKNOWN",
        };
        write!(f, "{}", s)
    }
}

/// Structured safety verdict, deserialized straight from the model's JSON
/// output. `can_eat` and `risk_level` are always produced by the same call;
/// a response missing any non-optional field fails deserialization and is
/// treated as a service error by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub detected_food_name: String,
    pub can_eat: bool,
    pub risk_level: RiskLevel,
    pub short_summary: String,
    pub detailed_explanation: String,
    #[serde(default)]
    pub max_portion_grams: Option<f64>,
    #[serde(default)]
    pub emergency_warning: Option<String>,
    pub disclaimer: String,
}

/// One completed food-safety check. Immutable once created; `pet_id` is a
/// reference, not ownership — the pet may be deleted independently.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRecord {
    pub id: String,
    pub pet_id: String,
    pub food_name: String,
    pub created_at: DateTime<Utc>,
    pub verdict: Verdict,
    /// Photo the check was run against, when the input was an image.
    pub image: Option<Vec<u8>>,
    /// Resolved product label, when the input came from a barcode scan.
    pub barcode: Option<String>,
}

/// What the user handed the orchestrator: a food photo, or a product name
/// already resolved by the barcode-scanner layer.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckInput {
    Image(Vec<u8>),
    Lookup(String),
}
