use async_trait::async_trait;
use serde::Deserialize;

use crate::types::{AnalysisRecord, CheckInput, PetProfile, Species, Verdict};
use crate::units::{Language, UnitSystem};

/// Pet profile persistence. Reads degrade to an empty list on storage
/// failure; writes propagate errors and callers must not assume a failed
/// write succeeded.
#[async_trait]
pub trait PetStore: Send + Sync {
    async fn list_pets(&self) -> Vec<PetProfile>;

    /// Full replace-by-id. Returns the refreshed full list for caller
    /// convenience.
    async fn upsert_pet(&self, pet: &PetProfile) -> anyhow::Result<Vec<PetProfile>>;

    async fn delete_pet(&self, id: &str) -> anyhow::Result<Vec<PetProfile>>;
}

/// Analysis record persistence. Records are append-only in practice; an id
/// collision replaces. Listing is always newest-first.
#[async_trait]
pub trait CheckStore: Send + Sync {
    async fn list_checks(&self) -> Vec<AnalysisRecord>;

    async fn upsert_check(&self, check: &AnalysisRecord) -> anyhow::Result<Vec<AnalysisRecord>>;
}

/// Scalar settings: onboarding flag, entitlement flag, and the free-credit
/// counter.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn has_onboarded(&self) -> anyhow::Result<bool>;

    /// Sets the onboarded flag and seeds the free-credit counter, but only
    /// if the counter has never been written — completing onboarding twice
    /// never re-grants credits.
    async fn complete_onboarding(&self) -> anyhow::Result<()>;

    async fn is_entitled(&self) -> anyhow::Result<bool>;

    /// Flips entitlement permanently true. Never reverts in this design.
    async fn set_entitled(&self) -> anyhow::Result<()>;

    async fn free_credits(&self) -> anyhow::Result<u32>;

    /// Decrement the credit counter by one, floored at zero. Atomic as a
    /// single statement, so a concurrent writer cannot lose an update.
    async fn spend_credit(&self) -> anyhow::Result<()>;

    /// Wipe both collections and all settings. The store afterwards is
    /// indistinguishable from a fresh install.
    async fn clear_all(&self) -> anyhow::Result<()>;
}

/// Facade over the focused store traits, so call sites can hold one
/// `Arc<dyn StateStore>`.
pub trait StateStore: Send + Sync + PetStore + CheckStore + SettingsStore {}

impl<T> StateStore for T where T: Send + Sync + PetStore + CheckStore + SettingsStore {}

/// Structured output of the pet-classification call. Deliberately lenient:
/// every field is optional at the wire level, and the profile builder applies
/// a strict `is_animal == Some(true)` acceptance check on top — a missing
/// flag is "no", never "maybe yes".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetClassification {
    #[serde(default)]
    pub is_animal: Option<bool>,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(default)]
    pub visual_description: Option<String>,
}

/// Everything the analysis call needs. Allergy and condition lists are
/// carried verbatim — they are the basis for the DANGEROUS-vs-SAFE
/// distinction and must reach the model as literal strings. Language and
/// unit system are presentation hints only.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub pet_name: String,
    pub species: Species,
    pub breed: Option<String>,
    pub age: f64,
    pub weight_kg: f64,
    pub allergies: Vec<String>,
    pub conditions: Vec<String>,
    pub language: Language,
    pub units: UnitSystem,
    pub input: CheckInput,
}

/// Reasoning/generation service boundary. Retry policy, rate limits and
/// authentication are the implementation's concern.
#[async_trait]
pub trait ModelService: Send + Sync {
    /// Classify the subject of a photo. Errors are network/parse failures;
    /// a non-animal photo is a successful classification with
    /// `is_animal != Some(true)`.
    async fn classify_pet(&self, image: &[u8]) -> anyhow::Result<PetClassification>;

    /// Best-effort portrait synthesis. `Ok(None)` means the call succeeded
    /// but returned no image payload.
    async fn generate_portrait(&self, prompt: &str) -> anyhow::Result<Option<Vec<u8>>>;

    /// Run the safety analysis and return a fully validated verdict.
    async fn analyze_food(&self, request: &AnalysisRequest) -> anyhow::Result<Verdict>;
}

/// Result contract of the purchase rail. Implementations fold their own
/// transport failures into `NetworkFailure`/`Other`; the contract is total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseOutcome {
    Completed,
    Cancelled,
    NetworkFailure,
    Other,
}

/// Entitlement/purchase boundary. Idempotent from this core's point of view:
/// success grants entitlement, anything else changes nothing.
#[async_trait]
pub trait EntitlementBackend: Send + Sync {
    async fn purchase(&self, plan_id: &str) -> PurchaseOutcome;

    /// Attempt to restore prior purchases. `true` means a valid prior
    /// purchase was found.
    async fn restore(&self) -> bool;
}
