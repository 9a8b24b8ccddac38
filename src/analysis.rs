//! Analysis orchestration: gate, ask the model, validate, persist, debit —
//! in that order. The gate is re-checked from current settings immediately
//! before the call, and a saved record is never rolled back by a failed
//! debit (credits are advisory, not a hard ledger).

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::entitlement::{BlockReason, EntitlementGate, GateDecision};
use crate::providers::ProviderError;
use crate::traits::{AnalysisRequest, ModelService, StateStore};
use crate::types::{AnalysisRecord, CheckInput, PetProfile};
use crate::units::{Language, UnitSystem};

const UNKNOWN_FOOD: &str = "Unknown food";

#[derive(Debug)]
pub enum AnalyzeError {
    /// Resolved only by the entitlement flow (upgrade/purchase), never by
    /// retrying the same action.
    Blocked(BlockReason),
    /// Network/parse/storage failure; nothing was persisted and no credit
    /// consumed unless the record itself was already saved.
    Service(anyhow::Error),
}

impl fmt::Display for AnalyzeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyzeError::Blocked(reason) => write!(f, "analysis blocked: {:?}", reason),
            AnalyzeError::Service(e) => write!(f, "analysis service error: {}", e),
        }
    }
}

impl std::error::Error for AnalyzeError {}

impl AnalyzeError {
    pub fn user_message(&self) -> String {
        match self {
            AnalyzeError::Blocked(_) => String::new(),
            AnalyzeError::Service(e) => {
                if let Some(pe) = e.downcast_ref::<ProviderError>() {
                    pe.user_message()
                } else {
                    "The analysis failed. Please try again.".to_string()
                }
            }
        }
    }
}

pub struct AnalysisOrchestrator {
    store: Arc<dyn StateStore>,
    model: Arc<dyn ModelService>,
    gate: EntitlementGate,
    language: Language,
    units: UnitSystem,
}

impl AnalysisOrchestrator {
    pub fn new(
        store: Arc<dyn StateStore>,
        model: Arc<dyn ModelService>,
        gate: EntitlementGate,
        language: Language,
        units: UnitSystem,
    ) -> Self {
        Self {
            store,
            model,
            gate,
            language,
            units,
        }
    }

    pub async fn analyze(
        &self,
        pet: &PetProfile,
        input: CheckInput,
    ) -> Result<AnalysisRecord, AnalyzeError> {
        // Fresh gate check — credits/entitlement may have changed since the
        // screen was rendered. A blocked call makes no network request.
        match self
            .gate
            .check_run_analysis()
            .await
            .map_err(AnalyzeError::Service)?
        {
            GateDecision::Blocked(reason) => return Err(AnalyzeError::Blocked(reason)),
            GateDecision::Allowed => {}
        }

        let request = AnalysisRequest {
            pet_name: pet.name.clone(),
            species: pet.species,
            breed: pet.breed.clone(),
            age: pet.age,
            weight_kg: pet.weight_kg,
            allergies: pet.allergies.clone(),
            conditions: pet.conditions.clone(),
            language: self.language,
            units: self.units,
            input: input.clone(),
        };

        let verdict = self.model.analyze_food(&request).await.map_err(|e| {
            if let Some(pe) = e.downcast_ref::<ProviderError>() {
                warn!(
                    kind = ?pe.kind,
                    status = ?pe.status,
                    retryable = pe.is_retryable(),
                    "food analysis call failed"
                );
            } else {
                warn!(error = %e, "food analysis call failed");
            }
            AnalyzeError::Service(e)
        })?;

        let food_name = if verdict.detected_food_name.is_empty() {
            UNKNOWN_FOOD.to_string()
        } else {
            verdict.detected_food_name.clone()
        };

        let record = AnalysisRecord {
            id: uuid::Uuid::new_v4().to_string(),
            pet_id: pet.id.clone(),
            food_name,
            created_at: Utc::now(),
            verdict,
            image: match &input {
                CheckInput::Image(bytes) => Some(bytes.clone()),
                CheckInput::Lookup(_) => None,
            },
            barcode: match &input {
                CheckInput::Lookup(label) => Some(label.clone()),
                CheckInput::Image(_) => None,
            },
        };

        self.store
            .upsert_check(&record)
            .await
            .map_err(AnalyzeError::Service)?;

        info!(
            check_id = %record.id,
            pet_id = %record.pet_id,
            risk = %record.verdict.risk_level,
            "analysis saved"
        );

        // Persist first, debit second. A failed debit is logged but never
        // rolls back the saved record.
        if let Err(e) = self.gate.on_analysis_succeeded().await {
            warn!(error = %e, check_id = %record.id, "credit debit failed after saving check");
        }

        Ok(record)
    }
}
