//! Shared test fixtures: a temp-file-backed store and scripted mocks for the
//! model service and the purchase backend. Mocks pop queued responses FIFO
//! and log every call so tests can assert on exactly what reached them.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Mutex;

use crate::profile::NewPetDraft;
use crate::state::SqliteStateStore;
use crate::traits::{
    AnalysisRequest, EntitlementBackend, ModelService, PetClassification, PurchaseOutcome,
};
use crate::types::{AnalysisRecord, PetProfile, RiskLevel, Species, Verdict};

pub async fn setup_test_store() -> (Arc<SqliteStateStore>, tempfile::NamedTempFile) {
    let db = tempfile::NamedTempFile::new().unwrap();
    let store = SqliteStateStore::new(db.path()).await.unwrap();
    (Arc::new(store), db)
}

pub fn make_pet(name: &str) -> PetProfile {
    PetProfile {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        species: Species::Dog,
        breed: None,
        age: 3.0,
        weight_kg: 10.0,
        notes: None,
        original_image: None,
        portrait: None,
        allergies: vec![],
        conditions: vec![],
    }
}

pub fn make_check(pet_id: &str, ms: i64) -> AnalysisRecord {
    AnalysisRecord {
        id: uuid::Uuid::new_v4().to_string(),
        pet_id: pet_id.to_string(),
        food_name: "Apple".to_string(),
        created_at: Utc.timestamp_millis_opt(ms).single().unwrap(),
        verdict: MockModelService::safe_verdict("Apple"),
        image: None,
        barcode: None,
    }
}

pub fn make_draft(name: &str) -> NewPetDraft {
    NewPetDraft {
        name: name.to_string(),
        age: 3.0,
        weight_kg: 10.0,
        notes: None,
        allergies: vec![],
        conditions: vec![],
        photo: vec![0xFF, 0xD8, 0xFF],
    }
}

/// Scripted model service. Responses are queued per call kind; an empty
/// queue yields a benign default so unrelated tests need no scripting.
pub struct MockModelService {
    classifications: Mutex<VecDeque<anyhow::Result<PetClassification>>>,
    portraits: Mutex<VecDeque<anyhow::Result<Option<Vec<u8>>>>>,
    verdicts: Mutex<VecDeque<anyhow::Result<Verdict>>>,
    pub classify_log: Mutex<Vec<Vec<u8>>>,
    pub portrait_log: Mutex<Vec<String>>,
    pub analyze_log: Mutex<Vec<AnalysisRequest>>,
}

impl MockModelService {
    pub fn new() -> Self {
        Self {
            classifications: Mutex::new(VecDeque::new()),
            portraits: Mutex::new(VecDeque::new()),
            verdicts: Mutex::new(VecDeque::new()),
            classify_log: Mutex::new(Vec::new()),
            portrait_log: Mutex::new(Vec::new()),
            analyze_log: Mutex::new(Vec::new()),
        }
    }

    pub async fn push_classification(&self, result: anyhow::Result<PetClassification>) {
        self.classifications.lock().await.push_back(result);
    }

    pub async fn push_portrait(&self, result: anyhow::Result<Option<Vec<u8>>>) {
        self.portraits.lock().await.push_back(result);
    }

    pub async fn push_verdict(&self, result: anyhow::Result<Verdict>) {
        self.verdicts.lock().await.push_back(result);
    }

    pub fn safe_verdict(food: &str) -> Verdict {
        Verdict {
            detected_food_name: food.to_string(),
            can_eat: true,
            risk_level: RiskLevel::Safe,
            short_summary: format!("{} is fine in moderation.", food),
            detailed_explanation: "No known hazards for this pet.".to_string(),
            max_portion_grams: Some(50.0),
            emergency_warning: None,
            disclaimer: "Not a substitute for veterinary advice.".to_string(),
        }
    }

    pub fn dangerous_verdict(food: &str) -> Verdict {
        Verdict {
            detected_food_name: food.to_string(),
            can_eat: false,
            risk_level: RiskLevel::Dangerous,
            short_summary: format!("{} is dangerous for this pet.", food),
            detailed_explanation: "Contains a listed allergen.".to_string(),
            max_portion_grams: None,
            emergency_warning: Some("Contact a veterinarian if already ingested.".to_string()),
            disclaimer: "Not a substitute for veterinary advice.".to_string(),
        }
    }
}

#[async_trait]
impl ModelService for MockModelService {
    async fn classify_pet(&self, image: &[u8]) -> anyhow::Result<PetClassification> {
        self.classify_log.lock().await.push(image.to_vec());
        match self.classifications.lock().await.pop_front() {
            Some(result) => result,
            None => Ok(PetClassification {
                is_animal: Some(true),
                species: Some("Dog".to_string()),
                breed: Some("Mixed".to_string()),
                visual_description: Some("a friendly dog".to_string()),
            }),
        }
    }

    async fn generate_portrait(&self, prompt: &str) -> anyhow::Result<Option<Vec<u8>>> {
        self.portrait_log.lock().await.push(prompt.to_string());
        match self.portraits.lock().await.pop_front() {
            Some(result) => result,
            None => Ok(None),
        }
    }

    async fn analyze_food(&self, request: &AnalysisRequest) -> anyhow::Result<Verdict> {
        self.analyze_log.lock().await.push(request.clone());
        match self.verdicts.lock().await.pop_front() {
            Some(result) => result,
            None => Ok(Self::safe_verdict("Apple")),
        }
    }
}

/// Scripted purchase backend. Defaults: purchase resolves `Other`, restore
/// finds nothing.
pub struct MockEntitlementBackend {
    outcomes: Mutex<VecDeque<PurchaseOutcome>>,
    restores: Mutex<VecDeque<bool>>,
    pub purchase_log: Mutex<Vec<String>>,
    pub restore_calls: Mutex<u32>,
}

impl MockEntitlementBackend {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            restores: Mutex::new(VecDeque::new()),
            purchase_log: Mutex::new(Vec::new()),
            restore_calls: Mutex::new(0),
        }
    }

    pub async fn push_outcome(&self, outcome: PurchaseOutcome) {
        self.outcomes.lock().await.push_back(outcome);
    }

    pub async fn push_restore(&self, found: bool) {
        self.restores.lock().await.push_back(found);
    }
}

#[async_trait]
impl EntitlementBackend for MockEntitlementBackend {
    async fn purchase(&self, plan_id: &str) -> PurchaseOutcome {
        self.purchase_log.lock().await.push(plan_id.to_string());
        self.outcomes
            .lock()
            .await
            .pop_front()
            .unwrap_or(PurchaseOutcome::Other)
    }

    async fn restore(&self) -> bool {
        *self.restore_calls.lock().await += 1;
        self.restores.lock().await.pop_front().unwrap_or(false)
    }
}
