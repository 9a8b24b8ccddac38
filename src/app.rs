//! Application core: a closed view-state union plus one event handler per
//! variant. The UI layer renders whatever `view()` says and feeds events
//! back; all gating, orchestration and persistence decisions live here.
//!
//! `handle` takes `&mut self`, so events are structurally serialized — there
//! is exactly one logical actor and no event can observe a half-applied
//! transition.

use std::sync::Arc;

use tracing::{info, warn};

use crate::analysis::{AnalysisOrchestrator, AnalyzeError};
use crate::entitlement::{BlockReason, EntitlementGate, GateDecision};
use crate::payment::PurchaseFlow;
use crate::profile::{NewPetDraft, ProfileBuilder};
use crate::traits::{PetStore, PurchaseOutcome, StateStore};
use crate::types::CheckInput;

/// Closed set of screens. Exhaustively matched everywhere; adding a variant
/// is a compile-visible change.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    Home,
    AddPet,
    EditPet {
        pet_id: String,
    },
    NewCheck {
        pet_id: String,
    },
    CheckResult {
        check_id: String,
    },
    History,
    /// Entered only via a gate block; `return_to` is where a successful
    /// purchase or restore lands the user.
    Paywall {
        return_to: Box<ViewState>,
        reason: BlockReason,
    },
}

/// Profile-edit payload. Species and breed are set once at creation by the
/// classifier and are deliberately absent here.
#[derive(Debug, Clone)]
pub struct PetEdits {
    pub pet_id: String,
    pub name: String,
    pub age: f64,
    pub weight_kg: f64,
    pub notes: Option<String>,
    pub allergies: Vec<String>,
    pub conditions: Vec<String>,
}

#[derive(Debug)]
pub enum AppEvent {
    AddPetRequested,
    PetSubmitted(NewPetDraft),
    EditRequested { pet_id: String },
    EditsSubmitted(PetEdits),
    PetDeleted { pet_id: String },
    CheckRequested { pet_id: String },
    CheckSubmitted(CheckInput),
    HistoryOpened,
    PlanPurchased { plan_id: String },
    RestoreRequested,
    Back,
    AccountReset,
}

pub struct AppCore {
    store: Arc<dyn StateStore>,
    profiles: ProfileBuilder,
    orchestrator: AnalysisOrchestrator,
    purchases: PurchaseFlow,
    gate: EntitlementGate,
    view: ViewState,
    last_notice: Option<String>,
}

impl AppCore {
    pub fn new(
        store: Arc<dyn StateStore>,
        profiles: ProfileBuilder,
        orchestrator: AnalysisOrchestrator,
        purchases: PurchaseFlow,
        gate: EntitlementGate,
    ) -> Self {
        Self {
            store,
            profiles,
            orchestrator,
            purchases,
            gate,
            view: ViewState::Home,
            last_notice: None,
        }
    }

    /// Resolve onboarding and pick the initial screen. First launch (or a
    /// launch with no pets) lands on AddPet; otherwise Home.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        if !self.store.has_onboarded().await? {
            self.store.complete_onboarding().await?;
            info!("onboarding completed, free credits seeded");
        }
        self.view = if self.store.list_pets().await.is_empty() {
            ViewState::AddPet
        } else {
            ViewState::Home
        };
        Ok(())
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    /// One-shot user-facing message from the last handled event, if any.
    /// Reading it clears it.
    pub fn take_notice(&mut self) -> Option<String> {
        self.last_notice.take()
    }

    pub async fn handle(&mut self, event: AppEvent) {
        self.last_notice = None;
        match event {
            AppEvent::AddPetRequested => self.on_add_pet_requested().await,
            AppEvent::PetSubmitted(draft) => self.on_pet_submitted(draft).await,
            AppEvent::EditRequested { pet_id } => {
                self.view = ViewState::EditPet { pet_id };
            }
            AppEvent::EditsSubmitted(edits) => self.on_edits_submitted(edits).await,
            AppEvent::PetDeleted { pet_id } => self.on_pet_deleted(&pet_id).await,
            AppEvent::CheckRequested { pet_id } => self.on_check_requested(pet_id).await,
            AppEvent::CheckSubmitted(input) => self.on_check_submitted(input).await,
            AppEvent::HistoryOpened => {
                self.view = ViewState::History;
            }
            AppEvent::PlanPurchased { plan_id } => self.on_plan_purchased(&plan_id).await,
            AppEvent::RestoreRequested => self.on_restore_requested().await,
            AppEvent::Back => self.on_back().await,
            AppEvent::AccountReset => self.on_account_reset().await,
        }
    }

    async fn on_add_pet_requested(&mut self) {
        let pet_count = self.store.list_pets().await.len();
        match self.gate.check_add_pet(pet_count).await {
            Ok(GateDecision::Allowed) => {
                self.view = ViewState::AddPet;
            }
            Ok(GateDecision::Blocked(reason)) => {
                self.view = ViewState::Paywall {
                    return_to: Box::new(ViewState::AddPet),
                    reason,
                };
            }
            Err(e) => {
                warn!(error = %e, "gate check failed for add-pet");
                self.last_notice = Some("Something went wrong. Please try again.".to_string());
            }
        }
    }

    async fn on_pet_submitted(&mut self, draft: NewPetDraft) {
        match self.profiles.build(draft).await {
            Ok(pet) => match self.store.upsert_pet(&pet).await {
                Ok(_) => {
                    info!(pet_id = %pet.id, name = %pet.name, "pet profile created");
                    self.view = ViewState::Home;
                }
                Err(e) => {
                    warn!(error = %e, "failed to save new pet profile");
                    self.last_notice =
                        Some("Could not save the profile. Please try again.".to_string());
                }
            },
            Err(e) => {
                self.last_notice = Some(e.user_message());
            }
        }
    }

    async fn on_edits_submitted(&mut self, edits: PetEdits) {
        if edits.name.trim().is_empty() || !(edits.age >= 0.0) || !(edits.weight_kg >= 0.0) {
            self.last_notice = Some(
                "Name must not be empty, and age and weight must be zero or more.".to_string(),
            );
            return;
        }

        let pets = self.store.list_pets().await;
        let Some(mut pet) = pets.into_iter().find(|p| p.id == edits.pet_id) else {
            warn!(pet_id = %edits.pet_id, "edit submitted for unknown pet");
            self.view = ViewState::Home;
            return;
        };

        // Species/breed and the stored images stay as classification left
        // them; only user-editable fields change.
        pet.name = edits.name;
        pet.age = edits.age;
        pet.weight_kg = edits.weight_kg;
        pet.notes = edits.notes;
        pet.allergies = edits.allergies;
        pet.conditions = edits.conditions;

        match self.store.upsert_pet(&pet).await {
            Ok(_) => {
                self.view = ViewState::Home;
            }
            Err(e) => {
                warn!(error = %e, pet_id = %pet.id, "failed to save pet edits");
                self.last_notice = Some("Could not save changes. Please try again.".to_string());
            }
        }
    }

    async fn on_pet_deleted(&mut self, pet_id: &str) {
        match self.store.delete_pet(pet_id).await {
            Ok(remaining) => {
                self.view = if remaining.is_empty() {
                    ViewState::AddPet
                } else {
                    ViewState::Home
                };
            }
            Err(e) => {
                warn!(error = %e, pet_id, "failed to delete pet");
                self.last_notice =
                    Some("Could not delete the profile. Please try again.".to_string());
            }
        }
    }

    async fn on_check_requested(&mut self, pet_id: String) {
        match self.gate.check_run_analysis().await {
            Ok(GateDecision::Allowed) => {
                self.view = ViewState::NewCheck { pet_id };
            }
            Ok(GateDecision::Blocked(reason)) => {
                self.view = ViewState::Paywall {
                    return_to: Box::new(ViewState::NewCheck { pet_id }),
                    reason,
                };
            }
            Err(e) => {
                warn!(error = %e, "gate check failed for new check");
                self.last_notice = Some("Something went wrong. Please try again.".to_string());
            }
        }
    }

    async fn on_check_submitted(&mut self, input: CheckInput) {
        let ViewState::NewCheck { pet_id } = &self.view else {
            warn!("check submitted outside the new-check screen, ignoring");
            return;
        };
        let pet_id = pet_id.clone();

        let Some(pet) = self
            .store
            .list_pets()
            .await
            .into_iter()
            .find(|p| p.id == pet_id)
        else {
            warn!(pet_id = %pet_id, "check submitted for unknown pet");
            self.view = ViewState::Home;
            return;
        };

        match self.orchestrator.analyze(&pet, input).await {
            Ok(record) => {
                self.view = ViewState::CheckResult {
                    check_id: record.id,
                };
            }
            Err(AnalyzeError::Blocked(reason)) => {
                self.view = ViewState::Paywall {
                    return_to: Box::new(ViewState::NewCheck { pet_id }),
                    reason,
                };
            }
            Err(e @ AnalyzeError::Service(_)) => {
                self.last_notice = Some(e.user_message());
            }
        }
    }

    async fn on_plan_purchased(&mut self, plan_id: &str) {
        match self.purchases.purchase(plan_id).await {
            PurchaseOutcome::Completed => {
                if let ViewState::Paywall { return_to, .. } = &self.view {
                    self.view = (**return_to).clone();
                }
            }
            PurchaseOutcome::Cancelled => {}
            PurchaseOutcome::NetworkFailure => {
                self.last_notice =
                    Some("Purchase failed due to a network problem. Please try again.".to_string());
            }
            PurchaseOutcome::Other => {
                self.last_notice = Some("Purchase could not be completed.".to_string());
            }
        }
    }

    async fn on_restore_requested(&mut self) {
        if self.purchases.restore().await {
            if let ViewState::Paywall { return_to, .. } = &self.view {
                self.view = (**return_to).clone();
            }
        } else {
            self.last_notice = Some("No previous purchases were found.".to_string());
        }
    }

    async fn on_back(&mut self) {
        self.view = if self.store.list_pets().await.is_empty() {
            ViewState::AddPet
        } else {
            ViewState::Home
        };
    }

    async fn on_account_reset(&mut self) {
        match self.store.clear_all().await {
            Ok(()) => {
                info!("account reset, store wiped");
                if let Err(e) = self.start().await {
                    warn!(error = %e, "re-onboarding after reset failed");
                    self.last_notice = Some("Reset finished with errors.".to_string());
                }
            }
            Err(e) => {
                warn!(error = %e, "account reset failed");
                self.last_notice = Some("Could not reset the account.".to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entitlement::INITIAL_FREE_CREDITS;
    use crate::testing::{
        make_draft, make_pet, setup_test_store, MockEntitlementBackend, MockModelService,
    };
    use crate::traits::{CheckStore, PetClassification, SettingsStore};
    use crate::units::{Language, UnitSystem};

    struct Harness {
        core: AppCore,
        store: Arc<crate::state::SqliteStateStore>,
        model: Arc<MockModelService>,
        backend: Arc<MockEntitlementBackend>,
        _db: tempfile::NamedTempFile,
    }

    async fn harness() -> Harness {
        let (store, db) = setup_test_store().await;
        let model = Arc::new(MockModelService::new());
        let backend = Arc::new(MockEntitlementBackend::new());
        let gate = EntitlementGate::new(store.clone());
        let core = AppCore::new(
            store.clone(),
            ProfileBuilder::new(model.clone()),
            AnalysisOrchestrator::new(
                store.clone(),
                model.clone(),
                gate.clone(),
                Language::En,
                UnitSystem::Metric,
            ),
            PurchaseFlow::new(backend.clone(), gate.clone()),
            gate,
        );
        let mut h = Harness {
            core,
            store,
            model,
            backend,
            _db: db,
        };
        h.core.start().await.unwrap();
        h
    }

    fn animal_classification() -> PetClassification {
        PetClassification {
            is_animal: Some(true),
            species: Some("Dog".to_string()),
            breed: Some("Beagle".to_string()),
            visual_description: Some("brown".to_string()),
        }
    }

    #[tokio::test]
    async fn first_launch_onboards_and_opens_add_pet() {
        let h = harness().await;
        assert_eq!(*h.core.view(), ViewState::AddPet);
        assert!(h.store.has_onboarded().await.unwrap());
        assert_eq!(
            h.store.free_credits().await.unwrap(),
            INITIAL_FREE_CREDITS
        );
    }

    #[tokio::test]
    async fn launch_with_existing_pet_opens_home() {
        let mut h = harness().await;
        h.store.upsert_pet(&make_pet("Rex")).await.unwrap();
        h.core.start().await.unwrap();
        assert_eq!(*h.core.view(), ViewState::Home);
    }

    #[tokio::test]
    async fn submitting_a_valid_pet_lands_home() {
        let mut h = harness().await;
        h.model
            .push_classification(Ok(animal_classification()))
            .await;
        h.model.push_portrait(Ok(None)).await;

        h.core
            .handle(AppEvent::PetSubmitted(make_draft("Rex")))
            .await;

        assert_eq!(*h.core.view(), ViewState::Home);
        assert_eq!(h.store.list_pets().await.len(), 1);
    }

    #[tokio::test]
    async fn non_animal_photo_stays_on_add_pet_with_a_notice() {
        let mut h = harness().await;
        h.model
            .push_classification(Ok(PetClassification::default()))
            .await;

        h.core
            .handle(AppEvent::PetSubmitted(make_draft("Rock")))
            .await;

        assert_eq!(*h.core.view(), ViewState::AddPet);
        assert!(h.core.take_notice().unwrap().contains("photo"));
        assert!(h.store.list_pets().await.is_empty());
    }

    #[tokio::test]
    async fn second_pet_on_free_tier_hits_the_paywall() {
        let mut h = harness().await;
        h.store.upsert_pet(&make_pet("Rex")).await.unwrap();

        h.core.handle(AppEvent::AddPetRequested).await;

        assert_eq!(
            *h.core.view(),
            ViewState::Paywall {
                return_to: Box::new(ViewState::AddPet),
                reason: BlockReason::PetLimit,
            }
        );
    }

    #[tokio::test]
    async fn completed_purchase_returns_to_the_blocked_screen() {
        let mut h = harness().await;
        h.store.upsert_pet(&make_pet("Rex")).await.unwrap();
        h.backend.push_outcome(PurchaseOutcome::Completed).await;

        h.core.handle(AppEvent::AddPetRequested).await;
        h.core
            .handle(AppEvent::PlanPurchased {
                plan_id: "pro_monthly".to_string(),
            })
            .await;

        assert_eq!(*h.core.view(), ViewState::AddPet);
        assert!(h.store.is_entitled().await.unwrap());
    }

    #[tokio::test]
    async fn cancelled_purchase_stays_on_the_paywall() {
        let mut h = harness().await;
        h.store.upsert_pet(&make_pet("Rex")).await.unwrap();
        h.backend.push_outcome(PurchaseOutcome::Cancelled).await;

        h.core.handle(AppEvent::AddPetRequested).await;
        let paywall = h.core.view().clone();
        h.core
            .handle(AppEvent::PlanPurchased {
                plan_id: "pro_monthly".to_string(),
            })
            .await;

        assert_eq!(*h.core.view(), paywall);
        assert!(!h.store.is_entitled().await.unwrap());
    }

    #[tokio::test]
    async fn out_of_credits_check_request_hits_the_paywall() {
        let mut h = harness().await;
        let pet = make_pet("Rex");
        h.store.upsert_pet(&pet).await.unwrap();
        for _ in 0..INITIAL_FREE_CREDITS {
            h.store.spend_credit().await.unwrap();
        }

        h.core
            .handle(AppEvent::CheckRequested {
                pet_id: pet.id.clone(),
            })
            .await;

        assert_eq!(
            *h.core.view(),
            ViewState::Paywall {
                return_to: Box::new(ViewState::NewCheck { pet_id: pet.id }),
                reason: BlockReason::OutOfCredits,
            }
        );
    }

    #[tokio::test]
    async fn successful_check_opens_the_result_screen() {
        let mut h = harness().await;
        let pet = make_pet("Rex");
        h.store.upsert_pet(&pet).await.unwrap();
        h.model
            .push_verdict(Ok(MockModelService::safe_verdict("Apple")))
            .await;

        h.core
            .handle(AppEvent::CheckRequested {
                pet_id: pet.id.clone(),
            })
            .await;
        h.core
            .handle(AppEvent::CheckSubmitted(CheckInput::Lookup(
                "Apple".to_string(),
            )))
            .await;

        let checks = h.store.list_checks().await;
        assert_eq!(checks.len(), 1);
        assert_eq!(
            *h.core.view(),
            ViewState::CheckResult {
                check_id: checks[0].id.clone(),
            }
        );
    }

    #[tokio::test]
    async fn failed_check_stays_on_new_check_with_a_notice() {
        let mut h = harness().await;
        let pet = make_pet("Rex");
        h.store.upsert_pet(&pet).await.unwrap();
        h.model
            .push_verdict(Err(anyhow::anyhow!("malformed output")))
            .await;

        h.core
            .handle(AppEvent::CheckRequested {
                pet_id: pet.id.clone(),
            })
            .await;
        h.core
            .handle(AppEvent::CheckSubmitted(CheckInput::Image(vec![1])))
            .await;

        assert_eq!(*h.core.view(), ViewState::NewCheck { pet_id: pet.id });
        assert!(h.core.take_notice().is_some());
        assert!(h.store.list_checks().await.is_empty());
    }

    #[tokio::test]
    async fn edits_change_user_fields_but_not_species_or_breed() {
        let mut h = harness().await;
        let mut pet = make_pet("Rex");
        pet.breed = Some("Beagle".to_string());
        h.store.upsert_pet(&pet).await.unwrap();

        h.core
            .handle(AppEvent::EditsSubmitted(PetEdits {
                pet_id: pet.id.clone(),
                name: "Rexy".to_string(),
                age: 4.0,
                weight_kg: 12.5,
                notes: Some("picky eater".to_string()),
                allergies: vec!["Chicken".to_string()],
                conditions: vec![],
            }))
            .await;

        assert_eq!(*h.core.view(), ViewState::Home);
        let saved = &h.store.list_pets().await[0];
        assert_eq!(saved.name, "Rexy");
        assert_eq!(saved.weight_kg, 12.5);
        assert_eq!(saved.allergies, ["Chicken"]);
        assert_eq!(saved.species, pet.species);
        assert_eq!(saved.breed.as_deref(), Some("Beagle"));
    }

    #[tokio::test]
    async fn edits_with_a_blank_name_are_rejected() {
        let mut h = harness().await;
        let pet = make_pet("Rex");
        h.store.upsert_pet(&pet).await.unwrap();

        let view_before = h.core.view().clone();
        h.core
            .handle(AppEvent::EditsSubmitted(PetEdits {
                pet_id: pet.id.clone(),
                name: "  ".to_string(),
                age: -2.0,
                weight_kg: 10.0,
                notes: None,
                allergies: vec![],
                conditions: vec![],
            }))
            .await;

        assert_eq!(*h.core.view(), view_before);
        assert!(h.core.take_notice().is_some());
        // Stored profile is untouched.
        assert_eq!(h.store.list_pets().await[0].name, "Rex");
    }

    #[tokio::test]
    async fn deleting_the_last_pet_reopens_add_pet() {
        let mut h = harness().await;
        let pet = make_pet("Rex");
        h.store.upsert_pet(&pet).await.unwrap();
        h.core.start().await.unwrap();

        h.core.handle(AppEvent::PetDeleted { pet_id: pet.id }).await;

        assert_eq!(*h.core.view(), ViewState::AddPet);
    }

    #[tokio::test]
    async fn account_reset_wipes_state_and_restarts_onboarding() {
        let mut h = harness().await;
        h.store.upsert_pet(&make_pet("Rex")).await.unwrap();
        h.store.spend_credit().await.unwrap();

        h.core.handle(AppEvent::AccountReset).await;

        assert_eq!(*h.core.view(), ViewState::AddPet);
        assert!(h.store.list_pets().await.is_empty());
        // Re-onboarding seeds a fresh credit grant.
        assert_eq!(
            h.store.free_credits().await.unwrap(),
            INITIAL_FREE_CREDITS
        );
    }

    #[tokio::test]
    async fn restore_without_purchases_reports_a_notice() {
        let mut h = harness().await;
        h.backend.push_restore(false).await;

        h.core.handle(AppEvent::RestoreRequested).await;

        assert!(h.core.take_notice().unwrap().contains("No previous"));
    }
}
