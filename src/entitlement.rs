//! Usage gating: who may add a pet profile, and who may run an analysis.
//!
//! The decision logic is pure — it sees only an explicit snapshot of the
//! entitlement settings plus the current pet count, never ambient state.
//! `EntitlementGate` wraps it with the store reads/writes, and every gated
//! action re-reads the snapshot immediately before executing, since credits
//! and entitlement can change between intent and execution.

use std::sync::Arc;

use crate::traits::StateStore;

/// Free accounts get this many analyses, granted once at onboarding.
pub const INITIAL_FREE_CREDITS: u32 = 3;

/// Free accounts may hold at most this many pet profiles.
pub const FREE_PET_LIMIT: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// Free-tier pet profile limit reached.
    PetLimit,
    /// Free credits exhausted.
    OutOfCredits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allowed,
    Blocked(BlockReason),
}

/// Point-in-time read of the entitlement settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitlementSnapshot {
    pub is_entitled: bool,
    pub free_credits: u32,
}

pub fn can_add_pet(snapshot: &EntitlementSnapshot, pet_count: usize) -> GateDecision {
    if snapshot.is_entitled || pet_count < FREE_PET_LIMIT {
        GateDecision::Allowed
    } else {
        GateDecision::Blocked(BlockReason::PetLimit)
    }
}

pub fn can_run_analysis(snapshot: &EntitlementSnapshot) -> GateDecision {
    if snapshot.is_entitled || snapshot.free_credits > 0 {
        GateDecision::Allowed
    } else {
        GateDecision::Blocked(BlockReason::OutOfCredits)
    }
}

/// Side-effectful companion to the pure checks: reads fresh snapshots and
/// applies the credit debit / entitlement grant through the store.
#[derive(Clone)]
pub struct EntitlementGate {
    store: Arc<dyn StateStore>,
}

impl EntitlementGate {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub async fn snapshot(&self) -> anyhow::Result<EntitlementSnapshot> {
        Ok(EntitlementSnapshot {
            is_entitled: self.store.is_entitled().await?,
            free_credits: self.store.free_credits().await?,
        })
    }

    pub async fn check_add_pet(&self, pet_count: usize) -> anyhow::Result<GateDecision> {
        Ok(can_add_pet(&self.snapshot().await?, pet_count))
    }

    pub async fn check_run_analysis(&self) -> anyhow::Result<GateDecision> {
        Ok(can_run_analysis(&self.snapshot().await?))
    }

    /// Debit one credit after a successful analysis. Entitled accounts never
    /// consume credits.
    pub async fn on_analysis_succeeded(&self) -> anyhow::Result<()> {
        if !self.store.is_entitled().await? {
            self.store.spend_credit().await?;
        }
        Ok(())
    }

    /// Grant entitlement permanently. Does not restore or reset credits, and
    /// calling it twice is a no-op.
    pub async fn on_entitlement_granted(&self) -> anyhow::Result<()> {
        self.store.set_entitled().await
    }
}
