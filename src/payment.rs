//! Purchase flow boundary. The store backend is a trait object so tests can
//! script outcomes; the real binary wires in whatever storefront adapter the
//! platform provides. A try-lock latch keeps concurrent purchase attempts
//! from racing each other.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::entitlement::EntitlementGate;
use crate::traits::{EntitlementBackend, PurchaseOutcome};

/// Backend for builds with no storefront attached (the CLI front). Every
/// purchase resolves `Other` and nothing is ever restorable.
pub struct NoStorefront;

#[async_trait]
impl EntitlementBackend for NoStorefront {
    async fn purchase(&self, plan_id: &str) -> PurchaseOutcome {
        warn!(plan_id, "purchase requested but no storefront is attached");
        PurchaseOutcome::Other
    }

    async fn restore(&self) -> bool {
        false
    }
}

pub struct PurchaseFlow {
    backend: Arc<dyn EntitlementBackend>,
    gate: EntitlementGate,
    busy: Mutex<()>,
}

impl PurchaseFlow {
    pub fn new(backend: Arc<dyn EntitlementBackend>, gate: EntitlementGate) -> Self {
        Self {
            backend,
            gate,
            busy: Mutex::new(()),
        }
    }

    /// Run a purchase for `plan_id`. Entitlement is granted locally only on
    /// a completed purchase; every other outcome leaves stored state
    /// untouched. A second call while one is in flight resolves to
    /// [`PurchaseOutcome::Other`] without touching the backend.
    pub async fn purchase(&self, plan_id: &str) -> PurchaseOutcome {
        let Ok(_guard) = self.busy.try_lock() else {
            warn!(plan_id, "purchase already in flight, ignoring");
            return PurchaseOutcome::Other;
        };

        let outcome = self.backend.purchase(plan_id).await;
        match outcome {
            PurchaseOutcome::Completed => {
                info!(plan_id, "purchase completed");
                if let Err(e) = self.gate.on_entitlement_granted().await {
                    // Keep the outcome Completed: the storefront transaction
                    // went through and a restore can repair local state.
                    warn!(error = %e, plan_id, "failed to persist entitlement after purchase");
                }
            }
            PurchaseOutcome::Cancelled => info!(plan_id, "purchase cancelled by user"),
            PurchaseOutcome::NetworkFailure => warn!(plan_id, "purchase failed: network"),
            PurchaseOutcome::Other => warn!(plan_id, "purchase failed"),
        }
        outcome
    }

    /// Ask the backend whether a prior purchase exists and re-grant
    /// entitlement locally if so. Returns whether anything was restored.
    pub async fn restore(&self) -> bool {
        let Ok(_guard) = self.busy.try_lock() else {
            warn!("restore requested while another store operation is in flight, ignoring");
            return false;
        };

        let restored = self.backend.restore().await;
        if restored {
            info!("prior purchase restored");
            if let Err(e) = self.gate.on_entitlement_granted().await {
                warn!(error = %e, "failed to persist entitlement after restore");
            }
        }
        restored
    }
}
