//! Profile builder: classify the photo, best-effort portrait, assemble the
//! pet profile. Two sequential network calls — the portrait prompt depends
//! on the classification output — and no retries.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::traits::ModelService;
use crate::types::{PetProfile, Species};

/// User-supplied inputs for a new profile. Weight is already canonical
/// kilograms; display-unit conversion happened at the edge.
#[derive(Debug, Clone)]
pub struct NewPetDraft {
    pub name: String,
    pub age: f64,
    pub weight_kg: f64,
    pub notes: Option<String>,
    pub allergies: Vec<String>,
    pub conditions: Vec<String>,
    pub photo: Vec<u8>,
}

#[derive(Debug)]
pub enum ProfileError {
    /// The draft itself is malformed (blank name, negative age or weight).
    /// Rejected before any network call.
    Invalid(&'static str),
    /// The classification call did not strictly confirm a real animal.
    /// The user must supply a different photo; retrying the same one is
    /// pointless.
    NotAnAnimal,
    /// Network or parse failure from the service. Safe to re-trigger.
    Service(anyhow::Error),
}

impl ProfileError {
    pub fn user_message(&self) -> String {
        match self {
            ProfileError::Invalid(msg) => msg.to_string(),
            ProfileError::NotAnAnimal => {
                "We couldn't spot a pet in this photo! Please upload a clear photo of your animal friend."
                    .to_string()
            }
            ProfileError::Service(e) => {
                if let Some(pe) = e.downcast_ref::<crate::providers::ProviderError>() {
                    pe.user_message()
                } else {
                    "Something went wrong while analyzing the photo. Please try again.".to_string()
                }
            }
        }
    }
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileError::Invalid(msg) => write!(f, "invalid pet draft: {}", msg),
            ProfileError::NotAnAnimal => write!(f, "no animal detected in photo"),
            ProfileError::Service(e) => write!(f, "profile service error: {}", e),
        }
    }
}

impl std::error::Error for ProfileError {}

fn portrait_prompt(breed: &str, species: Species, description: &str) -> String {
    format!(
        "Generate a cute, high-quality, vibrant, sticker-style vector art portrait of a {} {}. \
         Appearance: {}. \
         The background should be a solid soft circle color. \
         Ensure the face is clearly visible and cute.",
        breed, species, description
    )
}

pub struct ProfileBuilder {
    model: Arc<dyn ModelService>,
}

impl ProfileBuilder {
    pub fn new(model: Arc<dyn ModelService>) -> Self {
        Self { model }
    }

    pub async fn build(&self, draft: NewPetDraft) -> Result<PetProfile, ProfileError> {
        if draft.name.trim().is_empty() {
            return Err(ProfileError::Invalid("Please give your pet a name."));
        }
        // `!(x >= 0.0)` also rejects NaN.
        if !(draft.age >= 0.0) || !(draft.weight_kg >= 0.0) {
            return Err(ProfileError::Invalid(
                "Age and weight must be zero or more.",
            ));
        }

        let classification = self
            .model
            .classify_pet(&draft.photo)
            .await
            .map_err(ProfileError::Service)?;

        // Strict equality: a missing or null flag is a rejection, never a
        // "maybe yes".
        if classification.is_animal != Some(true) {
            info!(pet = %draft.name, "classification rejected photo as non-animal");
            return Err(ProfileError::NotAnAnimal);
        }

        let species = classification
            .species
            .as_deref()
            .map(Species::from_label)
            .unwrap_or_default();
        let breed = classification
            .breed
            .unwrap_or_else(|| "Unknown Mix".to_string());
        let description = classification
            .visual_description
            .unwrap_or_else(|| "A cute pet".to_string());

        // Best-effort: a failed or image-free generation call must never
        // abort profile creation.
        let prompt = portrait_prompt(&breed, species, &description);
        let portrait = match self.model.generate_portrait(&prompt).await {
            Ok(image) => image,
            Err(e) => {
                warn!(error = %e, pet = %draft.name, "portrait generation failed, continuing without one");
                None
            }
        };

        Ok(PetProfile {
            id: uuid::Uuid::new_v4().to_string(),
            name: draft.name,
            species,
            breed: Some(breed),
            age: draft.age,
            weight_kg: draft.weight_kg,
            notes: draft.notes,
            original_image: Some(draft.photo),
            portrait,
            allergies: draft.allergies,
            conditions: draft.conditions,
        })
    }
}
