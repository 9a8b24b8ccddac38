use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use crate::providers::ProviderError;
use crate::traits::{AnalysisRequest, ModelService, PetClassification};
use crate::types::{CheckInput, Verdict};

const B64: base64::engine::general_purpose::GeneralPurpose =
    base64::engine::general_purpose::STANDARD;

/// Concatenate the text parts of the first candidate, skipping thought
/// parts from thinking models.
fn response_text(data: &Value) -> Option<String> {
    let parts = data["candidates"].get(0)?.get("content")?.get("parts")?.as_array()?;
    let mut text = String::new();
    for part in parts {
        if part.get("thought").and_then(|v| v.as_bool()).unwrap_or(false) {
            continue;
        }
        if let Some(t) = part.get("text").and_then(|s| s.as_str()) {
            text.push_str(t);
        }
    }
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// First inline image payload of the first candidate, decoded.
fn response_inline_image(data: &Value) -> anyhow::Result<Option<Vec<u8>>> {
    let parts = data["candidates"]
        .get(0)
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array());
    let Some(parts) = parts else {
        return Ok(None);
    };
    for part in parts {
        if let Some(b64) = part
            .get("inlineData")
            .and_then(|d| d.get("data"))
            .and_then(|d| d.as_str())
        {
            return Ok(Some(B64.decode(b64)?));
        }
    }
    Ok(None)
}

fn classification_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "isAnimal": {
                "type": "BOOLEAN",
                "description": "True only if a real animal is detected"
            },
            "species": { "type": "STRING", "enum": ["Dog", "Cat", "Other"] },
            "breed": { "type": "STRING" },
            "visualDescription": { "type": "STRING" }
        },
        "required": ["isAnimal"]
    })
}

fn verdict_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "detectedFoodName": {
                "type": "STRING",
                "description": "The name of the food or object identified"
            },
            "canEat": { "type": "BOOLEAN" },
            "riskLevel": {
                "type": "STRING",
                "enum": ["SAFE", "CAUTION", "DANGEROUS", "UNKNOWN"]
            },
            "shortSummary": { "type": "STRING" },
            "detailedExplanation": { "type": "STRING" },
            "maxPortionGrams": { "type": "NUMBER", "nullable": true },
            "emergencyWarning": {
                "type": "STRING",
                "nullable": true,
                "description": "Alert if toxic or allergic match"
            },
            "disclaimer": { "type": "STRING" }
        },
        "required": [
            "detectedFoodName", "canEat", "riskLevel",
            "shortSummary", "detailedExplanation", "disclaimer"
        ]
    })
}

const CLASSIFY_PROMPT: &str = "\
Analyze this image.
1. First, determine strictly if this image contains a real, living animal (or a photo of one).
2. If it is an inanimate object, a human, a car, a landscape, or anything that is NOT a pet animal, set 'isAnimal' to false.
3. If it IS an animal:
   - Identify the species (Dog, Cat, or Other).
   - Identify the likely breed.
   - Provide a short visual description of the pet's appearance (color, pattern, distinctive features) to be used for generating a painting.";

fn analysis_system_prompt(request: &AnalysisRequest) -> String {
    let allergies = if request.allergies.is_empty() {
        "None known".to_string()
    } else {
        request.allergies.join(", ")
    };
    let conditions = if request.conditions.is_empty() {
        "None known".to_string()
    } else {
        request.conditions.join(", ")
    };
    let breed = request.breed.as_deref().unwrap_or("Unknown");

    format!(
        "You are an expert veterinary assistant.\n\
         \n\
         **Pet Profile:**\n\
         - Name: {name}\n\
         - Species/Breed: {breed} {species}\n\
         - Age: {age}\n\
         - Weight: {weight}kg\n\
         - **CRITICAL HEALTH CONTEXT**: Allergies: {allergies}. Conditions: {conditions}.\n\
         \n\
         **User Preferences:**\n\
         - Language: Respond STRICTLY in {language}.\n\
         - Units: Use {units} for portions.\n\
         \n\
         **Task:**\n\
         1. Analyze the input (Image or Product Name via Barcode).\n\
         2. Identify the food item.\n\
         3. Determine safety.\n\
         4. **CHECK SPECIFIC ALLERGIES**: If the pet is allergic to Chicken and the food is \"Chicken Jerky\", this is DANGEROUS.\n\
         5. **CHECK HEALTH CONDITIONS**: If the pet has Diabetes and the food is high sugar, this is DANGEROUS or CAUTION.\n\
         \n\
         **Output Rules:**\n\
         - If safe, provide max portion for a {weight}kg animal.\n\
         - If toxic or allergic match, risk is DANGEROUS.",
        name = request.pet_name,
        breed = breed,
        species = request.species,
        age = request.age,
        weight = request.weight_kg,
        allergies = allergies,
        conditions = conditions,
        language = request.language.prompt_name(),
        units = request.units.portion_hint(),
    )
}

pub struct GoogleGenAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    reasoning_model: String,
    image_model: String,
}

impl Drop for GoogleGenAiProvider {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}

impl GoogleGenAiProvider {
    pub fn new(
        api_key: &str,
        base_url: Option<&str>,
        reasoning_model: &str,
        image_model: &str,
    ) -> anyhow::Result<Self> {
        let client = crate::providers::build_http_client(Duration::from_secs(120))
            .map_err(|e| anyhow::anyhow!(e))?;
        let normalized_base_url = base_url
            .unwrap_or("https://generativelanguage.googleapis.com/v1beta")
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            client,
            base_url: normalized_base_url,
            api_key: api_key.to_string(),
            reasoning_model: reasoning_model.to_string(),
            image_model: image_model.to_string(),
        })
    }

    async fn generate(&self, model: &str, body: Value) -> anyhow::Result<Value> {
        // Header-based authentication instead of a URL query parameter, to
        // avoid API key exposure in logs, proxies, and error messages.
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::network(&e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| ProviderError::network(&e))?;
        if !status.is_success() {
            return Err(ProviderError::from_status(status.as_u16(), &text).into());
        }

        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl ModelService for GoogleGenAiProvider {
    async fn classify_pet(&self, image: &[u8]) -> anyhow::Result<PetClassification> {
        let body = json!({
            "contents": {
                "role": "user",
                "parts": [
                    { "text": CLASSIFY_PROMPT },
                    { "inlineData": { "mimeType": "image/jpeg", "data": B64.encode(image) } }
                ]
            },
            "generation_config": {
                "response_mime_type": "application/json",
                "response_schema": classification_schema()
            }
        });

        info!(
            model = %self.reasoning_model,
            image_bytes = image.len(),
            "Calling Google GenAI for pet classification"
        );

        let data = self.generate(&self.reasoning_model, body).await?;
        let Some(text) = response_text(&data) else {
            anyhow::bail!("classification returned no text content");
        };
        debug!(response = %text, "classification response");
        Ok(serde_json::from_str(&text)?)
    }

    async fn generate_portrait(&self, prompt: &str) -> anyhow::Result<Option<Vec<u8>>> {
        // No structured-output config for image generation models.
        let body = json!({
            "contents": { "parts": [{ "text": prompt }] }
        });

        info!(model = %self.image_model, "Calling Google GenAI for portrait generation");

        let data = self.generate(&self.image_model, body).await?;
        let image = response_inline_image(&data)?;
        if image.is_none() {
            warn!(model = %self.image_model, "portrait response carried no image payload");
        }
        Ok(image)
    }

    async fn analyze_food(&self, request: &AnalysisRequest) -> anyhow::Result<Verdict> {
        let parts = match &request.input {
            CheckInput::Image(bytes) => json!([
                { "text": "What is this and is it safe for my pet?" },
                { "inlineData": { "mimeType": "image/jpeg", "data": B64.encode(bytes) } }
            ]),
            CheckInput::Lookup(label) => json!([
                { "text": format!(
                    "I scanned a barcode. The product is \"{}\". Is this safe for my pet?",
                    label
                ) }
            ]),
        };

        let body = json!({
            "system_instruction": { "parts": [{ "text": analysis_system_prompt(request) }] },
            "contents": { "role": "user", "parts": parts },
            "generation_config": {
                "response_mime_type": "application/json",
                "response_schema": verdict_schema()
            }
        });

        info!(
            model = %self.reasoning_model,
            pet = %request.pet_name,
            input_kind = match request.input {
                CheckInput::Image(_) => "image",
                CheckInput::Lookup(_) => "lookup",
            },
            "Calling Google GenAI for food analysis"
        );

        let data = self.generate(&self.reasoning_model, body).await?;
        let Some(text) = response_text(&data) else {
            anyhow::bail!("analysis returned no text content");
        };
        debug!(response = %text, "analysis response");
        Ok(serde_json::from_str(&text)?)
    }
}
