use std::sync::Arc;

use lazy_static::lazy_static;
use log::{debug, error, o, Logger};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::address::{DraftId, GenerationDraft, PostalAddress};
use crate::errors::CatalogError;
use crate::llm::{JsonSchemaFormat, LanguageModel, Message, ReasoningEffort, StructuredCompletion};

pub const DEFAULT_MODEL: &str = "gpt-5-mini";

pub const SCHEMA_NAME: &str = "address_generation";

pub const SCHEMA_DESCRIPTION: &str = "Generate a structured address with metadata";

/// Model name prefixes of the families that accept a reasoning effort.
pub const REASONING_MODEL_PREFIXES: [&str; 4] = ["gpt-5", "o1", "o3", "o4"];

lazy_static! {
    /// The strict schema of a batch of generated addresses.
    pub static ref ADDRESS_BATCH_SCHEMA: Value = json!({
        "type": "object",
        "properties": {
            "addresses": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "briefIntro": {"type": "string"},
                        "tags": {"type": "array", "items": {"type": "string"}},
                        "address": {
                            "type": "object",
                            "properties": {
                                "country": {"type": "string"},
                                "city": {"type": "string"},
                                "line1": {"type": "string"},
                                "line2": {"type": ["string", "null"]},
                                "buildingName": {"type": ["string", "null"]},
                                "postalCode": {"type": ["string", "null"]},
                                "region": {"type": "string"}
                            },
                            "required": [
                                "country", "city", "line1", "line2",
                                "buildingName", "postalCode", "region"
                            ],
                            "additionalProperties": false
                        }
                    },
                    "required": ["name", "briefIntro", "tags", "address"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["addresses"],
        "additionalProperties": false
    });
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,

    /// Sent ahead of the prompt when not blank.
    pub system_prompt: Option<String>,

    pub model: Option<String>,

    /// Ignored for models that don't reason.
    pub effort: Option<ReasoningEffort>,
}

#[derive(Deserialize)]
struct AddressBatch {
    addresses: Vec<GeneratedAddress>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedAddress {
    name: String,
    brief_intro: String,
    tags: Vec<String>,
    address: PostalAddress,
}

impl From<GeneratedAddress> for GenerationDraft {
    fn from(generated: GeneratedAddress) -> Self {
        GenerationDraft {
            provisional_id: DraftId::generate(),
            name: generated.name,
            brief_intro: generated.brief_intro,
            tags: generated.tags,
            address: generated.address,
        }
    }
}

/// Returns the requested model, or the default when none is given.
pub fn select_model(requested: Option<&str>) -> &str {
    match requested.map(str::trim) {
        Some(model) if !model.is_empty() => model,
        _ => DEFAULT_MODEL,
    }
}

pub fn is_reasoning_model(model: &str) -> bool {
    REASONING_MODEL_PREFIXES
        .iter()
        .any(|prefix| model.starts_with(prefix))
}

/// The effort to send for `model`: the requested one (or `low`) for
/// reasoning models, nothing for the rest.
pub fn effort_for(model: &str, requested: Option<ReasoningEffort>) -> Option<ReasoningEffort> {
    if is_reasoning_model(model) {
        Some(requested.unwrap_or_default())
    } else {
        None
    }
}

pub fn build_messages(system_prompt: Option<&str>, prompt: &str) -> Vec<Message> {
    let mut messages = vec![];

    if let Some(system_prompt) = system_prompt.filter(|s| !s.trim().is_empty()) {
        messages.push(Message::system(system_prompt));
    }

    if !prompt.trim().is_empty() {
        messages.push(Message::user(prompt));
    }

    messages
}

/// Asks the model for a batch of addresses and returns them as drafts.
/// Nothing is persisted.
pub async fn generate(
    logger: Arc<Logger>,
    llm: Arc<dyn LanguageModel + Send + Sync>,
    request: GenerationRequest,
) -> Result<Vec<GenerationDraft>, CatalogError> {
    if request.prompt.trim().is_empty() {
        return Err(CatalogError::validation("prompt is required"));
    }

    let model = select_model(request.model.as_deref()).to_owned();
    let effort = effort_for(&model, request.effort);
    let logger = logger.new(o!("model" => model.clone()));

    let messages = build_messages(request.system_prompt.as_deref(), &request.prompt);
    if messages.is_empty() {
        error!(logger, "no system and user message provided");
        return Err(CatalogError::validation("no user or system message provided"));
    }

    let completion = StructuredCompletion {
        messages,
        format: JsonSchemaFormat {
            name: SCHEMA_NAME.to_owned(),
            description: SCHEMA_DESCRIPTION.to_owned(),
            schema: ADDRESS_BATCH_SCHEMA.clone(),
            strict: true,
        },
        model,
        effort,
    };

    debug!(logger, "Generating addresses..."; "effort" => ?effort);
    let completion = llm.structured_complete(completion).await?;

    let content = match completion.choices.into_iter().next() {
        Some(choice) => choice.content,
        None => {
            error!(logger, "no choices returned from completion");
            return Err(CatalogError::NoChoices);
        }
    };

    let batch: AddressBatch = match serde_json::from_str(&content) {
        Ok(batch) => batch,
        Err(e) => {
            error!(logger, "failed to unmarshal response"; "error" => %e, "content" => %content);
            return Err(CatalogError::SchemaDecode { content, source: e });
        }
    };

    let drafts: Vec<GenerationDraft> = batch.addresses.into_iter().map(Into::into).collect();
    debug!(logger, "Generated addresses"; "count" => drafts.len());

    Ok(drafts)
}
