use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use log::{debug, error, warn, Logger};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::config::LlmConfig;
use crate::errors::CatalogError;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// How hard a reasoning model should think before answering.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Minimal,
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasoningEffort::Minimal => "minimal",
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
        }
    }
}

impl Default for ReasoningEffort {
    fn default() -> Self {
        ReasoningEffort::Low
    }
}

impl fmt::Display for ReasoningEffort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasoningEffort {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minimal" => Ok(ReasoningEffort::Minimal),
            "low" => Ok(ReasoningEffort::Low),
            "medium" => Ok(ReasoningEffort::Medium),
            "high" => Ok(ReasoningEffort::High),
            _ => Err(CatalogError::validation(format!(
                "unknown reasoning effort [{}]",
                s
            ))),
        }
    }
}

/// A named JSON schema the completion must conform to.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct JsonSchemaFormat {
    pub name: String,
    pub description: String,
    pub schema: Value,
    pub strict: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructuredCompletion {
    pub messages: Vec<Message>,
    pub format: JsonSchemaFormat,
    pub model: String,

    /// Only sent when present.
    pub effort: Option<ReasoningEffort>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Completion {
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Choice {
    pub content: String,
}

/// A chat model able to answer in a given JSON schema.
pub trait LanguageModel {
    fn structured_complete(
        &self,
        request: StructuredCompletion,
    ) -> BoxFuture<Result<Completion, CatalogError>>;
}

/// A `LanguageModel` speaking the OpenAI chat completions protocol.
pub struct OpenAiClient {
    logger: Arc<Logger>,
    client: reqwest::Client,
    api_key: String,
    endpoint: Url,
}

impl OpenAiClient {
    pub fn new(logger: Arc<Logger>, config: LlmConfig) -> Result<Self, CatalogError> {
        let endpoint = config
            .base_url
            .join("chat/completions")
            .map_err(|e| CatalogError::validation(format!("invalid model endpoint: {}", e)))?;

        Ok(OpenAiClient {
            logger,
            client: reqwest::Client::new(),
            api_key: config.api_key,
            endpoint,
        })
    }
}

/// Builds the chat completions request body.
pub fn request_body(request: &StructuredCompletion) -> Value {
    let mut body = json!({
        "model": &request.model,
        "messages": &request.messages,
        "response_format": {
            "type": "json_schema",
            "json_schema": &request.format,
        },
    });

    if let Some(effort) = request.effort {
        body["reasoning_effort"] = json!(effort);
    }

    body
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

impl From<WireResponse> for Completion {
    fn from(response: WireResponse) -> Self {
        Completion {
            choices: response
                .choices
                .into_iter()
                .map(|c| Choice {
                    content: c.message.content.unwrap_or_default(),
                })
                .collect(),
        }
    }
}

impl LanguageModel for OpenAiClient {
    fn structured_complete(
        &self,
        request: StructuredCompletion,
    ) -> BoxFuture<Result<Completion, CatalogError>> {
        let body = request_body(&request);

        async move {
            debug!(self.logger, "Requesting chat completion..."; "model" => %request.model);

            let response = self
                .client
                .post(self.endpoint.clone())
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| {
                    error!(self.logger, "chat completion failed"; "error" => %e);
                    CatalogError::LanguageModelRequest { source: e }
                })?;

            let status = response.status();
            if !status.is_success() {
                let body = match response.text().await {
                    Ok(body) => body,
                    Err(e) => {
                        warn!(self.logger, "failed to read error response"; "error" => %e);
                        String::new()
                    }
                };
                error!(self.logger, "chat completion failed"; "status" => status.as_u16());

                return Err(CatalogError::LanguageModelStatus {
                    status: status.as_u16(),
                    body,
                });
            }

            let response: WireResponse = response
                .json()
                .await
                .map_err(|e| CatalogError::LanguageModelRequest { source: e })?;

            Ok(response.into())
        }
        .boxed()
    }
}
