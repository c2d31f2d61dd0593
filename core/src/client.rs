use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{GeminiConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::conversation::{Completion, Conversation, Message, ToolInvocationRequest};
use crate::errors::{GeminiError, GeminiResult};
use crate::gateway::CompletionGateway;
use crate::types::*;

/// Schema keywords the Gemini schema object understands.
const SUPPORTED_SCHEMA_KEYS: &[&str] = &[
    "type",
    "format",
    "description",
    "nullable",
    "enum",
    "properties",
    "required",
    "items",
    "anyOf",
    "minimum",
    "maximum",
    "minItems",
    "maxItems",
];

/// Client for interacting with the Gemini API
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
    api_key: String,
    model_name: String,
    base_url: String,
    timeout_secs: u64,
}

impl GeminiClient {
    /// Create a new Gemini API client. The credential is read from `config` only.
    pub fn new(config: GeminiConfig) -> GeminiResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                GeminiError::MissingCredential(
                    "a Gemini API key is required to initialize the Gemini client".to_string(),
                )
            })?;

        let timeout_secs = config.request_timeout_secs.unwrap_or(60).max(1);
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| GeminiError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            model_name: config
                .model_name
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            config,
            api_key,
            timeout_secs,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model_name)
    }

    /// Generate content using the Gemini API
    pub async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> GeminiResult<GenerateContentResponse> {
        let response = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeminiError::GatewayUnavailable {
                status: Some(status.as_u16()),
                message: format!("API request failed: {}", body.trim()),
            });
        }

        response.json::<GenerateContentResponse>().await.map_err(|e| {
            if e.is_timeout() {
                GeminiError::GatewayTimeout(self.timeout_secs)
            } else {
                GeminiError::InvalidResponse(format!("Failed to parse response: {}", e))
            }
        })
    }

    fn map_transport_error(&self, e: reqwest::Error) -> GeminiError {
        if e.is_timeout() {
            GeminiError::GatewayTimeout(self.timeout_secs)
        } else {
            GeminiError::unavailable(format!("Failed to send request: {}", e.without_url()))
        }
    }

    /// Builds the wire request for a conversation and an optional tool catalog.
    pub fn build_request(
        &self,
        conversation: &Conversation,
        tools: &[FunctionDeclaration],
    ) -> GenerateContentRequest {
        let system_instruction = self.config.system_prompt.as_ref().map(|prompt| Content {
            parts: vec![Part::text(prompt.clone())],
            role: None,
        });

        let (tools, tool_config) = if tools.is_empty() {
            (None, None)
        } else {
            let function_declarations = tools.iter().map(wire_declaration).collect();
            (
                Some(vec![Tool {
                    function_declarations,
                }]),
                Some(ToolConfig::auto()),
            )
        };

        GenerateContentRequest {
            contents: conversation_to_contents(conversation),
            system_instruction,
            tools,
            tool_config,
            generation_config: Some(GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            }),
        }
    }
}

#[async_trait]
impl CompletionGateway for GeminiClient {
    async fn complete(
        &self,
        conversation: &Conversation,
        tools: &[FunctionDeclaration],
    ) -> GeminiResult<Completion> {
        let request = self.build_request(conversation, tools);
        debug!(
            model = %self.model_name,
            messages = conversation.len(),
            tools = tools.len(),
            "Sending generateContent request"
        );

        let response = self.generate_content(&request).await?;
        let completion = parse_completion(&response)?;

        info!(
            model = %self.model_name,
            tool_calls = completion.tool_calls.len(),
            "Received completion"
        );
        Ok(completion)
    }
}

/// Maps conversation messages onto Gemini contents.
///
/// Consecutive tool results are grouped into one content so the number of
/// function responses matches the function calls of the preceding model turn.
pub fn conversation_to_contents(conversation: &Conversation) -> Vec<Content> {
    let mut contents: Vec<Content> = Vec::new();
    // Ids the model assigned; generated ones never go on the wire.
    let mut model_ids: HashSet<&str> = HashSet::new();

    for message in conversation.messages() {
        match message {
            Message::Human { content } => contents.push(Content {
                parts: vec![Part::text(content.clone())],
                role: Some("user".to_string()),
            }),
            Message::AiResponse {
                content,
                tool_calls,
            } => {
                let mut parts = Vec::new();
                if !content.is_empty() {
                    parts.push(Part::text(content.clone()));
                }
                parts.extend(tool_calls.iter().map(|call| {
                    if call.from_model {
                        model_ids.insert(call.id.as_str());
                    }
                    Part::function_call(FunctionCall {
                        id: call.from_model.then(|| call.id.clone()),
                        name: call.name.clone(),
                        args: call.arguments.clone(),
                    })
                }));
                contents.push(Content {
                    parts,
                    role: Some("model".to_string()),
                });
            }
            Message::ToolResult {
                invocation_id,
                tool_name,
                content,
            } => {
                let part = Part::function_response(
                    model_ids
                        .contains(invocation_id.as_str())
                        .then(|| invocation_id.clone()),
                    tool_name.clone(),
                    json!({ "content": content }),
                );
                match contents.last_mut() {
                    Some(last)
                        if last.role.as_deref() == Some("user")
                            && last.parts.iter().all(|p| p.function_response.is_some()) =>
                    {
                        last.parts.push(part)
                    }
                    _ => contents.push(Content {
                        parts: vec![part],
                        role: Some("user".to_string()),
                    }),
                }
            }
        }
    }

    contents
}

/// Extracts the answer text and any tool calls from the first candidate.
pub fn parse_completion(response: &GenerateContentResponse) -> GeminiResult<Completion> {
    let candidate = response.candidates.first().ok_or_else(|| {
        GeminiError::InvalidResponse(match &response.prompt_feedback {
            Some(feedback) => format!("No candidates in response (feedback: {})", feedback),
            None => "No candidates in response".to_string(),
        })
    })?;

    let content = candidate.content.as_ref().ok_or_else(|| {
        GeminiError::InvalidResponse(format!(
            "No content in candidate (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        ))
    })?;

    let mut completion = Completion::default();
    for part in &content.parts {
        if let Some(text) = &part.text {
            completion.text.push_str(text);
        }
        if let Some(call) = &part.function_call {
            let (id, from_model) = match &call.id {
                Some(id) if !id.is_empty() => (id.clone(), true),
                _ => (uuid::Uuid::new_v4().to_string(), false),
            };
            completion.tool_calls.push(ToolInvocationRequest {
                id,
                name: call.name.clone(),
                arguments: call.args.clone(),
                from_model,
            });
        }
    }

    Ok(completion)
}

fn wire_declaration(declaration: &FunctionDeclaration) -> FunctionDeclaration {
    let parameters = declaration
        .parameters
        .clone()
        .map(sanitize_json_schema)
        .filter(|schema| has_properties(schema));

    FunctionDeclaration {
        name: declaration.name.clone(),
        description: declaration.description.clone(),
        parameters,
    }
}

fn has_properties(schema: &Value) -> bool {
    schema
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(|props| !props.is_empty())
}

/// Reduces a JSON schema to the subset accepted by Gemini
pub fn sanitize_json_schema(schema: Value) -> Value {
    let Value::Object(obj) = schema else {
        return schema;
    };

    let mut out = Map::new();
    for (key, value) in obj {
        if !SUPPORTED_SCHEMA_KEYS.contains(&key.as_str()) {
            continue;
        }
        let value = match key.as_str() {
            "properties" => match value {
                Value::Object(props) => Value::Object(
                    props
                        .into_iter()
                        .map(|(name, prop)| (name, sanitize_json_schema(prop)))
                        .collect(),
                ),
                other => other,
            },
            "items" => sanitize_json_schema(value),
            "anyOf" => match value {
                Value::Array(variants) => {
                    Value::Array(variants.into_iter().map(sanitize_json_schema).collect())
                }
                other => other,
            },
            "type" => match value {
                // JSON schema allows ["integer", "null"]; Gemini wants one type plus `nullable`.
                Value::Array(types) => {
                    if types.iter().any(|t| t == "null") {
                        out.insert("nullable".to_string(), Value::Bool(true));
                    }
                    types
                        .into_iter()
                        .find(|t| t != "null")
                        .unwrap_or_else(|| Value::String("string".to_string()))
                }
                other => other,
            },
            _ => value,
        };
        out.insert(key, value);
    }

    Value::Object(out)
}
