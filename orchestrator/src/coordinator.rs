use crate::errors::QueryResult;
use gemini_core::types::FunctionDeclaration;
use gemini_core::{CompletionGateway, Conversation, Message, OrchestratorConfig};
use gemini_mcp::{to_function_declarations, ToolTransport};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Per-query knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Rounds in which the model may call tools. With `0` no tools are offered.
    pub max_tool_rounds: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self { max_tool_rounds: 1 }
    }
}

impl From<&OrchestratorConfig> for QueryOptions {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            max_tool_rounds: config.max_tool_rounds,
        }
    }
}

/// Result of a successful query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub answer: String,
    /// Invoked tools in invocation order; repeats are kept.
    pub tool_names: Vec<String>,
}

/// Answers one query, letting the model call tools from the transport's catalog.
///
/// Every query starts from a fresh conversation. Tool and gateway failures
/// abort the query and are returned as-is; no partial answer is produced.
pub async fn process_query<T, G>(
    transport: &mut T,
    gateway: &G,
    query: &str,
    options: QueryOptions,
) -> QueryResult<QueryOutcome>
where
    T: ToolTransport + ?Sized,
    G: CompletionGateway + ?Sized,
{
    let mut conversation = Conversation::from_query(query);

    let catalog = transport.list_tools().await?;
    let declarations = to_function_declarations(&catalog)?;
    debug!(tools = declarations.len(), "Offering tools to the model");

    let mut completion = gateway
        .complete(&conversation, offered(&declarations, 0, options))
        .await?;

    if !completion.has_tool_calls() {
        info!("Answered without tools");
        return Ok(QueryOutcome {
            answer: completion.text,
            tool_names: Vec::new(),
        });
    }

    let mut answers: Vec<String> = Vec::new();
    let mut tool_names = Vec::new();
    let mut round = 0;

    while completion.has_tool_calls() {
        if round >= options.max_tool_rounds {
            warn!(
                calls = completion.tool_calls.len(),
                "Model requested tools after the last tool round; ignoring"
            );
            if answers.is_empty() {
                answers.push(completion.text);
            }
            break;
        }
        round += 1;

        conversation.push(completion.to_message());
        for request in &completion.tool_calls {
            info!(
                round,
                tool = %request.name,
                id = %request.id,
                arguments = %serde_json::Value::Object(request.arguments.clone()),
                "Invoking tool"
            );
            let result = transport
                .call_tool(&request.name, request.arguments.clone())
                .await?;
            info!(tool = %request.name, result = %result.text(), "Tool finished");

            conversation.push(Message::tool_result(request, result.into_value()));
            tool_names.push(request.name.clone());
        }

        completion = gateway
            .complete(&conversation, offered(&declarations, round, options))
            .await?;
        if !completion.text.is_empty() {
            answers.push(completion.text.clone());
        }
    }

    Ok(QueryOutcome {
        answer: answers.join("\n"),
        tool_names,
    })
}

// Tools go out only while another tool round is still allowed.
fn offered(
    declarations: &[FunctionDeclaration],
    completed_rounds: usize,
    options: QueryOptions,
) -> &[FunctionDeclaration] {
    if completed_rounds < options.max_tool_rounds {
        declarations
    } else {
        &[]
    }
}
