//! Turns a server's tool catalog into function declarations for the model.

use crate::errors::{McpError, McpResult};
use crate::rpc::ToolDescriptor;
use gemini_core::types::FunctionDeclaration;
use serde_json::Value;

/// Converts tool descriptors into function declarations, keeping name,
/// description and input schema as the server reported them.
///
/// A schema that is not a JSON object (or whose `properties` is not an
/// object) cannot be declared and yields [`McpError::InvalidToolSchema`].
pub fn to_function_declarations(tools: &[ToolDescriptor]) -> McpResult<Vec<FunctionDeclaration>> {
    tools.iter().map(to_function_declaration).collect()
}

fn to_function_declaration(tool: &ToolDescriptor) -> McpResult<FunctionDeclaration> {
    let invalid = |reason: &str| McpError::InvalidToolSchema {
        tool: tool.name.clone(),
        reason: reason.to_string(),
    };

    let schema = tool
        .input_schema
        .as_object()
        .ok_or_else(|| invalid("input schema must be a JSON object"))?;

    if let Some(properties) = schema.get("properties") {
        if !properties.is_object() {
            return Err(invalid("'properties' must be a JSON object"));
        }
    }
    if let Some(kind) = schema.get("type") {
        if kind != "object" {
            return Err(invalid("top-level schema type must be 'object'"));
        }
    }

    Ok(FunctionDeclaration {
        name: tool.name.clone(),
        description: tool.description.clone(),
        parameters: Some(Value::Object(schema.clone())),
    })
}
