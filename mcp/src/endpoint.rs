use crate::errors::{McpError, McpResult};
use gemini_core::McpConfig;
use std::path::{Path, PathBuf};

/// How a tool server is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// Python script, run through the configured interpreter.
    Python,
    /// JavaScript module, run through the configured Node binary.
    Node,
    /// Native executable, run directly.
    Executable,
}

impl EndpointKind {
    /// Parses a declared kind name.
    pub fn from_name(name: &str) -> McpResult<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "python" | "py" => Ok(EndpointKind::Python),
            "node" | "js" | "javascript" => Ok(EndpointKind::Node),
            "executable" | "exec" | "binary" => Ok(EndpointKind::Executable),
            other => Err(McpError::UnsupportedEndpointKind(other.to_string())),
        }
    }

    /// Infers the kind from a script's extension.
    pub fn from_path(path: &Path) -> McpResult<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("py") => Ok(EndpointKind::Python),
            Some("js") | Some("mjs") | Some("cjs") => Ok(EndpointKind::Node),
            Some(other) => Err(McpError::UnsupportedEndpointKind(format!(
                "'.{}' (server script must be a .py or .js file)",
                other
            ))),
            None => Err(McpError::UnsupportedEndpointKind(format!(
                "{} has no extension; declare its kind explicitly",
                path.display()
            ))),
        }
    }
}

/// Identifies a tool server: where it lives and how to run it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub path: PathBuf,
    /// Declared kind name; inferred from the extension when absent.
    pub kind: Option<String>,
}

impl EndpointDescriptor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: None,
        }
    }

    pub fn with_kind(path: impl Into<PathBuf>, kind: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: Some(kind.into()),
        }
    }

    pub fn resolve_kind(&self) -> McpResult<EndpointKind> {
        match &self.kind {
            Some(name) => EndpointKind::from_name(name),
            None => EndpointKind::from_path(&self.path),
        }
    }

    /// Program and arguments used to spawn the server.
    pub fn command(&self, config: &McpConfig) -> McpResult<(String, Vec<String>)> {
        let script = self.path.to_string_lossy().into_owned();
        Ok(match self.resolve_kind()? {
            EndpointKind::Python => (config.python_command.clone(), vec![script]),
            EndpointKind::Node => (config.node_command.clone(), vec![script]),
            EndpointKind::Executable => (script, Vec::new()),
        })
    }
}

impl std::fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}
