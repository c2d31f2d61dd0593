use clap::{Parser, Subcommand};
use gemini_core::{GeminiConfig, UnifiedConfig};
use gemini_mcp::EndpointDescriptor;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Chat with Gemini using the tools of an MCP server
#[derive(Parser, Debug)]
#[command(name = "mcp-chat", author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to config file (defaults to ~/.config/gemini-mcp-chat/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Gemini model to use
    #[arg(short = 'o', long, global = true)]
    pub model: Option<String>,

    /// Gemini API key (otherwise GEMINI_API_KEY / GOOGLE_API_KEY)
    #[arg(short = 'k', long, global = true)]
    pub api_key: Option<String>,

    /// How many rounds of tool calls the model may make per query
    #[arg(long, global = true)]
    pub max_tool_rounds: Option<usize>,

    /// Server kind (python, node, executable); inferred from the extension if omitted
    #[arg(long, global = true)]
    pub kind: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Interactive chat; type 'quit' to leave
    Chat {
        /// Path to the MCP server script or executable
        server: PathBuf,
    },
    /// Answer a single prompt and exit
    Ask {
        /// Path to the MCP server script or executable
        server: PathBuf,
        /// The prompt to answer
        prompt: String,
    },
    /// Serve the chat over HTTP
    Serve {
        /// Path to the MCP server script or executable
        server: PathBuf,
        /// HTTP listen address (defaults to the config's http.addr)
        #[arg(long)]
        addr: Option<SocketAddr>,
    },
}

impl Args {
    /// Command line values win over the config file and the environment.
    pub fn apply_to(&self, config: &mut UnifiedConfig) {
        let overrides = GeminiConfig {
            api_key: self.api_key.clone(),
            model_name: self.model.clone(),
            system_prompt: None,
            temperature: None,
            max_output_tokens: None,
            base_url: None,
            request_timeout_secs: None,
        };
        config.gemini = config.gemini.merge(&overrides);

        if let Some(rounds) = self.max_tool_rounds {
            config.orchestrator.max_tool_rounds = rounds;
        }
        if let Command::Serve {
            addr: Some(addr), ..
        } = &self.command
        {
            config.http.addr = addr.to_string();
        }
        if self.verbose {
            config.log_level = "debug".to_string();
        }
    }

    pub fn endpoint(&self) -> EndpointDescriptor {
        let server = match &self.command {
            Command::Chat { server } | Command::Ask { server, .. } | Command::Serve { server, .. } => {
                server.clone()
            }
        };
        match &self.kind {
            Some(kind) => EndpointDescriptor::with_kind(server, kind.clone()),
            None => EndpointDescriptor::new(server),
        }
    }
}
