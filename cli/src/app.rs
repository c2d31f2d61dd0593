use anyhow::{Context, Result};
use colored::*;
use gemini_core::CompletionGateway;
use gemini_mcp::ToolTransport;
use gemini_orchestrator::{McpChatClient, QueryOutcome};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info};

/// Answers one prompt and prints the result.
pub async fn run_single_query<T, G>(client: &mut McpChatClient<T, G>, prompt: &str) -> Result<()>
where
    T: ToolTransport,
    G: CompletionGateway,
{
    info!("Running single query: {}", prompt);
    let outcome = client
        .answer_query(prompt)
        .await
        .context("Failed to answer query")?;
    print_outcome(&outcome);
    Ok(())
}

/// Reads prompts from stdin until `quit`, `exit` or end of input.
///
/// A failed query is reported and the loop goes on.
pub async fn run_interactive_chat<T, G>(client: &mut McpChatClient<T, G>) -> Result<()>
where
    T: ToolTransport,
    G: CompletionGateway,
{
    match client.list_tool_names().await {
        Ok(tools) if !tools.is_empty() => {
            println!("{} {}", "Tools:".cyan().bold(), tools.join(", "))
        }
        Ok(_) => println!("{}", "The server offers no tools.".yellow()),
        Err(e) => error!(error = %e, "Failed to list tools"),
    }
    println!("Type your queries or 'quit' to exit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}: ", "Query".green().bold());
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(input) = lines.next_line().await.context("Failed to read input")? else {
            println!();
            break;
        };
        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("quit") || input.eq_ignore_ascii_case("exit") {
            println!("Exiting chat session.");
            break;
        }

        debug!("Sending query: {}", input);
        match client.answer_query(input).await {
            Ok(outcome) => print_outcome(&outcome),
            Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
        }
        println!(); // Add spacing between interactions
    }

    Ok(())
}

pub fn print_outcome(outcome: &QueryOutcome) {
    println!("{}", outcome.answer);
    if !outcome.tool_names.is_empty() {
        println!(
            "{} {}",
            "Tools used:".cyan(),
            outcome.tool_names.join(", ")
        );
    }
}
