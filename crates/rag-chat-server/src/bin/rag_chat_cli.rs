use anyhow::Result;
use clap::Parser;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use rag_chat_server::config::{settings::DEFAULT_CONFIG_PATH, Settings};
use rag_chat_server::models::ConversationTurn;
use rag_chat_server::services::prompt::INITIAL_MESSAGE;
use rag_chat_server::services::conversation::trim_window;
use rag_chat_server::services::ConversationEngine;

#[derive(Parser, Debug)]
#[command(
    name = "rag-chat-cli",
    version,
    about = "Terminal chat against the RAG assistant"
)]
struct Args {
    /// Path to the settings file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Log filter (logs go to stderr)
    #[arg(long, default_value = "warn")]
    log: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(args.log.as_str())
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::load_from(&args.config)?;
    let engine = ConversationEngine::from_settings(&settings)?;
    let window = settings.session.max_messages;

    let greeting = settings
        .prompts
        .greeting
        .clone()
        .filter(|g| !g.trim().is_empty())
        .unwrap_or_else(|| INITIAL_MESSAGE.to_string());
    println!("\nBot: {}\n", greeting);

    let mut recent_messages: Vec<ConversationTurn> = Vec::new();
    let mut summary: Option<String> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();

        if question.is_empty() {
            continue;
        }
        if matches!(question.to_lowercase().as_str(), "exit" | "quit") {
            println!("\nBot: Goodbye!");
            break;
        }

        match engine.chat(question, &recent_messages, summary.clone()).await {
            Ok(result) => {
                println!("\nBot: {}\n", result.answer);

                recent_messages.push(ConversationTurn::user(question));
                recent_messages.push(ConversationTurn::assistant(result.answer));
                trim_window(&mut recent_messages, window);

                summary = result.updated_summary;
            }
            Err(e) => {
                warn!("Chat turn failed: {}", e);
                println!("\nBot: Sorry, I had trouble answering that. Please try again.\n");
            }
        }
    }

    Ok(())
}
