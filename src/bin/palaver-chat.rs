//! Interactive chat with an OpenAI-compatible chat-completion service.
//!
//! This binary provides a streaming REPL: each line you type is sent to the model together with
//! the conversation so far, and the answer is printed as it arrives.
//!
//! # Usage
//!
//! ```bash
//! export AI_API_KEY=sk-...
//! export AI_BASE_URL=https://dashscope.aliyuncs.com/compatible-mode/v1
//! export AI_MODEL=qwen-plus
//!
//! # Basic usage with settings from the environment
//! palaver-chat
//!
//! # Override the model and system prompt
//! palaver-chat --model qwen-max --system "You are a helpful coding assistant"
//!
//! # Disable colors (useful for piping output)
//! palaver-chat --no-color
//! ```
//!
//! # Commands
//!
//! - `history` - Show the conversation so far
//! - `clear` - Clear conversation history
//! - `stats` - Show session statistics
//! - `help` - Show available commands
//! - `quit` / `exit` - Exit the application
//!
//! Set `PALAVER_LOG` (e.g. `PALAVER_LOG=debug`) to see diagnostics on stderr.

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use palaver::ChatClient;
use palaver::chat::{
    ChatArgs, ChatConfig, ChatSession, EventStreamRenderer, Flow, PlainTextRenderer, Renderer,
    handle_input,
};

const LOG_ENV: &str = "PALAVER_LOG";

/// Main entry point for the palaver-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("palaver-chat [OPTIONS]");
    init_logging();

    let config = match ChatConfig::from_env(args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("palaver-chat: {err}");
            std::process::exit(2);
        }
    };
    tracing::debug!(?config, "resolved configuration");

    let mut renderer: Box<dyn Renderer> = if config.event_stream {
        Box::new(EventStreamRenderer::new(std::io::stdout()))
    } else {
        Box::new(PlainTextRenderer::with_color(config.use_color))
    };

    let client = ChatClient::from_config(&config)?;
    let mut session = ChatSession::new(client, config);
    let mut rl = DefaultEditor::new()?;

    // Ctrl+C while a cycle is running ends the session.
    let (interrupt_tx, mut interrupts) = mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(());
    })?;

    renderer.print_info(&format!("Chat (model: {})", session.model()));
    renderer.print_info("Type help for commands, quit to exit");

    loop {
        // Discard interrupts delivered while no cycle was running.
        while interrupts.try_recv().is_ok() {}

        match rl.readline("You: ") {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = rl.add_history_entry(line.trim());
                }
                let flow = tokio::select! {
                    flow = handle_input(&mut session, &line, renderer.as_mut()) => Some(flow),
                    _ = interrupts.recv() => None,
                };
                match flow {
                    Some(Flow::Continue) => {}
                    Some(Flow::Exit) => break,
                    None => {
                        // The abandoned cycle's indicator may still be winding down.
                        renderer.clear_progress();
                        renderer.print_info("Interrupted. Goodbye!");
                        break;
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at the prompt clears the line.
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                renderer.print_info("Goodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
