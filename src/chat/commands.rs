//! Command parsing for the chat application.
//!
//! A handful of bare words control the session instead of being sent to the model.  Matching is
//! case-insensitive and ignores surrounding whitespace; anything else is conversation.

use crate::chat::session::ChatSession;
use crate::render::Renderer;
use crate::transport::Transport;

/// A parsed line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Exit the chat application.
    Quit,

    /// Show the conversation so far.
    History,

    /// Reset the conversation to the system prompt.
    Clear,

    /// Display help information.
    Help,

    /// Display session statistics.
    Stats,

    /// Blank input.
    Empty,

    /// Ordinary conversation, trimmed.
    Message(String),
}

/// What the input loop should do after a line has been handled.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Wait for the next line.
    Continue,

    /// End the session.
    Exit,
}

/// Classifies one line of user input.
///
/// # Examples
///
/// ```
/// # use palaver::chat::{ChatCommand, parse_command};
/// assert_eq!(parse_command("  QUIT "), ChatCommand::Quit);
/// assert_eq!(parse_command("clear"), ChatCommand::Clear);
/// assert_eq!(
///     parse_command("clear the table"),
///     ChatCommand::Message("clear the table".to_string())
/// );
/// ```
pub fn parse_command(input: &str) -> ChatCommand {
    let input = input.trim();
    if input.is_empty() {
        return ChatCommand::Empty;
    }
    match input.to_lowercase().as_str() {
        "quit" | "exit" => ChatCommand::Quit,
        "history" => ChatCommand::History,
        "clear" => ChatCommand::Clear,
        "help" => ChatCommand::Help,
        "stats" => ChatCommand::Stats,
        _ => ChatCommand::Message(input.to_string()),
    }
}

/// Handles one line of user input against the session.
///
/// Only `quit`/`exit` return [`Flow::Exit`]; every other input, including a failed cycle,
/// returns to waiting for input.
pub async fn handle_input<T: Transport>(
    session: &mut ChatSession<T>,
    input: &str,
    renderer: &mut dyn Renderer,
) -> Flow {
    match parse_command(input) {
        ChatCommand::Quit => {
            renderer.print_info("Goodbye!");
            return Flow::Exit;
        }
        ChatCommand::History => {
            for turn in session.visible_history() {
                renderer.print_info(&format!("{}: {}", turn.role(), turn.content()));
            }
        }
        ChatCommand::Clear => {
            session.clear();
            renderer.print_info("Conversation cleared.");
        }
        ChatCommand::Help => {
            for line in help_text().lines() {
                renderer.print_info(&format!("    {line}"));
            }
        }
        ChatCommand::Stats => {
            let stats = session.stats();
            renderer.print_info("    Session Statistics:");
            renderer.print_info(&format!("      Model: {}", stats.model));
            renderer.print_info(&format!("      Turns: {}", stats.turn_count));
            renderer.print_info(&format!(
                "      Cycles: {} ({} failed)",
                stats.cycles, stats.failures
            ));
            match stats.last_elapsed {
                Some(elapsed) => renderer.print_info(&format!(
                    "      Last response time: {:.2}s",
                    elapsed.as_secs_f64()
                )),
                None => renderer.print_info("      Last response time: (none)"),
            }
        }
        ChatCommand::Empty => {
            renderer.print_info("Message cannot be empty.");
        }
        ChatCommand::Message(message) => {
            session.send(&message, renderer).await;
        }
    }
    Flow::Continue
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  history                Show the conversation so far
  clear                  Clear conversation history
  stats                  Show session statistics
  help                   Show this help message
  quit, exit             Exit the chat
Anything else is sent to the model."#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("quit"), ChatCommand::Quit);
        assert_eq!(parse_command("exit"), ChatCommand::Quit);
        assert_eq!(parse_command("  Quit  "), ChatCommand::Quit);
        assert_eq!(parse_command("EXIT"), ChatCommand::Quit);
    }

    #[test]
    fn parse_history_and_clear() {
        assert_eq!(parse_command("history"), ChatCommand::History);
        assert_eq!(parse_command("HISTORY\n"), ChatCommand::History);
        assert_eq!(parse_command("clear"), ChatCommand::Clear);
        assert_eq!(parse_command("\tClear"), ChatCommand::Clear);
    }

    #[test]
    fn parse_help_and_stats() {
        assert_eq!(parse_command("help"), ChatCommand::Help);
        assert_eq!(parse_command("stats"), ChatCommand::Stats);
    }

    #[test]
    fn blank_input_is_empty() {
        assert_eq!(parse_command(""), ChatCommand::Empty);
        assert_eq!(parse_command("   \t  "), ChatCommand::Empty);
    }

    #[test]
    fn everything_else_is_a_message() {
        assert_eq!(
            parse_command("  hi there "),
            ChatCommand::Message("hi there".to_string())
        );
        assert_eq!(
            parse_command("quit smoking"),
            ChatCommand::Message("quit smoking".to_string())
        );
        assert_eq!(
            parse_command("/quit"),
            ChatCommand::Message("/quit".to_string())
        );
    }

    #[test]
    fn help_text_not_empty() {
        let help = help_text();
        assert!(help.contains("quit"));
        assert!(help.contains("history"));
        assert!(help.contains("clear"));
    }
}
