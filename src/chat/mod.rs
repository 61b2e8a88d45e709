//! Interactive chat built on top of the palaver transport.
//!
//! This module provides a streaming REPL chat interface.  It supports:
//!
//! - Streaming responses with real-time token display
//! - Elapsed-time feedback while waiting for the model
//! - Bare-word commands for session control
//! - Configuration from the command line and the environment
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: the session engine that runs one request/response cycle per user turn
//! - [`commands`]: command parsing and the input state machine

mod commands;
pub mod config;
mod session;

pub use crate::render::{EventStreamRenderer, PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, Flow, handle_input, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use session::{ChatSession, CycleOutcome, SessionStats};
