//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolved [`ChatConfig`] that is
//! handed to the client and the session at construction.  The environment is read exactly once,
//! in [`ChatConfig::from_env`].

use std::fmt;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::error::{Error, Result};

/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "AI_API_KEY";

/// Environment variable holding the base URL of the chat-completion service.
pub const BASE_URL_VAR: &str = "AI_BASE_URL";

/// Environment variable holding the model name.
pub const MODEL_VAR: &str = "AI_MODEL";

/// Default system prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Default maximum tokens per response.
const DEFAULT_MAX_TOKENS: u32 = 500;

/// Default sampling temperature.
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default interval between progress updates.
const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Command-line arguments for the palaver-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: $AI_MODEL)", "MODEL")]
    pub model: Option<String>,

    /// System prompt to set context for the conversation.
    #[arrrg(optional, "System prompt for the conversation", "PROMPT")]
    pub system: Option<String>,

    /// Maximum tokens per response.
    #[arrrg(optional, "Max tokens per response (default: 500)", "TOKENS")]
    pub max_tokens: Option<u32>,

    /// Base URL of the chat-completion service.
    #[arrrg(optional, "Base URL of the service (default: $AI_BASE_URL)", "URL")]
    pub base_url: Option<String>,

    /// Request timeout in seconds.
    #[arrrg(optional, "Seconds to wait for a response (default: 60)", "SECONDS")]
    pub timeout_secs: Option<u64>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Request complete responses instead of streams.
    #[arrrg(flag, "Disable streaming responses")]
    pub no_stream: bool,

    /// Write answers as server-sent events instead of plain text.
    #[arrrg(flag, "Emit answers as server-sent events")]
    pub events: bool,
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing command-line arguments
/// and the environment with appropriate defaults.
#[derive(Clone)]
pub struct ChatConfig {
    /// The key presented to the service.
    pub api_key: String,

    /// Base URL of the chat-completion service, e.g. `https://api.openai.com/v1`.
    pub base_url: String,

    /// The model to use for generating responses.
    pub model: String,

    /// The system prompt that opens every transcript.
    pub system_prompt: String,

    /// Maximum tokens per response.
    pub max_tokens: Option<u32>,

    /// Optional sampling temperature.
    pub temperature: Option<f32>,

    /// How long to wait for the service to start answering.
    pub timeout: Duration,

    /// How often the progress indicator refreshes.
    pub progress_interval: Duration,

    /// Whether responses are streamed.
    pub streaming: bool,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Whether answers are written as server-sent events.
    pub event_stream: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - System prompt: "You are a helpful assistant."
    /// - Max tokens: 500
    /// - Temperature: 0.7
    /// - Timeout: 60 seconds
    /// - Streaming and color: enabled
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens: Some(DEFAULT_MAX_TOKENS),
            temperature: Some(DEFAULT_TEMPERATURE),
            timeout: DEFAULT_TIMEOUT,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            streaming: true,
            use_color: true,
            event_stream: false,
        }
    }

    /// Resolves configuration from command-line arguments and the process environment.
    pub fn from_env(args: ChatArgs) -> Result<Self> {
        Self::resolve(args, |name| std::env::var(name).ok())
    }

    /// Resolves configuration from command-line arguments and an environment lookup.
    ///
    /// Arguments take precedence over the environment.  The API key can only come from the
    /// environment so that it never shows up in process listings.
    pub fn resolve<F>(args: ChatArgs, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| env(name).filter(|value| !value.trim().is_empty());

        let api_key = lookup(API_KEY_VAR).ok_or_else(|| {
            Error::authentication(format!(
                "{API_KEY_VAR} is not configured; please check your environment variables"
            ))
        })?;
        let base_url = args.base_url.or_else(|| lookup(BASE_URL_VAR)).ok_or_else(|| {
            Error::validation(
                format!("{BASE_URL_VAR} is not configured"),
                Some("base_url".to_string()),
            )
        })?;
        let model = args.model.or_else(|| lookup(MODEL_VAR)).ok_or_else(|| {
            Error::validation(
                format!("{MODEL_VAR} is not configured"),
                Some("model".to_string()),
            )
        })?;

        let mut config = ChatConfig::new(api_key, base_url, model);
        if let Some(system) = args.system {
            config.system_prompt = system;
        }
        if let Some(max_tokens) = args.max_tokens {
            config.max_tokens = Some(max_tokens);
        }
        if let Some(secs) = args.timeout_secs {
            if secs == 0 {
                return Err(Error::validation(
                    "timeout must be at least one second",
                    Some("timeout_secs".to_string()),
                ));
            }
            config.timeout = Duration::from_secs(secs);
        }
        config.streaming = !args.no_stream;
        config.use_color = !args.no_color;
        config.event_stream = args.events;
        Ok(config)
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Sets the maximum tokens per response.
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets how long to wait for the service to start answering.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets how often the progress indicator refreshes.
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Enables or disables streaming responses.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatConfig")
            .field("api_key", &mask(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("system_prompt", &self.system_prompt)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .field("progress_interval", &self.progress_interval)
            .field("streaming", &self.streaming)
            .field("use_color", &self.use_color)
            .field("event_stream", &self.event_stream)
            .finish()
    }
}

/// Replaces every character of a secret with `*`.
pub(crate) fn mask(secret: &str) -> String {
    "*".repeat(secret.chars().count())
}
