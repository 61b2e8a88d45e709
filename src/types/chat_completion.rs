use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::Turn;

/// A complete, non-streamed chat-completion response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletion {
    /// Generated choices; only the first is used.
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

/// One choice of a complete response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionChoice {
    /// The generated message.
    #[serde(default)]
    pub message: Option<CompletionMessage>,
}

/// The generated message of a complete response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionMessage {
    /// Generated text.
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletion {
    /// Convert the first choice into an assistant turn.
    ///
    /// A response without text is an [`Error::EmptyResponse`]; an empty assistant turn is never
    /// produced.
    pub fn into_turn(self) -> Result<Turn> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.is_empty())
            .map(Turn::assistant)
            .ok_or_else(|| Error::empty_response("the model returned no content"))
    }
}
