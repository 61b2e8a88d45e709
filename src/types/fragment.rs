use serde::Deserialize;

/// One incremental piece of a streamed response.
///
/// A fragment may carry no text at all: role announcements, finish markers and keep-alive
/// chunks all arrive as fragments whose `content` is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    /// The text carried by this fragment, if any.
    pub content: Option<String>,
}

impl Fragment {
    /// A fragment carrying text.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
        }
    }

    /// A fragment carrying nothing to display.
    pub fn empty() -> Self {
        Self { content: None }
    }

    /// The non-empty text of this fragment.
    pub fn content_text(&self) -> Option<&str> {
        self.content.as_deref().filter(|text| !text.is_empty())
    }
}

/// A streamed chat-completion chunk as sent by OpenAI-compatible services.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionChunk {
    /// Choices carried by this chunk; only the first is used.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

/// One choice within a streamed chunk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    /// The incremental delta.
    #[serde(default)]
    pub delta: Option<ChunkDelta>,

    /// Why generation stopped, on the final chunk.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// The incremental message delta within a choice.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    /// The role, usually only present on the first chunk.
    #[serde(default)]
    pub role: Option<String>,

    /// Newly generated text.
    #[serde(default)]
    pub content: Option<String>,
}

impl From<ChatCompletionChunk> for Fragment {
    fn from(chunk: ChatCompletionChunk) -> Self {
        let content = chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content);
        Fragment { content }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment_from(json: &str) -> Fragment {
        serde_json::from_str::<ChatCompletionChunk>(json)
            .unwrap()
            .into()
    }

    #[test]
    fn delta_content_becomes_text() {
        let fragment = fragment_from(r#"{"choices":[{"delta":{"content":"He"}}]}"#);
        assert_eq!(fragment.content_text(), Some("He"));
    }

    #[test]
    fn missing_or_null_content_is_empty() {
        assert_eq!(
            fragment_from(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#),
            Fragment::empty()
        );
        assert_eq!(
            fragment_from(r#"{"choices":[{"delta":{"content":null}}]}"#),
            Fragment::empty()
        );
        assert_eq!(
            fragment_from(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#),
            Fragment::empty()
        );
        assert_eq!(fragment_from(r#"{"choices":[]}"#), Fragment::empty());
        assert_eq!(fragment_from(r#"{"id":"x"}"#), Fragment::empty());
    }

    #[test]
    fn empty_string_has_no_text() {
        assert_eq!(Fragment::text("").content_text(), None);
    }
}
