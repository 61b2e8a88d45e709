//! The seam between the session engine and whatever talks to the model.

use std::pin::Pin;

use futures::Stream;

use crate::error::Result;
use crate::types::{Fragment, Turn};

/// A lazy, finite, non-restartable sequence of response fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment>> + Send>>;

/// What a transport hands back once the model starts answering.
pub enum Reply {
    /// The response will arrive incrementally.
    Stream(FragmentStream),

    /// The response arrived in one piece.
    Complete(Turn),
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Stream(_) => f.write_str("Reply::Stream(..)"),
            Reply::Complete(turn) => f.debug_tuple("Reply::Complete").field(turn).finish(),
        }
    }
}

/// Sends a conversation to a model.
///
/// Implementations own retries, authentication and the wire protocol.  Errors they return should
/// use the tagged variants of [`crate::Error`] so that the engine can classify them.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// The model this transport talks to.
    fn model(&self) -> &str;

    /// Send the full conversation.
    ///
    /// Resolves as soon as the model starts answering: for a streaming request that is when the
    /// stream handle is available, not when the last fragment arrives.
    async fn send(&self, turns: &[Turn], streaming: bool) -> Result<Reply>;
}
