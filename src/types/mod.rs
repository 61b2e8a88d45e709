mod chat_completion;
mod chat_request;
mod fragment;
mod turn;

pub use chat_completion::{ChatCompletion, CompletionChoice, CompletionMessage};
pub use chat_request::ChatCompletionRequest;
pub use fragment::{ChatCompletionChunk, ChunkChoice, ChunkDelta, Fragment};
pub use turn::{Role, Turn};
