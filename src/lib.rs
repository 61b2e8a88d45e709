// Public modules
pub mod chat;
pub mod client;
pub mod collector;
pub mod error;
pub mod observability;
pub mod progress;
pub mod render;
pub mod sse;
pub mod transcript;
pub mod transport;
pub mod types;

// Re-exports
pub use client::ChatClient;
pub use collector::StreamCollector;
pub use error::{Error, FailureClass, Result};
pub use observability::register_biometrics;
pub use progress::{NullProgress, ProgressIndicator, ProgressSink};
pub use render::Renderer;
pub use transcript::Transcript;
pub use transport::{FragmentStream, Reply, Transport};
pub use types::*;
