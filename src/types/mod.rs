//! Public types for the Mimir API.

mod message;
mod params;
mod response;
mod source;

pub use message::{GREETING, Message, Role, trim_history};
pub use params::{DEFAULT_NUM_DOCS, DEFAULT_SIMILARITY_THRESHOLD, RetrievalParams};
pub use response::{
    Completion, CompletionKind, EngineResponse, EventStream, GenerationEvent, Mode,
};
pub use source::{SourceReference, format_sources};
