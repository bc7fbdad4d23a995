pub mod chunking;
pub mod encoder;
pub mod extract;
pub mod store;

pub use chunking::chunk_text;
pub use encoder::Encoder;
pub use extract::{extract_text, validate_image, DocumentKind};
pub use store::{ContextEntry, ContextError, ContextMetadata, ContextStore, ScoredChunk};
