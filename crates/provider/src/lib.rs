pub mod adapters;
pub mod client;
pub mod config;
pub mod registry;
pub mod rotator;
pub mod types;

pub use client::{ChunkStream, ClientError, ProviderClient};
pub use config::ProviderConfig;
pub use rotator::KeyRotator;
pub use types::{InvokeParams, InvokeResponse, Message, StreamChunk};
