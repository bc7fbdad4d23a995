pub mod engine;
pub mod scoring;
pub mod state;

pub use engine::{AggregatedError, FallbackEngine, ProviderEntry};
pub use scoring::{classify_task, ScoringEngine, TaskType};
pub use state::{ProviderLifecycle, ProviderState};
