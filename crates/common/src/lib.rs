pub mod config;
pub mod error;
pub mod ids;
pub mod logging;
pub mod types;

pub use config::{GatewayConfig, ProviderConfig};
pub use error::ErrorKind;
pub use ids::{new_context_id, new_request_id};
pub use logging::init_tracing;
