//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! relay.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → Relay::from_config / FrontServer
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CacheConfig, CdnConfig, FastPathConfig, FrontConfig, ObservabilityConfig, ProtocolConfig,
    RelayConfig, RelayNodeConfig, RelayPoolConfig,
};
pub use validation::ValidationError;
