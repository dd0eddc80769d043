//! Unified configuration layer.
//!
//! All environment variable reads funnel through here; business code accesses
//! config via the structured types in `schema` rather than calling
//! `std::env::var` directly.
//!
//! - `env_keys`  — centralized variable name constants
//! - `loader`    — env_or / env_optional / env_bool helpers
//! - `schema`    — LlmConfig, LimitsConfig, ModelsConfig, ObservabilityConfig

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use loader::{env_bool, env_num, env_optional, env_or, load_dotenv};
pub use schema::{LimitsConfig, LlmConfig, ModelEntry, ModelsConfig, ObservabilityConfig, RoleDefaults};
