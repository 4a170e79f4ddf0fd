pub mod config;
pub mod generation;

pub use config::{GlobalConfig, GlobalConfigError, GlobalConfigPatch};
pub use generation::{GenerationId, GenerationIdError};
