pub mod adapters;
pub mod agent;
pub mod config;
pub mod core;
pub mod domain;
pub mod tools;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::{CliConfig, Command};

pub use adapters::GeminiClient;
pub use config::ServiceConfig;
pub use core::service::GeminiNlpService;
pub use domain::schema::{FieldKind, FieldSpec, Schema, Schematic};
pub use tools::ToolRegistry;
pub use utils::error::{NlpError, Result};
