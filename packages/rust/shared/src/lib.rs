//! Shared types, error model, and configuration for AskData.
//!
//! This crate is the foundation depended on by all other AskData crates.
//! It provides:
//! - [`AskDataError`]: the unified error type
//! - Domain types ([`SchemaDescription`], [`ResultSet`], [`CandidateQuery`], [`Answer`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ChartsConfig, LlmConfig, SchemaRefresh, ServerConfig, StoreConfig, TopicConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from, validate_api_key,
};
pub use error::{AskDataError, Result};
pub use types::{
    Answer, CandidateQuery, CellValue, ColumnSchema, ResultSet, SchemaDescription, TableSchema,
    UNTYPED_COLUMN,
};
