//! Shared types, error model, and configuration for autoservice.
//!
//! This crate is the foundation depended on by all other autoservice crates.
//! It provides:
//! - [`AutoserviceError`], the unified error type
//! - Domain records ([`Customer`], [`Vehicle`], [`Workshop`], [`ServiceOrder`], [`AgentInteraction`])
//! - Configuration ([`AppConfig`] and its sections, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CompletionConfig, DatabaseConfig, SearchConfig, ServerConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, read_api_key,
};
pub use error::{AutoserviceError, Result};
pub use types::{
    AgentInteraction, Customer, NewCustomer, NewServiceOrder, NewVehicle, NewWorkshop,
    STATUS_OPEN, ServiceOrder, Vehicle, Workshop, WorkshopSummary,
};
