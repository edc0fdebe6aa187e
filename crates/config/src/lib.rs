//! Configuration loading for the bridge: schema, file discovery, `${VAR}`
//! substitution and environment overrides.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config},
    schema::{BridgeConfig, ServerConfig, UploadsConfig, WhatsAppConfig},
};
