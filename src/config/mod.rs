#[cfg(feature = "cli")]
pub mod cli;
pub mod manifest_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use manifest_config::{DeployConfig, NetworkConfig};
