pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{FileArtifactRegistry, JsonRpcBackend, LocalStorage};
pub use config::DeployConfig;
pub use core::sequencer::{DeploymentSequencer, SequencerOptions};
pub use domain::model::{DeploymentManifest, DeploymentResult, DeploymentSpec};
pub use utils::error::{DeployError, Result};
