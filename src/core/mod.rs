pub mod plan;
pub mod record;
pub mod sequencer;

pub use crate::domain::model::{
    Artifact, DeploymentManifest, DeploymentResult, DeploymentSpec, TransactionReceipt,
};
pub use crate::domain::ports::{ArtifactRegistry, DeployBackend, Storage};
pub use crate::utils::error::Result;
