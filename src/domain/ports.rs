use crate::domain::model::{Artifact, DeploymentResult};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}

/// Network client able to create one contract instance per call.
#[async_trait]
pub trait DeployBackend: Send + Sync {
    async fn deploy(&self, contract: &str, args: &[serde_json::Value]) -> Result<DeploymentResult>;

    /// Name of the target network, for logs and records.
    fn network(&self) -> &str;
}

#[async_trait]
pub trait ArtifactRegistry: Send + Sync {
    async fn load(&self, contract: &str) -> Result<Artifact>;
}
