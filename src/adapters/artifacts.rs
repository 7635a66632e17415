use crate::core::{Artifact, ArtifactRegistry, Storage};
use crate::utils::error::{DeployError, Result};
use async_trait::async_trait;

/// Reads `<Name>.json` build artifacts through a [`Storage`].
pub struct FileArtifactRegistry<S: Storage> {
    storage: S,
}

impl<S: Storage> FileArtifactRegistry<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl<S: Storage> ArtifactRegistry for FileArtifactRegistry<S> {
    async fn load(&self, contract: &str) -> Result<Artifact> {
        let file_name = format!("{}.json", contract);
        let data = self
            .storage
            .read_file(&file_name)
            .await
            .map_err(|e| DeployError::ArtifactError {
                contract: contract.to_string(),
                message: format!("cannot read {}: {}", file_name, e),
            })?;

        let artifact: Artifact =
            serde_json::from_slice(&data).map_err(|e| DeployError::ArtifactError {
                contract: contract.to_string(),
                message: format!("malformed artifact {}: {}", file_name, e),
            })?;

        check_bytecode(contract, &artifact.bytecode)?;
        tracing::debug!(
            "📦 Loaded artifact {} ({} bytes of bytecode)",
            artifact.contract_name,
            artifact.bytecode.len().saturating_sub(2) / 2
        );

        Ok(artifact)
    }
}

fn check_bytecode(contract: &str, bytecode: &str) -> Result<()> {
    let body = bytecode.strip_prefix("0x").unwrap_or(bytecode);

    if body.is_empty() {
        return Err(DeployError::ArtifactError {
            contract: contract.to_string(),
            message: "cannot deploy abstract contract or interface (empty bytecode)".to_string(),
        });
    }

    // Unlinked libraries leave `__Name____` placeholders in the bytecode
    if let Some(start) = body.find("__") {
        let placeholder: String = body[start..].chars().take(40).collect();
        return Err(DeployError::ArtifactError {
            contract: contract.to_string(),
            message: format!("bytecode contains unlinked library reference {}", placeholder),
        });
    }

    Ok(())
}
