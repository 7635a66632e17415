use crate::adapters::abi;
use crate::adapters::rpc_client::{parse_quantity, to_quantity, RpcClient};
use crate::config::NetworkConfig;
use crate::core::{ArtifactRegistry, DeployBackend, DeploymentResult, TransactionReceipt};
use crate::utils::error::{DeployError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Instant;
use tokio::sync::{Mutex, OnceCell};

/// Deploys artifacts through a node-managed account over JSON-RPC.
///
/// Submissions go through a single nonce lock, so the backend can be shared
/// by concurrent deploy calls without two transactions claiming one nonce.
/// Confirmation polling happens outside the lock.
pub struct JsonRpcBackend<R: ArtifactRegistry> {
    network: String,
    rpc: RpcClient,
    registry: R,
    settings: NetworkConfig,
    sender: OnceCell<String>,
    nonce: Mutex<Option<u64>>,
}

impl<R: ArtifactRegistry> JsonRpcBackend<R> {
    pub fn new(network: &str, settings: &NetworkConfig, registry: R) -> Result<Self> {
        let rpc = RpcClient::new(&settings.rpc_url, settings.request_timeout())?;
        Ok(Self {
            network: network.to_string(),
            rpc,
            registry,
            settings: settings.clone(),
            sender: OnceCell::new(),
            nonce: Mutex::new(None),
        })
    }

    /// Configured `from`, otherwise the node's first account.
    pub async fn sender(&self) -> Result<&str> {
        let sender = self
            .sender
            .get_or_try_init(|| async {
                if let Some(from) = &self.settings.from {
                    return Ok(from.clone());
                }
                let accounts: Vec<String> = self.rpc.call("eth_accounts", json!([])).await?;
                let first = accounts.into_iter().next().ok_or_else(|| DeployError::ConfigError {
                    message: format!(
                        "node at {} exposes no accounts; set networks.{}.from",
                        self.rpc.url(),
                        self.network
                    ),
                })?;
                tracing::info!("🔑 Using node account {} as deployer", first);
                Ok::<String, DeployError>(first)
            })
            .await?;
        Ok(sender.as_str())
    }

    async fn submit(&self, from: &str, data: String) -> Result<String> {
        let mut nonce_slot = self.nonce.lock().await;

        let nonce = match *nonce_slot {
            Some(nonce) => nonce,
            None => {
                let count: String = self
                    .rpc
                    .call("eth_getTransactionCount", json!([from, "pending"]))
                    .await?;
                parse_quantity(&count).ok_or_else(|| DeployError::RpcError {
                    code: 0,
                    message: format!("invalid transaction count '{}'", count),
                })?
            }
        };

        let mut transaction = json!({
            "from": from,
            "data": data,
            "nonce": to_quantity(nonce),
        });
        if let Some(gas) = self.settings.gas {
            transaction["gas"] = Value::String(to_quantity(gas));
        }
        if let Some(gas_price) = self.settings.gas_price {
            transaction["gasPrice"] = Value::String(to_quantity(gas_price));
        }

        match self
            .rpc
            .call::<String>("eth_sendTransaction", json!([transaction]))
            .await
        {
            Ok(tx_hash) => {
                *nonce_slot = Some(nonce + 1);
                tracing::debug!("📤 Submitted {} with nonce {}", tx_hash, nonce);
                Ok(tx_hash)
            }
            Err(e) => {
                // The node's view of the nonce is authoritative after a rejection
                *nonce_slot = None;
                Err(e)
            }
        }
    }

    async fn wait_for_receipt(&self, contract: &str, tx_hash: &str) -> Result<TransactionReceipt> {
        let timeout = self.settings.confirmation_timeout();
        let poll_interval = self.settings.poll_interval();
        let deadline = Instant::now() + timeout;

        loop {
            match self
                .rpc
                .call::<Option<Value>>("eth_getTransactionReceipt", json!([tx_hash]))
                .await
            {
                Ok(Some(raw)) => return Ok(parse_receipt(tx_hash, raw)),
                Ok(None) => tracing::debug!("⏳ {} pending ({})", contract, tx_hash),
                Err(e) => tracing::warn!("⚠️ Receipt lookup for {} failed: {}", tx_hash, e),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(DeployError::ConfirmationError {
                    contract: contract.to_string(),
                    tx_hash: Some(tx_hash.to_string()),
                    waited: timeout,
                });
            }
            tokio::time::sleep(poll_interval.min(deadline - now)).await;
        }
    }
}

#[async_trait]
impl<R: ArtifactRegistry> DeployBackend for JsonRpcBackend<R> {
    async fn deploy(&self, contract: &str, args: &[Value]) -> Result<DeploymentResult> {
        let artifact = self.registry.load(contract).await?;
        let encoded_args = abi::encode_constructor_args(&artifact.abi, args)?;
        let bytecode = artifact
            .bytecode
            .strip_prefix("0x")
            .unwrap_or(&artifact.bytecode);
        let data = format!("0x{}{}", bytecode, encoded_args);

        let from = self
            .sender()
            .await
            .map_err(|e| rejected(contract, e))?
            .to_string();
        let started = Instant::now();

        let tx_hash = self
            .submit(&from, data)
            .await
            .map_err(|e| rejected(contract, e))?;
        tracing::info!("📤 {} submitted in transaction {}", contract, tx_hash);

        let receipt = self.wait_for_receipt(contract, &tx_hash).await?;

        if receipt.status == Some(false) {
            return Err(DeployError::DeploymentError {
                contract: contract.to_string(),
                reason: format!("contract creation reverted (transaction {})", tx_hash),
            });
        }
        let address = receipt
            .contract_address
            .clone()
            .ok_or_else(|| DeployError::DeploymentError {
                contract: contract.to_string(),
                reason: format!("receipt for {} has no contract address", tx_hash),
            })?;

        tracing::debug!(
            "🧾 {} confirmed in block {:?} after {:?}",
            contract,
            receipt.block_number,
            started.elapsed()
        );

        Ok(DeploymentResult {
            contract: contract.to_string(),
            address,
            receipt,
        })
    }

    fn network(&self) -> &str {
        &self.network
    }
}

/// Node rejections become `DeploymentError`. Transport failures keep their
/// `HttpError` so the CLI reports them as system errors.
fn rejected(contract: &str, cause: DeployError) -> DeployError {
    let reason = match cause {
        DeployError::HttpError(_) => return cause,
        DeployError::RpcError { message, .. } => message,
        DeployError::ConfigError { message } => message,
        other => other.to_string(),
    };
    DeployError::DeploymentError {
        contract: contract.to_string(),
        reason,
    }
}

fn parse_receipt(tx_hash: &str, raw: Value) -> TransactionReceipt {
    let text = |field: &str| raw.get(field).and_then(Value::as_str);

    let transaction_hash = text("transactionHash").unwrap_or(tx_hash).to_string();
    let block_number = text("blockNumber").and_then(parse_quantity);
    let gas_used = text("gasUsed").and_then(parse_quantity);
    // Pre-Byzantium receipts carry no status field
    let status = text("status").and_then(parse_quantity).map(|status| status == 1);
    let contract_address = text("contractAddress").map(str::to_string);

    TransactionReceipt {
        transaction_hash,
        block_number,
        gas_used,
        status,
        contract_address,
        raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_receipt() {
        let receipt = parse_receipt(
            "0xabc",
            json!({
                "transactionHash": "0xabc",
                "blockNumber": "0x10",
                "gasUsed": "0x5208",
                "status": "0x1",
                "contractAddress": "0x5fbdb2315678afecb367f032d93f642f64180aa3"
            }),
        );

        assert_eq!(receipt.block_number, Some(16));
        assert_eq!(receipt.gas_used, Some(21000));
        assert_eq!(receipt.status, Some(true));
        assert_eq!(
            receipt.contract_address.as_deref(),
            Some("0x5fbdb2315678afecb367f032d93f642f64180aa3")
        );
    }

    #[test]
    fn test_parse_reverted_receipt_without_address() {
        let receipt = parse_receipt(
            "0xdef",
            json!({"status": "0x0", "contractAddress": null}),
        );

        assert_eq!(receipt.transaction_hash, "0xdef");
        assert_eq!(receipt.status, Some(false));
        assert!(receipt.contract_address.is_none());
    }
}
