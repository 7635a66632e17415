use crate::utils::error::{DeployError, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Minimal Ethereum JSON-RPC 2.0 client over HTTP.
pub struct RpcClient {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

impl RpcClient {
    pub fn new(url: &str, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// A `null` result deserializes into `T` as-is, so callers expecting a
    /// possibly-missing object should ask for `Option<_>`.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        tracing::debug!("➡️ {} (id {})", method, id);
        let response = self.client.post(&self.url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeployError::RpcError {
                code: i64::from(status.as_u16()),
                message: format!("HTTP {} from {}", status, self.url),
            });
        }

        let body: RpcResponse = response.json().await?;
        if let Some(error) = body.error {
            tracing::debug!("⬅️ {} failed: {} ({})", method, error.message, error.code);
            return Err(DeployError::RpcError {
                code: error.code,
                message: error.message,
            });
        }

        Ok(serde_json::from_value(body.result.unwrap_or(Value::Null))?)
    }
}

/// Parses a `0x`-prefixed hex quantity.
pub fn parse_quantity(value: &str) -> Option<u64> {
    u64::from_str_radix(value.strip_prefix("0x")?, 16).ok()
}

pub fn to_quantity(value: u64) -> String {
    format!("0x{:x}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_helpers() {
        assert_eq!(parse_quantity("0x1a"), Some(26));
        assert_eq!(parse_quantity("0x0"), Some(0));
        assert_eq!(parse_quantity("1a"), None);
        assert_eq!(to_quantity(6721975), "0x6691b7");
    }
}
