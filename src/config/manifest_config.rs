use crate::core::sequencer::{SequencerOptions, DEFAULT_DEPLOYMENT_TIMEOUT};
use crate::core::{DeploymentManifest, DeploymentSpec};
use crate::utils::error::{DeployError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_ARTIFACTS_DIRECTORY: &str = "build/contracts";
pub const DEFAULT_OUTPUT_DIRECTORY: &str = "deployments";
pub const SUPPORTED_OUTPUT_FORMATS: &[&str] = &["json", "csv"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    pub manifest: ManifestInfo,
    #[serde(default)]
    pub contracts: Vec<ContractDefinition>,
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,
    pub artifacts: Option<ArtifactsConfig>,
    pub output: Option<OutputConfig>,
    pub execution: Option<ExecutionConfig>,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestInfo {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractDefinition {
    pub name: String,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub args: Option<Vec<serde_json::Value>>, // 建構子參數，依 ABI 順序
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub rpc_url: String,
    pub from: Option<String>, // 未設定時使用節點的第一個帳戶
    pub gas: Option<u64>,
    pub gas_price: Option<u64>,
    pub confirmation_timeout_seconds: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    pub directory: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub directory: String,
    pub formats: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub max_concurrent: Option<usize>,
    pub deployment_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl NetworkConfig {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_seconds.unwrap_or(120))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.unwrap_or(500))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds.unwrap_or(30))
    }
}

impl DeployConfig {
    /// 從 TOML 檔案載入部署配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(DeployError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析部署配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| DeployError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("Deployment TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DEPLOYER_ADDRESS})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| DeployError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("manifest.name", &self.manifest.name)?;
        self.validate_contracts()?;

        // Individual networks are checked on selection; unused entries may
        // hold unresolved ${VAR} placeholders.
        if self.networks.is_empty() {
            return Err(DeployError::MissingConfigError {
                field: "networks".to_string(),
            });
        }

        if let Some(artifacts) = &self.artifacts {
            validation::validate_path("artifacts.directory", &artifacts.directory)?;
        }

        if let Some(output) = &self.output {
            validation::validate_path("output.directory", &output.directory)?;
            for format in output.formats.iter().flatten() {
                validation::validate_one_of("output.formats", format, SUPPORTED_OUTPUT_FORMATS)?;
            }
        }

        if let Some(execution) = &self.execution {
            if let Some(max_concurrent) = execution.max_concurrent {
                validation::validate_positive_number("execution.max_concurrent", max_concurrent, 1)?;
            }
            if execution.deployment_timeout_seconds == Some(0) {
                return Err(DeployError::InvalidConfigValueError {
                    field: "execution.deployment_timeout_seconds".to_string(),
                    value: "0".to_string(),
                    reason: "Timeout must be at least one second".to_string(),
                });
            }
        }

        Ok(())
    }

    fn validate_contracts(&self) -> Result<()> {
        if self.enabled_contracts().next().is_none() {
            return Err(DeployError::ManifestError {
                message: format!(
                    "manifest '{}' has no enabled [[contracts]] entries",
                    self.manifest.name
                ),
            });
        }

        for (index, contract) in self.contracts.iter().enumerate() {
            if contract.name.trim().is_empty() {
                return Err(DeployError::ManifestError {
                    message: format!("contract #{} has an empty name", index + 1),
                });
            }
        }

        Ok(())
    }

    fn validate_network(name: &str, network: &NetworkConfig) -> Result<()> {
        validation::validate_url(&format!("networks.{}.rpc_url", name), &network.rpc_url)?;

        if let Some(from) = &network.from {
            validation::validate_address(&format!("networks.{}.from", name), from)?;
        }

        if network.poll_interval_ms == Some(0) {
            return Err(DeployError::InvalidConfigValueError {
                field: format!("networks.{}.poll_interval_ms", name),
                value: "0".to_string(),
                reason: "Polling interval must be positive".to_string(),
            });
        }

        Ok(())
    }

    /// 獲取並驗證指定名稱的網路設定
    pub fn network(&self, name: &str) -> Result<&NetworkConfig> {
        let network = self
            .networks
            .get(name)
            .ok_or_else(|| DeployError::ConfigValidationError {
                field: "network".to_string(),
                message: format!(
                    "Network '{}' not found. Available networks: {}",
                    name,
                    self.networks.keys().cloned().collect::<Vec<_>>().join(", ")
                ),
            })?;
        Self::validate_network(name, network)?;
        self.validate_timeouts(name, network)?;
        Ok(network)
    }

    /// The per-deployment bound must outlast the backend's own receipt wait,
    /// otherwise a broadcast transaction is abandoned without its hash.
    fn validate_timeouts(&self, name: &str, network: &NetworkConfig) -> Result<()> {
        let deployment_timeout = self.sequencer_options().deployment_timeout;
        let backend_wait = network.confirmation_timeout() + network.request_timeout();

        if deployment_timeout <= backend_wait {
            return Err(DeployError::InvalidConfigValueError {
                field: "execution.deployment_timeout_seconds".to_string(),
                value: deployment_timeout.as_secs().to_string(),
                reason: format!(
                    "Must exceed networks.{}.confirmation_timeout_seconds plus request_timeout_seconds ({}s)",
                    name,
                    backend_wait.as_secs()
                ),
            });
        }

        Ok(())
    }

    pub fn enabled_contracts(&self) -> impl Iterator<Item = &ContractDefinition> {
        self.contracts.iter().filter(|c| c.enabled.unwrap_or(true))
    }

    /// Builds the run manifest from the enabled contracts, keeping file order.
    pub fn to_manifest(&self) -> DeploymentManifest {
        let mut manifest = DeploymentManifest::new(self.manifest.name.clone());
        for contract in self.enabled_contracts() {
            manifest.push(
                DeploymentSpec::new(contract.name.clone())
                    .with_args(contract.args.clone().unwrap_or_default()),
            );
        }
        manifest
    }

    /// Names listed more than once. Allowed, but worth a warning.
    pub fn duplicate_contracts(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for contract in self.enabled_contracts() {
            if !seen.insert(contract.name.as_str()) && !duplicates.contains(&contract.name.as_str())
            {
                duplicates.push(contract.name.as_str());
            }
        }
        duplicates
    }

    pub fn sequencer_options(&self) -> SequencerOptions {
        let execution = self.execution.as_ref();
        SequencerOptions {
            max_concurrent: execution.and_then(|e| e.max_concurrent).unwrap_or(1),
            deployment_timeout: execution
                .and_then(|e| e.deployment_timeout_seconds)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_DEPLOYMENT_TIMEOUT),
        }
    }

    pub fn artifacts_directory(&self) -> &str {
        self.artifacts
            .as_ref()
            .map(|a| a.directory.as_str())
            .unwrap_or(DEFAULT_ARTIFACTS_DIRECTORY)
    }

    pub fn output_directory(&self) -> &str {
        self.output
            .as_ref()
            .map(|o| o.directory.as_str())
            .unwrap_or(DEFAULT_OUTPUT_DIRECTORY)
    }

    pub fn output_formats(&self) -> Vec<String> {
        self.output
            .as_ref()
            .and_then(|o| o.formats.clone())
            .unwrap_or_else(|| vec!["json".to_string()])
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }
}

impl Validate for DeployConfig {
    fn validate(&self) -> Result<()> {
        DeployConfig::validate(self)
    }
}
