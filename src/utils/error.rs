use crate::domain::model::DeploymentResult;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Manifest error: {message}")]
    ManifestError { message: String },

    #[error("Deployment of '{contract}' failed: {reason}")]
    DeploymentError { contract: String, reason: String },

    #[error("Deployment of '{contract}' was not confirmed within {waited:?}{}", tx_suffix(.tx_hash))]
    ConfirmationError {
        contract: String,
        tx_hash: Option<String>,
        waited: Duration,
    },

    #[error("Artifact error for '{contract}': {message}")]
    ArtifactError { contract: String, message: String },

    #[error("ABI encoding error: {message}")]
    AbiError { message: String },

    #[error("JSON-RPC error {code}: {message}")]
    RpcError { code: i64, message: String },

    #[error("{0}")]
    RunAborted(Box<RunFailure>),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration '{field}'")]
    MissingConfigError { field: String },
}

fn tx_suffix(tx_hash: &Option<String>) -> String {
    match tx_hash {
        Some(hash) => format!(" (transaction {})", hash),
        None => String::new(),
    }
}

/// A run that stopped at `index`.
///
/// `completed` always holds the deployments of manifest positions
/// `0..index`, in order. A pooled run may also have had later positions in
/// flight when the failure was observed; those that landed are kept in
/// `completed_after` with their manifest position, so the two lists together
/// can be non-contiguous.
#[derive(Debug)]
pub struct RunFailure {
    pub index: usize,
    pub contract: String,
    pub cause: DeployError,
    pub completed: Vec<DeploymentResult>,
    pub completed_after: Vec<(usize, DeploymentResult)>,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Deployment run aborted at index {} ('{}') after {} completed deployment(s)",
            self.index,
            self.contract,
            self.completed.len(),
        )?;
        if !self.completed_after.is_empty() {
            write!(
                f,
                " and {} in-flight deployment(s) past the failure",
                self.completed_after.len()
            )?;
        }
        write!(f, ": {}", self.cause)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Manifest,
    Deployment,
    Confirmation,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl DeployError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DeployError::ManifestError { .. } => ErrorCategory::Manifest,
            DeployError::DeploymentError { .. }
            | DeployError::ArtifactError { .. }
            | DeployError::AbiError { .. }
            | DeployError::RpcError { .. } => ErrorCategory::Deployment,
            DeployError::ConfirmationError { .. } => ErrorCategory::Confirmation,
            DeployError::RunAborted(failure) => failure.cause.category(),
            DeployError::ConfigError { .. }
            | DeployError::ConfigValidationError { .. }
            | DeployError::InvalidConfigValueError { .. }
            | DeployError::MissingConfigError { .. } => ErrorCategory::Configuration,
            DeployError::HttpError(_)
            | DeployError::CsvError(_)
            | DeployError::IoError(_)
            | DeployError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Confirmation => ErrorSeverity::Medium,
            ErrorCategory::Manifest
            | ErrorCategory::Deployment
            | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// Process exit code for the CLI. Never zero.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }

    /// Results already deployed before the failing position, if the run got that far.
    pub fn completed_results(&self) -> &[DeploymentResult] {
        match self {
            DeployError::RunAborted(failure) => &failure.completed,
            _ => &[],
        }
    }

    /// Every deployment that landed, keyed by manifest position.
    pub fn landed_deployments(&self) -> Vec<(usize, &DeploymentResult)> {
        match self {
            DeployError::RunAborted(failure) => failure
                .completed
                .iter()
                .enumerate()
                .chain(failure.completed_after.iter().map(|(index, result)| (*index, result)))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            DeployError::ManifestError { message } => {
                format!("The deployment manifest is invalid: {}", message)
            }
            DeployError::DeploymentError { contract, reason } => {
                format!("Could not deploy {}: {}", contract, reason)
            }
            DeployError::ConfirmationError { contract, .. } => format!(
                "{} was submitted but no receipt arrived in time; check the network before re-running",
                contract
            ),
            DeployError::RunAborted(failure) => {
                let mut message = format!(
                    "Deployment stopped at #{} ({}); {} contract(s) were deployed before the failure.",
                    failure.index + 1,
                    failure.contract,
                    failure.completed.len(),
                );
                if !failure.completed_after.is_empty() {
                    message.push_str(&format!(
                        " {} later contract(s) already in flight were deployed too.",
                        failure.completed_after.len()
                    ));
                }
                format!("{} {}", message, failure.cause.user_friendly_message())
            }
            DeployError::HttpError(_) => "Could not reach the network RPC endpoint".to_string(),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Manifest => "Add at least one [[contracts]] entry to the manifest",
            ErrorCategory::Deployment => {
                "Check the sender balance, the artifact bytecode and the node logs"
            }
            ErrorCategory::Confirmation => {
                "Raise confirmation_timeout_seconds or check that the node is mining blocks"
            }
            ErrorCategory::Configuration => "Fix the configuration file and run again",
            ErrorCategory::System => "Check file permissions and network connectivity",
        }
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;
