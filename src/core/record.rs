use crate::core::{DeploymentResult, Storage};
use crate::utils::error::{DeployError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub index: Option<usize>,
    pub contract: Option<String>,
    pub reason: String,
}

/// One landed deployment and its position in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedDeployment {
    pub index: usize,
    #[serde(flatten)]
    pub result: DeploymentResult,
}

/// Audit record of one run. Written for partial runs too, since whatever was
/// deployed before a failure stays on chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub run_id: String,
    pub network: String,
    pub manifest: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub failure: Option<FailureRecord>,
    pub results: Vec<RecordedDeployment>,
}

impl DeploymentRecord {
    pub fn from_outcome(
        run_id: &str,
        network: &str,
        manifest: &str,
        started_at: DateTime<Utc>,
        outcome: &Result<Vec<DeploymentResult>>,
    ) -> Self {
        let (status, failure) = match outcome {
            Ok(_) => (RunStatus::Completed, None),
            Err(DeployError::RunAborted(failure)) => (
                RunStatus::Failed,
                Some(FailureRecord {
                    index: Some(failure.index),
                    contract: Some(failure.contract.clone()),
                    reason: failure.cause.to_string(),
                }),
            ),
            Err(other) => (
                RunStatus::Failed,
                Some(FailureRecord {
                    index: None,
                    contract: None,
                    reason: other.to_string(),
                }),
            ),
        };

        let landed: Vec<(usize, DeploymentResult)> = match outcome {
            Ok(results) => results.iter().cloned().enumerate().collect(),
            Err(e) => e
                .landed_deployments()
                .into_iter()
                .map(|(index, result)| (index, result.clone()))
                .collect(),
        };
        let mut results: Vec<RecordedDeployment> = landed
            .into_iter()
            .map(|(index, result)| RecordedDeployment { index, result })
            .collect();
        results.sort_by_key(|recorded| recorded.index);

        Self {
            run_id: run_id.to_string(),
            network: network.to_string(),
            manifest: manifest.to_string(),
            status,
            started_at,
            finished_at: Utc::now(),
            failure,
            results,
        }
    }

    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.network, self.run_id)
    }
}

const CSV_HEADER: [&str; 6] = [
    "index",
    "contract",
    "address",
    "transaction_hash",
    "block_number",
    "gas_used",
];

#[derive(Serialize)]
struct CsvRow<'a> {
    index: usize,
    contract: &'a str,
    address: &'a str,
    transaction_hash: &'a str,
    block_number: Option<u64>,
    gas_used: Option<u64>,
}

pub struct RecordWriter<S: Storage> {
    storage: S,
    formats: Vec<String>,
}

impl<S: Storage> RecordWriter<S> {
    pub fn new(storage: S, formats: Vec<String>) -> Self {
        Self { storage, formats }
    }

    /// Returns the paths written, one per configured format.
    pub async fn write(&self, record: &DeploymentRecord) -> Result<Vec<String>> {
        let mut written = Vec::new();

        for format in &self.formats {
            let (extension, data) = match format.as_str() {
                "json" => ("json", serde_json::to_vec_pretty(record)?),
                "csv" => ("csv", Self::to_csv(record)?),
                other => {
                    return Err(DeployError::InvalidConfigValueError {
                        field: "output.formats".to_string(),
                        value: other.to_string(),
                        reason: "Unsupported record format".to_string(),
                    })
                }
            };

            let path = format!("{}.{}", record.file_stem(), extension);
            let full_path = self.storage.write_file(&path, &data).await?;
            tracing::info!("💾 Deployment record saved to: {}", full_path);
            written.push(full_path);
        }

        Ok(written)
    }

    fn to_csv(record: &DeploymentRecord) -> Result<Vec<u8>> {
        // Header is written by hand so a run with no deployments still
        // yields a well-formed file
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.write_record(CSV_HEADER)?;
        for recorded in &record.results {
            let result = &recorded.result;
            writer.serialize(CsvRow {
                index: recorded.index,
                contract: &result.contract,
                address: &result.address,
                transaction_hash: &result.receipt.transaction_hash,
                block_number: result.receipt.block_number,
                gas_used: result.receipt.gas_used,
            })?;
        }
        writer
            .into_inner()
            .map_err(|e| DeployError::IoError(e.into_error()))
    }
}
