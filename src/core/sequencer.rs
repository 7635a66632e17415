use crate::core::{DeployBackend, DeploymentManifest, DeploymentResult, DeploymentSpec};
use crate::utils::error::{DeployError, Result, RunFailure};
use crate::utils::monitor::SystemMonitor;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

pub const DEFAULT_DEPLOYMENT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct SequencerOptions {
    /// Deployments allowed in flight at once. 1 means strictly sequential.
    pub max_concurrent: usize,
    /// Upper bound on a single backend deploy call, receipt included.
    pub deployment_timeout: Duration,
}

impl Default for SequencerOptions {
    fn default() -> Self {
        Self {
            max_concurrent: 1,
            deployment_timeout: DEFAULT_DEPLOYMENT_TIMEOUT,
        }
    }
}

/// Submits every spec of a manifest to one backend and collects the results
/// in manifest order. Fail-fast: the first failure ends the run.
pub struct DeploymentSequencer {
    backend: Arc<dyn DeployBackend>,
    options: SequencerOptions,
    monitor: Option<SystemMonitor>,
    run_id: String,
}

impl DeploymentSequencer {
    pub fn new(backend: Arc<dyn DeployBackend>, run_id: String) -> Self {
        Self {
            backend,
            options: SequencerOptions::default(),
            monitor: None,
            run_id,
        }
    }

    pub fn with_options(mut self, options: SequencerOptions) -> Self {
        self.options = options;
        self
    }

    /// 啟用或禁用系統監控
    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor = enabled.then(|| SystemMonitor::new(true));
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn options(&self) -> &SequencerOptions {
        &self.options
    }

    pub async fn run(&self, manifest: &DeploymentManifest) -> Result<Vec<DeploymentResult>> {
        if manifest.is_empty() {
            return Err(DeployError::ManifestError {
                message: format!("manifest '{}' contains no deployments", manifest.name),
            });
        }

        tracing::info!(
            "🎬 Run {} deploying {} contract(s) to {} (max in flight: {})",
            self.run_id,
            manifest.len(),
            self.backend.network(),
            self.options.max_concurrent.max(1)
        );

        if let Some(monitor) = &self.monitor {
            monitor.log_stats("Deployment run started");
        }

        let outcome = if self.options.max_concurrent <= 1 {
            self.run_sequential(manifest).await
        } else {
            self.run_pooled(manifest).await
        };

        if let Some(monitor) = &self.monitor {
            monitor.log_stats("Deployment run finished");
            monitor.log_final_stats();
        }

        outcome
    }

    async fn run_sequential(&self, manifest: &DeploymentManifest) -> Result<Vec<DeploymentResult>> {
        let total = manifest.len();
        let mut results = Vec::with_capacity(total);

        for (index, spec) in manifest.iter().enumerate() {
            tracing::info!("🚀 [{}/{}] Deploying {}", index + 1, total, spec.contract);
            let start_time = Instant::now();

            match deploy_one(self.backend.as_ref(), spec, self.options.deployment_timeout).await {
                Ok(result) => {
                    tracing::info!(
                        "✅ {} deployed at {} (tx: {}, duration: {:?})",
                        result.contract,
                        result.address,
                        result.receipt.transaction_hash,
                        start_time.elapsed()
                    );
                    results.push(result);
                }
                Err(cause) => {
                    tracing::error!("❌ Deployment of {} failed: {}", spec.contract, cause);
                    return Err(abort(index, spec, cause, results, Vec::new()));
                }
            }
        }

        Ok(results)
    }

    /// Bounded pool. Dispatch follows manifest order and stops at the first
    /// observed failure; deployments already in flight are awaited because
    /// their transactions cannot be recalled.
    async fn run_pooled(&self, manifest: &DeploymentManifest) -> Result<Vec<DeploymentResult>> {
        let total = manifest.len();
        let limit = self.options.max_concurrent;
        let mut slots: Vec<Option<DeploymentResult>> = vec![None; total];
        let mut task_index = HashMap::new();
        let mut in_flight = JoinSet::new();
        let mut failure: Option<(usize, DeployError)> = None;
        let mut next = 0;

        loop {
            while failure.is_none() && next < total && in_flight.len() < limit {
                let index = next;
                let spec = manifest.specs[index].clone();
                let backend = Arc::clone(&self.backend);
                let timeout = self.options.deployment_timeout;

                tracing::info!("🚀 [{}/{}] Deploying {}", index + 1, total, spec.contract);
                let handle = in_flight.spawn(async move {
                    let outcome = deploy_one(backend.as_ref(), &spec, timeout).await;
                    (index, outcome)
                });
                task_index.insert(handle.id(), index);
                next += 1;
            }

            let (index, outcome) = match in_flight.join_next().await {
                None => break,
                Some(Ok(done)) => done,
                Some(Err(join_error)) => {
                    let index = task_index.get(&join_error.id()).copied().unwrap_or(next - 1);
                    let reason = format!("deployment task did not complete: {}", join_error);
                    (
                        index,
                        Err(DeployError::DeploymentError {
                            contract: manifest.specs[index].contract.clone(),
                            reason,
                        }),
                    )
                }
            };

            match outcome {
                Ok(result) => {
                    tracing::info!("✅ {} deployed at {}", result.contract, result.address);
                    slots[index] = Some(result);
                }
                Err(cause) => {
                    tracing::error!(
                        "❌ Deployment of {} failed: {}",
                        manifest.specs[index].contract,
                        cause
                    );
                    let earlier = failure.as_ref().is_some_and(|(current, _)| *current < index);
                    if !earlier {
                        failure = Some((index, cause));
                    }
                }
            }
        }

        let Some((index, cause)) = failure else {
            return Ok(slots.into_iter().flatten().collect());
        };

        // Everything before the lowest failing index succeeded; later
        // positions only landed if they were already in flight.
        let mut completed = Vec::with_capacity(index);
        let mut completed_after = Vec::new();
        for (position, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(result) if position < index => completed.push(result),
                Some(result) => completed_after.push((position, result)),
                None => {}
            }
        }
        if !completed_after.is_empty() {
            tracing::warn!(
                "⚠️ {} deployment(s) past the failed index {} landed while in flight",
                completed_after.len(),
                index
            );
        }

        Err(abort(index, &manifest.specs[index], cause, completed, completed_after))
    }

    /// 獲取執行摘要
    pub fn get_run_summary(
        results: &[DeploymentResult],
        elapsed: Duration,
    ) -> HashMap<String, serde_json::Value> {
        let mut summary = HashMap::new();

        let total_gas: u64 = results.iter().filter_map(|r| r.receipt.gas_used).sum();
        summary.insert(
            "total_deployments".to_string(),
            serde_json::Value::Number(results.len().into()),
        );
        summary.insert(
            "total_gas_used".to_string(),
            serde_json::Value::Number(total_gas.into()),
        );
        summary.insert(
            "total_duration_ms".to_string(),
            serde_json::Value::Number((elapsed.as_millis() as u64).into()),
        );

        let deployed: Vec<serde_json::Value> = results
            .iter()
            .map(|r| serde_json::Value::String(r.contract.clone()))
            .collect();
        summary.insert(
            "deployed_contracts".to_string(),
            serde_json::Value::Array(deployed),
        );

        summary
    }
}

async fn deploy_one(
    backend: &dyn DeployBackend,
    spec: &DeploymentSpec,
    timeout: Duration,
) -> Result<DeploymentResult> {
    match tokio::time::timeout(timeout, backend.deploy(&spec.contract, &spec.args)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(DeployError::ConfirmationError {
            contract: spec.contract.clone(),
            tx_hash: None,
            waited: timeout,
        }),
    }
}

fn abort(
    index: usize,
    spec: &DeploymentSpec,
    cause: DeployError,
    completed: Vec<DeploymentResult>,
    completed_after: Vec<(usize, DeploymentResult)>,
) -> DeployError {
    DeployError::RunAborted(Box::new(RunFailure {
        index,
        contract: spec.contract.clone(),
        cause,
        completed,
        completed_after,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TransactionReceipt;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockBackend {
        calls: AtomicUsize,
        deployed: Mutex<Vec<String>>,
        fail_on: Option<String>,
        delays: HashMap<String, Duration>,
    }

    impl MockBackend {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                deployed: Mutex::new(Vec::new()),
                fail_on: None,
                delays: HashMap::new(),
            }
        }

        fn failing_on(mut self, contract: &str) -> Self {
            self.fail_on = Some(contract.to_string());
            self
        }

        fn with_delay(mut self, contract: &str, delay: Duration) -> Self {
            self.delays.insert(contract.to_string(), delay);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl DeployBackend for MockBackend {
        async fn deploy(
            &self,
            contract: &str,
            _args: &[serde_json::Value],
        ) -> Result<DeploymentResult> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

            if let Some(delay) = self.delays.get(contract) {
                tokio::time::sleep(*delay).await;
            }

            if self.fail_on.as_deref() == Some(contract) {
                return Err(DeployError::DeploymentError {
                    contract: contract.to_string(),
                    reason: "insufficient funds for gas * price + value".to_string(),
                });
            }

            self.deployed.lock().unwrap().push(contract.to_string());
            let address = format!("0x{:040x}", call);
            Ok(DeploymentResult {
                contract: contract.to_string(),
                address: address.clone(),
                receipt: TransactionReceipt {
                    transaction_hash: format!("0x{:064x}", call),
                    block_number: Some(call as u64),
                    gas_used: Some(21_000),
                    status: Some(true),
                    contract_address: Some(address),
                    raw: serde_json::Value::Null,
                },
            })
        }

        fn network(&self) -> &str {
            "mock"
        }
    }

    fn reference_manifest() -> DeploymentManifest {
        DeploymentManifest::with_contracts(
            "fair-exchange",
            [
                "HashedTimelock",
                "FT",
                "EllipticCurve",
                "TestHash",
                "FairTradeExtBsl",
                "Delgado",
                "Commitment",
                "FairTradeExtImproved",
                "SecLog",
                "CIDLog",
            ],
        )
    }

    fn sequencer(backend: Arc<MockBackend>) -> DeploymentSequencer {
        DeploymentSequencer::new(backend, "test_run".to_string())
    }

    fn contracts(results: &[DeploymentResult]) -> Vec<&str> {
        results.iter().map(|r| r.contract.as_str()).collect()
    }

    #[tokio::test]
    async fn test_run_returns_one_result_per_spec_in_order() {
        let backend = Arc::new(MockBackend::new());
        let manifest = reference_manifest();

        let results = sequencer(backend.clone()).run(&manifest).await.unwrap();

        assert_eq!(results.len(), manifest.len());
        for (spec, result) in manifest.iter().zip(&results) {
            assert_eq!(spec.contract, result.contract);
        }
        assert_eq!(backend.calls(), 10);
    }

    #[tokio::test]
    async fn test_two_contract_scenario() {
        let backend = Arc::new(MockBackend::new());
        let manifest = DeploymentManifest::with_contracts("pair", ["HashedTimelock", "FT"]);

        let results = sequencer(backend).run(&manifest).await.unwrap();

        assert_eq!(contracts(&results), vec!["HashedTimelock", "FT"]);
        assert_ne!(results[0].address, results[1].address);
    }

    #[tokio::test]
    async fn test_failure_reports_index_and_partial_results() {
        let backend = Arc::new(MockBackend::new().failing_on("FT"));
        let manifest =
            DeploymentManifest::with_contracts("triple", ["HashedTimelock", "FT", "EllipticCurve"]);

        let err = sequencer(backend.clone()).run(&manifest).await.unwrap_err();

        match err {
            DeployError::RunAborted(failure) => {
                assert_eq!(failure.index, 1);
                assert_eq!(failure.contract, "FT");
                assert_eq!(contracts(&failure.completed), vec!["HashedTimelock"]);
                assert!(matches!(failure.cause, DeployError::DeploymentError { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // EllipticCurve was never submitted
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_on_kth_spec_keeps_k_minus_one_results() {
        let manifest = reference_manifest();

        for (k, spec) in manifest.iter().enumerate() {
            let backend = Arc::new(MockBackend::new().failing_on(&spec.contract));
            let err = sequencer(backend).run(&manifest).await.unwrap_err();
            assert_eq!(err.completed_results().len(), k);
        }
    }

    #[tokio::test]
    async fn test_empty_manifest_never_reaches_backend() {
        let backend = Arc::new(MockBackend::new());
        let manifest = DeploymentManifest::new("empty");

        let err = sequencer(backend.clone()).run(&manifest).await.unwrap_err();

        assert!(matches!(err, DeployError::ManifestError { .. }));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_rerun_deploys_new_instances() {
        let backend = Arc::new(MockBackend::new());
        let manifest = reference_manifest();
        let sequencer = sequencer(backend);

        let first = sequencer.run(&manifest).await.unwrap();
        let second = sequencer.run(&manifest).await.unwrap();

        let first_addresses: HashSet<_> = first.iter().map(|r| r.address.clone()).collect();
        let second_addresses: HashSet<_> = second.iter().map(|r| r.address.clone()).collect();
        assert_eq!(first_addresses.len(), 10);
        assert!(first_addresses.is_disjoint(&second_addresses));
    }

    #[tokio::test]
    async fn test_slow_deployment_times_out_as_confirmation_error() {
        let backend = Arc::new(MockBackend::new().with_delay("FT", Duration::from_secs(30)));
        let manifest = DeploymentManifest::with_contracts("slow", ["HashedTimelock", "FT"]);

        let err = sequencer(backend)
            .with_options(SequencerOptions {
                max_concurrent: 1,
                deployment_timeout: Duration::from_millis(50),
            })
            .run(&manifest)
            .await
            .unwrap_err();

        match err {
            DeployError::RunAborted(failure) => {
                assert_eq!(failure.index, 1);
                assert!(matches!(failure.cause, DeployError::ConfirmationError { .. }));
                assert_eq!(failure.completed.len(), 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pooled_run_preserves_manifest_order() {
        let backend = Arc::new(
            MockBackend::new()
                .with_delay("HashedTimelock", Duration::from_millis(80))
                .with_delay("FT", Duration::from_millis(40)),
        );
        let manifest = reference_manifest();

        let results = sequencer(backend.clone())
            .with_options(SequencerOptions {
                max_concurrent: 4,
                ..SequencerOptions::default()
            })
            .run(&manifest)
            .await
            .unwrap();

        let expected: Vec<&str> = manifest.iter().map(|s| s.contract.as_str()).collect();
        assert_eq!(contracts(&results), expected);
        // Completion order differs from manifest order
        assert_ne!(backend.deployed.lock().unwrap()[0], "HashedTimelock");
    }

    #[tokio::test]
    async fn test_pooled_run_stops_dispatching_after_failure() {
        let backend = Arc::new(MockBackend::new().failing_on("HashedTimelock"));
        let manifest = reference_manifest();

        let err = sequencer(backend.clone())
            .with_options(SequencerOptions {
                max_concurrent: 2,
                ..SequencerOptions::default()
            })
            .run(&manifest)
            .await
            .unwrap_err();

        match err {
            DeployError::RunAborted(failure) => {
                assert_eq!(failure.index, 0);
                assert_eq!(failure.contract, "HashedTimelock");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(backend.calls() < manifest.len());
    }

    #[tokio::test]
    async fn test_pooled_failure_keeps_later_landings_apart() {
        let backend = Arc::new(
            MockBackend::new()
                .failing_on("HashedTimelock")
                .with_delay("HashedTimelock", Duration::from_millis(50)),
        );
        let manifest =
            DeploymentManifest::with_contracts("triple", ["HashedTimelock", "FT", "EllipticCurve"]);

        let err = sequencer(backend)
            .with_options(SequencerOptions {
                max_concurrent: 2,
                ..SequencerOptions::default()
            })
            .run(&manifest)
            .await
            .unwrap_err();

        assert!(err.completed_results().is_empty());
        let landed: Vec<(usize, &str)> = err
            .landed_deployments()
            .into_iter()
            .map(|(index, result)| (index, result.contract.as_str()))
            .collect();
        assert_eq!(landed, vec![(1, "FT"), (2, "EllipticCurve")]);

        match err {
            DeployError::RunAborted(failure) => {
                assert_eq!(failure.index, 0);
                assert_eq!(failure.contract, "HashedTimelock");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_run_summary() {
        let receipt = TransactionReceipt {
            transaction_hash: "0x01".to_string(),
            block_number: Some(1),
            gas_used: Some(100_000),
            status: Some(true),
            contract_address: Some("0xaa".to_string()),
            raw: serde_json::Value::Null,
        };
        let results = vec![
            DeploymentResult {
                contract: "SecLog".to_string(),
                address: "0xaa".to_string(),
                receipt: receipt.clone(),
            },
            DeploymentResult {
                contract: "CIDLog".to_string(),
                address: "0xbb".to_string(),
                receipt,
            },
        ];

        let summary =
            DeploymentSequencer::get_run_summary(&results, Duration::from_millis(1500));

        assert_eq!(summary.get("total_deployments").unwrap(), &serde_json::json!(2));
        assert_eq!(summary.get("total_gas_used").unwrap(), &serde_json::json!(200_000));
        assert_eq!(summary.get("total_duration_ms").unwrap(), &serde_json::json!(1500));
        assert_eq!(
            summary.get("deployed_contracts").unwrap(),
            &serde_json::json!(["SecLog", "CIDLog"])
        );
    }
}
