use chrono::Utc;
use clap::Parser;
use contract_deployer::core::plan::{self, ExecutionPlan};
use contract_deployer::core::record::{DeploymentRecord, RecordWriter};
use contract_deployer::utils::{logger, validation::Validate};
use contract_deployer::{
    CliConfig, DeployConfig, DeployError, DeploymentResult, DeploymentSequencer,
    FileArtifactRegistry, JsonRpcBackend, LocalStorage,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::main]
async fn main() {
    let args = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(args.verbose, args.log_format);

    tracing::info!("🚀 Starting contract deployer");
    if args.verbose {
        tracing::debug!("CLI config: {:?}", args);
    }

    if let Err(e) = run(args).await {
        tracing::error!(
            "❌ Deployment failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        let landed = e.landed_deployments();
        if !landed.is_empty() {
            eprintln!("⚠️ Deployed before the run stopped (still on chain):");
            for (index, result) in landed {
                eprintln!("  {}. {} at {}", index + 1, result.contract, result.address);
            }
        }

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
        std::process::exit(e.exit_code());
    }
}

async fn run(args: CliConfig) -> Result<(), DeployError> {
    args.validate()?;

    tracing::info!("📁 Loading deployment configuration from: {}", args.config);
    let config = DeployConfig::from_file(&args.config)?;
    config.validate()?;
    let network = config.network(&args.network)?;

    for duplicate in config.duplicate_contracts() {
        tracing::warn!("⚠️ {} is listed more than once and will be deployed each time", duplicate);
    }

    let manifest = plan::select(&config.to_manifest(), &args.only, &args.skip)?;
    let options = config.sequencer_options();
    let run_id = args
        .run_id
        .clone()
        .unwrap_or_else(|| format!("deploy_{}", Utc::now().format("%Y%m%d_%H%M%S")));

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - nothing will be submitted");
        print!("{}", ExecutionPlan::new(&manifest, &args.network, &options).render());
        return Ok(());
    }

    let registry =
        FileArtifactRegistry::new(LocalStorage::new(config.artifacts_directory().to_string()));
    let backend = Arc::new(JsonRpcBackend::new(&args.network, network, registry)?);
    let monitor_enabled = args.monitor || config.monitoring_enabled();
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let sequencer = DeploymentSequencer::new(backend, run_id.clone())
        .with_options(options)
        .with_monitoring(monitor_enabled);

    let started_at = Utc::now();
    let start_time = Instant::now();
    let outcome = sequencer.run(&manifest).await;

    // A rejected manifest never reached the network, so there is nothing to record
    let saved = if matches!(outcome, Err(DeployError::ManifestError { .. })) {
        Ok(Vec::new())
    } else {
        let record = DeploymentRecord::from_outcome(
            &run_id,
            &args.network,
            &manifest.name,
            started_at,
            &outcome,
        );
        let writer = RecordWriter::new(
            LocalStorage::new(config.output_directory().to_string()),
            config.output_formats(),
        );
        writer.write(&record).await
    };

    let results = match outcome {
        Ok(results) => results,
        Err(e) => {
            if let Err(save_error) = saved {
                tracing::error!("❌ Could not save the deployment record: {}", save_error);
            }
            return Err(e);
        }
    };

    display_results(&results, &run_id, start_time.elapsed());
    let paths = saved?;
    for path in paths {
        println!("📁 Record saved to: {}", path);
    }

    Ok(())
}

fn display_results(results: &[DeploymentResult], run_id: &str, elapsed: Duration) {
    let summary = DeploymentSequencer::get_run_summary(results, elapsed);

    println!();
    println!("✅ Deployment completed successfully!");
    println!("🆔 Run ID: {}", run_id);
    println!("📊 Contracts deployed: {}", results.len());
    if let Some(gas) = summary.get("total_gas_used") {
        println!("⛽ Total gas used: {}", gas);
    }
    println!("⏱️ Total time: {:?}", elapsed);
    println!();

    for (index, result) in results.iter().enumerate() {
        println!("  {}. {} => {}", index + 1, result.contract, result.address);
        println!("     tx: {}", result.receipt.transaction_hash);
    }
    println!();
}
