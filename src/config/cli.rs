use crate::utils::error::Result;
use crate::utils::logger::LogFormat;
use crate::utils::validation::{self, Validate};
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "deploy")]
#[command(about = "Deploy compiled contract artifacts to a network in manifest order")]
pub struct CliConfig {
    /// Network entry from the configuration file to deploy to
    #[arg(short, long)]
    pub network: String,

    /// Path to the deployment configuration file
    #[arg(short, long, default_value = "configs/deploy.toml")]
    pub config: String,

    /// Show the execution plan without contacting the network
    #[arg(long)]
    pub dry_run: bool,

    /// Deploy only these contracts (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,

    /// Skip these contracts (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub skip: Vec<String>,

    /// Identifier for this run, used to name the deployment record
    #[arg(long)]
    pub run_id: Option<String>,

    /// Log process CPU and memory usage during the run
    #[arg(long)]
    pub monitor: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, value_enum, default_value = "compact")]
    pub log_format: LogFormat,
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("network", &self.network)?;
        validation::validate_path("config", &self.config)?;
        if let Some(run_id) = &self.run_id {
            validation::validate_non_empty_string("run_id", run_id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection_lists() {
        let config = CliConfig::parse_from([
            "deploy",
            "--network",
            "development",
            "--only",
            "HashedTimelock,FT",
            "--skip",
            "FT",
        ]);

        assert_eq!(config.network, "development");
        assert_eq!(config.config, "configs/deploy.toml");
        assert_eq!(config.only, vec!["HashedTimelock", "FT"]);
        assert_eq!(config.skip, vec!["FT"]);
        assert_eq!(config.log_format, LogFormat::Compact);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_network_is_required() {
        assert!(CliConfig::try_parse_from(["deploy"]).is_err());
    }
}
