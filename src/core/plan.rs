use crate::core::sequencer::SequencerOptions;
use crate::core::DeploymentManifest;
use crate::utils::error::{DeployError, Result};
use std::collections::HashSet;
use std::fmt::Write as _;

/// Applies `--only` / `--skip` to a manifest, keeping relative order.
///
/// Names that match nothing in the manifest are rejected so a typo cannot
/// silently change what gets deployed.
pub fn select(
    manifest: &DeploymentManifest,
    only: &[String],
    skip: &[String],
) -> Result<DeploymentManifest> {
    let known: HashSet<&str> = manifest.iter().map(|s| s.contract.as_str()).collect();
    for name in only.iter().chain(skip) {
        if !known.contains(name.as_str()) {
            return Err(DeployError::ManifestError {
                message: format!("'{}' is not part of manifest '{}'", name, manifest.name),
            });
        }
    }

    let mut selected = DeploymentManifest::new(manifest.name.clone());
    for spec in manifest.iter() {
        let wanted = only.is_empty() || only.contains(&spec.contract);
        if wanted && !skip.contains(&spec.contract) {
            selected.push(spec.clone());
        }
    }
    Ok(selected)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanEntry {
    pub position: usize,
    pub contract: String,
    pub arg_count: usize,
}

/// What a run would do, computed without touching the network.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub manifest: String,
    pub network: String,
    pub max_concurrent: usize,
    pub entries: Vec<PlanEntry>,
}

impl ExecutionPlan {
    pub fn new(manifest: &DeploymentManifest, network: &str, options: &SequencerOptions) -> Self {
        let entries = manifest
            .iter()
            .enumerate()
            .map(|(index, spec)| PlanEntry {
                position: index + 1,
                contract: spec.contract.clone(),
                arg_count: spec.args.len(),
            })
            .collect();

        Self {
            manifest: manifest.name.clone(),
            network: network.to_string(),
            max_concurrent: options.max_concurrent.max(1),
            entries,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "🔍 Dry Run Analysis:");
        let _ = writeln!(out, "  Manifest: {}", self.manifest);
        let _ = writeln!(out, "  Network: {}", self.network);
        let mode = if self.max_concurrent == 1 {
            "sequential".to_string()
        } else {
            format!("pooled ({} in flight)", self.max_concurrent)
        };
        let _ = writeln!(out, "  Dispatch: {}", mode);
        let _ = writeln!(out);

        for entry in &self.entries {
            let _ = writeln!(
                out,
                "  {}. {} ({} constructor argument(s))",
                entry.position, entry.contract, entry.arg_count
            );
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "📊 Total contracts to deploy: {}", self.entries.len());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> DeploymentManifest {
        DeploymentManifest::with_contracts(
            "fair-exchange",
            ["HashedTimelock", "FT", "EllipticCurve", "TestHash"],
        )
    }

    fn names(manifest: &DeploymentManifest) -> Vec<&str> {
        manifest.iter().map(|s| s.contract.as_str()).collect()
    }

    #[test]
    fn test_select_keeps_manifest_order() {
        let only = vec!["TestHash".to_string(), "HashedTimelock".to_string()];
        let selected = select(&manifest(), &only, &[]).unwrap();
        assert_eq!(names(&selected), vec!["HashedTimelock", "TestHash"]);
    }

    #[test]
    fn test_select_with_skip() {
        let skip = vec!["FT".to_string()];
        let selected = select(&manifest(), &[], &skip).unwrap();
        assert_eq!(names(&selected), vec!["HashedTimelock", "EllipticCurve", "TestHash"]);
    }

    #[test]
    fn test_select_rejects_unknown_names() {
        let only = vec!["Fairtrade".to_string()];
        assert!(matches!(
            select(&manifest(), &only, &[]),
            Err(DeployError::ManifestError { .. })
        ));
    }

    #[test]
    fn test_plan_render() {
        let plan = ExecutionPlan::new(&manifest(), "development", &SequencerOptions::default());
        let rendered = plan.render();

        assert_eq!(plan.entries.len(), 4);
        assert_eq!(plan.entries[1].contract, "FT");
        assert!(rendered.contains("Dispatch: sequential"));
        assert!(rendered.contains("  3. EllipticCurve (0 constructor argument(s))"));
    }
}
