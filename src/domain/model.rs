use serde::{Deserialize, Serialize};

/// One contract to instantiate, with its constructor arguments in ABI order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    pub contract: String,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
}

impl DeploymentSpec {
    pub fn new(contract: impl Into<String>) -> Self {
        Self {
            contract: contract.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<serde_json::Value>) -> Self {
        self.args = args;
        self
    }
}

/// Ordered list of specs. Insertion order is submission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentManifest {
    pub name: String,
    pub specs: Vec<DeploymentSpec>,
}

impl DeploymentManifest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            specs: Vec::new(),
        }
    }

    pub fn push(&mut self, spec: DeploymentSpec) {
        self.specs.push(spec);
    }

    pub fn with_contracts<I, S>(name: impl Into<String>, contracts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            specs: contracts.into_iter().map(DeploymentSpec::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DeploymentSpec> {
        self.specs.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    pub status: Option<bool>,
    pub contract_address: Option<String>,
    /// Full receipt as returned by the node.
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub contract: String,
    pub address: String,
    pub receipt: TransactionReceipt,
}

/// Compiled contract as produced by the build toolchain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub contract_name: String,
    #[serde(default)]
    pub abi: serde_json::Value,
    #[serde(default)]
    pub bytecode: String,
}
