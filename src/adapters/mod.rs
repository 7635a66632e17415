// Adapters layer: concrete implementations for external systems (files, JSON-RPC nodes).

pub mod abi;
pub mod artifacts;
pub mod rpc_backend;
pub mod rpc_client;
pub mod storage;

pub use artifacts::FileArtifactRegistry;
pub use rpc_backend::JsonRpcBackend;
pub use storage::LocalStorage;
