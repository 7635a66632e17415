#![allow(dead_code)]

use contract_deployer::config::NetworkConfig;
use httpmock::prelude::*;
use httpmock::Mock;
use serde_json::{json, Value};
use std::path::Path;

pub const DEPLOYER: &str = "0x90f8bf6a479f320ead074411a4b0e7944ea8c9c1";

pub const REFERENCE_CONTRACTS: [&str; 10] = [
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
];

pub fn bytecode_for(index: usize) -> String {
    format!("0x60{:02x}60005500", index + 1)
}

pub fn tx_hash_for(index: usize) -> String {
    format!("0x{:064x}", 0xa000 + index)
}

pub fn address_for(index: usize) -> String {
    format!("0x{:040x}", 0xc000 + index)
}

pub fn write_artifact(dir: &Path, name: &str, bytecode: &str, abi: Value) {
    let artifact = json!({
        "contractName": name,
        "abi": abi,
        "bytecode": bytecode,
        "deployedBytecode": bytecode,
        "networks": {}
    });
    std::fs::write(
        dir.join(format!("{}.json", name)),
        serde_json::to_vec_pretty(&artifact).expect("artifact json"),
    )
    .expect("Failed to write test artifact");
}

pub fn rpc_result(result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": 1, "result": result})
}

pub fn rpc_error(code: i64, message: &str) -> Value {
    json!({"jsonrpc": "2.0", "id": 1, "error": {"code": code, "message": message}})
}

pub fn receipt_body(tx_hash: &str, address: Option<&str>, status: &str) -> Value {
    rpc_result(json!({
        "transactionHash": tx_hash,
        "blockNumber": "0x2",
        "gasUsed": "0x1d4c0",
        "status": status,
        "contractAddress": address,
        "logs": []
    }))
}

pub fn network_settings(server: &MockServer) -> NetworkConfig {
    NetworkConfig {
        rpc_url: server.base_url(),
        from: Some(DEPLOYER.to_string()),
        gas: Some(6_721_975),
        gas_price: None,
        confirmation_timeout_seconds: Some(1),
        poll_interval_ms: Some(50),
        request_timeout_seconds: Some(5),
    }
}

pub async fn mock_nonce<'a>(server: &'a MockServer, nonce: &str) -> Mock<'a> {
    let nonce = nonce.to_string();
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/")
                .body_contains("\"eth_getTransactionCount\"");
            then.status(200).json_body(rpc_result(json!(nonce)));
        })
        .await
}

/// Accepts a creation transaction whose data starts with `bytecode`.
pub async fn mock_send<'a>(server: &'a MockServer, bytecode: &str, tx_hash: &str) -> Mock<'a> {
    let data_prefix = format!("\"data\":\"{}", bytecode);
    let tx_hash = tx_hash.to_string();
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/")
                .body_contains("\"eth_sendTransaction\"")
                .body_contains(data_prefix);
            then.status(200).json_body(rpc_result(json!(tx_hash)));
        })
        .await
}

pub async fn mock_receipt<'a>(server: &'a MockServer, tx_hash: &str, body: Value) -> Mock<'a> {
    let tx_hash = tx_hash.to_string();
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/")
                .body_contains("\"eth_getTransactionReceipt\"")
                .body_contains(tx_hash);
            then.status(200).json_body(body);
        })
        .await
}

/// Mocks a successful deployment of the `index`-th contract.
pub async fn mock_successful_deploy(server: &MockServer, index: usize) {
    let tx_hash = tx_hash_for(index);
    let address = address_for(index);
    mock_send(server, &bytecode_for(index), &tx_hash).await;
    mock_receipt(server, &tx_hash, receipt_body(&tx_hash, Some(&address), "0x1")).await;
}
