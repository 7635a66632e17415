//! Constructor argument encoding for contract-creation transactions.
//!
//! Only static ABI types are supported: each argument becomes one 32-byte
//! word appended to the creation bytecode. Dynamic types (`string`, `bytes`,
//! arrays, tuples) need head/tail encoding and are rejected.

use crate::utils::error::{DeployError, Result};
use serde_json::Value;

const WORD_HEX_LEN: usize = 64;

/// Returns the hex (no `0x`) encoding of `args` against the constructor in `abi`.
pub fn encode_constructor_args(abi: &Value, args: &[Value]) -> Result<String> {
    let inputs = constructor_input_types(abi);

    if inputs.len() != args.len() {
        return Err(abi_error(format!(
            "constructor expects {} argument(s), manifest provides {}",
            inputs.len(),
            args.len()
        )));
    }

    let mut encoded = String::with_capacity(inputs.len() * WORD_HEX_LEN);
    for (position, (kind, value)) in inputs.iter().zip(args).enumerate() {
        let word = encode_word(kind, value)
            .map_err(|e| abi_error(format!("argument #{} ({}): {}", position + 1, kind, e)))?;
        encoded.push_str(&word);
    }

    Ok(encoded)
}

fn constructor_input_types(abi: &Value) -> Vec<String> {
    abi.as_array()
        .and_then(|entries| {
            entries
                .iter()
                .find(|entry| entry.get("type").and_then(Value::as_str) == Some("constructor"))
        })
        .and_then(|constructor| constructor.get("inputs"))
        .and_then(Value::as_array)
        .map(|inputs| {
            inputs
                .iter()
                .map(|input| {
                    input
                        .get("type")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                })
                .collect()
        })
        .unwrap_or_default()
}

fn encode_word(kind: &str, value: &Value) -> std::result::Result<String, String> {
    match kind {
        "address" => encode_address(value),
        "bool" => match value {
            Value::Bool(flag) => Ok(format!("{:064x}", u8::from(*flag))),
            other => Err(format!("expected a boolean, got {}", other)),
        },
        _ if kind.starts_with("uint") => {
            let bits = type_bits(kind, "uint")?;
            let number = parse_unsigned(value)?;
            if bits < 128 && number >> bits != 0 {
                return Err(format!("{} does not fit in {} bits", number, bits));
            }
            Ok(format!("{:064x}", number))
        }
        _ if kind.starts_with("int") => {
            let bits = type_bits(kind, "int")?;
            let number = parse_signed(value)?;
            if bits < 128 {
                let bound = 1i128 << (bits - 1);
                if number < -bound || number >= bound {
                    return Err(format!("{} does not fit in {} bits", number, bits));
                }
            }
            let fill = if number < 0 { "f" } else { "0" };
            Ok(format!("{}{:032x}", fill.repeat(32), number as u128))
        }
        _ if kind.starts_with("bytes") && kind.len() > "bytes".len() => encode_fixed_bytes(kind, value),
        other => Err(format!("unsupported constructor type '{}'", other)),
    }
}

fn encode_address(value: &Value) -> std::result::Result<String, String> {
    let text = value
        .as_str()
        .ok_or_else(|| format!("expected an address string, got {}", value))?;
    let digits = text
        .strip_prefix("0x")
        .ok_or_else(|| format!("address '{}' is missing the 0x prefix", text))?;
    let bytes = hex::decode(digits).map_err(|e| format!("invalid address '{}': {}", text, e))?;
    if bytes.len() != 20 {
        return Err(format!("address '{}' is not 20 bytes", text));
    }
    Ok(format!("{:0>64}", hex::encode(bytes)))
}

fn encode_fixed_bytes(kind: &str, value: &Value) -> std::result::Result<String, String> {
    let size: usize = kind["bytes".len()..]
        .parse()
        .map_err(|_| format!("unsupported constructor type '{}'", kind))?;
    if !(1..=32).contains(&size) {
        return Err(format!("unsupported constructor type '{}'", kind));
    }

    let text = value
        .as_str()
        .ok_or_else(|| format!("expected a hex string, got {}", value))?;
    let bytes = hex::decode(text.strip_prefix("0x").unwrap_or(text))
        .map_err(|e| format!("invalid hex '{}': {}", text, e))?;
    if bytes.len() != size {
        return Err(format!("expected {} bytes, got {}", size, bytes.len()));
    }
    Ok(format!("{:0<64}", hex::encode(bytes)))
}

fn type_bits(kind: &str, prefix: &str) -> std::result::Result<u32, String> {
    let suffix = &kind[prefix.len()..];
    if suffix.is_empty() {
        return Ok(256);
    }
    let bits: u32 = suffix
        .parse()
        .map_err(|_| format!("unsupported constructor type '{}'", kind))?;
    if bits == 0 || bits > 256 || bits % 8 != 0 {
        return Err(format!("unsupported constructor type '{}'", kind));
    }
    Ok(bits)
}

fn parse_unsigned(value: &Value) -> std::result::Result<u128, String> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| format!("{} is not a non-negative integer", number)),
        Value::String(text) => match text.strip_prefix("0x") {
            Some(digits) => u128::from_str_radix(digits, 16),
            None => text.parse(),
        }
        .map_err(|_| format!("'{}' is not an unsigned integer up to 128 bits", text)),
        other => Err(format!("expected an integer, got {}", other)),
    }
}

fn parse_signed(value: &Value) -> std::result::Result<i128, String> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .map(i128::from)
            .ok_or_else(|| format!("{} is not an integer", number)),
        Value::String(text) => {
            let (negative, magnitude) = match text.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, text.as_str()),
            };
            let parsed = match magnitude.strip_prefix("0x") {
                Some(digits) => {
                    i128::from_str_radix(digits, 16).map(|n| if negative { -n } else { n })
                }
                None => text.parse(),
            };
            parsed.map_err(|_| format!("'{}' is not a signed integer up to 128 bits", text))
        }
        other => Err(format!("expected an integer, got {}", other)),
    }
}

fn abi_error(message: String) -> DeployError {
    DeployError::AbiError { message }
}
