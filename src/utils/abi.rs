//! Minimal ABI helpers for the fixed contract interface this service watches.
//!
//! Selectors and event topics are derived from signatures at startup rather
//! than hardcoded, so the tables cannot drift from the signature text.

use alloy::hex;
use alloy::primitives::{keccak256, Address, U256};
use lazy_static::lazy_static;
use std::collections::HashMap;

/// First four bytes of the keccak-256 of a function signature, 0x-prefixed.
pub fn function_selector(signature: &str) -> String {
    let hash = keccak256(signature.as_bytes());
    format!("0x{}", hex::encode(&hash[..4]))
}

/// Full keccak-256 of an event signature, 0x-prefixed (topic0).
pub fn event_topic(signature: &str) -> String {
    format!("0x{}", hex::encode(keccak256(signature.as_bytes())))
}

/// ABI-encodes a call to `signature` with address arguments only.
pub fn encode_call(signature: &str, args: &[Address]) -> Vec<u8> {
    let hash = keccak256(signature.as_bytes());
    let mut out = hash[..4].to_vec();
    for arg in args {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(arg.as_slice());
        out.extend_from_slice(&word);
    }
    out
}

/// Returns the 32-byte word at `index` of an ABI-encoded response.
pub fn word(data: &[u8], index: usize) -> Option<&[u8]> {
    data.get(index * 32..(index + 1) * 32)
}

pub fn decode_bool(data: &[u8], index: usize) -> Option<bool> {
    word(data, index).map(|w| w[31] != 0)
}

pub fn decode_u64(data: &[u8], index: usize) -> Option<u64> {
    let w = word(data, index)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&w[24..32]);
    Some(u64::from_be_bytes(buf))
}

pub fn decode_address(data: &[u8], index: usize) -> Option<String> {
    let w = word(data, index)?;
    Some(format!("0x{}", hex::encode(&w[12..32])))
}

pub fn decode_u256_string(data: &[u8], index: usize) -> Option<String> {
    let w = word(data, index)?;
    Some(U256::from_be_slice(w).to_string())
}

struct KnownFunction {
    signature: &'static str,
    name: &'static str,
}

const KNOWN_FUNCTIONS: &[KnownFunction] = &[
    KnownFunction { signature: "transfer(address,uint256)", name: "transfer" },
    KnownFunction { signature: "transferFrom(address,address,uint256)", name: "transferFrom" },
    KnownFunction { signature: "approve(address,uint256)", name: "approve" },
    KnownFunction { signature: "grantPermission(address,uint256)", name: "grantPermission" },
    KnownFunction { signature: "revokePermission(address,uint256)", name: "revokePermission" },
    KnownFunction { signature: "createSession(address,uint256)", name: "createSession" },
    KnownFunction { signature: "endSession(address)", name: "endSession" },
    KnownFunction { signature: "setPaused(bool)", name: "setPaused" },
    KnownFunction { signature: "transferOwnership(address)", name: "transferOwnership" },
];

/// Known event shape: all indexed parameters in this interface are addresses,
/// all data parameters are uint256.
pub struct KnownEvent {
    pub name: &'static str,
    pub signature: &'static str,
    pub indexed: &'static [&'static str],
    pub data_fields: &'static [&'static str],
}

const KNOWN_EVENTS: &[KnownEvent] = &[
    KnownEvent {
        name: "Transfer",
        signature: "Transfer(address,address,uint256)",
        indexed: &["from", "to"],
        data_fields: &["value"],
    },
    KnownEvent {
        name: "PermissionGranted",
        signature: "PermissionGranted(address,uint256,uint256)",
        indexed: &["user"],
        data_fields: &["permission", "expiresAt"],
    },
    KnownEvent {
        name: "PermissionRevoked",
        signature: "PermissionRevoked(address,uint256)",
        indexed: &["user"],
        data_fields: &["permission"],
    },
    KnownEvent {
        name: "SessionCreated",
        signature: "SessionCreated(address,address,uint256)",
        indexed: &["user", "app"],
        data_fields: &["expiresAt"],
    },
    KnownEvent {
        name: "SessionEnded",
        signature: "SessionEnded(address,address)",
        indexed: &["user", "app"],
        data_fields: &[],
    },
];

lazy_static! {
    static ref SELECTOR_TABLE: HashMap<String, &'static str> = KNOWN_FUNCTIONS
        .iter()
        .map(|f| (function_selector(f.signature), f.name))
        .collect();
    static ref EVENT_TABLE: HashMap<String, &'static KnownEvent> = KNOWN_EVENTS
        .iter()
        .map(|e| (event_topic(e.signature), e))
        .collect();
}

/// Resolves the method name for a transaction input via the fixed 4-byte
/// selector table. Unknown selectors and short inputs yield `None`.
pub fn lookup_method_name(input: &str) -> Option<&'static str> {
    if input.len() < 10 {
        return None;
    }
    SELECTOR_TABLE.get(&input[..10].to_lowercase()).copied()
}

/// Decodes a raw log against the known contract interface. Logs whose topic0
/// does not match any known event return `None`.
pub fn decode_known_event(
    topics: &[String],
    data: &str,
) -> Option<(&'static str, HashMap<String, String>)> {
    let topic0 = topics.first()?.to_lowercase();
    let event = EVENT_TABLE.get(&topic0)?;

    let mut params = HashMap::new();
    for (i, field) in event.indexed.iter().enumerate() {
        let topic = topics.get(i + 1)?;
        let raw = hex::decode(topic.trim_start_matches("0x")).ok()?;
        if raw.len() != 32 {
            return None;
        }
        params.insert(field.to_string(), format!("0x{}", hex::encode(&raw[12..32])));
    }

    let data_bytes = hex::decode(data.trim_start_matches("0x")).ok()?;
    for (i, field) in event.data_fields.iter().enumerate() {
        let value = decode_u256_string(&data_bytes, i)?;
        params.insert(field.to_string(), value);
    }

    Some((event.name, params))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_selector_matches_known_value() {
        // transfer(address,uint256) is the canonical ERC-20 selector
        assert_eq!(function_selector("transfer(address,uint256)"), "0xa9059cbb");
    }

    #[test]
    fn test_lookup_method_name() {
        let input = format!("{}000000", function_selector("transfer(address,uint256)"));
        assert_eq!(lookup_method_name(&input), Some("transfer"));
        assert_eq!(lookup_method_name("0x1234"), None);
        assert_eq!(lookup_method_name("0xdeadbeefcafe"), None);
    }

    #[test]
    fn test_encode_call_layout() {
        let addr: Address = "0x1111111111111111111111111111111111111111"
            .parse()
            .unwrap();
        let encoded = encode_call("endSession(address)", &[addr]);
        assert_eq!(encoded.len(), 4 + 32);
        assert_eq!(&encoded[..4], &keccak256("endSession(address)".as_bytes())[..4]);
        assert_eq!(&encoded[16..36], addr.as_slice());
    }

    #[test]
    fn test_word_decoders() {
        let mut data = vec![0u8; 64];
        data[31] = 1; // bool true at word 0
        data[56..64].copy_from_slice(&42u64.to_be_bytes()); // u64 42 at word 1

        assert_eq!(decode_bool(&data, 0), Some(true));
        assert_eq!(decode_u64(&data, 1), Some(42));
        assert_eq!(decode_u256_string(&data, 1).as_deref(), Some("42"));
        assert!(decode_bool(&data, 2).is_none());
    }

    #[test]
    fn test_decode_known_event_transfer() {
        let from = "0x000000000000000000000000aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        let to = "0x000000000000000000000000bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
        let topics = vec![
            event_topic("Transfer(address,address,uint256)"),
            from.to_string(),
            to.to_string(),
        ];
        let mut data = [0u8; 32];
        data[24..].copy_from_slice(&1000u64.to_be_bytes());
        let data_hex = format!("0x{}", hex::encode(data));

        let (name, params) = decode_known_event(&topics, &data_hex).unwrap();
        assert_eq!(name, "Transfer");
        assert_eq!(
            params.get("from").map(String::as_str),
            Some("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")
        );
        assert_eq!(
            params.get("to").map(String::as_str),
            Some("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb")
        );
        assert_eq!(params.get("value").map(String::as_str), Some("1000"));
    }

    #[test]
    fn test_decode_unknown_event_is_skipped() {
        let topics = vec![event_topic("SomethingElse(uint256)")];
        assert!(decode_known_event(&topics, "0x").is_none());
    }
}
