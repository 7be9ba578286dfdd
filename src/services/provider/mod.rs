//! Chain provider for interacting with the watched EVM contract.
//!
//! Wraps an HTTP RPC provider and exposes the small set of read operations
//! the tracker and synchronizer need: receipts, mempool lookups, block
//! height and typed reads of the contract's state getters.

use std::time::Duration;

use alloy::{
    primitives::{Address, Bytes, TxHash, TxKind},
    providers::{Provider, RootProvider},
    rpc::{
        client::ClientBuilder,
        types::{TransactionInput, TransactionReceipt, TransactionRequest},
    },
    transports::http::{Client, Http},
};
use async_trait::async_trait;
use reqwest::ClientBuilder as ReqwestClientBuilder;
use serde::{Deserialize, Serialize};

use crate::models::{
    ContractStateSnapshot, DecodedContractEvent, MiniAppSessionState, ProviderError,
    UserPermissionState,
};
use crate::utils::{
    decode_address, decode_bool, decode_known_event, decode_u64, encode_call, lookup_method_name,
};

#[cfg(test)]
use mockall::automock;

/// Receipt fields the tracker consumes, decoupled from the RPC types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionReceiptData {
    pub transaction_hash: String,
    pub block_number: Option<u64>,
    pub status: bool,
    pub gas_used: u64,
    pub effective_gas_price: Option<String>,
    pub logs: Vec<RawEventLog>,
}

/// Undecoded log entry as hex strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEventLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
}

/// Pending transaction details read from the mempool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MempoolTransactionData {
    pub from: String,
    pub to: Option<String>,
    pub value: String,
    pub nonce: u64,
    pub gas_limit: u64,
    pub input: String,
    pub method: Option<String>,
}

/// Read-side interface to the chain.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChainProviderTrait: Send + Sync {
    /// Performs an `eth_call` against the watched contract.
    async fn read_contract(&self, data: Vec<u8>) -> Result<Vec<u8>, ProviderError>;

    /// Looks up a transaction in the mempool or a block. `Ok(None)` means
    /// the node does not know the hash.
    async fn get_transaction(
        &self,
        tx_hash: &str,
    ) -> Result<Option<MempoolTransactionData>, ProviderError>;

    /// Fetches the receipt for a hash. `Ok(None)` means not yet mined.
    async fn get_transaction_receipt(
        &self,
        tx_hash: &str,
    ) -> Result<Option<TransactionReceiptData>, ProviderError>;

    /// Gets the current block number of the chain.
    async fn get_block_number(&self) -> Result<u64, ProviderError>;

    /// Decodes a raw log against the known contract interface. Logs from
    /// other contracts or with unknown topics yield `None`.
    fn decode_event_log(&self, log: &RawEventLog) -> Option<DecodedContractEvent>;

    /// Reads the contract's global configuration.
    async fn get_contract_state(&self) -> Result<ContractStateSnapshot, ProviderError>;

    /// Reads the permission flags for a user.
    async fn get_user_permission_state(
        &self,
        user_address: &str,
    ) -> Result<UserPermissionState, ProviderError>;

    /// Reads the mini-app session record for a user.
    async fn get_mini_app_session(
        &self,
        user_address: &str,
    ) -> Result<MiniAppSessionState, ProviderError>;

    /// Checks whether a user has an active session with an app contract.
    async fn has_active_session(
        &self,
        user_address: &str,
        app_address: &str,
    ) -> Result<bool, ProviderError>;
}

/// Provider implementation for EVM-compatible chains.
#[derive(Clone)]
pub struct EvmChainProvider {
    provider: RootProvider<Http<Client>>,
    contract_address: Address,
}

impl EvmChainProvider {
    /// Creates a new provider for the given RPC endpoint and contract.
    pub fn new(
        rpc_url: &str,
        contract_address: &str,
        timeout_seconds: u64,
    ) -> Result<Self, ProviderError> {
        let rpc_url = rpc_url.parse().map_err(|e| {
            ProviderError::NetworkConfiguration(format!("Invalid URL format: {}", e))
        })?;

        let contract_address = contract_address
            .parse()
            .map_err(|_| ProviderError::InvalidAddress(contract_address.to_string()))?;

        let client = ReqwestClientBuilder::default()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Other(format!("Failed to build HTTP client: {}", e)))?;

        let mut transport = Http::new(rpc_url);
        transport.set_client(client);

        let is_local = transport.guess_local();
        let rpc_client = ClientBuilder::default().transport(transport, is_local);

        Ok(Self {
            provider: RootProvider::new(rpc_client),
            contract_address,
        })
    }

    fn parse_hash(tx_hash: &str) -> Result<TxHash, ProviderError> {
        tx_hash
            .parse()
            .map_err(|_| ProviderError::InvalidHash(tx_hash.to_string()))
    }

    fn parse_address(address: &str) -> Result<Address, ProviderError> {
        address
            .parse()
            .map_err(|_| ProviderError::InvalidAddress(address.to_string()))
    }

    fn convert_receipt(receipt: TransactionReceipt) -> TransactionReceiptData {
        let gas_used: u64 = receipt.gas_used.try_into().unwrap_or_default();
        let logs = receipt
            .inner
            .logs()
            .iter()
            .map(|log| RawEventLog {
                address: format!("0x{}", alloy::hex::encode(log.address())),
                topics: log
                    .topics()
                    .iter()
                    .map(|topic| format!("0x{}", alloy::hex::encode(topic)))
                    .collect(),
                data: format!("0x{}", alloy::hex::encode(&log.data().data)),
            })
            .collect();

        TransactionReceiptData {
            transaction_hash: format!("0x{}", alloy::hex::encode(receipt.transaction_hash)),
            block_number: receipt.block_number,
            status: receipt.status(),
            gas_used,
            effective_gas_price: Some(receipt.effective_gas_price.to_string()),
            logs,
        }
    }

    fn epoch_to_rfc3339(epoch_secs: u64) -> Option<String> {
        if epoch_secs == 0 {
            return None;
        }
        chrono::DateTime::from_timestamp(epoch_secs as i64, 0).map(|dt| dt.to_rfc3339())
    }
}

#[async_trait]
impl ChainProviderTrait for EvmChainProvider {
    async fn read_contract(&self, data: Vec<u8>) -> Result<Vec<u8>, ProviderError> {
        let request = TransactionRequest {
            to: Some(TxKind::Call(self.contract_address)),
            input: TransactionInput::new(Bytes::from(data)),
            ..Default::default()
        };
        let response = self
            .provider
            .call(&request)
            .await
            .map_err(ProviderError::from)?;
        Ok(response.to_vec())
    }

    async fn get_transaction(
        &self,
        tx_hash: &str,
    ) -> Result<Option<MempoolTransactionData>, ProviderError> {
        use alloy::consensus::Transaction as _;

        let hash = Self::parse_hash(tx_hash)?;
        let tx = self
            .provider
            .get_transaction_by_hash(hash)
            .await
            .map_err(ProviderError::from)?;

        Ok(tx.map(|tx| {
            let input = format!("0x{}", alloy::hex::encode(tx.inner.input()));
            let method = lookup_method_name(&input).map(|name| name.to_string());
            MempoolTransactionData {
                from: format!("0x{}", alloy::hex::encode(tx.from)),
                to: tx
                    .inner
                    .to()
                    .map(|to| format!("0x{}", alloy::hex::encode(to))),
                value: tx.inner.value().to_string(),
                nonce: tx.inner.nonce(),
                gas_limit: tx.inner.gas_limit().try_into().unwrap_or_default(),
                input,
                method,
            }
        }))
    }

    async fn get_transaction_receipt(
        &self,
        tx_hash: &str,
    ) -> Result<Option<TransactionReceiptData>, ProviderError> {
        let hash = Self::parse_hash(tx_hash)?;
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(ProviderError::from)?;
        Ok(receipt.map(Self::convert_receipt))
    }

    async fn get_block_number(&self) -> Result<u64, ProviderError> {
        self.provider
            .get_block_number()
            .await
            .map_err(ProviderError::from)
    }

    fn decode_event_log(&self, log: &RawEventLog) -> Option<DecodedContractEvent> {
        let contract = format!("0x{}", alloy::hex::encode(self.contract_address));
        if log.address.to_lowercase() != contract {
            return None;
        }
        let (name, params) = decode_known_event(&log.topics, &log.data)?;
        Some(DecodedContractEvent {
            name: name.to_string(),
            contract_address: log.address.to_lowercase(),
            params,
        })
    }

    async fn get_contract_state(&self) -> Result<ContractStateSnapshot, ProviderError> {
        let data = self.read_contract(encode_call("getGlobalConfig()", &[])).await?;

        let parse_error =
            || ProviderError::Other("Malformed getGlobalConfig() response".to_string());

        Ok(ContractStateSnapshot {
            owner: decode_address(&data, 0).ok_or_else(parse_error)?,
            paused: decode_bool(&data, 1).ok_or_else(parse_error)?,
            session_duration_secs: decode_u64(&data, 2).ok_or_else(parse_error)?,
            permission_count: decode_u64(&data, 3).ok_or_else(parse_error)?,
            last_updated: chrono::Utc::now().to_rfc3339(),
        })
    }

    async fn get_user_permission_state(
        &self,
        user_address: &str,
    ) -> Result<UserPermissionState, ProviderError> {
        let user = Self::parse_address(user_address)?;
        let data = self
            .read_contract(encode_call("getUserPermissions(address)", &[user]))
            .await?;

        let parse_error =
            || ProviderError::Other("Malformed getUserPermissions(address) response".to_string());

        let expires_at = decode_u64(&data, 2).ok_or_else(parse_error)?;
        let granted_at = decode_u64(&data, 3).ok_or_else(parse_error)?;

        Ok(UserPermissionState {
            user_address: user_address.to_lowercase(),
            active: decode_bool(&data, 0).ok_or_else(parse_error)?,
            level: decode_u64(&data, 1).ok_or_else(parse_error)?,
            expires_at: Self::epoch_to_rfc3339(expires_at),
            granted_at: Self::epoch_to_rfc3339(granted_at),
            last_updated: chrono::Utc::now().to_rfc3339(),
        })
    }

    async fn get_mini_app_session(
        &self,
        user_address: &str,
    ) -> Result<MiniAppSessionState, ProviderError> {
        let user = Self::parse_address(user_address)?;
        let data = self
            .read_contract(encode_call("getSession(address)", &[user]))
            .await?;

        let parse_error =
            || ProviderError::Other("Malformed getSession(address) response".to_string());

        let app = decode_address(&data, 1).ok_or_else(parse_error)?;
        let expires_at = decode_u64(&data, 2).ok_or_else(parse_error)?;

        Ok(MiniAppSessionState {
            user_address: user_address.to_lowercase(),
            active: decode_bool(&data, 0).ok_or_else(parse_error)?,
            app_address: if app == format!("0x{}", "0".repeat(40)) {
                None
            } else {
                Some(app)
            },
            expires_at: Self::epoch_to_rfc3339(expires_at),
            last_updated: chrono::Utc::now().to_rfc3339(),
        })
    }

    async fn has_active_session(
        &self,
        user_address: &str,
        app_address: &str,
    ) -> Result<bool, ProviderError> {
        let user = Self::parse_address(user_address)?;
        let app = Self::parse_address(app_address)?;
        let data = self
            .read_contract(encode_call("hasActiveSession(address,address)", &[user, app]))
            .await?;

        decode_bool(&data, 0).ok_or_else(|| {
            ProviderError::Other("Malformed hasActiveSession(address,address) response".to_string())
        })
    }
}

impl std::fmt::Debug for EvmChainProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmChainProvider")
            .field("contract_address", &self.contract_address)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{event_topic, function_selector};

    fn test_provider() -> EvmChainProvider {
        EvmChainProvider::new(
            "http://localhost:8545",
            "0x1111111111111111111111111111111111111111",
            30,
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_contract_address() {
        let result = EvmChainProvider::new("http://localhost:8545", "not-an-address", 30);
        assert!(matches!(result, Err(ProviderError::InvalidAddress(_))));
    }

    #[test]
    fn test_parse_hash_rejects_garbage() {
        assert!(matches!(
            EvmChainProvider::parse_hash("0x1234"),
            Err(ProviderError::InvalidHash(_))
        ));
    }

    #[test]
    fn test_decode_event_log_requires_watched_contract() {
        let provider = test_provider();
        let mut data = [0u8; 32];
        data[24..].copy_from_slice(&500u64.to_be_bytes());

        let log = RawEventLog {
            address: "0x1111111111111111111111111111111111111111".to_string(),
            topics: vec![
                event_topic("Transfer(address,address,uint256)"),
                format!("0x{}{}", "0".repeat(24), "a".repeat(40)),
                format!("0x{}{}", "0".repeat(24), "b".repeat(40)),
            ],
            data: format!("0x{}", alloy::hex::encode(data)),
        };

        let decoded = provider.decode_event_log(&log).unwrap();
        assert_eq!(decoded.name, "Transfer");
        assert_eq!(decoded.params.get("value").map(String::as_str), Some("500"));

        // Same log from a different contract is ignored
        let foreign = RawEventLog {
            address: "0x2222222222222222222222222222222222222222".to_string(),
            ..log
        };
        assert!(provider.decode_event_log(&foreign).is_none());
    }

    #[test]
    fn test_epoch_to_rfc3339_zero_is_none() {
        assert!(EvmChainProvider::epoch_to_rfc3339(0).is_none());
        assert!(EvmChainProvider::epoch_to_rfc3339(1_700_000_000).is_some());
    }

    #[test]
    fn test_state_getter_selectors_are_stable() {
        // The getters are fixed contract interface entries
        assert_eq!(function_selector("getGlobalConfig()").len(), 10);
        assert_eq!(
            encode_call("hasActiveSession(address,address)", &[
                Address::ZERO,
                Address::ZERO
            ])
            .len(),
            4 + 64
        );
    }
}
