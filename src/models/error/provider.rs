use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("RPC request timed out")]
    Timeout,

    #[error("Rate limited by RPC endpoint")]
    RateLimited,

    #[error("Bad gateway from RPC endpoint")]
    BadGateway,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid transaction hash: {0}")]
    InvalidHash(String),

    #[error("Network configuration error: {0}")]
    NetworkConfiguration(String),

    #[error("RPC request error: {0}")]
    RequestError(String),

    #[error("Provider error: {0}")]
    Other(String),
}

impl From<alloy::transports::TransportError> for ProviderError {
    fn from(err: alloy::transports::TransportError) -> Self {
        let msg = err.to_string();
        let lowered = msg.to_lowercase();
        if lowered.contains("timed out") || lowered.contains("timeout") {
            ProviderError::Timeout
        } else if lowered.contains("429") || lowered.contains("too many requests") {
            ProviderError::RateLimited
        } else if lowered.contains("502") || lowered.contains("bad gateway") {
            ProviderError::BadGateway
        } else {
            ProviderError::RequestError(msg)
        }
    }
}
