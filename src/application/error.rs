use crate::domain::error::DomainError;
use crate::domain::{BrokerAddress, Partition};
use thiserror::Error;

/// Failure of a whole round trip to a broker.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("Correlation id mismatch: expected {expected}, got {actual}")]
    CorrelationMismatch { expected: i32, actual: i32 },
    #[error("Transport is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("Communication with broker {broker} failed: {source}")]
    Communication {
        broker: BrokerAddress,
        #[source]
        source: TransportError,
    },
    #[error("Inconsistent response from broker {broker}: {reason}")]
    InconsistentResponse { broker: BrokerAddress, reason: String },
    #[error("No leader found for partition {0}")]
    PartitionNotFound(Partition),
    #[error("Topic not found: {0}")]
    TopicNotFound(String),
    #[error("Broker discovery failed: {0}")]
    Discovery(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ClientError {
    pub fn communication(broker: &BrokerAddress, source: TransportError) -> Self {
        ClientError::Communication {
            broker: broker.clone(),
            source,
        }
    }

    pub fn inconsistent(broker: &BrokerAddress, reason: impl Into<String>) -> Self {
        ClientError::InconsistentResponse {
            broker: broker.clone(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
