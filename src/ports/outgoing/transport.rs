use crate::adapters::protocol::dto::{KafkaRequest, KafkaResponse};
use crate::application::error::TransportError;
use crate::domain::BrokerAddress;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Socket level knobs handed to every transport a connector opens.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    pub buffer_size: usize,
    pub socket_timeout: Duration,
}

/// One request/response channel to a single broker.
///
/// Requests are answered strictly in order; callers never pipeline.
#[async_trait]
pub trait KafkaTransport: Send + Sync {
    async fn send(&self, request: KafkaRequest) -> Result<KafkaResponse, TransportError>;

    /// Releases the underlying socket. Later sends fail with `TransportError::Closed`.
    async fn close(&self);
}

/// Creates transports. Opening must not touch the network.
pub trait TransportConnector: Send + Sync {
    fn open(&self, broker: &BrokerAddress, settings: &ConnectionSettings) -> Arc<dyn KafkaTransport>;
}
