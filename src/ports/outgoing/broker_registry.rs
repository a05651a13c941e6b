use crate::Result;
use async_trait::async_trait;

/// Source of broker registrations, such as the `/brokers/ids` tree of a
/// coordination service. Each descriptor is the raw JSON node document.
#[async_trait]
pub trait BrokerRegistry: Send + Sync {
    /// Connection string of the registry, for diagnostics.
    fn address(&self) -> &str;

    async fn broker_descriptors(&self) -> Result<Vec<String>>;
}
