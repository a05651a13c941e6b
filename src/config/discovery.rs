use crate::application::error::{ClientError, Result};
use crate::domain::BrokerAddress;
use crate::ports::outgoing::BrokerRegistry;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const PLAINTEXT_PREFIX: &str = "PLAINTEXT://";

/// Where seed brokers come from. Fixed for the lifetime of a configuration.
#[derive(Clone)]
pub enum BrokerDiscovery {
    Static(Vec<BrokerAddress>),
    Registry(RegistryDiscovery),
}

impl BrokerDiscovery {
    /// Returns a non-empty list of seed brokers.
    pub async fn resolve(&self) -> Result<Vec<BrokerAddress>> {
        match self {
            BrokerDiscovery::Static(brokers) if brokers.is_empty() => {
                Err(ClientError::Discovery("static broker list is empty".to_string()))
            }
            BrokerDiscovery::Static(brokers) => Ok(brokers.clone()),
            BrokerDiscovery::Registry(registry) => registry.resolve().await,
        }
    }
}

impl fmt::Debug for BrokerDiscovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerDiscovery::Static(brokers) => f.debug_tuple("Static").field(brokers).finish(),
            BrokerDiscovery::Registry(registry) => f.debug_tuple("Registry").field(registry).finish(),
        }
    }
}

/// Looks up live brokers in a registry and turns its node documents into addresses.
#[derive(Clone)]
pub struct RegistryDiscovery {
    registry: Arc<dyn BrokerRegistry>,
    timeout: Duration,
}

impl RegistryDiscovery {
    pub fn new(registry: Arc<dyn BrokerRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn resolve(&self) -> Result<Vec<BrokerAddress>> {
        let descriptors = tokio::time::timeout(self.timeout, self.registry.broker_descriptors())
            .await
            .map_err(|_| {
                ClientError::Discovery(format!(
                    "registry {} did not answer within {:?}",
                    self.registry.address(),
                    self.timeout
                ))
            })?
            .map_err(|e| {
                ClientError::Discovery(format!("registry {} lookup failed: {}", self.registry.address(), e))
            })?;

        let brokers = descriptors
            .iter()
            .map(|descriptor| parse_broker_node(descriptor))
            .collect::<Result<Vec<_>>>()?;

        if brokers.is_empty() {
            warn!(registry = %self.registry.address(), "registry lists no brokers");
            return Err(ClientError::Discovery(format!(
                "no brokers registered in {}",
                self.registry.address()
            )));
        }

        debug!(registry = %self.registry.address(), count = brokers.len(), "resolved brokers from registry");
        Ok(brokers)
    }
}

impl fmt::Debug for RegistryDiscovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryDiscovery")
            .field("registry", &self.registry.address())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct BrokerNode {
    host: Option<String>,
    port: Option<i32>,
    #[serde(default)]
    endpoints: Vec<String>,
}

/// Reads a registry node such as
/// `{"host":"kafka-1","port":9092,"endpoints":["PLAINTEXT://kafka-1:9092"]}`.
/// Brokers that only advertise listeners leave `host` null and `port` at -1.
pub fn parse_broker_node(descriptor: &str) -> Result<BrokerAddress> {
    let node: BrokerNode = serde_json::from_str(descriptor)
        .map_err(|e| ClientError::Discovery(format!("unparseable broker node '{}': {}", descriptor, e)))?;

    if let (Some(host), Some(port)) = (node.host.as_deref(), node.port) {
        if !host.is_empty() && port > 0 {
            let port = u16::try_from(port)
                .map_err(|_| ClientError::Discovery(format!("port {} out of range", port)))?;
            return Ok(BrokerAddress::new(host, port)?);
        }
    }

    node.endpoints
        .iter()
        .find_map(|endpoint| endpoint.strip_prefix(PLAINTEXT_PREFIX))
        .map(|address| BrokerAddress::from_address(address).map_err(ClientError::from))
        .unwrap_or_else(|| {
            Err(ClientError::Discovery(format!(
                "broker node has neither host/port nor a plaintext endpoint: {}",
                descriptor
            )))
        })
}
