use crate::application::error::{ClientError, Result};
use crate::domain::{BrokerAddress, Partition};
use crate::ports::outgoing::{BrokerRegistry, ConnectionSettings};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::discovery::{BrokerDiscovery, RegistryDiscovery};
use super::file_config::ClientFileConfig;

pub const DEFAULT_CLIENT_ID: &str = "kafka-client";
pub const DEFAULT_MIN_BYTES: i32 = 1;
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_millis(100);
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;
pub const DEFAULT_SOCKET_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);
pub const DEFAULT_FETCH_METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything a `ConnectionFactory` needs to reach the cluster.
#[derive(Debug, Clone)]
pub struct Configuration {
    discovery: BrokerDiscovery,
    client_id: String,
    min_bytes: i32,
    max_wait: Duration,
    buffer_size: usize,
    socket_timeout: Duration,
    backoff: Duration,
    fetch_metadata_timeout: Duration,
    default_topic: Option<String>,
    default_partitions: Option<Vec<Partition>>,
}

impl Configuration {
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }

    /// Shortcut for a static seed list such as `"kafka-1:9092,kafka-2"`.
    pub fn from_brokers(brokers: &str) -> Result<Self> {
        Self::builder()
            .static_brokers(BrokerAddress::parse_list(brokers)?)
            .build()
    }

    /// Parses a TOML client configuration, see `ClientFileConfig`.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        ClientFileConfig::parse_str(contents)?.into_builder()?.build()
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ClientError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let configuration = Self::from_toml_str(&contents)?;
        debug!(path = %path.display(), "loaded client configuration");
        Ok(configuration)
    }

    pub fn discovery(&self) -> &BrokerDiscovery {
        &self.discovery
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn min_bytes(&self) -> i32 {
        self.min_bytes
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn socket_timeout(&self) -> Duration {
        self.socket_timeout
    }

    /// Pause a caller should take before retrying after a leadership error.
    /// The client itself never retries.
    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    pub fn fetch_metadata_timeout(&self) -> Duration {
        self.fetch_metadata_timeout
    }

    pub fn default_topic(&self) -> Option<&str> {
        self.default_topic.as_deref()
    }

    pub fn default_partitions(&self) -> Option<&[Partition]> {
        self.default_partitions.as_deref()
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            buffer_size: self.buffer_size,
            socket_timeout: self.socket_timeout,
        }
    }
}

#[derive(Default)]
pub struct ConfigurationBuilder {
    discovery: Option<BrokerDiscovery>,
    client_id: Option<String>,
    min_bytes: Option<i32>,
    max_wait: Option<Duration>,
    buffer_size: Option<usize>,
    socket_timeout: Option<Duration>,
    backoff: Option<Duration>,
    fetch_metadata_timeout: Option<Duration>,
    default_topic: Option<String>,
    default_partitions: Option<Vec<Partition>>,
}

impl ConfigurationBuilder {
    pub fn static_brokers(mut self, brokers: Vec<BrokerAddress>) -> Self {
        self.discovery = Some(BrokerDiscovery::Static(brokers));
        self
    }

    pub fn registry(mut self, registry: Arc<dyn BrokerRegistry>, timeout: Duration) -> Self {
        self.discovery = Some(BrokerDiscovery::Registry(RegistryDiscovery::new(registry, timeout)));
        self
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn min_bytes(mut self, min_bytes: i32) -> Self {
        self.min_bytes = Some(min_bytes);
        self
    }

    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size);
        self
    }

    pub fn socket_timeout(mut self, socket_timeout: Duration) -> Self {
        self.socket_timeout = Some(socket_timeout);
        self
    }

    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = Some(backoff);
        self
    }

    pub fn fetch_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_metadata_timeout = Some(timeout);
        self
    }

    pub fn default_topic(mut self, topic: impl Into<String>) -> Self {
        self.default_topic = Some(topic.into());
        self
    }

    pub fn default_partitions(mut self, partitions: Vec<Partition>) -> Self {
        self.default_partitions = Some(partitions);
        self
    }

    pub fn build(self) -> Result<Configuration> {
        let discovery = self
            .discovery
            .ok_or_else(|| ClientError::Config("no broker discovery configured".to_string()))?;
        if let BrokerDiscovery::Static(brokers) = &discovery {
            if brokers.is_empty() {
                return Err(ClientError::Config("static broker list is empty".to_string()));
            }
        }

        if self.default_topic.is_some() && self.default_partitions.is_some() {
            return Err(ClientError::Config(
                "default topic and default partitions are mutually exclusive".to_string(),
            ));
        }

        let min_bytes = self.min_bytes.unwrap_or(DEFAULT_MIN_BYTES);
        if min_bytes < 0 {
            return Err(ClientError::Config(format!("fetch.min.bytes must not be negative, got {}", min_bytes)));
        }
        let max_wait = self.max_wait.unwrap_or(DEFAULT_MAX_WAIT);
        if max_wait.as_millis() > i32::MAX as u128 {
            return Err(ClientError::Config(format!("fetch.max.wait {:?} is too large", max_wait)));
        }
        let buffer_size = self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE);
        if buffer_size == 0 {
            return Err(ClientError::Config("socket.buffer.size must be positive".to_string()));
        }
        let socket_timeout = self.socket_timeout.unwrap_or(DEFAULT_SOCKET_TIMEOUT);
        let fetch_metadata_timeout = self.fetch_metadata_timeout.unwrap_or(DEFAULT_FETCH_METADATA_TIMEOUT);
        if socket_timeout.is_zero() || fetch_metadata_timeout.is_zero() {
            return Err(ClientError::Config("timeouts must be positive".to_string()));
        }

        Ok(Configuration {
            discovery,
            client_id: self.client_id.unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
            min_bytes,
            max_wait,
            buffer_size,
            socket_timeout,
            backoff: self.backoff.unwrap_or(DEFAULT_BACKOFF),
            fetch_metadata_timeout,
            default_topic: self.default_topic,
            default_partitions: self.default_partitions,
        })
    }
}
