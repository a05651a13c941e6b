use crate::adapters::outgoing::DirectoryBrokerRegistry;
use crate::application::error::{ClientError, Result};
use crate::domain::{BrokerAddress, Partition};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::configuration::{ConfigurationBuilder, DEFAULT_FETCH_METADATA_TIMEOUT};

/// Client configuration as written in a TOML file.
///
/// ```toml
/// brokers = ["kafka-1:9092", "kafka-2"]
/// client_id = "poller"
/// max_wait_ms = 250
/// default_partitions = ["orders:0", "orders:1"]
///
/// [registry]
/// dir = "/var/lib/kafka/brokers/ids"
/// timeout_ms = 500
/// ```
///
/// Unset fields fall back to the builder defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientFileConfig {
    pub brokers: Vec<String>,
    pub registry: Option<RegistryFileConfig>,
    pub client_id: Option<String>,
    pub min_bytes: Option<i32>,
    pub max_wait_ms: Option<u64>,
    pub buffer_size: Option<usize>,
    pub socket_timeout_ms: Option<u64>,
    pub backoff_ms: Option<u64>,
    pub metadata_fetch_timeout_ms: Option<u64>,
    pub default_topic: Option<String>,
    pub default_partitions: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegistryFileConfig {
    pub dir: PathBuf,
    pub timeout_ms: Option<u64>,
}

impl ClientFileConfig {
    pub fn parse_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| ClientError::Config(format!("failed to parse config: {}", e)))
    }

    /// Feeds every set field into a builder. Validation stays in `build()`.
    pub fn into_builder(self) -> Result<ConfigurationBuilder> {
        let mut builder = ConfigurationBuilder::default();

        match (self.brokers.is_empty(), self.registry) {
            (false, Some(_)) => {
                return Err(ClientError::Config(
                    "brokers and registry are mutually exclusive".to_string(),
                ))
            }
            (false, None) => {
                let brokers = self
                    .brokers
                    .iter()
                    .map(|b| BrokerAddress::from_address(b))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                builder = builder.static_brokers(brokers);
            }
            (true, Some(registry)) => {
                let timeout = registry
                    .timeout_ms
                    .map_or(DEFAULT_FETCH_METADATA_TIMEOUT, Duration::from_millis);
                builder = builder.registry(Arc::new(DirectoryBrokerRegistry::new(registry.dir)), timeout);
            }
            (true, None) => {}
        }

        if let Some(client_id) = self.client_id {
            builder = builder.client_id(client_id);
        }
        if let Some(min_bytes) = self.min_bytes {
            builder = builder.min_bytes(min_bytes);
        }
        if let Some(ms) = self.max_wait_ms {
            builder = builder.max_wait(Duration::from_millis(ms));
        }
        if let Some(buffer_size) = self.buffer_size {
            builder = builder.buffer_size(buffer_size);
        }
        if let Some(ms) = self.socket_timeout_ms {
            builder = builder.socket_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.backoff_ms {
            builder = builder.backoff(Duration::from_millis(ms));
        }
        if let Some(ms) = self.metadata_fetch_timeout_ms {
            builder = builder.fetch_metadata_timeout(Duration::from_millis(ms));
        }
        if let Some(topic) = self.default_topic {
            builder = builder.default_topic(topic);
        }
        if let Some(partitions) = self.default_partitions {
            let partitions = partitions
                .iter()
                .map(|p| Partition::parse(p))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            builder = builder.default_partitions(partitions);
        }

        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_file() {
        let config = ClientFileConfig::parse_str(
            r#"
            brokers = ["kafka-1:9092", "kafka-2"]
            client_id = "poller"
            min_bytes = 1024
            socket_timeout_ms = 5000
            default_partitions = ["orders:0", "orders:1"]
            "#,
        )
        .unwrap();

        assert_eq!(config.brokers, vec!["kafka-1:9092", "kafka-2"]);
        assert_eq!(config.client_id.as_deref(), Some("poller"));
        assert_eq!(config.min_bytes, Some(1024));
        assert_eq!(config.socket_timeout_ms, Some(5000));
        assert_eq!(config.max_wait_ms, None);
        assert_eq!(config.registry, None);
    }

    #[test]
    fn test_parse_registry_table() {
        let config = ClientFileConfig::parse_str(
            r#"
            [registry]
            dir = "/var/lib/kafka/brokers/ids"
            "#,
        )
        .unwrap();

        assert!(config.brokers.is_empty());
        assert_eq!(
            config.registry,
            Some(RegistryFileConfig {
                dir: PathBuf::from("/var/lib/kafka/brokers/ids"),
                timeout_ms: None,
            })
        );
    }

    #[test]
    fn test_parse_rejects_wrong_types() {
        assert!(matches!(
            ClientFileConfig::parse_str("min_bytes = \"lots\""),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            ClientFileConfig::parse_str("brokers = \"kafka-1\""),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn test_into_builder_rejects_bad_entries() {
        let both = ClientFileConfig {
            brokers: vec!["kafka-1".to_string()],
            registry: Some(RegistryFileConfig {
                dir: PathBuf::from("/tmp"),
                timeout_ms: None,
            }),
            ..Default::default()
        };
        assert!(matches!(both.into_builder(), Err(ClientError::Config(_))));

        let bad_partition = ClientFileConfig {
            brokers: vec!["kafka-1".to_string()],
            default_partitions: Some(vec!["orders".to_string()]),
            ..Default::default()
        };
        assert!(matches!(bad_partition.into_builder(), Err(ClientError::Domain(_))));

        let bad_broker = ClientFileConfig {
            brokers: vec!["a:b:c".to_string()],
            ..Default::default()
        };
        assert!(matches!(bad_broker.into_builder(), Err(ClientError::Domain(_))));
    }
}
