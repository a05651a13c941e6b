pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::error::{ClientError, Result, TransportError};
pub use application::{Connection, ConnectionFactory, KafkaTemplate};
pub use config::{BrokerDiscovery, ClientFileConfig, Configuration, ConfigurationBuilder};
pub use domain::{
    BrokerAddress, DomainError, FetchRequest, KafkaMessage, KafkaMessageBatch, MetadataCache, Partition,
    PartitionResult, PartitionResultBuilder, ReferenceTime,
};
