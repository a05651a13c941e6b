pub mod broker_registry;
pub mod transport;

pub use broker_registry::BrokerRegistry;
pub use transport::{ConnectionSettings, KafkaTransport, TransportConnector};
