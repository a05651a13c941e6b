pub mod directory_registry;
pub mod tcp_transport;

pub use directory_registry::DirectoryBrokerRegistry;
pub use tcp_transport::{TcpConnector, TcpTransport};
