pub mod connection;
pub mod connection_factory;
pub mod error;
pub mod template;

pub use connection::Connection;
pub use connection_factory::ConnectionFactory;
pub use error::{ClientError, Result, TransportError};
pub use template::KafkaTemplate;
