pub mod configuration;
pub mod discovery;
pub mod file_config;
#[cfg(test)]
pub mod test_config;

pub use configuration::{Configuration, ConfigurationBuilder};
pub use discovery::{BrokerDiscovery, RegistryDiscovery};
pub use file_config::{ClientFileConfig, RegistryFileConfig};
