use crate::domain::error::DomainError;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_PORT: u16 = 9092;

/// Network location of a single broker.
#[derive(Debug, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct BrokerAddress {
    host: String,
    port: u16,
}

impl BrokerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, DomainError> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(DomainError::InvalidAddress("host must not be empty".to_string()));
        }
        if port == 0 {
            return Err(DomainError::InvalidAddress(format!(
                "port must be positive for host {}",
                host
            )));
        }
        Ok(Self { host, port })
    }

    pub fn with_default_port(host: impl Into<String>) -> Result<Self, DomainError> {
        Self::new(host, DEFAULT_PORT)
    }

    /// Parses `host[:port]`, falling back to port 9092.
    pub fn from_address(address: &str) -> Result<Self, DomainError> {
        let address = address.trim();
        let parts: Vec<&str> = address.split(':').collect();
        match parts.as_slice() {
            [host] => Self::with_default_port(*host),
            [host, port] => {
                let port = port.parse::<u16>().map_err(|_| {
                    DomainError::InvalidAddress(format!("invalid port in '{}'", address))
                })?;
                Self::new(*host, port)
            }
            _ => Err(DomainError::InvalidAddress(format!(
                "expected host[:port], got '{}'",
                address
            ))),
        }
    }

    /// Parses a comma separated list of `host[:port]` entries.
    pub fn parse_list(addresses: &str) -> Result<Vec<Self>, DomainError> {
        addresses
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::from_address)
            .collect()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl FromStr for BrokerAddress {
    type Err = DomainError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_address(s)
    }
}

impl fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
