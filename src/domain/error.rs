#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    InvalidAddress(String),
    InvalidArgument(String),
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainError::InvalidAddress(msg) => write!(f, "Invalid broker address: {}", msg),
            DomainError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}
