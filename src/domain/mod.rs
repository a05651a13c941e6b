pub mod broker;
pub mod error;
pub mod message;
pub mod metadata;
pub mod partition;
pub mod result;

pub use broker::*;
pub use error::DomainError;
pub use message::*;
pub use metadata::*;
pub use partition::*;
pub use result::*;
