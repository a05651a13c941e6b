mod common;
pub mod records;
pub mod request;
pub mod response;

pub use common::*;
pub use records::*;
pub use request::*;
pub use response::*;
