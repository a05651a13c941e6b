pub mod codec;
pub mod constants;
pub mod dto;
pub mod parser;

pub use codec::KafkaProtocolCodec;
