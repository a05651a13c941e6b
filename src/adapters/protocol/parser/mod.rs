pub mod base_parser;
pub mod record_batch_parser;
pub mod request_encoder;
pub mod response_parser;
pub mod traits;
pub mod varint;

pub use base_parser::BaseParser;
pub use record_batch_parser::{RecordBatchBuilder, RecordBatchParser};
pub use request_encoder::RequestEncoder;
pub use response_parser::ResponseParser;
pub use traits::*;
