use crate::adapters::protocol::dto::{KafkaRequest, KafkaResponse, RecordBatch};
use crate::application::error::TransportError;
use bytes::Bytes;

use super::parser::{RecordBatchParser, RequestEncoder, ResponseParser};

/// Client side of the wire protocol: requests go out, responses and record sets come in.
#[derive(Clone, Default)]
pub struct KafkaProtocolCodec {
    request_encoder: RequestEncoder,
    response_parser: ResponseParser,
    record_batch_parser: RecordBatchParser,
}

impl KafkaProtocolCodec {
    pub fn new() -> Self {
        Self {
            request_encoder: RequestEncoder::new(),
            response_parser: ResponseParser::new(),
            record_batch_parser: RecordBatchParser::new(),
        }
    }

    pub fn encode_request(&self, request: &KafkaRequest) -> Vec<u8> {
        self.request_encoder.encode(request)
    }

    /// `data` is the frame after its size prefix.
    pub fn parse_response(&self, request: &KafkaRequest, data: &[u8]) -> Result<KafkaResponse, TransportError> {
        let response = self.response_parser.parse(
            request.header.api_key,
            request.header.api_version,
            data,
        )?;

        if response.correlation_id != request.header.correlation_id {
            return Err(TransportError::CorrelationMismatch {
                expected: request.header.correlation_id,
                actual: response.correlation_id,
            });
        }

        Ok(response)
    }

    pub fn parse_records(&self, records: &Bytes) -> Result<Vec<RecordBatch>, TransportError> {
        self.record_batch_parser.parse_batches(records)
    }
}
