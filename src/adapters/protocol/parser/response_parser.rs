use crate::adapters::protocol::constants::{
    FETCH_KEY, FETCH_VERSION, LIST_OFFSETS_KEY, LIST_OFFSETS_VERSION, METADATA_KEY,
    METADATA_VERSION, OFFSET_COMMIT_KEY, OFFSET_COMMIT_VERSION, OFFSET_FETCH_KEY,
    OFFSET_FETCH_VERSION,
};
use crate::adapters::protocol::dto::{
    AbortedTransaction, FetchResponse, FetchablePartitionResponse, FetchableTopicResponse,
    KafkaResponse, ListOffsetsPartitionResponse, ListOffsetsResponse, ListOffsetsTopicResponse,
    MetadataBroker, MetadataPartition, MetadataResponse, MetadataTopic,
    OffsetCommitPartitionResponse, OffsetCommitResponse, OffsetCommitTopicResponse,
    OffsetFetchPartitionResponse, OffsetFetchResponse, OffsetFetchTopicResponse,
    ResponsePayload,
};
use crate::application::error::TransportError;
use bytes::{Buf, Bytes};
use tracing::trace;

use super::base_parser::BaseParser;
use super::traits::{ArrayParser, PrimitiveParser, StringParser};

#[derive(Clone, Default)]
pub struct ResponseParser {
    base: BaseParser,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            base: BaseParser,
        }
    }

    /// Parses one response frame (without its size prefix). The wire does not
    /// carry the API key, so the caller passes the one it sent.
    pub fn parse(&self, api_key: i16, api_version: i16, data: &[u8]) -> Result<KafkaResponse, TransportError> {
        trace!(api_key, api_version, raw = %hex::encode(data), "parsing response");
        let mut buf = Bytes::copy_from_slice(data);

        let correlation_id = self.base.parse_i32(&mut buf)?;
        let payload = self.parse_payload(&mut buf, api_key, api_version)?;

        if buf.has_remaining() {
            return Err(TransportError::Protocol(format!(
                "{} trailing bytes after response for api key {}",
                buf.remaining(),
                api_key
            )));
        }

        Ok(KafkaResponse::new(correlation_id, payload))
    }

    fn parse_payload(&self, buf: &mut Bytes, api_key: i16, api_version: i16) -> Result<ResponsePayload, TransportError> {
        let expected_version = match api_key {
            METADATA_KEY => METADATA_VERSION,
            FETCH_KEY => FETCH_VERSION,
            LIST_OFFSETS_KEY => LIST_OFFSETS_VERSION,
            OFFSET_FETCH_KEY => OFFSET_FETCH_VERSION,
            OFFSET_COMMIT_KEY => OFFSET_COMMIT_VERSION,
            _ => {
                return Err(TransportError::Protocol(format!("unsupported api key {}", api_key)));
            }
        };
        if api_version != expected_version {
            return Err(TransportError::Protocol(format!(
                "unsupported version {} for api key {}",
                api_version, api_key
            )));
        }

        match api_key {
            METADATA_KEY => self.parse_metadata_response(buf).map(ResponsePayload::Metadata),
            FETCH_KEY => self.parse_fetch_response(buf).map(ResponsePayload::Fetch),
            LIST_OFFSETS_KEY => self.parse_list_offsets_response(buf).map(ResponsePayload::ListOffsets),
            OFFSET_FETCH_KEY => self.parse_offset_fetch_response(buf).map(ResponsePayload::OffsetFetch),
            _ => self.parse_offset_commit_response(buf).map(ResponsePayload::OffsetCommit),
        }
    }

    fn parse_metadata_response(&self, buf: &mut Bytes) -> Result<MetadataResponse, TransportError> {
        let brokers = self.base.parse_array(buf, |buf| {
            Ok(MetadataBroker {
                node_id: self.base.parse_i32(buf)?,
                host: self.base.parse_string(buf)?,
                port: self.base.parse_i32(buf)?,
                rack: self.base.parse_nullable_string(buf)?,
            })
        })?;
        let controller_id = self.base.parse_i32(buf)?;

        let topics = self.base.parse_array(buf, |buf| {
            let error_code = self.base.parse_i16(buf)?;
            let name = self.base.parse_string(buf)?;
            let is_internal = self.base.parse_bool(buf)?;
            let partitions = self.base.parse_array(buf, |buf| {
                Ok(MetadataPartition {
                    error_code: self.base.parse_i16(buf)?,
                    partition_index: self.base.parse_i32(buf)?,
                    leader_id: self.base.parse_i32(buf)?,
                    replica_nodes: self.base.parse_array(buf, |buf| self.base.parse_i32(buf))?,
                    isr_nodes: self.base.parse_array(buf, |buf| self.base.parse_i32(buf))?,
                })
            })?;
            trace!(topic = %name, error_code, partitions = partitions.len(), "metadata topic");

            Ok(MetadataTopic {
                error_code,
                name,
                is_internal,
                partitions,
            })
        })?;

        Ok(MetadataResponse {
            brokers,
            controller_id,
            topics,
        })
    }

    fn parse_fetch_response(&self, buf: &mut Bytes) -> Result<FetchResponse, TransportError> {
        let throttle_time_ms = self.base.parse_i32(buf)?;

        let responses = self.base.parse_array(buf, |buf| {
            let topic = self.base.parse_string(buf)?;
            let partitions = self.base.parse_array(buf, |buf| {
                let partition_index = self.base.parse_i32(buf)?;
                let error_code = self.base.parse_i16(buf)?;
                let high_watermark = self.base.parse_i64(buf)?;
                let last_stable_offset = self.base.parse_i64(buf)?;
                let aborted_transactions = self.base.parse_nullable_array(buf, |buf| {
                    Ok(AbortedTransaction {
                        producer_id: self.base.parse_i64(buf)?,
                        first_offset: self.base.parse_i64(buf)?,
                    })
                })?;
                let records = self.base.parse_nullable_bytes(buf)?;

                Ok(FetchablePartitionResponse {
                    partition_index,
                    error_code,
                    high_watermark,
                    last_stable_offset,
                    aborted_transactions,
                    records,
                })
            })?;

            Ok(FetchableTopicResponse { topic, partitions })
        })?;

        Ok(FetchResponse {
            throttle_time_ms,
            responses,
        })
    }

    fn parse_list_offsets_response(&self, buf: &mut Bytes) -> Result<ListOffsetsResponse, TransportError> {
        let topics = self.base.parse_array(buf, |buf| {
            let name = self.base.parse_string(buf)?;
            let partitions = self.base.parse_array(buf, |buf| {
                Ok(ListOffsetsPartitionResponse {
                    partition_index: self.base.parse_i32(buf)?,
                    error_code: self.base.parse_i16(buf)?,
                    timestamp: self.base.parse_i64(buf)?,
                    offset: self.base.parse_i64(buf)?,
                })
            })?;

            Ok(ListOffsetsTopicResponse { name, partitions })
        })?;

        Ok(ListOffsetsResponse { topics })
    }

    fn parse_offset_fetch_response(&self, buf: &mut Bytes) -> Result<OffsetFetchResponse, TransportError> {
        let topics = self.base.parse_array(buf, |buf| {
            let name = self.base.parse_string(buf)?;
            let partitions = self.base.parse_array(buf, |buf| {
                Ok(OffsetFetchPartitionResponse {
                    partition_index: self.base.parse_i32(buf)?,
                    committed_offset: self.base.parse_i64(buf)?,
                    metadata: self.base.parse_nullable_string(buf)?,
                    error_code: self.base.parse_i16(buf)?,
                })
            })?;

            Ok(OffsetFetchTopicResponse { name, partitions })
        })?;

        Ok(OffsetFetchResponse { topics })
    }

    fn parse_offset_commit_response(&self, buf: &mut Bytes) -> Result<OffsetCommitResponse, TransportError> {
        let topics = self.base.parse_array(buf, |buf| {
            let name = self.base.parse_string(buf)?;
            let partitions = self.base.parse_array(buf, |buf| {
                Ok(OffsetCommitPartitionResponse {
                    partition_index: self.base.parse_i32(buf)?,
                    error_code: self.base.parse_i16(buf)?,
                })
            })?;

            Ok(OffsetCommitTopicResponse { name, partitions })
        })?;

        Ok(OffsetCommitResponse { topics })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put_string(data: &mut Vec<u8>, value: &str) {
        data.extend_from_slice(&(value.len() as i16).to_be_bytes());
        data.extend_from_slice(value.as_bytes());
    }

    #[test]
    fn test_parse_metadata_response() {
        let mut data = Vec::new();
        data.extend_from_slice(&42i32.to_be_bytes()); // correlation id

        // brokers
        data.extend_from_slice(&1i32.to_be_bytes());
        data.extend_from_slice(&7i32.to_be_bytes()); // node id
        put_string(&mut data, "broker-7");
        data.extend_from_slice(&9093i32.to_be_bytes());
        data.extend_from_slice(&(-1i16).to_be_bytes()); // null rack
        data.extend_from_slice(&7i32.to_be_bytes()); // controller id

        // topics
        data.extend_from_slice(&1i32.to_be_bytes());
        data.extend_from_slice(&0i16.to_be_bytes());
        put_string(&mut data, "orders");
        data.push(0); // is_internal
        data.extend_from_slice(&1i32.to_be_bytes()); // partitions
        data.extend_from_slice(&0i16.to_be_bytes());
        data.extend_from_slice(&0i32.to_be_bytes()); // partition index
        data.extend_from_slice(&7i32.to_be_bytes()); // leader
        data.extend_from_slice(&1i32.to_be_bytes()); // replicas
        data.extend_from_slice(&7i32.to_be_bytes());
        data.extend_from_slice(&0i32.to_be_bytes()); // isr (empty)

        let response = ResponseParser::new().parse(METADATA_KEY, METADATA_VERSION, &data).unwrap();
        assert_eq!(response.correlation_id, 42);

        match response.payload {
            ResponsePayload::Metadata(metadata) => {
                assert_eq!(metadata.controller_id, 7);
                assert_eq!(metadata.brokers.len(), 1);
                assert_eq!(metadata.brokers[0].host, "broker-7");
                assert_eq!(metadata.brokers[0].port, 9093);
                assert_eq!(metadata.brokers[0].rack, None);
                assert_eq!(metadata.topics[0].name, "orders");
                assert_eq!(metadata.topics[0].partitions[0].leader_id, 7);
                assert_eq!(metadata.topics[0].partitions[0].replica_nodes, vec![7]);
                assert!(metadata.topics[0].partitions[0].isr_nodes.is_empty());
            }
            other => panic!("Expected Metadata payload, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_fetch_response() {
        let mut data = Vec::new();
        data.extend_from_slice(&5i32.to_be_bytes()); // correlation id
        data.extend_from_slice(&0i32.to_be_bytes()); // throttle
        data.extend_from_slice(&1i32.to_be_bytes()); // topics
        put_string(&mut data, "orders");
        data.extend_from_slice(&2i32.to_be_bytes()); // partitions

        data.extend_from_slice(&0i32.to_be_bytes());
        data.extend_from_slice(&0i16.to_be_bytes());
        data.extend_from_slice(&10i64.to_be_bytes()); // high watermark
        data.extend_from_slice(&10i64.to_be_bytes()); // last stable offset
        data.extend_from_slice(&(-1i32).to_be_bytes()); // null aborted txns
        data.extend_from_slice(&3i32.to_be_bytes());
        data.extend_from_slice(&[1, 2, 3]);

        data.extend_from_slice(&1i32.to_be_bytes());
        data.extend_from_slice(&1i16.to_be_bytes()); // offset out of range
        data.extend_from_slice(&(-1i64).to_be_bytes());
        data.extend_from_slice(&(-1i64).to_be_bytes());
        data.extend_from_slice(&0i32.to_be_bytes()); // empty aborted txns
        data.extend_from_slice(&(-1i32).to_be_bytes()); // null records

        let response = ResponseParser::new().parse(FETCH_KEY, FETCH_VERSION, &data).unwrap();
        match response.payload {
            ResponsePayload::Fetch(fetch) => {
                let partitions = &fetch.responses[0].partitions;
                assert_eq!(partitions[0].high_watermark, 10);
                assert_eq!(partitions[0].records, Some(Bytes::from_static(&[1, 2, 3])));
                assert_eq!(partitions[0].aborted_transactions, None);
                assert_eq!(partitions[1].error_code, 1);
                assert_eq!(partitions[1].records, None);
                assert_eq!(partitions[1].aborted_transactions, Some(vec![]));
            }
            other => panic!("Expected Fetch payload, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_offset_fetch_response() {
        let mut data = Vec::new();
        data.extend_from_slice(&9i32.to_be_bytes());
        data.extend_from_slice(&1i32.to_be_bytes());
        put_string(&mut data, "orders");
        data.extend_from_slice(&1i32.to_be_bytes());
        data.extend_from_slice(&3i32.to_be_bytes());
        data.extend_from_slice(&77i64.to_be_bytes());
        put_string(&mut data, "");
        data.extend_from_slice(&0i16.to_be_bytes());

        let response = ResponseParser::new()
            .parse(OFFSET_FETCH_KEY, OFFSET_FETCH_VERSION, &data)
            .unwrap();
        match response.payload {
            ResponsePayload::OffsetFetch(offsets) => {
                let partition = &offsets.topics[0].partitions[0];
                assert_eq!(partition.partition_index, 3);
                assert_eq!(partition.committed_offset, 77);
                assert_eq!(partition.metadata.as_deref(), Some(""));
            }
            other => panic!("Expected OffsetFetch payload, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_truncated_and_trailing_data() {
        let parser = ResponseParser::new();

        let mut truncated = Vec::new();
        truncated.extend_from_slice(&1i32.to_be_bytes());
        truncated.extend_from_slice(&1i32.to_be_bytes()); // one topic, then nothing
        assert!(parser.parse(LIST_OFFSETS_KEY, LIST_OFFSETS_VERSION, &truncated).is_err());

        let mut trailing = Vec::new();
        trailing.extend_from_slice(&1i32.to_be_bytes());
        trailing.extend_from_slice(&0i32.to_be_bytes()); // no topics
        trailing.push(0xaa);
        assert!(parser.parse(OFFSET_COMMIT_KEY, OFFSET_COMMIT_VERSION, &trailing).is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_api() {
        let parser = ResponseParser::new();
        let data = 1i32.to_be_bytes();
        assert!(parser.parse(18, 0, &data).is_err());
        assert!(parser.parse(FETCH_KEY, 11, &data).is_err());
    }
}
