use crate::adapters::protocol::constants::{LOG_OVERHEAD, RECORD_BATCH_MAGIC, RECORD_BATCH_OVERHEAD};
use crate::adapters::protocol::dto::{Record, RecordBatch, RecordHeader};
use crate::application::error::TransportError;
use bytes::{Buf, Bytes};
use tracing::trace;

use super::base_parser::BaseParser;
use super::traits::{ByteParser, PrimitiveParser, VarIntParser};

/// Byte offset of the magic byte inside a batch (base offset, length, leader epoch).
const MAGIC_OFFSET: usize = 16;

#[derive(Debug, Default, Clone)]
pub struct RecordBatchParser {
    base: BaseParser,
}

impl RecordBatchParser {
    pub fn new() -> Self {
        Self {
            base: BaseParser,
        }
    }

    /// Parses the record set of one fetched partition. The broker may cut the
    /// last batch short when it hits the size limit; that tail is dropped.
    pub fn parse_batches(&self, records: &Bytes) -> Result<Vec<RecordBatch>, TransportError> {
        let mut src = records.clone();
        let mut batches = Vec::new();

        while src.remaining() >= LOG_OVERHEAD {
            let batch_length = i32::from_be_bytes([src[8], src[9], src[10], src[11]]);
            if batch_length < 0 || (batch_length as usize) + LOG_OVERHEAD < RECORD_BATCH_OVERHEAD {
                return Err(TransportError::Protocol(format!(
                    "invalid record batch length {}",
                    batch_length
                )));
            }

            let total = batch_length as usize + LOG_OVERHEAD;
            if src.remaining() < total {
                trace!(remaining = src.remaining(), needed = total, "dropping partial trailing batch");
                break;
            }

            let mut batch = src.split_to(total);
            let magic = batch[MAGIC_OFFSET] as i8;
            if magic != RECORD_BATCH_MAGIC {
                return Err(TransportError::Protocol(format!(
                    "unsupported record batch magic {}",
                    magic
                )));
            }

            batches.push(self.parse_record_batch(&mut batch)?);
        }

        Ok(batches)
    }

    pub fn parse_record_batch(&self, src: &mut Bytes) -> Result<RecordBatch, TransportError> {
        let base_offset = self.base.parse_i64(src)?;
        let batch_length = self.base.parse_i32(src)?;
        let partition_leader_epoch = self.base.parse_i32(src)?;
        let magic = self.base.parse_i8(src)?;
        let crc = self.base.parse_u32(src)?;
        let attributes = self.base.parse_i16(src)?;
        let last_offset_delta = self.base.parse_i32(src)?;
        let base_timestamp = self.base.parse_i64(src)?;
        let max_timestamp = self.base.parse_i64(src)?;
        let producer_id = self.base.parse_i64(src)?;
        let producer_epoch = self.base.parse_i16(src)?;
        let base_sequence = self.base.parse_i32(src)?;

        let mut batch = RecordBatch {
            base_offset,
            batch_length,
            partition_leader_epoch,
            magic,
            crc,
            attributes,
            last_offset_delta,
            base_timestamp,
            max_timestamp,
            producer_id,
            producer_epoch,
            base_sequence,
            records: Vec::new(),
        };

        if batch.compression_codec() != 0 {
            return Err(TransportError::Protocol(format!(
                "compressed record batch at offset {} (codec {}) is not supported",
                base_offset,
                batch.compression_codec()
            )));
        }

        let count = self.base.parse_i32(src)?;
        if count < 0 {
            return Err(TransportError::Protocol(format!("negative record count {}", count)));
        }

        let mut records = Vec::with_capacity((count as usize).min(src.remaining()));
        for _ in 0..count {
            records.push(self.parse_record(src)?);
        }
        batch.records = records;

        Ok(batch)
    }

    pub fn parse_record(&self, src: &mut Bytes) -> Result<Record, TransportError> {
        let length = self.base.parse_varint(src)?;
        if length < 0 {
            return Err(TransportError::Protocol(format!("negative record length {}", length)));
        }
        self.base.ensure_remaining(src, length as usize)?;
        let mut body = src.split_to(length as usize);

        let attributes = self.base.parse_i8(&mut body)?;
        let timestamp_delta = self.base.parse_varlong(&mut body)?;
        let offset_delta = self.base.parse_varint(&mut body)?;
        let key = self.parse_varint_bytes(&mut body)?;
        let value = self.parse_varint_bytes(&mut body)?;

        let header_count = self.base.parse_varint(&mut body)?;
        let mut headers = Vec::with_capacity((header_count.max(0) as usize).min(body.remaining()));
        for _ in 0..header_count {
            let key = self
                .parse_varint_bytes(&mut body)?
                .ok_or_else(|| TransportError::Protocol("null record header key".to_string()))?;
            let key = String::from_utf8(key.to_vec())
                .map_err(|e| TransportError::Protocol(format!("invalid UTF-8 header key: {}", e)))?;
            let value = self.parse_varint_bytes(&mut body)?;
            headers.push(RecordHeader { key, value });
        }

        Ok(Record {
            attributes,
            timestamp_delta,
            offset_delta,
            key,
            value,
            headers,
        })
    }

    fn parse_varint_bytes(&self, src: &mut Bytes) -> Result<Option<Bytes>, TransportError> {
        let len = self.base.parse_varint(src)?;
        if len < 0 {
            return Ok(None);
        }
        let len = len as usize;
        self.base.ensure_remaining(src, len)?;
        Ok(Some(src.split_to(len)))
    }
}

/// Builds uncompressed magic-2 batches. Used by tests and fake brokers.
#[derive(Debug, Default)]
pub struct RecordBatchBuilder {
    base_offset: i64,
    base_timestamp: i64,
    attributes: i16,
    records: Vec<(Option<Vec<u8>>, Option<Vec<u8>>)>,
}

impl RecordBatchBuilder {
    pub fn new(base_offset: i64) -> Self {
        Self {
            base_offset,
            ..Default::default()
        }
    }

    pub fn timestamp(mut self, base_timestamp: i64) -> Self {
        self.base_timestamp = base_timestamp;
        self
    }

    pub fn attributes(mut self, attributes: i16) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn record(mut self, key: Option<&[u8]>, value: Option<&[u8]>) -> Self {
        self.records.push((key.map(<[u8]>::to_vec), value.map(<[u8]>::to_vec)));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        use super::varint::PutVarint;

        let mut records = Vec::new();
        for (delta, (key, value)) in self.records.iter().enumerate() {
            let mut body = Vec::new();
            body.push(0); // attributes
            body.put_varlong(delta as i64);
            body.put_varint(delta as i32);
            put_varint_bytes(&mut body, key.as_deref());
            put_varint_bytes(&mut body, value.as_deref());
            body.put_varint(0); // headers

            records.put_varint(body.len() as i32);
            records.extend_from_slice(&body);
        }

        let last_offset_delta = self.records.len().saturating_sub(1) as i32;
        let mut after_length = Vec::new();
        after_length.extend_from_slice(&0i32.to_be_bytes()); // leader epoch
        after_length.push(RECORD_BATCH_MAGIC as u8);
        after_length.extend_from_slice(&0u32.to_be_bytes()); // crc, not verified on read
        after_length.extend_from_slice(&self.attributes.to_be_bytes());
        after_length.extend_from_slice(&last_offset_delta.to_be_bytes());
        after_length.extend_from_slice(&self.base_timestamp.to_be_bytes());
        after_length.extend_from_slice(&(self.base_timestamp + last_offset_delta as i64).to_be_bytes());
        after_length.extend_from_slice(&(-1i64).to_be_bytes()); // producer id
        after_length.extend_from_slice(&(-1i16).to_be_bytes()); // producer epoch
        after_length.extend_from_slice(&(-1i32).to_be_bytes()); // base sequence
        after_length.extend_from_slice(&(self.records.len() as i32).to_be_bytes());
        after_length.extend_from_slice(&records);

        let mut batch = Vec::with_capacity(after_length.len() + LOG_OVERHEAD);
        batch.extend_from_slice(&self.base_offset.to_be_bytes());
        batch.extend_from_slice(&(after_length.len() as i32).to_be_bytes());
        batch.extend_from_slice(&after_length);
        batch
    }
}

fn put_varint_bytes(buf: &mut Vec<u8>, value: Option<&[u8]>) {
    use super::varint::PutVarint;

    match value {
        Some(value) => {
            buf.put_varint(value.len() as i32);
            buf.extend_from_slice(value);
        }
        None => buf.put_varint(-1),
    }
}
