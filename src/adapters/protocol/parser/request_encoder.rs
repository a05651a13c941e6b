use bytes::{BufMut, BytesMut};
use crate::adapters::protocol::dto::{KafkaRequest, RequestHeader, RequestPayload};

#[derive(Clone, Default)]
pub struct RequestEncoder;

impl RequestEncoder {
    pub fn new() -> Self {
        Self
    }

    /// 요청을 크기 접두사가 붙은 프레임으로 인코딩
    pub fn encode(&self, request: &KafkaRequest) -> Vec<u8> {
        let mut buf = BytesMut::new();

        self.encode_header(&mut buf, &request.header);

        match &request.payload {
            RequestPayload::Metadata(metadata) => {
                match &metadata.topics {
                    Some(topics) => {
                        buf.put_i32(topics.len() as i32);
                        for topic in topics {
                            put_string(&mut buf, topic);
                        }
                    }
                    None => buf.put_i32(-1),
                }
            }
            RequestPayload::Fetch(fetch) => {
                buf.put_i32(fetch.replica_id);
                buf.put_i32(fetch.max_wait_ms);
                buf.put_i32(fetch.min_bytes);
                buf.put_i32(fetch.max_bytes);
                buf.put_i8(fetch.isolation_level);

                buf.put_i32(fetch.topics.len() as i32);
                for topic in &fetch.topics {
                    put_string(&mut buf, &topic.topic);
                    buf.put_i32(topic.partitions.len() as i32);
                    for partition in &topic.partitions {
                        buf.put_i32(partition.partition);
                        buf.put_i64(partition.fetch_offset);
                        buf.put_i32(partition.partition_max_bytes);
                    }
                }
            }
            RequestPayload::ListOffsets(list_offsets) => {
                buf.put_i32(list_offsets.replica_id);

                buf.put_i32(list_offsets.topics.len() as i32);
                for topic in &list_offsets.topics {
                    put_string(&mut buf, &topic.name);
                    buf.put_i32(topic.partitions.len() as i32);
                    for partition in &topic.partitions {
                        buf.put_i32(partition.partition_index);
                        buf.put_i64(partition.timestamp);
                    }
                }
            }
            RequestPayload::OffsetFetch(offset_fetch) => {
                put_string(&mut buf, &offset_fetch.group_id);

                buf.put_i32(offset_fetch.topics.len() as i32);
                for topic in &offset_fetch.topics {
                    put_string(&mut buf, &topic.name);
                    buf.put_i32(topic.partition_indexes.len() as i32);
                    for partition in &topic.partition_indexes {
                        buf.put_i32(*partition);
                    }
                }
            }
            RequestPayload::OffsetCommit(offset_commit) => {
                put_string(&mut buf, &offset_commit.group_id);
                buf.put_i32(offset_commit.generation_id);
                put_string(&mut buf, &offset_commit.member_id);
                buf.put_i64(offset_commit.retention_time_ms);

                buf.put_i32(offset_commit.topics.len() as i32);
                for topic in &offset_commit.topics {
                    put_string(&mut buf, &topic.name);
                    buf.put_i32(topic.partitions.len() as i32);
                    for partition in &topic.partitions {
                        buf.put_i32(partition.partition_index);
                        buf.put_i64(partition.committed_offset);
                        put_nullable_string(&mut buf, partition.committed_metadata.as_deref());
                    }
                }
            }
        }

        let total_size = buf.len() as i32;
        let mut final_buf = BytesMut::with_capacity(buf.len() + 4);
        final_buf.put_i32(total_size);
        final_buf.put_slice(&buf);

        final_buf.to_vec()
    }

    fn encode_header(&self, buf: &mut BytesMut, header: &RequestHeader) {
        buf.put_i16(header.api_key);
        buf.put_i16(header.api_version);
        buf.put_i32(header.correlation_id);
        put_nullable_string(buf, header.client_id.as_deref());
    }
}

fn put_string(buf: &mut BytesMut, value: &str) {
    buf.put_i16(value.len() as i16);
    buf.put_slice(value.as_bytes());
}

fn put_nullable_string(buf: &mut BytesMut, value: Option<&str>) {
    match value {
        Some(value) => put_string(buf, value),
        None => buf.put_i16(-1),
    }
}
