use crate::adapters::protocol::constants::{
    FETCH_KEY, FETCH_VERSION, LIST_OFFSETS_KEY, LIST_OFFSETS_VERSION, METADATA_KEY,
    METADATA_VERSION, OFFSET_COMMIT_KEY, OFFSET_COMMIT_VERSION, OFFSET_FETCH_KEY,
    OFFSET_FETCH_VERSION,
};

#[derive(Debug, Clone, PartialEq)]
pub struct RequestHeader {
    pub api_key: i16,
    pub api_version: i16,
    pub correlation_id: i32,
    pub client_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRequest {
    /// `None` asks for every topic.
    pub topics: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub replica_id: i32,
    pub max_wait_ms: i32,
    pub min_bytes: i32,
    pub max_bytes: i32,
    pub isolation_level: i8,
    pub topics: Vec<FetchTopic>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchTopic {
    pub topic: String,
    pub partitions: Vec<FetchPartition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchPartition {
    pub partition: i32,
    pub fetch_offset: i64,
    pub partition_max_bytes: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListOffsetsRequest {
    pub replica_id: i32,
    pub topics: Vec<ListOffsetsTopic>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListOffsetsTopic {
    pub name: String,
    pub partitions: Vec<ListOffsetsPartition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListOffsetsPartition {
    pub partition_index: i32,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OffsetFetchRequest {
    pub group_id: String,
    pub topics: Vec<OffsetFetchTopic>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OffsetFetchTopic {
    pub name: String,
    pub partition_indexes: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OffsetCommitRequest {
    pub group_id: String,
    pub generation_id: i32,
    pub member_id: String,
    pub retention_time_ms: i64,
    pub topics: Vec<OffsetCommitTopic>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OffsetCommitTopic {
    pub name: String,
    pub partitions: Vec<OffsetCommitPartition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OffsetCommitPartition {
    pub partition_index: i32,
    pub committed_offset: i64,
    pub committed_metadata: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestPayload {
    Metadata(MetadataRequest),
    Fetch(FetchRequest),
    ListOffsets(ListOffsetsRequest),
    OffsetFetch(OffsetFetchRequest),
    OffsetCommit(OffsetCommitRequest),
}

impl RequestPayload {
    pub fn api_key(&self) -> i16 {
        match self {
            RequestPayload::Metadata(_) => METADATA_KEY,
            RequestPayload::Fetch(_) => FETCH_KEY,
            RequestPayload::ListOffsets(_) => LIST_OFFSETS_KEY,
            RequestPayload::OffsetFetch(_) => OFFSET_FETCH_KEY,
            RequestPayload::OffsetCommit(_) => OFFSET_COMMIT_KEY,
        }
    }

    pub fn api_version(&self) -> i16 {
        match self {
            RequestPayload::Metadata(_) => METADATA_VERSION,
            RequestPayload::Fetch(_) => FETCH_VERSION,
            RequestPayload::ListOffsets(_) => LIST_OFFSETS_VERSION,
            RequestPayload::OffsetFetch(_) => OFFSET_FETCH_VERSION,
            RequestPayload::OffsetCommit(_) => OFFSET_COMMIT_VERSION,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KafkaRequest {
    pub header: RequestHeader,
    pub payload: RequestPayload,
}

impl KafkaRequest {
    pub fn new(correlation_id: i32, client_id: Option<String>, payload: RequestPayload) -> Self {
        Self {
            header: RequestHeader {
                api_key: payload.api_key(),
                api_version: payload.api_version(),
                correlation_id,
                client_id,
            },
            payload,
        }
    }
}
