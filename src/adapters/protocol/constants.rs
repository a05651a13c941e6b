/// API keys of the requests this client issues.
pub const FETCH_KEY: i16 = 1;
pub const LIST_OFFSETS_KEY: i16 = 2;
pub const METADATA_KEY: i16 = 3;
pub const OFFSET_COMMIT_KEY: i16 = 8;
pub const OFFSET_FETCH_KEY: i16 = 9;

/// Versions pinned per API. All of them use the non-flexible encoding
/// (int16 string lengths, int32 array lengths, no tagged fields).
pub const FETCH_VERSION: i16 = 4;
pub const LIST_OFFSETS_VERSION: i16 = 1;
pub const METADATA_VERSION: i16 = 1;
pub const OFFSET_COMMIT_VERSION: i16 = 2;
pub const OFFSET_FETCH_VERSION: i16 = 1;

/// Follower replica id; -1 marks an ordinary consumer.
pub const CONSUMER_REPLICA_ID: i32 = -1;

/// READ_UNCOMMITTED
pub const ISOLATION_LEVEL: i8 = 0;

/// Upper bound for the whole fetch response, on top of the per-partition limits.
pub const FETCH_MAX_BYTES: i32 = 50 * 1024 * 1024;

/// Refuse frames larger than this.
pub const MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

pub const NO_LEADER: i32 = -1;
pub const DEFAULT_GENERATION_ID: i32 = -1;
pub const DEFAULT_RETENTION_TIME: i64 = -1;

/// Record batch layout (magic 2).
pub const RECORD_BATCH_MAGIC: i8 = 2;
pub const RECORD_BATCH_OVERHEAD: usize = 61;
pub const LOG_OVERHEAD: usize = 12;
pub const COMPRESSION_CODEC_MASK: i16 = 0x07;
pub const CONTROL_FLAG_MASK: i16 = 0x20;
