use crate::domain::error::DomainError;
use std::fmt;

#[derive(Debug, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct Partition {
    topic: String,
    id: u32,
}

impl Partition {
    pub fn new(topic: impl Into<String>, id: u32) -> Self {
        Self {
            topic: topic.into(),
            id,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Parses `topic:id`.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let (topic, id) = value
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| DomainError::InvalidArgument(format!("expected topic:id, got '{}'", value)))?;
        if topic.is_empty() {
            return Err(DomainError::InvalidArgument(format!(
                "missing topic in '{}'",
                value
            )));
        }
        let id = id.parse::<u32>().map_err(|_| {
            DomainError::InvalidArgument(format!("invalid partition id in '{}'", value))
        })?;
        Ok(Self::new(topic, id))
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.topic, self.id)
    }
}

/// A read of up to `max_size_in_bytes` from `partition`, starting at `offset`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FetchRequest {
    partition: Partition,
    offset: i64,
    max_size_in_bytes: i32,
}

impl FetchRequest {
    pub fn new(partition: Partition, offset: i64, max_size_in_bytes: i32) -> Result<Self, DomainError> {
        if offset < 0 {
            return Err(DomainError::InvalidArgument(format!(
                "offset must not be negative for {}, got {}",
                partition, offset
            )));
        }
        if max_size_in_bytes <= 0 {
            return Err(DomainError::InvalidArgument(format!(
                "max size must be positive for {}, got {}",
                partition, max_size_in_bytes
            )));
        }
        Ok(Self {
            partition,
            offset,
            max_size_in_bytes,
        })
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn max_size_in_bytes(&self) -> i32 {
        self.max_size_in_bytes
    }
}

/// Point in a partition's log used to look up a starting offset.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ReferenceTime {
    Earliest,
    Latest,
    /// Milliseconds since the epoch.
    Timestamp(i64),
}

impl ReferenceTime {
    pub const EARLIEST: i64 = -2;
    pub const LATEST: i64 = -1;

    pub fn as_millis(&self) -> i64 {
        match self {
            ReferenceTime::Earliest => Self::EARLIEST,
            ReferenceTime::Latest => Self::LATEST,
            ReferenceTime::Timestamp(ts) => *ts,
        }
    }
}
