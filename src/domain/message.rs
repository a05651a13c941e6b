use crate::domain::partition::Partition;
use bytes::Bytes;

#[derive(Debug, Clone, PartialEq)]
pub struct KafkaMessageMetadata {
    pub partition: Partition,
    pub offset: i64,
    pub next_offset: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KafkaMessage {
    pub metadata: KafkaMessageMetadata,
    pub key: Option<Bytes>,
    pub payload: Option<Bytes>,
    pub timestamp: i64,
    pub headers: Vec<(String, Option<Bytes>)>,
}

impl KafkaMessage {
    pub fn offset(&self) -> i64 {
        self.metadata.offset
    }

    pub fn next_offset(&self) -> i64 {
        self.metadata.next_offset
    }
}

/// Messages read from one partition, plus its high-watermark at fetch time.
#[derive(Debug, Clone, PartialEq)]
pub struct KafkaMessageBatch {
    partition: Partition,
    messages: Vec<KafkaMessage>,
    high_watermark: i64,
}

impl KafkaMessageBatch {
    pub fn new(partition: Partition, messages: Vec<KafkaMessage>, high_watermark: i64) -> Self {
        Self {
            partition,
            messages,
            high_watermark,
        }
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn messages(&self) -> &[KafkaMessage] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<KafkaMessage> {
        self.messages
    }

    pub fn high_watermark(&self) -> i64 {
        self.high_watermark
    }

    /// Offset to resume from, if the batch has messages.
    pub fn next_offset(&self) -> Option<i64> {
        self.messages.last().map(KafkaMessage::next_offset)
    }
}
