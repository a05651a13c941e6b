use crate::adapters::protocol::constants::{
    CONSUMER_REPLICA_ID, DEFAULT_GENERATION_ID, DEFAULT_RETENTION_TIME, FETCH_MAX_BYTES,
    ISOLATION_LEVEL, NO_LEADER,
};
use crate::adapters::protocol::dto::{
    self, FetchPartition, FetchTopic, KafkaRequest, ListOffsetsPartition, ListOffsetsRequest,
    ListOffsetsTopic, MetadataRequest, MetadataResponse, OffsetCommitPartition,
    OffsetCommitRequest, OffsetCommitTopic, OffsetFetchRequest, OffsetFetchTopic, RecordBatch,
    RequestPayload, ResponsePayload,
};
use crate::adapters::protocol::KafkaProtocolCodec;
use crate::application::error::{ClientError, Result, TransportError};
use crate::config::Configuration;
use crate::domain::{
    BrokerAddress, FetchRequest, KafkaMessage, KafkaMessageBatch, KafkaMessageMetadata,
    Partition, PartitionDescriptor, PartitionResult, ReferenceTime, TopicDescriptor, NO_ERROR,
};
use crate::ports::outgoing::KafkaTransport;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Protocol calls against a single broker.
///
/// Broker-side errors for individual partitions end up in the returned
/// `PartitionResult`; only whole-call failures are raised.
pub struct Connection {
    broker: BrokerAddress,
    transport: Arc<dyn KafkaTransport>,
    codec: KafkaProtocolCodec,
    correlation_ids: AtomicI32,
    client_id: String,
    min_bytes: i32,
    max_wait: Duration,
}

impl Connection {
    pub fn new(broker: BrokerAddress, transport: Arc<dyn KafkaTransport>, configuration: &Configuration) -> Self {
        Self {
            broker,
            transport,
            codec: KafkaProtocolCodec::new(),
            correlation_ids: AtomicI32::new(0),
            client_id: configuration.client_id().to_string(),
            min_bytes: configuration.min_bytes(),
            max_wait: configuration.max_wait(),
        }
    }

    pub fn broker(&self) -> &BrokerAddress {
        &self.broker
    }

    /// Reads from every requested partition in one round trip.
    ///
    /// Batches may start before the requested offset; those earlier messages are
    /// dropped, as are transaction control batches.
    pub async fn fetch(&self, requests: &[FetchRequest]) -> Result<PartitionResult<KafkaMessageBatch>> {
        ensure_distinct(requests.iter().map(FetchRequest::partition))?;

        let mut topics: Vec<FetchTopic> = Vec::new();
        for request in requests {
            let partition = FetchPartition {
                partition: partition_index(request.partition())?,
                fetch_offset: request.offset(),
                partition_max_bytes: request.max_size_in_bytes(),
            };
            match topics.iter_mut().find(|t| t.topic == request.partition().topic()) {
                Some(topic) => topic.partitions.push(partition),
                None => topics.push(FetchTopic {
                    topic: request.partition().topic().to_string(),
                    partitions: vec![partition],
                }),
            }
        }

        let payload = RequestPayload::Fetch(dto::FetchRequest {
            replica_id: CONSUMER_REPLICA_ID,
            max_wait_ms: i32::try_from(self.max_wait.as_millis()).unwrap_or(i32::MAX),
            min_bytes: self.min_bytes,
            max_bytes: FETCH_MAX_BYTES,
            isolation_level: ISOLATION_LEVEL,
            topics,
        });

        let response = match self.send(payload).await? {
            ResponsePayload::Fetch(response) => response,
            other => return Err(self.unexpected_response("Fetch", &other)),
        };

        let mut partitions = HashMap::new();
        for topic in &response.responses {
            for partition in &topic.partitions {
                partitions.insert((topic.topic.as_str(), partition.partition_index), partition);
            }
        }

        let mut builder = PartitionResult::builder();
        for request in requests {
            let partition = request.partition();
            trace!(broker = %self.broker, %partition, offset = request.offset(), "reading");

            let data = partitions
                .get(&(partition.topic(), partition_index(partition)?))
                .ok_or_else(|| {
                    ClientError::inconsistent(&self.broker, format!("no fetch data for partition {}", partition))
                })?;

            if data.error_code != NO_ERROR {
                builder.add(partition.clone()).with_error(data.error_code);
                continue;
            }

            let batches = match &data.records {
                Some(records) => self
                    .codec
                    .parse_records(records)
                    .map_err(|e| ClientError::communication(&self.broker, e))?,
                None => Vec::new(),
            };
            let skipped_control = batches.iter().any(RecordBatch::is_control);
            let messages = to_messages(partition, request.offset(), batches)
                .map_err(|e| ClientError::communication(&self.broker, e))?;
            if messages.is_empty() && !skipped_control && request.offset() < data.high_watermark {
                return Err(ClientError::inconsistent(
                    &self.broker,
                    format!(
                        "no messages for partition {} at offset {} below high watermark {}",
                        partition,
                        request.offset(),
                        data.high_watermark
                    ),
                ));
            }
            builder
                .add(partition.clone())
                .with_result(KafkaMessageBatch::new(partition.clone(), messages, data.high_watermark));
        }

        Ok(builder.build())
    }

    /// Looks up the first offset at or after `reference_time` for each partition.
    pub async fn fetch_initial_offset(
        &self,
        reference_time: ReferenceTime,
        partitions: &[Partition],
    ) -> Result<PartitionResult<i64>> {
        if partitions.is_empty() {
            return Err(ClientError::InvalidArgument("at least one partition is required".to_string()));
        }
        ensure_distinct(partitions.iter())?;

        let mut topics: Vec<ListOffsetsTopic> = Vec::new();
        for partition in partitions {
            let entry = ListOffsetsPartition {
                partition_index: partition_index(partition)?,
                timestamp: reference_time.as_millis(),
            };
            match topics.iter_mut().find(|t| t.name == partition.topic()) {
                Some(topic) => topic.partitions.push(entry),
                None => topics.push(ListOffsetsTopic {
                    name: partition.topic().to_string(),
                    partitions: vec![entry],
                }),
            }
        }

        let payload = RequestPayload::ListOffsets(ListOffsetsRequest {
            replica_id: CONSUMER_REPLICA_ID,
            topics,
        });
        let response = match self.send(payload).await? {
            ResponsePayload::ListOffsets(response) => response,
            other => return Err(self.unexpected_response("ListOffsets", &other)),
        };

        let mut offsets = HashMap::new();
        for topic in &response.topics {
            for partition in &topic.partitions {
                offsets.insert((topic.name.as_str(), partition.partition_index), partition);
            }
        }

        let mut builder = PartitionResult::builder();
        for partition in partitions {
            let answer = offsets
                .get(&(partition.topic(), partition_index(partition)?))
                .ok_or_else(|| {
                    ClientError::inconsistent(&self.broker, format!("no offset answer for partition {}", partition))
                })?;

            if answer.error_code != NO_ERROR {
                builder.add(partition.clone()).with_error(answer.error_code);
            } else if answer.offset < 0 {
                return Err(ClientError::inconsistent(
                    &self.broker,
                    format!("no error but no offset either for partition {}", partition),
                ));
            } else {
                builder.add(partition.clone()).with_result(answer.offset);
            }
        }

        Ok(builder.build())
    }

    /// Committed offsets of `consumer_id`. A partition without a commit
    /// reports offset -1.
    pub async fn fetch_stored_offsets_for_consumer(
        &self,
        consumer_id: &str,
        partitions: &[Partition],
    ) -> Result<PartitionResult<i64>> {
        ensure_distinct(partitions.iter())?;

        let mut topics: Vec<OffsetFetchTopic> = Vec::new();
        for partition in partitions {
            let index = partition_index(partition)?;
            match topics.iter_mut().find(|t| t.name == partition.topic()) {
                Some(topic) => topic.partition_indexes.push(index),
                None => topics.push(OffsetFetchTopic {
                    name: partition.topic().to_string(),
                    partition_indexes: vec![index],
                }),
            }
        }

        let payload = RequestPayload::OffsetFetch(OffsetFetchRequest {
            group_id: consumer_id.to_string(),
            topics,
        });
        let response = match self.send(payload).await? {
            ResponsePayload::OffsetFetch(response) => response,
            other => return Err(self.unexpected_response("OffsetFetch", &other)),
        };

        let mut offsets = HashMap::new();
        for topic in &response.topics {
            for partition in &topic.partitions {
                offsets.insert((topic.name.as_str(), partition.partition_index), partition);
            }
        }

        let mut builder = PartitionResult::builder();
        for partition in partitions {
            let answer = offsets
                .get(&(partition.topic(), partition_index(partition)?))
                .ok_or_else(|| {
                    ClientError::inconsistent(
                        &self.broker,
                        format!("no stored offset answer for partition {}", partition),
                    )
                })?;

            if answer.error_code == NO_ERROR {
                builder.add(partition.clone()).with_result(answer.committed_offset);
            } else {
                builder.add(partition.clone()).with_error(answer.error_code);
            }
        }

        Ok(builder.build())
    }

    /// Stores offsets for `consumer_id`. The returned result only lists
    /// partitions whose commit failed.
    pub async fn commit_offsets_for_consumer(
        &self,
        consumer_id: &str,
        offsets: &HashMap<Partition, i64>,
    ) -> Result<PartitionResult<()>> {
        let mut ordered: Vec<(&Partition, i64)> = offsets.iter().map(|(p, o)| (p, *o)).collect();
        ordered.sort();

        let mut topics: Vec<OffsetCommitTopic> = Vec::new();
        for (partition, offset) in &ordered {
            if *offset < 0 {
                return Err(ClientError::InvalidArgument(format!(
                    "cannot commit negative offset {} for {}",
                    offset, partition
                )));
            }
            let entry = OffsetCommitPartition {
                partition_index: partition_index(partition)?,
                committed_offset: *offset,
                committed_metadata: None,
            };
            match topics.iter_mut().find(|t| t.name == partition.topic()) {
                Some(topic) => topic.partitions.push(entry),
                None => topics.push(OffsetCommitTopic {
                    name: partition.topic().to_string(),
                    partitions: vec![entry],
                }),
            }
        }

        let payload = RequestPayload::OffsetCommit(OffsetCommitRequest {
            group_id: consumer_id.to_string(),
            generation_id: DEFAULT_GENERATION_ID,
            member_id: String::new(),
            retention_time_ms: DEFAULT_RETENTION_TIME,
            topics,
        });
        let response = match self.send(payload).await? {
            ResponsePayload::OffsetCommit(response) => response,
            other => return Err(self.unexpected_response("OffsetCommit", &other)),
        };

        let mut codes = HashMap::new();
        for topic in &response.topics {
            for partition in &topic.partitions {
                codes.insert((topic.name.as_str(), partition.partition_index), partition.error_code);
            }
        }

        let mut builder = PartitionResult::builder();
        for (partition, _) in ordered {
            let code = codes
                .get(&(partition.topic(), partition_index(partition)?))
                .ok_or_else(|| {
                    ClientError::inconsistent(&self.broker, format!("no commit answer for partition {}", partition))
                })?;
            if *code != NO_ERROR {
                builder.add(partition.clone()).with_error(*code);
            }
        }

        Ok(builder.build())
    }

    /// Topology of `topics` as seen by this broker. An empty slice asks for all topics.
    pub async fn fetch_metadata(&self, topics: &[String]) -> Result<Vec<TopicDescriptor>> {
        let payload = RequestPayload::Metadata(MetadataRequest {
            topics: if topics.is_empty() { None } else { Some(topics.to_vec()) },
        });
        let response = match self.send(payload).await? {
            ResponsePayload::Metadata(response) => response,
            other => return Err(self.unexpected_response("Metadata", &other)),
        };

        self.to_topic_descriptors(response)
    }

    pub async fn close(&self) {
        debug!(broker = %self.broker, "closing connection");
        self.transport.close().await;
    }

    async fn send(&self, payload: RequestPayload) -> Result<ResponsePayload> {
        let correlation_id = self.correlation_ids.fetch_add(1, Ordering::Relaxed);
        let request = KafkaRequest::new(correlation_id, Some(self.client_id.clone()), payload);

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| ClientError::communication(&self.broker, e))?;

        if response.correlation_id != correlation_id {
            return Err(ClientError::communication(
                &self.broker,
                TransportError::CorrelationMismatch {
                    expected: correlation_id,
                    actual: response.correlation_id,
                },
            ));
        }

        Ok(response.payload)
    }

    fn unexpected_response(&self, expected: &str, actual: &ResponsePayload) -> ClientError {
        ClientError::communication(
            &self.broker,
            TransportError::Protocol(format!("expected {} response, got {}", expected, actual.name())),
        )
    }

    fn to_topic_descriptors(&self, response: MetadataResponse) -> Result<Vec<TopicDescriptor>> {
        let mut brokers = HashMap::new();
        for broker in &response.brokers {
            let address = u16::try_from(broker.port)
                .ok()
                .and_then(|port| BrokerAddress::new(broker.host.as_str(), port).ok());
            match address {
                Some(address) => {
                    brokers.insert(broker.node_id, address);
                }
                None => warn!(
                    broker = %self.broker,
                    node_id = broker.node_id,
                    host = %broker.host,
                    port = broker.port,
                    "ignoring unusable broker entry in metadata"
                ),
            }
        }

        response
            .topics
            .into_iter()
            .map(|topic| {
                if topic.error_code != NO_ERROR {
                    return Ok(TopicDescriptor::with_error(topic.name, topic.error_code));
                }

                let partitions = topic
                    .partitions
                    .into_iter()
                    .map(|partition| {
                        let partition_index = u32::try_from(partition.partition_index).map_err(|_| {
                            ClientError::inconsistent(
                                &self.broker,
                                format!("negative partition index {} in topic {}", partition.partition_index, topic.name),
                            )
                        })?;
                        let leader = if partition.leader_id == NO_LEADER {
                            None
                        } else {
                            brokers.get(&partition.leader_id).cloned()
                        };

                        Ok(PartitionDescriptor {
                            error_code: partition.error_code,
                            partition_index,
                            leader,
                            replicas: partition.replica_nodes,
                            in_sync_replicas: partition.isr_nodes,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;

                Ok(TopicDescriptor {
                    error_code: topic.error_code,
                    name: topic.name,
                    is_internal: topic.is_internal,
                    partitions,
                })
            })
            .collect()
    }
}

fn partition_index(partition: &Partition) -> Result<i32> {
    i32::try_from(partition.id())
        .map_err(|_| ClientError::InvalidArgument(format!("partition id out of range: {}", partition)))
}

fn ensure_distinct<'a>(partitions: impl Iterator<Item = &'a Partition>) -> Result<()> {
    let mut seen = HashSet::new();
    for partition in partitions {
        if !seen.insert(partition) {
            return Err(ClientError::InvalidArgument(format!(
                "partition {} requested more than once",
                partition
            )));
        }
    }
    Ok(())
}

fn to_messages(
    partition: &Partition,
    requested_offset: i64,
    batches: Vec<RecordBatch>,
) -> std::result::Result<Vec<KafkaMessage>, TransportError> {
    let overflow = |what: &str, base: i64| {
        TransportError::Protocol(format!("{} overflows in batch at offset {} of {}", what, base, partition))
    };

    let mut messages = Vec::new();
    for batch in batches {
        if batch.is_control() {
            continue;
        }
        for record in batch.records {
            let offset = batch
                .base_offset
                .checked_add(record.offset_delta as i64)
                .ok_or_else(|| overflow("record offset", batch.base_offset))?;
            if offset < requested_offset {
                continue;
            }
            let next_offset = offset
                .checked_add(1)
                .ok_or_else(|| overflow("next offset", batch.base_offset))?;
            let timestamp = batch
                .base_timestamp
                .checked_add(record.timestamp_delta)
                .ok_or_else(|| overflow("record timestamp", batch.base_offset))?;
            messages.push(KafkaMessage {
                metadata: KafkaMessageMetadata {
                    partition: partition.clone(),
                    offset,
                    next_offset,
                },
                key: record.key,
                payload: record.value,
                timestamp,
                headers: record.headers.into_iter().map(|h| (h.key, h.value)).collect(),
            });
        }
    }
    Ok(messages)
}
