use crate::adapters::protocol::constants::NO_LEADER;
use crate::adapters::protocol::dto::{
    FetchResponse, FetchablePartitionResponse, FetchableTopicResponse, KafkaRequest, KafkaResponse,
    ListOffsetsPartitionResponse, ListOffsetsResponse, ListOffsetsTopicResponse, MetadataBroker,
    MetadataPartition, MetadataResponse, MetadataTopic, OffsetCommitPartitionResponse,
    OffsetCommitResponse, OffsetCommitTopicResponse, OffsetFetchPartitionResponse,
    OffsetFetchResponse, OffsetFetchTopicResponse, RequestPayload, ResponsePayload,
};
use crate::adapters::protocol::parser::RecordBatchBuilder;
use crate::application::error::TransportError;
use crate::config::Configuration;
use crate::domain::{BrokerAddress, Partition, ReferenceTime};
use crate::ports::outgoing::{ConnectionSettings, KafkaTransport, TransportConnector};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const UNKNOWN_TOPIC_OR_PARTITION: i16 = 3;
const NOT_LEADER_FOR_PARTITION: i16 = 6;
const OFFSET_OUT_OF_RANGE: i16 = 1;

struct MockPartition {
    leader: Option<usize>,
    log: Vec<(Option<Vec<u8>>, Vec<u8>)>,
    withhold_records: bool,
}

#[derive(Default)]
struct ClusterState {
    topics: HashMap<String, Vec<MockPartition>>,
    committed: HashMap<(String, Partition), i64>,
    down: HashSet<usize>,
}

/// In-memory cluster answering protocol requests at the DTO level.
/// Broker `i` has node id `i`.
pub struct MockCluster {
    brokers: Vec<BrokerAddress>,
    state: Mutex<ClusterState>,
    metadata_requests: AtomicUsize,
    opened: AtomicUsize,
    metadata_delay: Duration,
    last_client_id: Mutex<Option<String>>,
}

impl MockCluster {
    pub fn new(brokers: &[&str]) -> Arc<Self> {
        Self::with_metadata_delay(brokers, Duration::ZERO)
    }

    /// Metadata answers are delayed so that racing callers overlap.
    pub fn with_metadata_delay(brokers: &[&str], metadata_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            brokers: brokers
                .iter()
                .map(|b| BrokerAddress::from_address(b).unwrap())
                .collect(),
            state: Mutex::new(ClusterState::default()),
            metadata_requests: AtomicUsize::new(0),
            opened: AtomicUsize::new(0),
            metadata_delay,
            last_client_id: Mutex::new(None),
        })
    }

    pub fn broker(&self, index: usize) -> BrokerAddress {
        self.brokers[index].clone()
    }

    /// `leaders[i]` is the broker index leading partition `i`.
    pub fn add_topic(&self, name: &str, leaders: &[usize]) {
        let partitions = leaders
            .iter()
            .map(|leader| MockPartition {
                leader: Some(*leader),
                log: Vec::new(),
                withhold_records: false,
            })
            .collect();
        self.state.lock().unwrap().topics.insert(name.to_string(), partitions);
    }

    pub fn remove_topic(&self, name: &str) {
        self.state.lock().unwrap().topics.remove(name);
    }

    pub fn move_leader(&self, topic: &str, partition: usize, leader: usize) {
        self.state.lock().unwrap().topics.get_mut(topic).unwrap()[partition].leader = Some(leader);
    }

    pub fn set_leaderless(&self, topic: &str, partition: usize) {
        self.state.lock().unwrap().topics.get_mut(topic).unwrap()[partition].leader = None;
    }

    pub fn append(&self, topic: &str, partition: usize, key: Option<&[u8]>, value: &[u8]) {
        self.state.lock().unwrap().topics.get_mut(topic).unwrap()[partition]
            .log
            .push((key.map(<[u8]>::to_vec), value.to_vec()));
    }

    /// Fetches of this partition succeed but carry an empty record set.
    pub fn withhold_records(&self, topic: &str, partition: usize) {
        self.state.lock().unwrap().topics.get_mut(topic).unwrap()[partition].withhold_records = true;
    }

    pub fn take_down(&self, broker: usize) {
        self.state.lock().unwrap().down.insert(broker);
    }

    pub fn bring_up(&self, broker: usize) {
        self.state.lock().unwrap().down.remove(&broker);
    }

    pub fn committed(&self, group: &str, partition: &Partition) -> Option<i64> {
        self.state
            .lock()
            .unwrap()
            .committed
            .get(&(group.to_string(), partition.clone()))
            .copied()
    }

    pub fn metadata_requests(&self) -> usize {
        self.metadata_requests.load(Ordering::SeqCst)
    }

    pub fn last_client_id(&self) -> Option<String> {
        self.last_client_id.lock().unwrap().clone()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn connector(self: &Arc<Self>) -> Arc<MockConnector> {
        Arc::new(MockConnector {
            cluster: Arc::clone(self),
        })
    }

    /// Static configuration seeded with every broker of the cluster.
    pub fn configuration(&self) -> Configuration {
        Configuration::builder()
            .static_brokers(self.brokers.clone())
            .client_id("mock-client")
            .fetch_metadata_timeout(Duration::from_secs(2))
            .build()
            .unwrap()
    }

    fn handle(&self, node: usize, request: KafkaRequest) -> Result<KafkaResponse, TransportError> {
        *self.last_client_id.lock().unwrap() = request.header.client_id.clone();
        let payload = match request.payload {
            RequestPayload::Metadata(metadata) => {
                self.metadata_requests.fetch_add(1, Ordering::SeqCst);
                ResponsePayload::Metadata(self.metadata(metadata.topics))
            }
            RequestPayload::Fetch(fetch) => {
                let state = self.state.lock().unwrap();
                let responses = fetch
                    .topics
                    .into_iter()
                    .map(|topic| FetchableTopicResponse {
                        partitions: topic
                            .partitions
                            .iter()
                            .map(|p| fetch_partition(&state, node, &topic.topic, p.partition, p.fetch_offset))
                            .collect(),
                        topic: topic.topic,
                    })
                    .collect();
                ResponsePayload::Fetch(FetchResponse {
                    throttle_time_ms: 0,
                    responses,
                })
            }
            RequestPayload::ListOffsets(list) => {
                let state = self.state.lock().unwrap();
                let topics = list
                    .topics
                    .into_iter()
                    .map(|topic| ListOffsetsTopicResponse {
                        partitions: topic
                            .partitions
                            .iter()
                            .map(|p| {
                                let (error_code, offset) =
                                    match led_partition(&state, node, &topic.name, p.partition_index) {
                                        Ok(partition) => {
                                            let len = partition.log.len() as i64;
                                            let offset = match p.timestamp {
                                                ReferenceTime::EARLIEST => 0,
                                                ReferenceTime::LATEST => len,
                                                // message i carries timestamp i
                                                timestamp => timestamp.clamp(0, len),
                                            };
                                            (0, offset)
                                        }
                                        Err(code) => (code, -1),
                                    };
                                ListOffsetsPartitionResponse {
                                    partition_index: p.partition_index,
                                    error_code,
                                    timestamp: -1,
                                    offset,
                                }
                            })
                            .collect(),
                        name: topic.name,
                    })
                    .collect();
                ResponsePayload::ListOffsets(ListOffsetsResponse { topics })
            }
            RequestPayload::OffsetFetch(offset_fetch) => {
                let state = self.state.lock().unwrap();
                let topics = offset_fetch
                    .topics
                    .into_iter()
                    .map(|topic| OffsetFetchTopicResponse {
                        partitions: topic
                            .partition_indexes
                            .iter()
                            .map(|index| {
                                let key = (
                                    offset_fetch.group_id.clone(),
                                    Partition::new(topic.name.clone(), *index as u32),
                                );
                                let known = state
                                    .topics
                                    .get(&topic.name)
                                    .map_or(false, |partitions| (*index as usize) < partitions.len());
                                OffsetFetchPartitionResponse {
                                    partition_index: *index,
                                    committed_offset: state.committed.get(&key).copied().unwrap_or(-1),
                                    metadata: Some(String::new()),
                                    error_code: if known { 0 } else { UNKNOWN_TOPIC_OR_PARTITION },
                                }
                            })
                            .collect(),
                        name: topic.name,
                    })
                    .collect();
                ResponsePayload::OffsetFetch(OffsetFetchResponse { topics })
            }
            RequestPayload::OffsetCommit(commit) => {
                let mut state = self.state.lock().unwrap();
                let mut topics = Vec::new();
                for topic in commit.topics {
                    let mut partitions = Vec::new();
                    for p in &topic.partitions {
                        let known = state
                            .topics
                            .get(&topic.name)
                            .map_or(false, |partitions| (p.partition_index as usize) < partitions.len());
                        if known {
                            state.committed.insert(
                                (
                                    commit.group_id.clone(),
                                    Partition::new(topic.name.clone(), p.partition_index as u32),
                                ),
                                p.committed_offset,
                            );
                        }
                        partitions.push(OffsetCommitPartitionResponse {
                            partition_index: p.partition_index,
                            error_code: if known { 0 } else { UNKNOWN_TOPIC_OR_PARTITION },
                        });
                    }
                    topics.push(OffsetCommitTopicResponse {
                        name: topic.name,
                        partitions,
                    });
                }
                ResponsePayload::OffsetCommit(OffsetCommitResponse { topics })
            }
        };

        Ok(KafkaResponse::new(request.header.correlation_id, payload))
    }

    fn metadata(&self, topics: Option<Vec<String>>) -> MetadataResponse {
        let state = self.state.lock().unwrap();
        let names = topics.unwrap_or_else(|| state.topics.keys().cloned().collect());

        let topics = names
            .into_iter()
            .map(|name| match state.topics.get(&name) {
                Some(partitions) => MetadataTopic {
                    error_code: 0,
                    name,
                    is_internal: false,
                    partitions: partitions
                        .iter()
                        .enumerate()
                        .map(|(index, partition)| {
                            let leader_id = partition.leader.map_or(NO_LEADER, |l| l as i32);
                            MetadataPartition {
                                error_code: if partition.leader.is_some() { 0 } else { 5 },
                                partition_index: index as i32,
                                leader_id,
                                replica_nodes: vec![leader_id],
                                isr_nodes: vec![leader_id],
                            }
                        })
                        .collect(),
                },
                None => MetadataTopic {
                    error_code: UNKNOWN_TOPIC_OR_PARTITION,
                    name,
                    is_internal: false,
                    partitions: Vec::new(),
                },
            })
            .collect();

        MetadataResponse {
            brokers: self
                .brokers
                .iter()
                .enumerate()
                .map(|(node_id, broker)| MetadataBroker {
                    node_id: node_id as i32,
                    host: broker.host().to_string(),
                    port: broker.port() as i32,
                    rack: None,
                })
                .collect(),
            controller_id: 0,
            topics,
        }
    }
}

fn led_partition<'a>(
    state: &'a ClusterState,
    node: usize,
    topic: &str,
    index: i32,
) -> Result<&'a MockPartition, i16> {
    let partition = state
        .topics
        .get(topic)
        .and_then(|partitions| partitions.get(index as usize))
        .ok_or(UNKNOWN_TOPIC_OR_PARTITION)?;
    if partition.leader != Some(node) {
        return Err(NOT_LEADER_FOR_PARTITION);
    }
    Ok(partition)
}

/// Like a real broker, answers with the whole batch containing `offset`.
fn fetch_partition(state: &ClusterState, node: usize, topic: &str, index: i32, offset: i64) -> FetchablePartitionResponse {
    let empty = |error_code| FetchablePartitionResponse {
        partition_index: index,
        error_code,
        high_watermark: -1,
        last_stable_offset: -1,
        aborted_transactions: None,
        records: None,
    };

    let partition = match led_partition(state, node, topic, index) {
        Ok(partition) => partition,
        Err(code) => return empty(code),
    };
    let high_watermark = partition.log.len() as i64;
    if offset > high_watermark {
        return empty(OFFSET_OUT_OF_RANGE);
    }

    let records = if offset == high_watermark || partition.withhold_records {
        Bytes::new()
    } else {
        let builder = partition
            .log
            .iter()
            .fold(RecordBatchBuilder::new(0), |builder, (key, value)| {
                builder.record(key.as_deref(), Some(value.as_slice()))
            });
        Bytes::from(builder.build())
    };

    FetchablePartitionResponse {
        partition_index: index,
        error_code: 0,
        high_watermark,
        last_stable_offset: high_watermark,
        aborted_transactions: None,
        records: Some(records),
    }
}

pub struct MockConnector {
    cluster: Arc<MockCluster>,
}

impl TransportConnector for MockConnector {
    fn open(&self, broker: &BrokerAddress, _settings: &ConnectionSettings) -> Arc<dyn KafkaTransport> {
        self.cluster.opened.fetch_add(1, Ordering::SeqCst);
        Arc::new(MockTransport {
            cluster: Arc::clone(&self.cluster),
            node: self.cluster.brokers.iter().position(|b| b == broker),
            closed: AtomicBool::new(false),
        })
    }
}

pub struct MockTransport {
    cluster: Arc<MockCluster>,
    node: Option<usize>,
    closed: AtomicBool,
}

#[async_trait]
impl KafkaTransport for MockTransport {
    async fn send(&self, request: KafkaRequest) -> Result<KafkaResponse, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let node = match self.node {
            Some(node) if !self.cluster.state.lock().unwrap().down.contains(&node) => node,
            _ => {
                return Err(TransportError::Io(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "broker unreachable",
                )))
            }
        };

        if matches!(request.payload, RequestPayload::Metadata(_)) && !self.cluster.metadata_delay.is_zero() {
            tokio::time::sleep(self.cluster.metadata_delay).await;
        }

        self.cluster.handle(node, request)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
