use crate::domain::broker::BrokerAddress;
use crate::domain::partition::Partition;
use std::collections::HashMap;

pub const NO_ERROR: i16 = 0;

#[derive(Debug, Clone, PartialEq)]
pub struct PartitionDescriptor {
    pub error_code: i16,
    pub partition_index: u32,
    pub leader: Option<BrokerAddress>,
    pub replicas: Vec<i32>,
    pub in_sync_replicas: Vec<i32>,
}

impl PartitionDescriptor {
    pub fn led_by(partition_index: u32, leader: BrokerAddress) -> Self {
        Self {
            error_code: NO_ERROR,
            partition_index,
            leader: Some(leader),
            replicas: Vec::new(),
            in_sync_replicas: Vec::new(),
        }
    }
}

/// Topology of one topic as reported by a broker.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicDescriptor {
    pub error_code: i16,
    pub name: String,
    pub is_internal: bool,
    pub partitions: Vec<PartitionDescriptor>,
}

impl TopicDescriptor {
    pub fn new(name: impl Into<String>, partitions: Vec<PartitionDescriptor>) -> Self {
        Self {
            error_code: NO_ERROR,
            name: name.into(),
            is_internal: false,
            partitions,
        }
    }

    pub fn with_error(name: impl Into<String>, error_code: i16) -> Self {
        Self {
            error_code,
            name: name.into(),
            is_internal: false,
            partitions: Vec::new(),
        }
    }

    pub fn has_error(&self) -> bool {
        self.error_code != NO_ERROR
    }
}

/// Immutable snapshot of partition leadership, keyed by topic.
///
/// `merge` never mutates; it returns a new snapshot in which every topic named by
/// the descriptors is replaced as a whole. Partitions without a usable leader stay
/// listed with `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataCache {
    leaders: HashMap<String, HashMap<Partition, Option<BrokerAddress>>>,
}

impl MetadataCache {
    pub fn new(descriptors: &[TopicDescriptor]) -> Self {
        Self::default().merge(descriptors)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get_leader(&self, partition: &Partition) -> Option<&BrokerAddress> {
        self.leaders
            .get(partition.topic())
            .and_then(|partitions| partitions.get(partition))
            .and_then(Option::as_ref)
    }

    /// Partitions of `topic` sorted by id.
    pub fn get_partitions(&self, topic: &str) -> Option<Vec<Partition>> {
        self.leaders.get(topic).map(|partitions| {
            let mut partitions: Vec<Partition> = partitions.keys().cloned().collect();
            partitions.sort();
            partitions
        })
    }

    pub fn contains_topic(&self, topic: &str) -> bool {
        self.leaders.contains_key(topic)
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.leaders.keys().map(String::as_str)
    }

    pub fn merge(&self, descriptors: &[TopicDescriptor]) -> MetadataCache {
        let mut leaders = self.leaders.clone();
        for descriptor in descriptors {
            let partitions: HashMap<Partition, Option<BrokerAddress>> = descriptor
                .partitions
                .iter()
                .map(|p| {
                    let leader = if p.error_code == NO_ERROR { p.leader.clone() } else { None };
                    (Partition::new(descriptor.name.clone(), p.partition_index), leader)
                })
                .collect();

            if partitions.is_empty() {
                leaders.remove(&descriptor.name);
            } else {
                leaders.insert(descriptor.name.clone(), partitions);
            }
        }
        MetadataCache { leaders }
    }
}
