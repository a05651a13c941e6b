use crate::adapters::outgoing::TcpConnector;
use crate::application::connection::Connection;
use crate::application::error::{ClientError, Result, TransportError};
use crate::config::Configuration;
use crate::domain::{BrokerAddress, MetadataCache, Partition, TopicDescriptor};
use crate::ports::outgoing::TransportConnector;
use arc_swap::ArcSwap;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

type ConnectionMap = HashMap<BrokerAddress, Arc<Connection>>;

/// Shared entry point to a cluster: one `Connection` per broker plus a
/// lazily refreshed view of partition leadership.
///
/// # Locking
///
/// A single `RwLock` guards the connection map. Its write half is also held
/// for every metadata refresh, so concurrent misses on the same topic cost one
/// round trip. Metadata reads go through an `ArcSwap` snapshot and take no lock.
pub struct ConnectionFactory {
    configuration: Configuration,
    connector: Arc<dyn TransportConnector>,
    connections: RwLock<ConnectionMap>,
    metadata: ArcSwap<MetadataCache>,
}

impl ConnectionFactory {
    pub fn new(configuration: Configuration) -> Self {
        Self::with_connector(configuration, Arc::new(TcpConnector::new()))
    }

    pub fn with_connector(configuration: Configuration, connector: Arc<dyn TransportConnector>) -> Self {
        Self {
            configuration,
            connector,
            connections: RwLock::new(HashMap::new()),
            metadata: ArcSwap::from_pointee(MetadataCache::empty()),
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Current leadership snapshot.
    pub fn metadata_cache(&self) -> Arc<MetadataCache> {
        self.metadata.load_full()
    }

    /// Returns the connection to `broker`, creating it on first use.
    pub async fn connect(&self, broker: &BrokerAddress) -> Arc<Connection> {
        {
            let connections = self.connections.read().await;
            if let Some(connection) = connections.get(broker) {
                return Arc::clone(connection);
            }
        }

        let mut connections = self.connections.write().await;
        self.connection_in(&mut connections, broker)
    }

    pub async fn get_leader(&self, partition: &Partition) -> Result<BrokerAddress> {
        if let Some(leader) = self.metadata.load().get_leader(partition) {
            return Ok(leader.clone());
        }

        debug!(%partition, "leader not cached");
        let mut connections = self.connections.write().await;
        if let Some(leader) = self.metadata.load().get_leader(partition) {
            return Ok(leader.clone());
        }
        self.refresh_locked(&mut connections, &[partition.topic().to_string()])
            .await?;

        self.metadata
            .load()
            .get_leader(partition)
            .cloned()
            .ok_or_else(|| ClientError::PartitionNotFound(partition.clone()))
    }

    /// Leaders for a whole batch. Topics missing from the cache are refreshed
    /// together in one request.
    pub async fn get_leaders(&self, partitions: &[Partition]) -> Result<HashMap<Partition, BrokerAddress>> {
        if missing_topics(&self.metadata.load(), partitions).is_empty() {
            return collect_leaders(&self.metadata.load(), partitions);
        }

        let mut connections = self.connections.write().await;
        let missing = missing_topics(&self.metadata.load(), partitions);
        if !missing.is_empty() {
            debug!(topics = ?missing, "leaders not cached");
            self.refresh_locked(&mut connections, &missing).await?;
        }

        collect_leaders(&self.metadata.load(), partitions)
    }

    /// Partitions of `topic`, sorted by id.
    pub async fn get_partitions(&self, topic: &str) -> Result<Vec<Partition>> {
        if let Some(partitions) = self.metadata.load().get_partitions(topic) {
            return Ok(partitions);
        }

        debug!(topic, "partitions not cached");
        let mut connections = self.connections.write().await;
        if let Some(partitions) = self.metadata.load().get_partitions(topic) {
            return Ok(partitions);
        }
        self.refresh_locked(&mut connections, &[topic.to_string()]).await?;

        self.metadata
            .load()
            .get_partitions(topic)
            .ok_or_else(|| ClientError::TopicNotFound(topic.to_string()))
    }

    /// Configured default partitions, or every partition of the default topic.
    pub async fn default_partitions(&self) -> Result<Vec<Partition>> {
        if let Some(partitions) = self.configuration.default_partitions() {
            return Ok(partitions.to_vec());
        }
        match self.configuration.default_topic() {
            Some(topic) => self.get_partitions(topic).await,
            None => Err(ClientError::Config(
                "neither default topic nor default partitions configured".to_string(),
            )),
        }
    }

    /// Asks the seed brokers for the current leaders of `topics` and merges
    /// the answer into the cache.
    pub async fn refresh_metadata(&self, topics: &[String]) -> Result<()> {
        let mut connections = self.connections.write().await;
        self.refresh_locked(&mut connections, topics).await
    }

    /// Closes and forgets the connection to `broker`. The next `connect`
    /// creates a new one.
    pub async fn disconnect(&self, broker: &BrokerAddress) {
        let removed = self.connections.write().await.remove(broker);
        if let Some(connection) = removed {
            connection.close().await;
        }
    }

    /// Closes every connection.
    pub async fn destroy(&self) {
        let drained: Vec<Arc<Connection>> = {
            let mut connections = self.connections.write().await;
            connections.drain().map(|(_, connection)| connection).collect()
        };
        debug!(count = drained.len(), "closing all connections");
        for connection in drained {
            connection.close().await;
        }
    }

    fn connection_in(&self, connections: &mut ConnectionMap, broker: &BrokerAddress) -> Arc<Connection> {
        let connection = connections.entry(broker.clone()).or_insert_with(|| {
            debug!(%broker, "creating connection");
            let transport = self
                .connector
                .open(broker, &self.configuration.connection_settings());
            Arc::new(Connection::new(broker.clone(), transport, &self.configuration))
        });
        Arc::clone(connection)
    }

    /// Must be called with the write lock held; `connections` is its guard.
    async fn refresh_locked(&self, connections: &mut ConnectionMap, topics: &[String]) -> Result<()> {
        let seeds = self.configuration.discovery().resolve().await?;
        let timeout = self.configuration.fetch_metadata_timeout();

        let mut last_error = None;
        for seed in &seeds {
            let connection = self.connection_in(connections, seed);
            match tokio::time::timeout(timeout, connection.fetch_metadata(topics)).await {
                Ok(Ok(descriptors)) => {
                    self.apply(seed, descriptors);
                    return Ok(());
                }
                Ok(Err(e)) => {
                    warn!(%seed, error = %e, "metadata request failed");
                    last_error = Some(e);
                }
                Err(_) => {
                    // An abandoned exchange leaves the socket mid-response.
                    warn!(%seed, ?timeout, "metadata request timed out");
                    if let Some(connection) = connections.remove(seed) {
                        connection.close().await;
                    }
                    last_error = Some(ClientError::communication(seed, TransportError::Timeout(timeout)));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ClientError::Discovery("no seed brokers available".to_string())))
    }

    fn apply(&self, seed: &BrokerAddress, descriptors: Vec<TopicDescriptor>) {
        let (errored, fresh): (Vec<_>, Vec<_>) = descriptors.into_iter().partition(TopicDescriptor::has_error);
        for topic in &errored {
            warn!(%seed, topic = %topic.name, error_code = topic.error_code, "topic metadata reported an error");
        }

        let merged = self.metadata.load().merge(&fresh);
        debug!(%seed, topics = fresh.len(), "metadata refreshed");
        self.metadata.store(Arc::new(merged));
    }
}

fn missing_topics(cache: &MetadataCache, partitions: &[Partition]) -> Vec<String> {
    partitions
        .iter()
        .filter(|partition| cache.get_leader(partition).is_none())
        .map(|partition| partition.topic())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn collect_leaders(cache: &MetadataCache, partitions: &[Partition]) -> Result<HashMap<Partition, BrokerAddress>> {
    partitions
        .iter()
        .map(|partition| {
            cache
                .get_leader(partition)
                .map(|leader| (partition.clone(), leader.clone()))
                .ok_or_else(|| ClientError::PartitionNotFound(partition.clone()))
        })
        .collect()
}
