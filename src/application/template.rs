use crate::application::connection_factory::ConnectionFactory;
use crate::application::error::{ClientError, Result};
use crate::domain::{FetchRequest, KafkaMessageBatch, Partition, PartitionResult};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::trace;

/// Fetches a batch of requests that all go to one leader.
///
/// Splitting work across brokers is up to the caller.
#[derive(Clone)]
pub struct KafkaTemplate {
    connection_factory: Arc<ConnectionFactory>,
}

impl KafkaTemplate {
    pub fn new(connection_factory: Arc<ConnectionFactory>) -> Self {
        Self { connection_factory }
    }

    pub fn connection_factory(&self) -> &Arc<ConnectionFactory> {
        &self.connection_factory
    }

    pub async fn receive(&self, requests: &[FetchRequest]) -> Result<PartitionResult<KafkaMessageBatch>> {
        if requests.is_empty() {
            return Err(ClientError::InvalidArgument("at least one fetch request is required".to_string()));
        }

        let partitions: Vec<Partition> = requests.iter().map(|r| r.partition().clone()).collect();
        let leaders = self.connection_factory.get_leaders(&partitions).await?;

        let distinct: HashSet<_> = leaders.values().collect();
        if distinct.len() != 1 {
            return Err(ClientError::InvalidArgument(format!(
                "requests span {} leaders; all partitions must share one",
                distinct.len()
            )));
        }

        let leader = &leaders[&partitions[0]];
        trace!(%leader, count = requests.len(), "receiving");
        let connection = self.connection_factory.connect(leader).await;
        connection.fetch(requests).await
    }
}
