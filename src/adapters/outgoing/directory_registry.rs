use crate::application::error::{ClientError, Result};
use crate::ports::outgoing::BrokerRegistry;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tracing::trace;

/// Broker registry backed by a directory holding one JSON node document per
/// broker, the way `/brokers/ids/<id>` is laid out in a coordination service.
pub struct DirectoryBrokerRegistry {
    root: PathBuf,
    address: String,
}

impl DirectoryBrokerRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let address = root.display().to_string();
        Self { root, address }
    }
}

#[async_trait]
impl BrokerRegistry for DirectoryBrokerRegistry {
    fn address(&self) -> &str {
        &self.address
    }

    async fn broker_descriptors(&self) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| ClientError::Discovery(format!("cannot list {}: {}", self.address, e)))?;

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ClientError::Discovery(format!("cannot list {}: {}", self.address, e)))?
        {
            let path = entry.path();
            let is_hidden = path
                .file_name()
                .and_then(|name| name.to_str())
                .map_or(true, |name| name.starts_with('.'));
            if path.is_file() && !is_hidden {
                paths.push(path);
            }
        }
        // broker ids as file names, read in a stable order
        paths.sort();

        let mut descriptors = Vec::with_capacity(paths.len());
        for path in paths {
            let descriptor = fs::read_to_string(&path)
                .await
                .map_err(|e| ClientError::Discovery(format!("cannot read {}: {}", path.display(), e)))?;
            trace!(path = %path.display(), "read broker node");
            descriptors.push(descriptor);
        }

        Ok(descriptors)
    }
}
