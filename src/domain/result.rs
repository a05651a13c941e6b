use crate::domain::partition::Partition;
use std::collections::HashMap;

/// Per-partition outcome of a call spanning several partitions.
///
/// Every partition lives in exactly one of the two maps.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionResult<T> {
    results: HashMap<Partition, T>,
    errors: HashMap<Partition, i16>,
}

impl<T> PartitionResult<T> {
    pub fn builder() -> PartitionResultBuilder<T> {
        PartitionResultBuilder::new()
    }

    pub fn result(&self, partition: &Partition) -> Option<&T> {
        self.results.get(partition)
    }

    pub fn error(&self, partition: &Partition) -> Option<i16> {
        self.errors.get(partition).copied()
    }

    pub fn results(&self) -> &HashMap<Partition, T> {
        &self.results
    }

    pub fn errors(&self) -> &HashMap<Partition, i16> {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty() && self.errors.is_empty()
    }

    pub fn partitions(&self) -> impl Iterator<Item = &Partition> {
        self.results.keys().chain(self.errors.keys())
    }

    pub fn into_parts(self) -> (HashMap<Partition, T>, HashMap<Partition, i16>) {
        (self.results, self.errors)
    }
}

pub struct PartitionResultBuilder<T> {
    results: HashMap<Partition, T>,
    errors: HashMap<Partition, i16>,
}

impl<T> PartitionResultBuilder<T> {
    pub fn new() -> Self {
        Self {
            results: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    /// Starts the entry for `partition`.
    ///
    /// # Panics
    ///
    /// If `partition` already has a result or an error.
    pub fn add(&mut self, partition: Partition) -> PartitionEntry<'_, T> {
        assert!(
            !self.results.contains_key(&partition) && !self.errors.contains_key(&partition),
            "partition {} already present in result",
            partition
        );
        PartitionEntry {
            builder: self,
            partition,
        }
    }

    pub fn build(self) -> PartitionResult<T> {
        PartitionResult {
            results: self.results,
            errors: self.errors,
        }
    }
}

impl<T> Default for PartitionResultBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[must_use]
pub struct PartitionEntry<'a, T> {
    builder: &'a mut PartitionResultBuilder<T>,
    partition: Partition,
}

impl<'a, T> PartitionEntry<'a, T> {
    pub fn with_result(self, value: T) {
        self.builder.results.insert(self.partition, value);
    }

    pub fn with_error(self, error_code: i16) {
        self.builder.errors.insert(self.partition, error_code);
    }
}
