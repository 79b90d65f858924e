//! Round-robin partition assignment
//!
//! A file belongs to partition `index % partitions`, where `index` is its
//! position in the day's file list. Size and content are not considered.

use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionAssignment {
    partitions: usize,
}

impl PartitionAssignment {
    /// `partitions` is clamped to at least one.
    pub fn new(partitions: usize) -> Self {
        Self {
            partitions: partitions.max(1),
        }
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    #[inline]
    pub fn partition_of(&self, file_index: usize) -> usize {
        file_index % self.partitions
    }

    /// Files owned by `partition`, in list order.
    pub fn files_for<'a>(
        &self,
        files: &'a [PathBuf],
        partition: usize,
    ) -> impl Iterator<Item = &'a PathBuf> + 'a {
        let assignment = *self;
        files
            .iter()
            .enumerate()
            .filter(move |(index, _)| assignment.partition_of(*index) == partition)
            .map(|(_, file)| file)
    }

    /// Number of files `partition` receives out of `total`.
    pub fn share_of(&self, total: usize, partition: usize) -> usize {
        if partition >= self.partitions {
            return 0;
        }
        total / self.partitions + usize::from(partition < total % self.partitions)
    }
}
