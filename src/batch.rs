//! Per-partition record buffer handed from a worker to the flush.

use crate::models::TickRecord;

/// Pending inserts for one partition of one day.
///
/// Filled by exactly one worker during parsing, then moved to the
/// coordinator which consumes it during the flush.
#[derive(Debug, Default)]
pub struct BatchBuffer {
    partition: usize,
    records: Vec<TickRecord>,
}

impl BatchBuffer {
    pub fn new(partition: usize) -> Self {
        Self {
            partition,
            records: Vec::new(),
        }
    }

    pub fn partition(&self) -> usize {
        self.partition
    }

    #[inline]
    pub fn push(&mut self, record: TickRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TickRecord> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a BatchBuffer {
    type Item = &'a TickRecord;
    type IntoIter = std::slice::Iter<'a, TickRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
