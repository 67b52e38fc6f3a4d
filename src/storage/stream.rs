//! Per-table change log exposed through the stream APIs.

use std::collections::VecDeque;
use serde::{Deserialize, Serialize};
use crate::core::{Cell, ColumnValue, DbError, PrimaryKey, Result};

/// The only shard of a table stream.
pub const DEFAULT_SHARD_ID: &str = "0";

const ITERATOR_SEPARATOR: char = '|';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamSpec {
    pub enable: bool,
    /// Falls back to the store default when unset.
    pub expiration_hours: Option<i64>,
}

impl StreamSpec {
    pub fn enabled(expiration_hours: i64) -> Self {
        Self {
            enable: true,
            expiration_hours: Some(expiration_hours),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enable: false,
            expiration_hours: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamRecordType {
    Put,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnOperation {
    Put,
    DeleteOneVersion,
    DeleteAllVersions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordColumn {
    pub name: String,
    pub value: Option<ColumnValue>,
    pub timestamp: Option<i64>,
    pub operation: ColumnOperation,
}

impl RecordColumn {
    pub fn put(cell: &Cell, timestamp: i64) -> Self {
        Self {
            name: cell.name.clone(),
            value: Some(cell.value.clone()),
            timestamp: Some(timestamp),
            operation: ColumnOperation::Put,
        }
    }

    pub fn delete_version(name: &str, timestamp: i64) -> Self {
        Self {
            name: name.to_string(),
            value: None,
            timestamp: Some(timestamp),
            operation: ColumnOperation::DeleteOneVersion,
        }
    }

    pub fn delete_all(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: None,
            timestamp: None,
            operation: ColumnOperation::DeleteAllVersions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRecord {
    pub sequence: u64,
    pub record_type: StreamRecordType,
    pub primary_key: PrimaryKey,
    pub columns: Vec<RecordColumn>,
    /// Commit time in milliseconds.
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamStatus {
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub stream_id: String,
    pub table_name: String,
    pub creation_time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamShard {
    pub shard_id: String,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescription {
    pub stream_id: String,
    pub table_name: String,
    pub creation_time: i64,
    pub expiration_hours: i64,
    pub status: StreamStatus,
    pub shards: Vec<StreamShard>,
}

/// Stream ids are `<table>_<creation ms in hex>`.
pub fn stream_id_for(table: &str, creation_time: i64) -> String {
    format!("{}_{:x}", table, creation_time)
}

/// Table name carried by a stream id, rejecting names longer than
/// `max_table_bytes`.
pub fn table_of_stream_id(stream_id: &str, max_table_bytes: usize) -> Result<&str> {
    let invalid = || DbError::invalid(format!("Invalid stream id: {}.", stream_id));
    let (table, created) = stream_id.rsplit_once('_').ok_or_else(invalid)?;
    if table.is_empty() || table.len() > max_table_bytes || i64::from_str_radix(created, 16).is_err() {
        return Err(invalid());
    }
    Ok(table)
}

/// Opaque position inside a stream shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardIterator {
    pub stream_id: String,
    pub shard_id: String,
    pub sequence: u64,
}

impl ShardIterator {
    pub fn encode(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.stream_id,
            self.shard_id,
            self.sequence,
            sep = ITERATOR_SEPARATOR
        )
    }

    pub fn decode(raw: &str) -> Result<Self> {
        let invalid = || DbError::invalid(format!("Invalid shard iterator: {}.", raw));
        let mut parts = raw.rsplitn(3, ITERATOR_SEPARATOR);
        let sequence = parts
            .next()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(invalid)?;
        let shard_id = parts.next().ok_or_else(invalid)?.to_string();
        let stream_id = parts.next().ok_or_else(invalid)?.to_string();
        Ok(Self {
            stream_id,
            shard_id,
            sequence,
        })
    }
}

/// Ordered change records of one table; records older than the retention
/// window are dropped when new ones arrive.
#[derive(Debug, Clone)]
pub struct StreamLog {
    stream_id: String,
    creation_time: i64,
    expiration_hours: i64,
    next_sequence: u64,
    records: VecDeque<StreamRecord>,
}

impl StreamLog {
    pub fn new(table: &str, expiration_hours: i64, now: i64) -> Self {
        Self {
            stream_id: stream_id_for(table, now),
            creation_time: now,
            expiration_hours,
            next_sequence: 0,
            records: VecDeque::new(),
        }
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn creation_time(&self) -> i64 {
        self.creation_time
    }

    pub fn expiration_hours(&self) -> i64 {
        self.expiration_hours
    }

    pub fn set_expiration_hours(&mut self, hours: i64) {
        self.expiration_hours = hours;
    }

    pub fn append(
        &mut self,
        record_type: StreamRecordType,
        primary_key: PrimaryKey,
        columns: Vec<RecordColumn>,
        now: i64,
    ) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.records.push_back(StreamRecord {
            sequence,
            record_type,
            primary_key,
            columns,
            timestamp: now,
        });
        self.expire(now);
        sequence
    }

    /// Records at or after `from`, at most `limit`, plus the sequence to
    /// continue from.
    pub fn read(&self, from: u64, limit: usize) -> (Vec<StreamRecord>, u64) {
        let records: Vec<StreamRecord> = self
            .records
            .iter()
            .filter(|r| r.sequence >= from)
            .take(limit)
            .cloned()
            .collect();
        let next = records.last().map(|r| r.sequence + 1).unwrap_or(from);
        (records, next)
    }

    pub fn info(&self, table: &str) -> StreamInfo {
        StreamInfo {
            stream_id: self.stream_id.clone(),
            table_name: table.to_string(),
            creation_time: self.creation_time,
        }
    }

    pub fn describe(&self, table: &str) -> StreamDescription {
        StreamDescription {
            stream_id: self.stream_id.clone(),
            table_name: table.to_string(),
            creation_time: self.creation_time,
            expiration_hours: self.expiration_hours,
            status: StreamStatus::Active,
            shards: vec![StreamShard {
                shard_id: DEFAULT_SHARD_ID.to_string(),
                parent_id: None,
            }],
        }
    }

    fn expire(&mut self, now: i64) {
        let horizon = now.saturating_sub(self.expiration_hours.saturating_mul(3_600_000));
        while self.records.front().is_some_and(|r| r.timestamp < horizon) {
            self.records.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iterator_round_trip_keeps_underscored_table() {
        let it = ShardIterator {
            stream_id: stream_id_for("my_table", 0x1234),
            shard_id: DEFAULT_SHARD_ID.to_string(),
            sequence: 7,
        };
        assert_eq!(ShardIterator::decode(&it.encode()).unwrap(), it);
        assert_eq!(table_of_stream_id(&it.stream_id, 238).unwrap(), "my_table");
    }

    #[test]
    fn test_long_table_name_is_invalid_stream_id() {
        let id = stream_id_for(&"t".repeat(239), 1);
        let err = table_of_stream_id(&id, 238).unwrap_err();
        assert!(err.message().starts_with("Invalid stream id"));
    }

    #[test]
    fn test_expired_records_are_trimmed() {
        let pk = PrimaryKey::builder().add("id", 1_i64).build();
        let mut log = StreamLog::new("t", 1, 0);
        log.append(StreamRecordType::Put, pk.clone(), vec![], 0);
        log.append(StreamRecordType::Delete, pk, vec![], 3_600_001);

        let (records, next) = log.read(0, 10);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sequence, 1);
        assert_eq!(next, 2);
    }
}
