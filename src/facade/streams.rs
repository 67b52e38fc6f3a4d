use log::debug;
use crate::core::{DbError, Result};
use crate::storage::stream::{DEFAULT_SHARD_ID, table_of_stream_id};
use crate::storage::{ShardIterator, StreamDescription, StreamInfo, TableKind};
use super::database::WideColumnDB;
use super::requests::GetStreamRecordResponse;

const DEFAULT_STREAM_RECORD_LIMIT: usize = 100;

fn stream_not_found() -> DbError {
    DbError::NotFound("Requested stream data does not exist.".into())
}

impl WideColumnDB {
    /// Streams of every table, or of one table when `table_name` is given.
    pub async fn list_stream(&self, table_name: Option<&str>) -> Result<Vec<StreamInfo>> {
        self.ensure_open()?;
        let names = match table_name {
            Some(name) => {
                self.catalog.read().await.get_table(name)?;
                vec![name.to_string()]
            }
            None => self.catalog.read().await.list_tables(TableKind::WideColumn),
        };

        let mut streams = Vec::new();
        for name in names {
            let Ok(handle) = self.storage.get_table(&name).await else {
                continue;
            };
            if let Some(stream) = handle.read().await.stream() {
                streams.push(stream.info(&name));
            }
        }
        Ok(streams)
    }

    pub async fn describe_stream(&self, stream_id: &str) -> Result<StreamDescription> {
        self.ensure_open()?;
        let table_name = table_of_stream_id(stream_id, self.config.max_table_name_bytes)?;
        let handle = self
            .storage
            .get_table(table_name)
            .await
            .map_err(|_| stream_not_found())?;
        let table = handle.read().await;
        match table.stream() {
            Some(stream) if stream.stream_id() == stream_id => Ok(stream.describe(table_name)),
            _ => Err(stream_not_found()),
        }
    }

    /// Iterator positioned at the oldest retained record of a shard.
    pub async fn get_shard_iterator(&self, stream_id: &str, shard_id: &str) -> Result<String> {
        let description = self.describe_stream(stream_id).await?;
        if !description.shards.iter().any(|s| s.shard_id == shard_id) {
            return Err(DbError::NotFound("Requested shard does not exist.".into()));
        }
        Ok(ShardIterator {
            stream_id: stream_id.to_string(),
            shard_id: shard_id.to_string(),
            sequence: 0,
        }
        .encode())
    }

    /// Records from an iterator position, plus the iterator to continue
    /// from. The shard stays open, so a continuation is always returned.
    pub async fn get_stream_record(
        &self,
        shard_iterator: &str,
        limit: Option<usize>,
    ) -> Result<GetStreamRecordResponse> {
        self.ensure_open()?;
        let limit = match limit {
            Some(0) => return Err(DbError::invalid("limit must be greater than 0.")),
            Some(limit) => limit,
            None => DEFAULT_STREAM_RECORD_LIMIT,
        };

        let iterator = ShardIterator::decode(shard_iterator)?;
        let table_name = table_of_stream_id(&iterator.stream_id, self.config.max_stream_table_name_bytes)?;
        if iterator.shard_id != DEFAULT_SHARD_ID {
            return Err(DbError::NotFound("Requested shard does not exist.".into()));
        }

        let handle = self
            .storage
            .get_table(table_name)
            .await
            .map_err(|_| stream_not_found())?;
        let table = handle.read().await;
        let stream = table
            .stream()
            .filter(|s| s.stream_id() == iterator.stream_id)
            .ok_or_else(stream_not_found)?;

        let (records, next) = stream.read(iterator.sequence, limit);
        debug!(
            "read {} stream record(s) from {} at {}",
            records.len(),
            iterator.stream_id,
            iterator.sequence
        );

        Ok(GetStreamRecordResponse {
            records,
            next_shard_iterator: Some(
                ShardIterator {
                    sequence: next,
                    ..iterator
                }
                .encode(),
            ),
        })
    }
}
