//! The durable checkpoint of one replication stream: a single row in
//! `_vt.blp_checkpoint` keyed by source shard uid, recording the last
//! fully applied group id.
//!
//! The row is provisioned once by the bootstrap step (see
//! [`create_blp_checkpoint`] / [`populate_blp_checkpoint`]); the player
//! only ever reads it at startup and UPDATEs it inside each replicated
//! transaction.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::dbclient::DbClient;
use crate::error::Error;

/// Replication progress of one source shard stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlpPosition {
    /// Stable identity of the stream.
    pub uid: u32,
    /// Last fully applied group id.
    pub group_id: i64,
}

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub fn query_blp_checkpoint(uid: u32) -> String {
    format!("SELECT group_id FROM _vt.blp_checkpoint WHERE source_shard_uid={uid}")
}

pub fn update_blp_checkpoint(uid: u32, group_id: i64, time_updated: i64) -> String {
    format!(
        "UPDATE _vt.blp_checkpoint SET group_id={group_id}, time_updated={time_updated} WHERE source_shard_uid={uid}"
    )
}

/// DDL used by the bootstrap step that provisions the checkpoint table.
pub fn create_blp_checkpoint() -> &'static str {
    "CREATE TABLE IF NOT EXISTS _vt.blp_checkpoint (
  source_shard_uid INT UNSIGNED NOT NULL,
  group_id BIGINT DEFAULT 0,
  time_updated BIGINT UNSIGNED NOT NULL,
  PRIMARY KEY (source_shard_uid)
) ENGINE=InnoDB"
}

/// Seeds the row for a new stream; run once before the player starts.
pub fn populate_blp_checkpoint(uid: u32, group_id: i64, time_updated: i64) -> String {
    format!(
        "INSERT INTO _vt.blp_checkpoint (source_shard_uid, group_id, time_updated) VALUES ({uid}, {group_id}, {time_updated})"
    )
}

/// Reads the starting position for `uid`. The row must exist.
pub async fn read_start_position<C: DbClient>(dbc: &mut C, uid: u32) -> Result<BlpPosition, Error> {
    let result = dbc
        .execute_fetch(&query_blp_checkpoint(uid), 1, true)
        .await?;
    if result.rows.len() != 1 {
        return Err(Error::CheckpointRead {
            uid,
            rows: result.rows.len(),
        });
    }
    let group_id = parse_group_id(&result.rows[0])?;
    Ok(BlpPosition { uid, group_id })
}

fn parse_group_id(row: &[Option<Vec<u8>>]) -> Result<i64, Error> {
    let cell = row
        .first()
        .and_then(|c| c.as_deref())
        .ok_or_else(|| Error::MalformedCheckpoint("group_id is NULL".to_string()))?;
    let text = std::str::from_utf8(cell)
        .map_err(|_| Error::MalformedCheckpoint("group_id is not utf-8".to_string()))?;
    text.parse()
        .map_err(|_| Error::MalformedCheckpoint(format!("group_id {text:?} is not an integer")))
}
