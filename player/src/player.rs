//! The player proper: subscribes to a source shard's update stream and
//! replays each transaction into the local database, advancing the
//! checkpoint row inside every replicated transaction.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tonic::Status;
use tracing::{debug, info};

use shardstream_binlogdata::binlogdata::update_stream_client::UpdateStreamClient;
use shardstream_binlogdata::binlogdata::{
    BinlogTransaction, KeyRange, StreamKeyRangeRequest, StreamTablesRequest,
};

use crate::checkpoint::{self, BlpPosition};
use crate::dbclient::{DbClient, QueryResult};
use crate::error::Error;
use crate::stats::PlayerStats;

/// How the source shard filters the stream for this player.
#[derive(Debug, Clone)]
pub enum Selector {
    /// Rows whose sharding key falls in the half-open interval.
    KeyRange(KeyRange),
    /// Statements touching the named tables.
    Tables(Vec<String>),
}

/// Tunables. Defaults carry the production constants.
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Delay between attempts of a deadlocked transaction.
    pub retry_delay: Duration,
    /// Statements slower than this are logged.
    pub slow_query_threshold: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(1),
            slow_query_threshold: Duration::from_millis(100),
        }
    }
}

const SLOW_QUERY_LOG_LIMIT: usize = 256;

/// Replays one source shard's update stream into the local database.
///
/// The database client must already be connected; the player never
/// opens or closes it. Exactly one player may run per checkpoint uid.
pub struct BinlogPlayer<C> {
    addr: String,
    dbc: C,
    selector: Selector,
    position: BlpPosition,
    stop_at_group_id: i64,
    stats: Arc<PlayerStats>,
    config: PlayerConfig,
}

impl<C: DbClient> BinlogPlayer<C> {
    /// Player over a key-range-filtered stream.
    pub fn new_key_range(
        addr: impl Into<String>,
        dbc: C,
        key_range: KeyRange,
        position: BlpPosition,
        stop_at_group_id: i64,
        stats: Arc<PlayerStats>,
    ) -> Self {
        Self::new(
            addr,
            dbc,
            Selector::KeyRange(key_range),
            position,
            stop_at_group_id,
            stats,
        )
    }

    /// Player over a table-list-filtered stream.
    pub fn new_tables(
        addr: impl Into<String>,
        dbc: C,
        tables: Vec<String>,
        position: BlpPosition,
        stop_at_group_id: i64,
        stats: Arc<PlayerStats>,
    ) -> Self {
        Self::new(
            addr,
            dbc,
            Selector::Tables(tables),
            position,
            stop_at_group_id,
            stats,
        )
    }

    fn new(
        addr: impl Into<String>,
        dbc: C,
        selector: Selector,
        position: BlpPosition,
        stop_at_group_id: i64,
        stats: Arc<PlayerStats>,
    ) -> Self {
        Self {
            addr: addr.into(),
            dbc,
            selector,
            position,
            stop_at_group_id,
            stats,
            config: PlayerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }

    /// Last applied position.
    pub fn position(&self) -> BlpPosition {
        self.position
    }

    pub fn stats(&self) -> Arc<PlayerStats> {
        Arc::clone(&self.stats)
    }

    /// Runs until the stream ends, the stop position is reached, the
    /// token is cancelled, or a fatal error occurs.
    ///
    /// Returns `Ok(())` on cancellation or on reaching the stop
    /// position, [`Error::StreamEnded`] when the server closes the
    /// stream cleanly, and the underlying error otherwise.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), Error> {
        if self.stop_at_group_id > 0 {
            if self.position.group_id > self.stop_at_group_id {
                return Err(Error::InvalidConfig(format!(
                    "starting point {} greater than stopping point {}",
                    self.position.group_id, self.stop_at_group_id
                )));
            }
            if self.position.group_id == self.stop_at_group_id {
                info!(
                    group_id = self.position.group_id,
                    "already at stop position, not starting"
                );
                return Ok(());
            }
            info!(
                stop_at = self.stop_at_group_id,
                "will stop in sync at group id"
            );
        }

        debug!(addr = %self.addr, "dialing update stream");
        let mut client = UpdateStreamClient::connect(self.addr.clone()).await?;
        let stream = match &self.selector {
            Selector::Tables(tables) => {
                client
                    .stream_tables(StreamTablesRequest {
                        group_id: self.position.group_id,
                        tables: tables.clone(),
                    })
                    .await?
                    .into_inner()
            }
            Selector::KeyRange(key_range) => {
                client
                    .stream_key_range(StreamKeyRangeRequest {
                        group_id: self.position.group_id,
                        key_range: Some(key_range.clone()),
                    })
                    .await?
                    .into_inner()
            }
        };
        // The client is dropped on every path out of the dispatch loop,
        // which closes the channel.
        self.dispatch(stream, cancel).await
    }

    async fn dispatch<S>(&mut self, mut stream: S, cancel: CancellationToken) -> Result<(), Error>
    where
        S: Stream<Item = Result<BinlogTransaction, Status>> + Unpin,
    {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(group_id = self.position.group_id, "binlog player canceled");
                    return Ok(());
                }
                item = stream.next() => match item {
                    Some(Ok(tx)) => {
                        if self.apply(tx).await? {
                            return Ok(());
                        }
                    }
                    Some(Err(status)) => return Err(Error::Grpc(status)),
                    None => {
                        debug!("update stream closed by server");
                        return Err(Error::StreamEnded);
                    }
                },
            }
        }
    }

    /// Applies one transaction, retrying deadlocks until it lands.
    /// Returns true once the stop position has been reached.
    async fn apply(&mut self, tx: BinlogTransaction) -> Result<bool, Error> {
        loop {
            if self.process_transaction(&tx).await? {
                if self.stop_at_group_id > 0 && self.position.group_id >= self.stop_at_group_id {
                    info!(
                        group_id = self.position.group_id,
                        "reached stop position, done playing logs"
                    );
                    return Ok(true);
                }
                return Ok(false);
            }
            info!(group_id = tx.group_id, "retrying txn");
            tokio::time::sleep(self.config.retry_delay).await;
        }
    }

    /// One attempt at a transaction: begin, checkpoint update, the
    /// statements in order, commit. `Ok(false)` means a deadlock rolled
    /// the attempt back and the caller should retry; everything else
    /// is fatal.
    async fn process_transaction(&mut self, tx: &BinlogTransaction) -> Result<bool, Error> {
        let started = Instant::now();
        self.dbc.begin().await?;
        self.write_recovery_position(tx.group_id).await?;
        for statement in &tx.statements {
            let sql = String::from_utf8_lossy(&statement.sql);
            match self.exec(&sql).await {
                Ok(_) => {}
                Err(err) if err.is_deadlock() => {
                    info!(group_id = tx.group_id, %err, "deadlock applying txn");
                    self.dbc.rollback().await?;
                    return Ok(false);
                }
                Err(err) => return Err(err),
            }
        }
        self.dbc.commit().await?;
        self.stats.txn_count.add(1);
        self.stats.txn_time.record(started.elapsed());
        Ok(true)
    }

    /// Writes the checkpoint row inside the currently open transaction,
    /// so the commit lands the data and its checkpoint atomically.
    async fn write_recovery_position(&mut self, group_id: i64) -> Result<(), Error> {
        self.position.group_id = group_id;
        let sql = checkpoint::update_blp_checkpoint(
            self.position.uid,
            group_id,
            checkpoint::unix_now(),
        );
        let result = self.exec(&sql).await?;
        if result.rows_affected != 1 {
            return Err(Error::CheckpointUpdate {
                uid: self.position.uid,
                rows: result.rows_affected,
            });
        }
        Ok(())
    }

    /// Statement execution with telemetry. Successful statements count
    /// toward `QueryCount`/`QueryTime`; anything slower than the
    /// threshold is logged either way.
    async fn exec(&mut self, sql: &str) -> Result<QueryResult, Error> {
        let started = Instant::now();
        let result = self.dbc.execute_fetch(sql, 0, false).await;
        let elapsed = started.elapsed();
        if result.is_ok() {
            self.stats.query_count.add(1);
            self.stats.query_time.record(elapsed);
        }
        if elapsed > self.config.slow_query_threshold {
            info!(
                elapsed_ms = elapsed.as_millis() as u64,
                sql = truncate_sql(sql, SLOW_QUERY_LOG_LIMIT),
                "slow query"
            );
        }
        result
    }
}

fn truncate_sql(sql: &str, max_chars: usize) -> &str {
    match sql.char_indices().nth(max_chars) {
        Some((idx, _)) => &sql[..idx],
        None => sql,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeDbClient;
    use futures_util::stream;
    use shardstream_binlogdata::binlogdata::binlog_transaction::statement::Category;
    use shardstream_binlogdata::binlogdata::binlog_transaction::Statement;

    fn txn(group_id: i64, statements: &[&str]) -> BinlogTransaction {
        BinlogTransaction {
            group_id,
            statements: statements
                .iter()
                .map(|sql| Statement {
                    category: Category::BlDml as i32,
                    charset: None,
                    sql: sql.as_bytes().to_vec(),
                })
                .collect(),
        }
    }

    fn player(
        dbc: FakeDbClient,
        uid: u32,
        group_id: i64,
        stop_at_group_id: i64,
    ) -> BinlogPlayer<FakeDbClient> {
        BinlogPlayer::new_tables(
            "http://127.0.0.1:1",
            dbc,
            vec!["t".to_string()],
            BlpPosition { uid, group_id },
            stop_at_group_id,
            Arc::new(PlayerStats::new()),
        )
    }

    fn items(
        txns: Vec<Result<BinlogTransaction, Status>>,
    ) -> impl Stream<Item = Result<BinlogTransaction, Status>> + Unpin {
        stream::iter(txns)
    }

    fn assert_checkpoint_update(entry: &str, uid: u32, group_id: i64) {
        let prefix = format!("UPDATE _vt.blp_checkpoint SET group_id={group_id}, time_updated=");
        assert!(entry.starts_with(&prefix), "unexpected statement: {entry}");
        assert!(entry.ends_with(&format!(" WHERE source_shard_uid={uid}")));
    }

    #[tokio::test]
    async fn happy_path_applies_and_returns_stream_ended() {
        let mut player = player(FakeDbClient::new(), 5, 100, 0);
        let stream = items(vec![Ok(txn(101, &["INSERT INTO t VALUES (1)"]))]);

        let err = player
            .dispatch(stream, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StreamEnded));

        let log = &player.dbc.log;
        assert_eq!(log.len(), 4);
        assert_eq!(log[0], "BEGIN");
        assert_checkpoint_update(&log[1], 5, 101);
        assert_eq!(log[2], "INSERT INTO t VALUES (1)");
        assert_eq!(log[3], "COMMIT");

        assert_eq!(player.position(), BlpPosition { uid: 5, group_id: 101 });
        assert_eq!(player.stats.txn_count.get(), 1);
        assert_eq!(player.stats.query_count.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn deadlock_rolls_back_and_retries_the_same_txn() {
        let mut dbc = FakeDbClient::new();
        dbc.script_error("INSERT INTO t VALUES (2)", FakeDbClient::deadlock());
        let mut player = player(dbc, 5, 100, 0);
        let stream = items(vec![Ok(txn(
            101,
            &["INSERT INTO t VALUES (1)", "INSERT INTO t VALUES (2)"],
        ))]);

        let err = player
            .dispatch(stream, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StreamEnded));

        let log = &player.dbc.log;
        assert_eq!(log.len(), 10);
        assert_eq!(log[0], "BEGIN");
        assert_checkpoint_update(&log[1], 5, 101);
        assert_eq!(log[2], "INSERT INTO t VALUES (1)");
        assert_eq!(log[3], "INSERT INTO t VALUES (2)");
        assert_eq!(log[4], "ROLLBACK");
        assert_eq!(log[5], "BEGIN");
        assert_checkpoint_update(&log[6], 5, 101);
        assert_eq!(log[7], "INSERT INTO t VALUES (1)");
        assert_eq!(log[8], "INSERT INTO t VALUES (2)");
        assert_eq!(log[9], "COMMIT");

        // Retries count as one transaction; the failed statement does
        // not count, both checkpoint updates do.
        assert_eq!(player.stats.txn_count.get(), 1);
        assert_eq!(player.stats.query_count.get(), 5);
    }

    #[tokio::test]
    async fn stops_at_the_configured_group_id() {
        let mut player = player(FakeDbClient::new(), 7, 500, 502);
        let stream = items(vec![
            Ok(txn(501, &["S501"])),
            Ok(txn(502, &["S502"])),
            Ok(txn(503, &["S503"])),
        ]);

        player
            .dispatch(stream, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(player.position(), BlpPosition { uid: 7, group_id: 502 });
        let begins = player.dbc.log.iter().filter(|s| *s == "BEGIN").count();
        assert_eq!(begins, 2);
        assert!(!player.dbc.log.iter().any(|s| s == "S503"));
    }

    #[tokio::test]
    async fn already_at_stop_returns_without_dialing() {
        let mut player = player(FakeDbClient::new(), 7, 502, 502);
        player.run(CancellationToken::new()).await.unwrap();
        assert!(player.dbc.log.is_empty());
    }

    #[tokio::test]
    async fn start_past_stop_is_a_configuration_error() {
        let mut player = player(FakeDbClient::new(), 7, 503, 502);
        let err = player.run(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(player.dbc.log.is_empty());
    }

    #[tokio::test]
    async fn cancellation_between_transactions_returns_ok() {
        let mut player = player(FakeDbClient::new(), 3, 10, 0);
        let cancel = CancellationToken::new();
        let mid_stream = cancel.clone();
        let stream = Box::pin(async_stream::stream! {
            yield Ok::<_, Status>(txn(11, &["INSERT INTO t VALUES (11)"]));
            mid_stream.cancel();
            futures_util::future::pending::<()>().await;
        });

        player.dispatch(stream, cancel).await.unwrap();

        assert_eq!(player.position(), BlpPosition { uid: 3, group_id: 11 });
        let begins = player.dbc.log.iter().filter(|s| *s == "BEGIN").count();
        assert_eq!(begins, 1);
    }

    #[tokio::test]
    async fn connection_fatal_begin_surfaces_the_error() {
        let mut dbc = FakeDbClient::new();
        dbc.script_error(
            "BEGIN",
            Error::Sql {
                code: 2006,
                message: "MySQL server has gone away".to_string(),
            },
        );
        let mut player = player(dbc, 3, 10, 0);
        let stream = items(vec![Ok(txn(11, &["INSERT INTO t VALUES (11)"]))]);

        let err = player
            .dispatch(stream, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.sql_code(), Some(2006));
        assert!(!player.dbc.connected);
        assert_eq!(player.position(), BlpPosition { uid: 3, group_id: 10 });
        assert_eq!(player.dbc.log, vec!["BEGIN"]);
    }

    #[tokio::test]
    async fn mid_stream_rpc_error_is_returned() {
        let mut player = player(FakeDbClient::new(), 3, 10, 0);
        let stream = items(vec![
            Ok(txn(11, &["INSERT INTO t VALUES (11)"])),
            Err(Status::unavailable("stream broke")),
        ]);

        let err = player
            .dispatch(stream, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Grpc(_)));
        assert_eq!(player.position(), BlpPosition { uid: 3, group_id: 11 });
    }

    #[tokio::test]
    async fn empty_transaction_still_advances_the_checkpoint() {
        let mut player = player(FakeDbClient::new(), 5, 100, 0);
        let stream = items(vec![Ok(txn(101, &[]))]);

        let err = player
            .dispatch(stream, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StreamEnded));

        let log = &player.dbc.log;
        assert_eq!(log.len(), 3);
        assert_eq!(log[0], "BEGIN");
        assert_checkpoint_update(&log[1], 5, 101);
        assert_eq!(log[2], "COMMIT");
        assert_eq!(player.position().group_id, 101);
    }

    #[tokio::test]
    async fn checkpoint_update_must_affect_one_row() {
        let mut dbc = FakeDbClient::new();
        dbc.script_result(
            "UPDATE _vt.blp_checkpoint",
            QueryResult {
                rows_affected: 0,
                ..Default::default()
            },
        );
        let mut player = player(dbc, 5, 100, 0);
        let stream = items(vec![Ok(txn(101, &["INSERT INTO t VALUES (1)"]))]);

        let err = player
            .dispatch(stream, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::CheckpointUpdate { uid: 5, rows: 0 }
        ));
    }

    #[tokio::test]
    async fn non_deadlock_statement_error_is_fatal() {
        let mut dbc = FakeDbClient::new();
        dbc.script_error(
            "INSERT INTO t VALUES (1)",
            Error::Sql {
                code: 1062,
                message: "Duplicate entry '1' for key 'PRIMARY'".to_string(),
            },
        );
        let mut player = player(dbc, 5, 100, 0);
        let stream = items(vec![Ok(txn(101, &["INSERT INTO t VALUES (1)"]))]);

        let err = player
            .dispatch(stream, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.sql_code(), Some(1062));
        // No rollback for fatal errors; the session owner decides.
        assert!(!player.dbc.log.iter().any(|s| s == "ROLLBACK"));
        assert!(!player.dbc.log.iter().any(|s| s == "COMMIT"));
    }

    #[test]
    fn slow_query_text_is_truncated_on_char_boundaries() {
        let sql = "é".repeat(300);
        assert_eq!(truncate_sql(&sql, 256).chars().count(), 256);
        assert_eq!(truncate_sql("short", 256), "short");
    }
}
