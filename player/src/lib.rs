//! # shardstream-player
//!
//! Replays a source shard's binlog transaction stream into a local
//! MySQL, advancing a durable checkpoint as it goes. This is the data
//! plane of shard-to-shard asynchronous replication: the source shard
//! serves an ordered stream of transactions filtered by key range or
//! table list, and the player applies each one atomically together
//! with its checkpoint row update.
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use shardstream_player::checkpoint::read_start_position;
//! use shardstream_player::dbclient::{DbClient, MysqlClient};
//! use shardstream_player::player::BinlogPlayer;
//! use shardstream_player::stats::PlayerStats;
//! use shardstream_player::Error;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let mut dbc = MysqlClient::from_url("mysql://app@localhost:3306/db")?;
//!     dbc.connect().await?;
//!
//!     let position = read_start_position(&mut dbc, 5).await?;
//!     let stats = Arc::new(PlayerStats::new());
//!     let _sampler = stats.spawn_sampler();
//!
//!     let cancel = CancellationToken::new();
//!     let mut player = BinlogPlayer::new_tables(
//!         "http://source-shard:15999",
//!         dbc,
//!         vec!["users".to_string()],
//!         position,
//!         0,
//!         Arc::clone(&stats),
//!     );
//!     match player.run(cancel).await {
//!         // The server finished the stream; restart to resume.
//!         Err(Error::StreamEnded) => Ok(()),
//!         other => other,
//!     }
//! }
//! ```

pub mod checkpoint;
pub mod dbclient;
pub mod dryrun;
mod error;
pub mod player;
pub mod stats;
#[cfg(test)]
pub(crate) mod testutil;

pub use error::Error;
