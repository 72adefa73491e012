use crate::dbclient::ER_LOCK_DEADLOCK;

/// Errors surfaced by the player and its database client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A SQL error reported by the server (or mapped from a lost
    /// connection), with its numeric code.
    #[error("sql error {code}: {message}")]
    Sql { code: u16, message: String },

    /// A driver failure that carries no SQL code.
    #[error("database driver error: {0}")]
    Driver(mysql_async::Error),

    /// The client is not connected; `connect` must be called first.
    #[error("not connected to the database")]
    NotConnected,

    #[error(transparent)]
    Grpc(#[from] tonic::Status),

    #[error(transparent)]
    Transport(#[from] tonic::transport::Error),

    /// The server closed the update stream without an error.
    #[error("binlog stream ended")]
    StreamEnded,

    /// The checkpoint SELECT did not return exactly one row.
    #[error("checkpoint read for source shard uid {uid} returned {rows} rows")]
    CheckpointRead { uid: u32, rows: usize },

    /// The checkpoint UPDATE did not affect exactly one row.
    #[error("checkpoint update for source shard uid {uid} affected {rows} rows")]
    CheckpointUpdate { uid: u32, rows: u64 },

    #[error("malformed checkpoint row: {0}")]
    MalformedCheckpoint(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The numeric SQL code, if this is a SQL error.
    pub fn sql_code(&self) -> Option<u16> {
        match self {
            Error::Sql { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True for `ER_LOCK_DEADLOCK`, the one retryable statement failure.
    pub fn is_deadlock(&self) -> bool {
        self.sql_code() == Some(ER_LOCK_DEADLOCK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadlock_is_the_only_retryable_sql_error() {
        let deadlock = Error::Sql {
            code: 1213,
            message: "Deadlock found when trying to get lock".to_string(),
        };
        assert!(deadlock.is_deadlock());
        assert_eq!(deadlock.sql_code(), Some(1213));

        let dup = Error::Sql {
            code: 1062,
            message: "Duplicate entry".to_string(),
        };
        assert!(!dup.is_deadlock());
        assert!(!Error::StreamEnded.is_deadlock());
        assert_eq!(Error::StreamEnded.sql_code(), None);
    }
}
