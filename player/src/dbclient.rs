use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use tracing::debug;

use crate::error::Error;

/// `ER_LOCK_DEADLOCK`: the statement lost a deadlock and the server
/// rolled the transaction back. Retryable.
pub const ER_LOCK_DEADLOCK: u16 = 1213;

/// `ER_QUERY_INTERRUPTED`, treated like a lost connection.
pub const ER_QUERY_INTERRUPTED: u16 = 1317;

/// Bounds of the client-side `CR_*` error range.
pub const CR_ERROR_FIRST: u16 = 2000;
pub const CR_ERROR_LAST: u16 = 2018;

/// `CR_SERVER_LOST`: transport dropped mid-query.
pub const CR_SERVER_LOST: u16 = 2013;

/// True for errors after which the session is unusable and must be
/// reconnected: the whole `CR_*` range plus `ER_QUERY_INTERRUPTED`.
pub fn is_conn_error(code: u16) -> bool {
    (CR_ERROR_FIRST..=CR_ERROR_LAST).contains(&code) || code == ER_QUERY_INTERRUPTED
}

/// Column metadata, populated only when `want_fields` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
}

/// Result of one `execute_fetch`. Cells are the textual bytes of each
/// value; `None` is SQL NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub rows_affected: u64,
    pub insert_id: u64,
    pub rows: Vec<Vec<Option<Vec<u8>>>>,
    pub fields: Option<Vec<Field>>,
}

/// The capability set the player needs from a database session:
/// connect/close, transaction verbs, and statement execution.
///
/// The transaction verbs have default implementations that route the
/// bare SQL verb through `execute_fetch`, so implementations only need
/// to provide the session lifecycle and statement execution.
#[async_trait]
pub trait DbClient: Send {
    /// Establishes the session. Idempotent after `close`.
    async fn connect(&mut self) -> Result<(), Error>;

    async fn begin(&mut self) -> Result<(), Error> {
        self.execute_fetch("BEGIN", 0, false).await.map(|_| ())
    }

    async fn commit(&mut self) -> Result<(), Error> {
        self.execute_fetch("COMMIT", 0, false).await.map(|_| ())
    }

    async fn rollback(&mut self) -> Result<(), Error> {
        self.execute_fetch("ROLLBACK", 0, false).await.map(|_| ())
    }

    /// Executes one statement. `max_rows == 0` means no row limit; a
    /// positive value truncates the returned rows. `want_fields`
    /// controls whether column metadata is fetched.
    async fn execute_fetch(
        &mut self,
        sql: &str,
        max_rows: usize,
        want_fields: bool,
    ) -> Result<QueryResult, Error>;

    /// Releases the session. Safe to call more than once.
    async fn close(&mut self);
}

/// Live client over a real MySQL session.
///
/// On a connection-fatal error (`is_conn_error`) the session is dropped
/// before the error is returned, so the next call observes
/// `NotConnected` and the owner must `connect` again.
pub struct MysqlClient {
    opts: mysql_async::Opts,
    conn: Option<mysql_async::Conn>,
}

impl MysqlClient {
    pub fn new(opts: mysql_async::Opts) -> Self {
        Self { opts, conn: None }
    }

    pub fn from_url(url: &str) -> Result<Self, Error> {
        let opts = mysql_async::Opts::from_url(url)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        Ok(Self::new(opts))
    }

    /// Classifies a driver error and tears the session down if it is
    /// connection-fatal.
    async fn fail(&mut self, err: mysql_async::Error) -> Error {
        let err = translate(err);
        if let Some(code) = err.sql_code() {
            if is_conn_error(code) {
                debug!(code, "connection-fatal sql error, dropping session");
                self.drop_session().await;
            }
        }
        err
    }

    async fn drop_session(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(err) = conn.disconnect().await {
                debug!(%err, "error closing mysql session");
            }
        }
    }

    async fn fetch(
        conn: &mut mysql_async::Conn,
        sql: &str,
        max_rows: usize,
        want_fields: bool,
    ) -> Result<QueryResult, mysql_async::Error> {
        let mut result = conn.query_iter(sql).await?;
        let fields = if want_fields {
            result.columns().map(|columns| {
                columns
                    .iter()
                    .map(|c| Field {
                        name: c.name_str().into_owned(),
                    })
                    .collect()
            })
        } else {
            None
        };
        let collected: Vec<mysql_async::Row> = result.collect().await?;
        let rows_affected = result.affected_rows();
        let insert_id = result.last_insert_id().unwrap_or(0);
        drop(result);

        let mut rows: Vec<Vec<Option<Vec<u8>>>> = collected
            .into_iter()
            .map(|row| row.unwrap().into_iter().map(cell_bytes).collect())
            .collect();
        if max_rows > 0 {
            rows.truncate(max_rows);
        }
        Ok(QueryResult {
            rows_affected,
            insert_id,
            rows,
            fields,
        })
    }
}

#[async_trait]
impl DbClient for MysqlClient {
    async fn connect(&mut self) -> Result<(), Error> {
        if self.conn.is_none() {
            let conn = match mysql_async::Conn::new(self.opts.clone()).await {
                Ok(conn) => conn,
                Err(err) => return Err(translate(err)),
            };
            self.conn = Some(conn);
        }
        Ok(())
    }

    async fn execute_fetch(
        &mut self,
        sql: &str,
        max_rows: usize,
        want_fields: bool,
    ) -> Result<QueryResult, Error> {
        let conn = match self.conn.as_mut() {
            Some(conn) => conn,
            None => return Err(Error::NotConnected),
        };
        match Self::fetch(conn, sql, max_rows, want_fields).await {
            Ok(result) => Ok(result),
            Err(err) => Err(self.fail(err).await),
        }
    }

    async fn close(&mut self) {
        self.drop_session().await;
    }
}

fn translate(err: mysql_async::Error) -> Error {
    match err {
        mysql_async::Error::Server(e) => Error::Sql {
            code: e.code,
            message: e.message,
        },
        // Transport loss surfaces as I/O, not as a SQL code; report it
        // as the classic client code.
        mysql_async::Error::Io(e) => Error::Sql {
            code: CR_SERVER_LOST,
            message: e.to_string(),
        },
        other => Error::Driver(other),
    }
}

fn cell_bytes(value: mysql_async::Value) -> Option<Vec<u8>> {
    match value {
        mysql_async::Value::NULL => None,
        mysql_async::Value::Bytes(bytes) => Some(bytes),
        mysql_async::Value::Int(v) => Some(v.to_string().into_bytes()),
        mysql_async::Value::UInt(v) => Some(v.to_string().into_bytes()),
        other => Some(other.as_sql(true).trim_matches('\'').as_bytes().to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conn_error_code_boundaries() {
        assert!(!is_conn_error(1999));
        assert!(is_conn_error(2000));
        assert!(is_conn_error(2006));
        assert!(is_conn_error(2013));
        assert!(is_conn_error(2018));
        assert!(!is_conn_error(2019));
        assert!(is_conn_error(1317));
        assert!(!is_conn_error(ER_LOCK_DEADLOCK));
    }

    #[test]
    fn cells_render_as_text() {
        assert_eq!(cell_bytes(mysql_async::Value::NULL), None);
        assert_eq!(
            cell_bytes(mysql_async::Value::Bytes(b"abc".to_vec())),
            Some(b"abc".to_vec())
        );
        assert_eq!(
            cell_bytes(mysql_async::Value::Int(-42)),
            Some(b"-42".to_vec())
        );
        assert_eq!(
            cell_bytes(mysql_async::Value::UInt(7)),
            Some(b"7".to_vec())
        );
    }
}
