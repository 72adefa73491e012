use std::io::{BufWriter, Write};

use async_trait::async_trait;

use crate::dbclient::{DbClient, QueryResult};
use crate::error::Error;

/// Database client that serializes statements instead of executing them.
///
/// Every verb and statement is written as `<text>;\n`, so replaying a
/// stream through it produces a SQL dump that can be piped into a
/// server later. `execute_fetch` reports one affected row and no result
/// rows.
pub struct DryRunClient<W: Write> {
    out: BufWriter<W>,
}

impl<W: Write> DryRunClient<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: BufWriter::new(out),
        }
    }

    /// Flushes and returns the underlying writer.
    pub fn into_inner(self) -> Result<W, Error> {
        self.out.into_inner().map_err(|e| Error::Io(e.into_error()))
    }

    fn record(&mut self, sql: &str) -> Result<(), Error> {
        self.out.write_all(sql.as_bytes())?;
        self.out.write_all(b";\n")?;
        Ok(())
    }
}

#[async_trait]
impl<W: Write + Send> DbClient for DryRunClient<W> {
    async fn connect(&mut self) -> Result<(), Error> {
        Ok(())
    }

    async fn execute_fetch(
        &mut self,
        sql: &str,
        _max_rows: usize,
        _want_fields: bool,
    ) -> Result<QueryResult, Error> {
        self.record(sql)?;
        Ok(QueryResult {
            rows_affected: 1,
            ..Default::default()
        })
    }

    async fn close(&mut self) {
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serializes_a_transaction_in_order() {
        let mut client = DryRunClient::new(Vec::new());
        client.begin().await.unwrap();
        client
            .execute_fetch("INSERT INTO t VALUES (1)", 0, false)
            .await
            .unwrap();
        client.commit().await.unwrap();

        let out = client.into_inner().unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "BEGIN;\nINSERT INTO t VALUES (1);\nCOMMIT;\n"
        );
    }

    #[tokio::test]
    async fn every_fetch_affects_one_row() {
        let mut client = DryRunClient::new(Vec::new());
        let result = client.execute_fetch("DELETE FROM t", 0, false).await.unwrap();
        assert_eq!(result.rows_affected, 1);
        assert!(result.rows.is_empty());
        assert!(result.fields.is_none());
    }
}
