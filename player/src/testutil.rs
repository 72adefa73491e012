//! Scripted in-memory database client for tests.

use std::collections::VecDeque;

use async_trait::async_trait;

use crate::dbclient::{is_conn_error, DbClient, QueryResult};
use crate::error::Error;

/// Records every statement it receives and replays scripted outcomes.
///
/// Outcomes are keyed by SQL prefix (the checkpoint UPDATE carries a
/// wall-clock timestamp, so exact matching is not possible) and are
/// consumed in order; unscripted statements succeed with one affected
/// row.
#[derive(Default)]
pub(crate) struct FakeDbClient {
    pub log: Vec<String>,
    pub connected: bool,
    scripts: Vec<(String, VecDeque<Result<QueryResult, Error>>)>,
}

impl FakeDbClient {
    pub fn new() -> Self {
        Self {
            connected: true,
            ..Default::default()
        }
    }

    pub fn script_result(&mut self, prefix: &str, result: QueryResult) {
        self.script(prefix, Ok(result));
    }

    pub fn script_error(&mut self, prefix: &str, err: Error) {
        self.script(prefix, Err(err));
    }

    fn script(&mut self, prefix: &str, outcome: Result<QueryResult, Error>) {
        match self.scripts.iter_mut().find(|(p, _)| p == prefix) {
            Some((_, queue)) => queue.push_back(outcome),
            None => self
                .scripts
                .push((prefix.to_string(), VecDeque::from([outcome]))),
        }
    }

    pub fn deadlock() -> Error {
        Error::Sql {
            code: 1213,
            message: "Deadlock found when trying to get lock; try restarting transaction"
                .to_string(),
        }
    }
}

#[async_trait]
impl DbClient for FakeDbClient {
    async fn connect(&mut self) -> Result<(), Error> {
        self.connected = true;
        Ok(())
    }

    async fn execute_fetch(
        &mut self,
        sql: &str,
        max_rows: usize,
        _want_fields: bool,
    ) -> Result<QueryResult, Error> {
        self.log.push(sql.to_string());
        for (prefix, queue) in self.scripts.iter_mut() {
            if sql.starts_with(prefix.as_str()) {
                if let Some(outcome) = queue.pop_front() {
                    return match outcome {
                        Ok(mut result) => {
                            if max_rows > 0 {
                                result.rows.truncate(max_rows);
                            }
                            Ok(result)
                        }
                        Err(err) => {
                            if err.sql_code().is_some_and(is_conn_error) {
                                self.connected = false;
                            }
                            Err(err)
                        }
                    };
                }
            }
        }
        Ok(QueryResult {
            rows_affected: 1,
            ..Default::default()
        })
    }

    async fn close(&mut self) {
        self.connected = false;
    }
}
