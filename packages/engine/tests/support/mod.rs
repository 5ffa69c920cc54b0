#![allow(dead_code)]

use std::collections::VecDeque;

use shadowsql_engine::{row, Row, SchemaRegistry, ShadowBackend, ShadowError, Value};

/// In-memory stand-in for the real database: records every statement it
/// receives and answers with queued rows (or nothing once the queue is
/// drained).
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub executed: Vec<String>,
    responses: VecDeque<Result<Vec<Row>, ShadowError>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&mut self, rows: Vec<Row>) -> &mut Self {
        self.responses.push_back(Ok(rows));
        self
    }

    pub fn fail(&mut self, message: &str) -> &mut Self {
        self.responses
            .push_back(Err(ShadowError::Backend(message.to_string())));
        self
    }

    pub fn last(&self) -> &str {
        self.executed.last().map(String::as_str).unwrap_or_default()
    }
}

impl ShadowBackend for RecordingBackend {
    fn execute(&mut self, sql: &str) -> Result<Vec<Row>, ShadowError> {
        self.executed.push(sql.to_string());
        self.responses.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub const USERS_DDL: &str =
    "CREATE TABLE users (id INT NOT NULL AUTO_INCREMENT, name VARCHAR(50) NOT NULL, \
     email VARCHAR(100), PRIMARY KEY (id), UNIQUE KEY uniq_email (email))";

pub fn users_registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry.register("users", USERS_DDL).expect("register users");
    registry
}

pub fn user(id: i64, name: &str, email: Option<&str>) -> Row {
    row([
        ("id", Value::Integer(id)),
        ("name", Value::from(name)),
        ("email", email.map(Value::from).unwrap_or(Value::Null)),
    ])
}
