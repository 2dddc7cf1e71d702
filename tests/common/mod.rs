#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use quarry::{
    ClassInfo, Driver, Error, PropertyStorage, ResultSet, Session, StaticSchema, Tenant, TypeTag,
};

/// Scripted driver: records every SQL string it is handed and replays
/// queued result sets in order. Unqueued queries get an empty result.
pub struct MockDriver {
    responses: Mutex<VecDeque<Result<ResultSet, String>>>,
    log: Mutex<Vec<String>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, result: ResultSet) {
        self.responses.lock().unwrap().push_back(Ok(result));
    }

    pub fn push_failure(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn issued(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn last_sql(&self) -> String {
        self.log.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn execute(&self, sql: &str) -> Result<ResultSet, Error> {
        self.log.lock().unwrap().push(sql.to_string());
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(result)) => Ok(result),
            Some(Err(message)) => Err(Error::Driver(message)),
            None => Ok(ResultSet::default()),
        }
    }

    async fn last_insert_id(&self) -> Result<u64, Error> {
        Ok(0)
    }
}

pub fn result_set(columns: &[&str], rows: &[&[Option<&str>]]) -> ResultSet {
    ResultSet {
        columns: columns.iter().map(|c| c.to_string()).collect(),
        rows: rows
            .iter()
            .map(|row| row.iter().map(|c| c.map(str::to_string)).collect())
            .collect(),
    }
}

/// The fixture schema: a plain class, a link between classes, a
/// self-referential tree, a multilingual class, a parameter table for
/// collectors, and a protected administrative class.
pub fn schema() -> StaticSchema {
    StaticSchema::new()
        .register(
            ClassInfo::new("person", "person", "id")
                .with_property("id", PropertyStorage::new("person", "id", TypeTag::Uint))
                .with_property(
                    "username",
                    PropertyStorage::new("person", "username", TypeTag::String),
                )
                .with_property(
                    "firstname",
                    PropertyStorage::new("person", "firstname", TypeTag::String),
                )
                .with_property(
                    "lastname",
                    PropertyStorage::new("person", "lastname", TypeTag::String),
                ),
        )
        .register(
            ClassInfo::new("member", "member", "id")
                .with_property("id", PropertyStorage::new("member", "id", TypeTag::Uint))
                .with_property("person", PropertyStorage::link("member", "person", "person"))
                .with_property(
                    "role",
                    PropertyStorage::new("member", "role", TypeTag::String),
                ),
        )
        .register(
            ClassInfo::new("topic", "topic", "id")
                .with_up("up")
                .with_property("id", PropertyStorage::new("topic", "id", TypeTag::Uint))
                .with_property("up", PropertyStorage::link("topic", "up", "topic"))
                .with_property(
                    "name",
                    PropertyStorage::new("topic", "name", TypeTag::String),
                ),
        )
        .register(
            ClassInfo::new("article", "article", "id")
                .multilang()
                .with_property("id", PropertyStorage::new("article", "id", TypeTag::Uint))
                .with_property("topic", PropertyStorage::link("article", "topic", "topic"))
                .with_property(
                    "title",
                    PropertyStorage::new("article_i", "title", TypeTag::String),
                )
                .with_property(
                    "content",
                    PropertyStorage::new("article_i", "content", TypeTag::String),
                ),
        )
        .register(
            ClassInfo::new("parameter", "record_extension", "id")
                .with_property(
                    "id",
                    PropertyStorage::new("record_extension", "id", TypeTag::Uint),
                )
                .with_property(
                    "parentguid",
                    PropertyStorage::new("record_extension", "parentguid", TypeTag::String),
                )
                .with_property(
                    "domain",
                    PropertyStorage::new("record_extension", "domain", TypeTag::String),
                )
                .with_property(
                    "name",
                    PropertyStorage::new("record_extension", "name", TypeTag::String),
                )
                .with_property(
                    "value",
                    PropertyStorage::new("record_extension", "value", TypeTag::String),
                ),
        )
        .register(
            ClassInfo::new("sitegroup", "sitegroup", "id")
                .protected()
                .with_property("id", PropertyStorage::new("sitegroup", "id", TypeTag::Uint))
                .with_property(
                    "name",
                    PropertyStorage::new("sitegroup", "name", TypeTag::String),
                ),
        )
}

pub fn session_for(driver: &Arc<MockDriver>, tenant: Tenant) -> Session {
    Session::new(Arc::clone(driver) as Arc<dyn Driver>, Arc::new(schema()), tenant)
}

pub fn tenant_session(driver: &Arc<MockDriver>) -> Session {
    session_for(driver, Tenant::new(7))
}
