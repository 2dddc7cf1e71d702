//! # Quarry
//!
//! Quarry is the query core of a schema-described content repository:
//! classes map onto relational tables, and in-memory query
//! specifications (constraints, AND/OR groups, ordering, language and
//! tenant filtering, limit/offset) compile into one injection-safe SQL
//! statement per execution. Rows come back as typed records.
//!
//! ## What's inside
//!
//! ### Constraint engine
//! Property names resolve against a schema registry (one link hop
//! allowed), values are strictly coerced to the declared column types,
//! and the operator whitelist is closed: nothing outside
//! `= <> < > <= >= LIKE NOT LIKE IN NOT IN INTREE` ever reaches the
//! SQL string. `INTREE` expands to the transitive descendants of a
//! tree-structured class.
//!
//! ### Tenancy and language
//! Every query is scoped to the calling tenant (sitegroup), with
//! tenant `0` shared and root callers unfiltered. Multilingual classes
//! join their `_i` instance table and fall back to the default
//! language where a requested-language row is missing.
//!
//! ### Collector
//! A read-through key→{subkey→value} cache over the same builder, for
//! hot lookups like style elements and parameters.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use quarry::{Session, Tenant, adapters::mysql::MySqlDriver};
//!
//! let driver = Arc::new(MySqlDriver::connect(&url).await?);
//! let session = Session::new(driver, schema, Tenant::new(7));
//!
//! let mut query = session.query_builder("person")?;
//! query.add_constraint("username", "=", "alice")?;
//! let people = query.execute().await?;
//! ```

pub mod adapters;
pub mod collector;
pub mod driver;
pub mod error;
pub mod query;
pub mod record;
pub mod schema;
pub mod tree;
pub mod value;

use std::sync::Arc;

pub use crate::collector::Collector;
pub use crate::driver::{Driver, ResultSet, Row};
pub use crate::error::Error;
pub use crate::query::{Direction, GroupOp, Operator, PropertyRef, QueryBuilder};
pub use crate::record::{Metadata, RawRecord, Record};
pub use crate::schema::{ClassInfo, PropertyStorage, SchemaRegistry, StaticSchema};
pub use crate::value::{TypeTag, Value, escape_string};

/// The calling tenant. Tenant `0` rows are shared and visible to all;
/// a root tenant bypasses sitegroup filtering and may query protected
/// classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tenant {
    pub id: u32,
    pub is_root: bool,
}

impl Tenant {
    pub fn new(id: u32) -> Self {
        Self { id, is_root: false }
    }

    pub fn root(id: u32) -> Self {
        Self { id, is_root: true }
    }
}

/// A Session binds a driver, a schema registry, a tenant context, and
/// the language configuration, and hands out query builders and
/// collectors. It replaces the process-global state of the legacy
/// system: everything a builder needs travels through here explicitly.
#[derive(Clone)]
pub struct Session {
    driver: Arc<dyn Driver>,
    schema: Arc<dyn SchemaRegistry>,
    tenant: Tenant,
    language: u32,
    default_language: u32,
}

impl Session {
    pub fn new(driver: Arc<dyn Driver>, schema: Arc<dyn SchemaRegistry>, tenant: Tenant) -> Self {
        Self {
            driver,
            schema,
            tenant,
            language: 0,
            default_language: 0,
        }
    }

    /// Requested content language for multilingual classes.
    pub fn with_language(mut self, lang: u32) -> Self {
        self.language = lang;
        self
    }

    /// Fallback language used where a requested-language row is missing.
    pub fn with_default_language(mut self, lang: u32) -> Self {
        self.default_language = lang;
        self
    }

    pub fn tenant(&self) -> Tenant {
        self.tenant
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Start a query against `class`.
    pub fn query_builder(&self, class: &str) -> Result<QueryBuilder, Error> {
        let info = self
            .schema
            .class(class)
            .ok_or_else(|| Error::UnknownClass(class.to_string()))?
            .clone();
        Ok(QueryBuilder::new(
            Arc::clone(&self.driver),
            Arc::clone(&self.schema),
            info,
            self.tenant,
            self.language,
            self.default_language,
        ))
    }

    /// Start a collector over `class`, pinned to the domain constraint
    /// `domain = value`.
    pub fn collector(
        &self,
        class: &str,
        domain: &str,
        value: impl Into<Value>,
    ) -> Result<Collector, Error> {
        let mut builder = self.query_builder(class)?;
        builder.add_constraint(domain, "=", value)?;
        Ok(Collector::new(builder))
    }
}
