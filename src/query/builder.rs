use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use tracing::{debug, error};

use crate::driver::{Driver, ResultSet};
use crate::error::Error;
use crate::query::constraint::{Comparand, Constraint, Operator};
use crate::query::group::{ConstraintGroup, ConstraintNode, GroupOp};
use crate::query::order::{Direction, OrderSpec};
use crate::query::property::{self, PropertyRef, metadata_column, metadata_property_names};
use crate::record::{RawRecord, Record};
use crate::schema::{ClassInfo, SchemaRegistry};
use crate::value::{TypeTag, Value};
use crate::Tenant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LanguageFilter {
    Active(u32),
    Unset,
}

/// One builder, one logical query. Constraints, groups, and orders
/// accumulate through the mutating calls; the terminal operations
/// compile everything into a single SQL statement, run it, and
/// materialize the rows. Terminal calls may be repeated; each re-runs
/// the query.
pub struct QueryBuilder {
    driver: Arc<dyn Driver>,
    schema: Arc<dyn SchemaRegistry>,
    class: ClassInfo,
    tenant: Tenant,
    tables: BTreeSet<String>,
    root_nodes: Vec<ConstraintNode>,
    open_groups: Vec<ConstraintGroup>,
    orders: Vec<OrderSpec>,
    limit: Option<u64>,
    offset: u64,
    language: LanguageFilter,
    default_language: u32,
    include_deleted: bool,
}

impl std::fmt::Debug for QueryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBuilder").finish_non_exhaustive()
    }
}

impl QueryBuilder {
    pub(crate) fn new(
        driver: Arc<dyn Driver>,
        schema: Arc<dyn SchemaRegistry>,
        class: ClassInfo,
        tenant: Tenant,
        language: u32,
        default_language: u32,
    ) -> Self {
        let tables: BTreeSet<String> = class.tables().map(str::to_string).collect();
        Self {
            driver,
            schema,
            class,
            tenant,
            tables,
            root_nodes: Vec::new(),
            open_groups: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: 0,
            language: LanguageFilter::Active(language),
            default_language,
            include_deleted: false,
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class.name
    }

    // ==================== Accumulation ====================

    /// Add one `property <op> value` constraint. Validation is all-or-
    /// nothing: an unresolvable property, a bad operator, or a value
    /// the declared type rejects leaves the builder exactly as it was.
    pub fn add_constraint(
        &mut self,
        name: &str,
        op: &str,
        value: impl Into<Value>,
    ) -> Result<(), Error> {
        let op = Operator::parse(op)?;
        let left = property::resolve(self.schema.as_ref(), &self.class, name)?;
        let right = self.build_comparand(name, &left, op, value.into())?;

        self.tables.insert(left.table.clone());
        self.push_node(ConstraintNode::Leaf(Constraint { left, op, right }));
        Ok(())
    }

    /// Add a property-to-property comparison, typically across a link.
    pub fn add_constraint_with_property(
        &mut self,
        name_a: &str,
        op: &str,
        name_b: &str,
    ) -> Result<(), Error> {
        let op = Operator::parse(op)?;
        if matches!(op, Operator::In | Operator::NotIn | Operator::InTree) {
            return Err(Error::ValueShape(format!(
                "{} is not a property-to-property operator",
                op.sql()
            )));
        }
        let left = property::resolve(self.schema.as_ref(), &self.class, name_a)?;
        let right = property::resolve(self.schema.as_ref(), &self.class, name_b)?;

        self.tables.insert(left.table.clone());
        self.tables.insert(right.table.clone());
        self.push_node(ConstraintNode::Leaf(Constraint {
            left,
            op,
            right: Comparand::Property(right),
        }));
        Ok(())
    }

    /// Open a logical group. Groups nest: a `begin_group` inside an open
    /// group creates a child of that group.
    pub fn begin_group(&mut self, op: &str) -> Result<(), Error> {
        let op = GroupOp::parse(op)?;
        self.open_groups.push(ConstraintGroup::new(op));
        Ok(())
    }

    /// Close the innermost open group.
    pub fn end_group(&mut self) -> Result<(), Error> {
        let group = self.open_groups.pop().ok_or(Error::UnbalancedGrouping)?;
        match self.open_groups.last_mut() {
            Some(parent) => parent.members.push(ConstraintNode::Group(group)),
            None => self.root_nodes.push(ConstraintNode::Group(group)),
        }
        Ok(())
    }

    pub fn add_order(&mut self, name: &str, direction: &str) -> Result<(), Error> {
        let direction = Direction::parse(direction)?;
        let prop = property::resolve(self.schema.as_ref(), &self.class, name)?;
        self.tables.insert(prop.table.clone());
        self.orders.push(OrderSpec {
            property: prop,
            direction,
        });
        Ok(())
    }

    pub fn set_limit(&mut self, limit: u64) {
        self.limit = Some(limit);
    }

    pub fn set_offset(&mut self, offset: u64) {
        self.offset = offset;
    }

    /// Restrict multilingual content to `lang`, with fallback to the
    /// default language where no row exists in `lang`.
    pub fn set_language(&mut self, lang: u32) {
        self.language = LanguageFilter::Active(lang);
    }

    /// Drop language filtering entirely; the instance table is not
    /// joined and every language row is visible.
    pub fn unset_languages(&mut self) {
        self.language = LanguageFilter::Unset;
    }

    /// Make deleted records visible to this query.
    pub fn include_deleted(&mut self) {
        self.include_deleted = true;
    }

    fn push_node(&mut self, node: ConstraintNode) {
        match self.open_groups.last_mut() {
            Some(group) => group.members.push(node),
            None => self.root_nodes.push(node),
        }
    }

    fn build_comparand(
        &self,
        name: &str,
        left: &PropertyRef,
        op: Operator,
        value: Value,
    ) -> Result<Comparand, Error> {
        match op {
            Operator::In | Operator::NotIn => {
                let Value::Array(items) = value else {
                    return Err(Error::ValueShape(format!(
                        "{} requires an array value",
                        op.sql()
                    )));
                };
                if items.is_empty() {
                    return Err(Error::ValueShape(format!("{} with empty array", op.sql())));
                }
                let mut coerced = Vec::with_capacity(items.len());
                for item in items {
                    coerced.push(item.coerce(left.declared_type)?);
                }
                Ok(Comparand::Value(Value::Array(coerced)))
            }
            Operator::InTree => {
                let designated = self.class.parent.as_deref() == Some(name)
                    || self.class.up.as_deref() == Some(name);
                if !designated {
                    return Err(Error::ValueShape(format!(
                        "INTREE applies only to the parent or up property, not {:?}",
                        name
                    )));
                }
                let root = value
                    .coerce(TypeTag::Uint)
                    .map_err(|_| Error::ValueShape("INTREE requires an integer root id".into()))?
                    .as_uint()
                    .unwrap_or(0);
                Ok(Comparand::Tree {
                    table: self.class.table.clone(),
                    id_column: self.class.primary_column().to_string(),
                    up_column: left.column.clone(),
                    root,
                })
            }
            _ => Ok(Comparand::Value(value.coerce(left.declared_type)?)),
        }
    }

    // ==================== SQL assembly ====================

    fn guard(&self) -> Result<(), Error> {
        if !self.open_groups.is_empty() {
            return Err(Error::UnbalancedGrouping);
        }
        if self.class.protected && !self.tenant.is_root {
            return Err(Error::AccessDenied(self.class.name.clone()));
        }
        Ok(())
    }

    fn lang_active(&self) -> bool {
        self.class.multilang && matches!(self.language, LanguageFilter::Active(_))
    }

    fn requested_language(&self) -> u32 {
        match self.language {
            LanguageFilter::Active(lang) => lang,
            LanguageFilter::Unset => self.default_language,
        }
    }

    fn from_clause(&self) -> String {
        let mut tables: Vec<&str> = self.tables.iter().map(String::as_str).collect();
        let lang_table;
        if self.lang_active() {
            lang_table = self.class.lang_table();
            tables.push(&lang_table);
        }
        tables.join(", ")
    }

    async fn render_where(&self) -> Result<Vec<String>, Error> {
        let mut conditions = Vec::new();

        // tenant isolation: shared tenant 0 plus the caller's own;
        // root callers bypass the filter entirely
        if !self.tenant.is_root {
            for table in &self.tables {
                conditions.push(format!(
                    "{}.sitegroup IN (0, {})",
                    table, self.tenant.id
                ));
            }
        }

        if !self.include_deleted {
            conditions.push(format!("{}.metadata_deleted = 0", self.class.table));
        }

        if self.lang_active() {
            let lang_table = self.class.lang_table();
            conditions.push(format!(
                "{}.{} = {}.sid",
                self.class.table,
                self.class.primary_column(),
                lang_table
            ));
            let requested = self.requested_language();
            if requested == self.default_language {
                conditions.push(format!("{}.lang = {}", lang_table, requested));
            } else {
                conditions.push(format!(
                    "{}.lang IN ({}, {})",
                    lang_table, self.default_language, requested
                ));
            }
        }

        for node in &self.root_nodes {
            if let Some(sql) = self.render_node(node).await? {
                conditions.push(sql);
            }
        }

        Ok(conditions)
    }

    /// Render one node of the constraint tree. Empty groups are omitted
    /// entirely rather than replaced with an identity clause.
    fn render_node<'a>(
        &'a self,
        node: &'a ConstraintNode,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, Error>> + Send + 'a>> {
        Box::pin(async move {
            match node {
                ConstraintNode::Leaf(constraint) => {
                    constraint.render(self.driver.as_ref()).await.map(Some)
                }
                ConstraintNode::Group(group) => {
                    let mut parts = Vec::with_capacity(group.members.len());
                    for member in &group.members {
                        if let Some(sql) = self.render_node(member).await? {
                            parts.push(sql);
                        }
                    }
                    if parts.is_empty() {
                        Ok(None)
                    } else {
                        Ok(Some(format!(
                            "( {} )",
                            parts.join(&format!(" {} ", group.op.sql()))
                        )))
                    }
                }
            }
        })
    }

    fn append_tail(&self, sql: &mut String) {
        if !self.orders.is_empty() {
            sql.push_str(" ORDER BY ");
            let terms: Vec<String> = self.orders.iter().map(OrderSpec::sql).collect();
            sql.push_str(&terms.join(", "));
        }
        match (self.limit, self.offset) {
            (Some(limit), 0) => sql.push_str(&format!(" LIMIT {}", limit)),
            (Some(limit), offset) => sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset)),
            (None, 0) => {}
            // MySQL has no offset without limit
            (None, offset) => {
                sql.push_str(&format!(" LIMIT 18446744073709551615 OFFSET {}", offset))
            }
        }
    }

    async fn assemble(&self, select_list: &str) -> Result<String, Error> {
        let mut sql = format!("SELECT {} FROM {}", select_list, self.from_clause());
        let conditions = self.render_where().await?;
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        self.append_tail(&mut sql);
        Ok(sql)
    }

    fn object_select_list(&self) -> String {
        let t = &self.class.table;
        let mut cols = vec![format!("{}.guid", t), format!("{}.sitegroup", t)];
        cols.extend(metadata_property_names().map(|name| format!("{}.{}", t, metadata_column(name))));
        cols.extend(
            self.class
                .properties
                .values()
                .map(|p| format!("{}.{}", p.table, p.column)),
        );
        if self.lang_active() {
            let lang_table = self.class.lang_table();
            cols.push(format!("{}.sid", lang_table));
            cols.push(format!("{}.lang", lang_table));
        }
        cols.join(", ")
    }

    fn guid_select_list(&self) -> String {
        let mut cols = vec![format!("{}.guid", self.class.table)];
        if self.lang_active() {
            let lang_table = self.class.lang_table();
            cols.push(format!("{}.sid", lang_table));
            cols.push(format!("{}.lang", lang_table));
        }
        cols.join(", ")
    }

    async fn run(&self, sql: &str) -> Result<ResultSet, Error> {
        debug!(class = %self.class.name, sql, "executing query");
        let start = Instant::now();
        let result = self.driver.execute(sql).await;
        histogram!("quarry.query.duration_ms", "class" => self.class.name.clone())
            .record(start.elapsed().as_millis() as f64);
        match result {
            Ok(rows) => Ok(rows),
            Err(err) => {
                error!(class = %self.class.name, sql, %err, "query failed");
                Err(err)
            }
        }
    }

    /// Language fallback: when a non-default language is requested, the
    /// result may hold up to two instance rows per object (requested +
    /// default). Keep one per guid, preferring the requested language,
    /// in first-seen order.
    fn surviving_rows(&self, result: &ResultSet) -> Vec<usize> {
        let requested = self.requested_language();
        if !self.lang_active() || requested == self.default_language {
            return (0..result.rows.len()).collect();
        }

        let mut kept: Vec<usize> = Vec::new();
        let mut by_guid: BTreeMap<String, usize> = BTreeMap::new();
        for (idx, row) in result.rows.iter().enumerate() {
            let guid = result.cell(row, "guid").unwrap_or_default().to_string();
            let lang = result
                .cell(row, "lang")
                .and_then(|cell| cell.parse::<u32>().ok())
                .unwrap_or(self.default_language);
            match by_guid.get(&guid) {
                None => {
                    by_guid.insert(guid, kept.len());
                    kept.push(idx);
                }
                Some(&slot) => {
                    let current = &result.rows[kept[slot]];
                    let current_lang = result
                        .cell(current, "lang")
                        .and_then(|cell| cell.parse::<u32>().ok())
                        .unwrap_or(self.default_language);
                    if current_lang != requested && lang == requested {
                        kept[slot] = idx;
                    }
                }
            }
        }
        kept
    }

    // ==================== Terminal operations ====================

    /// OBJECT mode: run the query and materialize every row into a
    /// typed record.
    pub async fn execute(&self) -> Result<Vec<Record>, Error> {
        self.guard()?;
        let sql = self.assemble(&self.object_select_list()).await?;
        let result = self.run(&sql).await?;
        let lang_active = self.lang_active();

        let mut records = Vec::with_capacity(result.rows.len());
        for idx in self.surviving_rows(&result) {
            records.push(Record::from_row(
                &self.class,
                &result,
                &result.rows[idx],
                lang_active,
            )?);
        }
        Ok(records)
    }

    /// Read-only projection: same statement as OBJECT mode, but rows
    /// stay raw apart from the guid/sitegroup shortcut.
    pub async fn execute_raw(&self) -> Result<Vec<RawRecord>, Error> {
        self.guard()?;
        let sql = self.assemble(&self.object_select_list()).await?;
        let result = self.run(&sql).await?;
        let columns = Arc::new(result.columns.clone());

        let mut records = Vec::with_capacity(result.rows.len());
        for idx in self.surviving_rows(&result) {
            let row = &result.rows[idx];
            let guid = result.cell(row, "guid").unwrap_or_default().to_string();
            let sitegroup = result
                .cell(row, "sitegroup")
                .and_then(|cell| cell.parse::<u32>().ok())
                .unwrap_or(0);
            records.push(RawRecord::new(
                Arc::clone(&columns),
                row.clone(),
                guid,
                sitegroup,
            ));
        }
        Ok(records)
    }

    /// GUID mode: only the object identifiers.
    pub async fn list_guids(&self) -> Result<Vec<String>, Error> {
        self.guard()?;
        let sql = self.assemble(&self.guid_select_list()).await?;
        let result = self.run(&sql).await?;
        Ok(self
            .surviving_rows(&result)
            .into_iter()
            .filter_map(|idx| result.cell(&result.rows[idx], "guid"))
            .map(str::to_string)
            .collect())
    }

    /// COUNT mode: wraps the GUID-mode statement in a counting query.
    /// One round trip, no row transfer.
    pub async fn count(&self) -> Result<u64, Error> {
        self.guard()?;
        let select_list = if self.lang_active() {
            format!("DISTINCT {}.guid", self.class.table)
        } else {
            format!("{}.guid", self.class.table)
        };
        let inner = self.assemble(&select_list).await?;
        let sql = format!("SELECT COUNT(*) FROM ({}) AS qbcount", inner);
        let result = self.run(&sql).await?;
        let count = result
            .rows
            .first()
            .and_then(|row| row.first())
            .and_then(|cell| cell.as_deref())
            .and_then(|cell| cell.parse::<u64>().ok())
            .unwrap_or(0);
        Ok(count)
    }

    /// FIELD mode: caller-specified projection. Each returned map is
    /// keyed by the property names as passed, values decoded to the
    /// properties' declared types. This is the Collector's read path.
    pub async fn execute_fields(
        &mut self,
        names: &[String],
    ) -> Result<Vec<BTreeMap<String, Value>>, Error> {
        self.guard()?;

        let mut projected: Vec<(String, String, PropertyRef)> = Vec::with_capacity(names.len());
        for name in names {
            let prop = property::resolve(self.schema.as_ref(), &self.class, name)?;
            self.tables.insert(prop.table.clone());
            let alias = name.replace('.', "_");
            projected.push((name.clone(), alias, prop));
        }

        let mut cols: Vec<String> = projected
            .iter()
            .map(|(_, alias, prop)| format!("{} AS {}", prop.qualified(), alias))
            .collect();
        cols.push(format!("{}.guid", self.class.table));
        if self.lang_active() {
            cols.push(format!("{}.lang", self.class.lang_table()));
        }

        let sql = self.assemble(&cols.join(", ")).await?;
        let result = self.run(&sql).await?;

        let mut out = Vec::with_capacity(result.rows.len());
        for idx in self.surviving_rows(&result) {
            let row = &result.rows[idx];
            let mut map = BTreeMap::new();
            for (name, alias, prop) in &projected {
                let value = Value::decode_column(result.cell(row, alias), prop.declared_type)
                    .unwrap_or_else(|_| Value::zero(prop.declared_type));
                map.insert(name.clone(), value);
            }
            out.push(map);
        }
        Ok(out)
    }
}
