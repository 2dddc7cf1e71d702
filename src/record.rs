use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::driver::{ResultSet, Row};
use crate::error::Error;
use crate::query::property::metadata_column;
use crate::schema::ClassInfo;
use crate::value::{TypeTag, Value};

/// The fixed metadata column set every stored object carries. Datetime
/// columns use the legacy zero-datetime (`0000-00-00 00:00:00`) for
/// "never", decoded here as `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub creator: String,
    pub created: Option<DateTime<Utc>>,
    pub revisor: String,
    pub revised: Option<DateTime<Utc>>,
    pub revision: u32,
    pub locker: String,
    pub locked: Option<DateTime<Utc>>,
    pub approver: String,
    pub approved: Option<DateTime<Utc>>,
    pub authors: String,
    pub owner: String,
    pub schedule_start: Option<DateTime<Utc>>,
    pub schedule_end: Option<DateTime<Utc>>,
    pub hidden: bool,
    pub nav_noentry: bool,
    pub size: u32,
    pub published: Option<DateTime<Utc>>,
    pub exported: Option<DateTime<Utc>>,
    pub imported: Option<DateTime<Utc>>,
    pub deleted: bool,
    pub score: i32,
    pub is_locked: bool,
    pub is_approved: bool,
}

/// Parse a datetime cell; NULL, empty, and zero datetimes are `None`.
pub(crate) fn parse_datetime(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    if raw.is_empty() || raw.starts_with("0000-00-00") {
        return None;
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn cell_bool(result: &ResultSet, row: &Row, column: &str) -> bool {
    matches!(
        Value::decode_column(result.cell(row, column), TypeTag::Bool),
        Ok(Value::Bool(true))
    )
}

fn cell_string(result: &ResultSet, row: &Row, column: &str) -> String {
    result.cell(row, column).unwrap_or_default().to_string()
}

fn cell_uint(result: &ResultSet, row: &Row, column: &str) -> u32 {
    match Value::decode_column(result.cell(row, column), TypeTag::Uint) {
        Ok(Value::Uint(u)) => u,
        _ => 0,
    }
}

impl Metadata {
    pub(crate) fn from_row(result: &ResultSet, row: &Row) -> Metadata {
        let dt = |name: &str| parse_datetime(result.cell(row, &metadata_column(name)));
        Metadata {
            creator: cell_string(result, row, &metadata_column("creator")),
            created: dt("created"),
            revisor: cell_string(result, row, &metadata_column("revisor")),
            revised: dt("revised"),
            revision: cell_uint(result, row, &metadata_column("revision")),
            locker: cell_string(result, row, &metadata_column("locker")),
            locked: dt("locked"),
            approver: cell_string(result, row, &metadata_column("approver")),
            approved: dt("approved"),
            authors: cell_string(result, row, &metadata_column("authors")),
            owner: cell_string(result, row, &metadata_column("owner")),
            schedule_start: dt("schedule_start"),
            schedule_end: dt("schedule_end"),
            hidden: cell_bool(result, row, &metadata_column("hidden")),
            nav_noentry: cell_bool(result, row, &metadata_column("nav_noentry")),
            size: cell_uint(result, row, &metadata_column("size")),
            published: dt("published"),
            exported: dt("exported"),
            imported: dt("imported"),
            deleted: cell_bool(result, row, &metadata_column("deleted")),
            score: match Value::decode_column(
                result.cell(row, &metadata_column("score")),
                TypeTag::Int,
            ) {
                Ok(Value::Int(i)) => i as i32,
                _ => 0,
            },
            is_locked: cell_bool(result, row, &metadata_column("is_locked")),
            is_approved: cell_bool(result, row, &metadata_column("is_approved")),
        }
    }
}

/// One fully materialized object row: identity, metadata, and the
/// class-specific properties decoded to their declared types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub class: String,
    pub guid: String,
    pub sitegroup: u32,
    /// Language of the instance row this record came from, when the
    /// class is multilingual and a language filter was active.
    pub lang: Option<u32>,
    pub metadata: Metadata,
    properties: BTreeMap<String, Value>,
}

impl Record {
    pub(crate) fn from_row(
        class: &ClassInfo,
        result: &ResultSet,
        row: &Row,
        lang_active: bool,
    ) -> Result<Record, Error> {
        let mut properties = BTreeMap::new();
        for (name, storage) in &class.properties {
            let value = Value::decode_column(result.cell(row, &storage.column), storage.declared_type)
                .unwrap_or_else(|_| Value::zero(storage.declared_type));
            properties.insert(name.clone(), value);
        }

        let lang = if lang_active {
            match Value::decode_column(result.cell(row, "lang"), TypeTag::Uint) {
                Ok(Value::Uint(l)) => Some(l),
                _ => None,
            }
        } else {
            None
        };

        Ok(Record {
            class: class.name.clone(),
            guid: cell_string(result, row, "guid"),
            sitegroup: cell_uint(result, row, "sitegroup"),
            lang,
            metadata: Metadata::from_row(result, row),
            properties,
        })
    }

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.properties.get(property)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Read-only projection: the raw row is retained instead of being
/// materialized, with the guid/sitegroup shortcut decoded eagerly.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub guid: String,
    pub sitegroup: u32,
    columns: Arc<Vec<String>>,
    row: Row,
}

impl RawRecord {
    pub(crate) fn new(columns: Arc<Vec<String>>, row: Row, guid: String, sitegroup: u32) -> Self {
        Self {
            guid,
            sitegroup,
            columns,
            row,
        }
    }

    /// Raw cell by column name; `None` for unknown columns and NULLs.
    pub fn cell(&self, column: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.row.get(idx).and_then(|c| c.as_deref())
    }
}
