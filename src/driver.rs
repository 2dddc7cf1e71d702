use async_trait::async_trait;

use crate::error::Error;
use crate::value::escape_string;

/// One fetched row; cells arrive in column order, `None` for SQL NULL.
/// Everything is carried in its text form, the way the legacy wire
/// protocol delivered it; typing happens at materialization.
pub type Row = Vec<Option<String>>;

#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell by column name. `None` for an unknown column or a NULL cell.
    pub fn cell<'a>(&self, row: &'a Row, name: &str) -> Option<&'a str> {
        let idx = self.column_index(name)?;
        row.get(idx).and_then(|c| c.as_deref())
    }
}

/// The external database connection. One SQL string in, one result set
/// out; no statement caching, no transactions. Implementations are
/// expected to be safe to share behind an `Arc`, but one logical query
/// runs one blocking round-trip at a time.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<ResultSet, Error>;

    /// Escape a string for inclusion inside single quotes. The default
    /// is the MySQL backslash convention; adapters with a server-side
    /// escape call should override.
    fn escape(&self, raw: &str) -> String {
        escape_string(raw)
    }

    async fn last_insert_id(&self) -> Result<u64, Error>;
}
