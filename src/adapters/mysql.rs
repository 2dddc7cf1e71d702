use async_trait::async_trait;
use sqlx::mysql::MySqlPool;
use sqlx::{Column, Row as _};

use crate::driver::{Driver, ResultSet};
use crate::error::Error;

/// `Driver` over a sqlx MySQL pool. Every cell is decoded to its text
/// form, matching the legacy wire shape the materializer expects.
pub struct MySqlDriver {
    pool: MySqlPool,
}

impl MySqlDriver {
    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, Error> {
        let pool = MySqlPool::connect(url)
            .await
            .map_err(|err| Error::Driver(err.to_string()))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl Driver for MySqlDriver {
    async fn execute(&self, sql: &str) -> Result<ResultSet, Error> {
        let fetched = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| Error::Driver(err.to_string()))?;

        let columns: Vec<String> = fetched
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let mut rows = Vec::with_capacity(fetched.len());
        for row in fetched {
            let mut cells = Vec::with_capacity(row.len());
            for idx in 0..row.len() {
                let cell: Option<String> = row
                    .try_get_unchecked(idx)
                    .map_err(|err| Error::Driver(err.to_string()))?;
                cells.push(cell);
            }
            rows.push(cells);
        }
        Ok(ResultSet { columns, rows })
    }

    async fn last_insert_id(&self) -> Result<u64, Error> {
        let row = sqlx::query("SELECT LAST_INSERT_ID()")
            .fetch_one(&self.pool)
            .await
            .map_err(|err| Error::Driver(err.to_string()))?;
        row.try_get_unchecked(0)
            .map_err(|err| Error::Driver(err.to_string()))
    }
}
