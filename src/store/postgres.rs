use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use super::RateStore;
use crate::currency::Currency;
use crate::error::StoreError;
use crate::exchange_rate::RateRecord;

const UNIQUE_VIOLATION: &str = "23505";

#[derive(sqlx::FromRow)]
struct RateRow {
    id: Uuid,
    base_currency: String,
    target_currency: String,
    rate: Decimal,
    observed_at: DateTime<Utc>,
}

impl TryFrom<RateRow> for RateRecord {
    type Error = StoreError;

    fn try_from(row: RateRow) -> Result<Self, Self::Error> {
        let parse = |code: &str| {
            code.parse::<Currency>()
                .map_err(|e| StoreError::Corrupt(format!("row {}: {e}", row.id)))
        };
        Ok(RateRecord {
            id: row.id,
            base_currency: parse(&row.base_currency)?,
            target_currency: parse(&row.target_currency)?,
            rate: row.rate,
            observed_at: row.observed_at,
        })
    }
}

fn into_records(rows: Vec<RateRow>) -> Result<Vec<RateRecord>, StoreError> {
    rows.into_iter().map(RateRecord::try_from).collect()
}

/// PostgreSQL-backed store over the `exchange_rates` table.
#[derive(Clone)]
pub struct PgRateStore {
    pool: PgPool,
}

impl PgRateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl RateStore for PgRateStore {
    async fn append(&self, records: &[RateRecord]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for record in records {
            let inserted = sqlx::query(
                "INSERT INTO exchange_rates (id, base_currency, target_currency, rate, observed_at) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(record.id)
            .bind(record.base_currency.code())
            .bind(record.target_currency.code())
            .bind(record.rate)
            .bind(record.observed_at)
            .execute(&mut *tx)
            .await;

            if let Err(e) = inserted {
                let duplicate = e
                    .as_database_error()
                    .and_then(|db| db.code())
                    .is_some_and(|code| code == UNIQUE_VIOLATION);
                // Dropping the transaction rolls it back.
                return Err(if duplicate {
                    StoreError::DuplicateRecord {
                        pair: record.pair(),
                        observed_at: record.observed_at,
                    }
                } else {
                    StoreError::Database(e)
                });
            }
        }

        tx.commit().await?;
        debug!("Committed {} exchange rates", records.len());

        Ok(())
    }

    async fn latest(
        &self,
        base: &Currency,
        target: &Currency,
    ) -> Result<Option<RateRecord>, StoreError> {
        let row = sqlx::query_as::<_, RateRow>(
            "SELECT id, base_currency, target_currency, rate, observed_at \
             FROM exchange_rates \
             WHERE base_currency = $1 AND target_currency = $2 \
             ORDER BY observed_at DESC \
             LIMIT 1",
        )
        .bind(base.code())
        .bind(target.code())
        .fetch_optional(&self.pool)
        .await?;

        row.map(RateRecord::try_from).transpose()
    }

    async fn history(
        &self,
        base: &Currency,
        target: &Currency,
    ) -> Result<Vec<RateRecord>, StoreError> {
        let rows = sqlx::query_as::<_, RateRow>(
            "SELECT id, base_currency, target_currency, rate, observed_at \
             FROM exchange_rates \
             WHERE base_currency = $1 AND target_currency = $2 \
             ORDER BY observed_at DESC",
        )
        .bind(base.code())
        .bind(target.code())
        .fetch_all(&self.pool)
        .await?;

        into_records(rows)
    }

    async fn latest_all(&self) -> Result<Vec<RateRecord>, StoreError> {
        let rows = sqlx::query_as::<_, RateRow>(
            "SELECT id, base_currency, target_currency, rate, observed_at \
             FROM exchange_rates \
             WHERE observed_at = (SELECT MAX(observed_at) FROM exchange_rates) \
             ORDER BY base_currency, target_currency",
        )
        .fetch_all(&self.pool)
        .await?;

        into_records(rows)
    }
}
