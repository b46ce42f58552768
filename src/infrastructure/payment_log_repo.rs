use async_trait::async_trait;
use crate::domain::{EvidenceVerdict, PaymentLog};
use crate::infrastructure::{PaymentLogRepository, RepositoryError};
use sqlx::{PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

pub struct PostgresPaymentLogRepository {
    pool: PgPool,
}

impl PostgresPaymentLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentLogRepository for PostgresPaymentLogRepository {
    async fn append(&self, entry: &PaymentLog) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO payment_logs (id, account_id, username, evidence_path, evidence_sha256,
                                      detected_bank, detected_amount, raw_output, verdict, reason,
                                      created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(entry.id)
        .bind(entry.account_id)
        .bind(&entry.username)
        .bind(&entry.evidence_path)
        .bind(&entry.evidence_sha256)
        .bind(&entry.detected_bank)
        .bind(entry.detected_amount)
        .bind(&entry.raw_output)
        .bind(entry.verdict.to_string())
        .bind(&entry.reason)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<PaymentLog, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, account_id, username, evidence_path, evidence_sha256, detected_bank,
                   detected_amount, raw_output, verdict, reason, created_at
            FROM payment_logs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => RepositoryError::NotFound(format!("Payment log {}", id)),
            _ => RepositoryError::DatabaseError(e),
        })?;

        row_to_payment_log(&row)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<PaymentLog>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, username, evidence_path, evidence_sha256, detected_bank,
                   detected_amount, raw_output, verdict, reason, created_at
            FROM payment_logs
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_payment_log).collect()
    }

    async fn list_by_account(&self, account_id: Uuid) -> Result<Vec<PaymentLog>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, username, evidence_path, evidence_sha256, detected_bank,
                   detected_amount, raw_output, verdict, reason, created_at
            FROM payment_logs
            WHERE account_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_payment_log).collect()
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM payment_logs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Payment log {}", id)));
        }
        Ok(())
    }

    async fn delete_all(&self) -> Result<Vec<PaymentLog>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            DELETE FROM payment_logs
            RETURNING id, account_id, username, evidence_path, evidence_sha256, detected_bank,
                      detected_amount, raw_output, verdict, reason, created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_payment_log).collect()
    }
}

fn row_to_payment_log(row: &sqlx::postgres::PgRow) -> Result<PaymentLog, RepositoryError> {
    let verdict_str: String = row.try_get("verdict")?;

    Ok(PaymentLog {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        username: row.try_get("username")?,
        evidence_path: row.try_get("evidence_path")?,
        evidence_sha256: row.try_get("evidence_sha256")?,
        detected_bank: row.try_get("detected_bank")?,
        detected_amount: row.try_get("detected_amount")?,
        raw_output: row.try_get("raw_output")?,
        verdict: EvidenceVerdict::from_str(&verdict_str)
            .map_err(|_| RepositoryError::InvalidData(format!("Unknown verdict: {}", verdict_str)))?,
        reason: row.try_get("reason")?,
        created_at: row.try_get("created_at")?,
    })
}
